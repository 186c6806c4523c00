//! Core data model types for the pipeline.
//!
//! The pipeline operates on an in-memory [`Frame`]: row-major storage described by an
//! ordered [`Schema`], with per-column [`ColumnMeta`] accumulated separately as stages run.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Logical column type as seen by transform/stat dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Continuous numeric column.
    Num,
    /// Temporal column (epoch milliseconds).
    Date,
    /// Categorical/string column.
    Cat,
}

/// A single cell value in a [`Frame`].
///
/// `Time` carries epoch milliseconds. Serde uses the `untagged` representation so values
/// can appear directly as filter operands in a JSON spec; untagged deserialization maps
/// JSON numbers to [`Value::Num`], so timestamp operands arrive as `Num` and are compared
/// numerically against `Time` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit float.
    Num(f64),
    /// UTF-8 string.
    Str(String),
    /// Epoch-millisecond timestamp.
    Time(i64),
    /// Five-number summary produced by the box statistic.
    Summary(Box<BoxSummary>),
}

impl Value {
    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, if it has one (`Num` or `Time`).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(v) => Some(*v),
            Self::Time(t) => Some(*t as f64),
            _ => None,
        }
    }

    /// Three-way comparison used by filters, sorting, and min/max.
    ///
    /// `Num` and `Time` compare numerically (also against each other), `Str` compares
    /// lexicographically. Pairs with no defined order (nulls, NaN, mixed string/number,
    /// summaries) return `None`.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }
}

/// Five-number summary with outliers, produced by the box statistic.
///
/// When the input carries fewer than six non-null values the quartiles cannot be
/// computed and only `outliers` (then holding all values) is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSummary {
    /// Quartile values, absent when the input was too small.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quartiles: Option<Quartiles>,
    /// Values outside the inter-quartile outlier bounds (or all values if too few).
    pub outliers: Vec<f64>,
}

/// The five quartile values of a [`BoxSummary`].
///
/// `q1`/`q5` are the extremes of the inliers, `q2`/`q4` the lower/upper quartiles, and
/// `q3` the median of all values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quartiles {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
    pub q4: f64,
    pub q5: f64,
}

/// A single named, typed column in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: ColumnType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered list of columns describing the shape of a [`Frame`]'s rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// In-memory tabular frame.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
/// Pipeline stages take the frame by value (or `&mut`) and hand it onward; no stage
/// retains a reference past its own turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Create a frame from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the frame.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All values of one column, in row order. `None` if the column is absent.
    pub fn column_values(&self, name: &str) -> Option<Vec<Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|row| row[idx].clone()).collect())
    }

    /// Drop rows for which `predicate` returns `false`, in place.
    pub fn retain_rows<F>(&mut self, mut predicate: F)
    where
        F: FnMut(&[Value]) -> bool,
    {
        self.rows.retain(|row| predicate(row.as_slice()));
    }

    /// Ensure a column named `name` with type `ty` exists, returning its index.
    ///
    /// A fresh column is appended to the schema and every row is padded with
    /// [`Value::Null`]; an existing column has its type overwritten (transform
    /// destinations may intentionally replace their source column).
    pub fn ensure_column(&mut self, name: &str, ty: ColumnType) -> usize {
        match self.schema.index_of(name) {
            Some(idx) => {
                self.schema.fields[idx].ty = ty;
                idx
            }
            None => {
                self.schema.fields.push(Field::new(name, ty));
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
                self.schema.fields.len() - 1
            }
        }
    }
}

/// Per-column metadata accumulated across pipeline stages.
///
/// Stages only ever overwrite the entry for the column they produced; entries for other
/// columns accumulate monotonically in the enclosing [`MetaMap`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Logical type of the column.
    pub ty: ColumnType,
    /// Whether the column was produced by a bin transform.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub binned: bool,
    /// Bin width, when `binned`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<crate::spec::BinWidth>,
    /// Distinct surviving values after meta ranking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<Value>>,
    /// Whether `levels` is in ranked order.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sorted: bool,
}

impl ColumnMeta {
    /// Plain metadata for a column of the given type.
    pub fn of_type(ty: ColumnType) -> Self {
        Self {
            ty,
            binned: false,
            bin: None,
            levels: None,
            sorted: false,
        }
    }
}

/// Column-name-keyed metadata map.
///
/// A `BTreeMap` keeps iteration deterministic, so repeated runs over unchanged input
/// produce identical output.
pub type MetaMap = BTreeMap<String, ColumnMeta>;

/// Raw dataset as delivered by a [`crate::source::DataSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Raw rows.
    pub data: Frame,
    /// Metadata for the raw columns.
    pub meta: MetaMap,
}
