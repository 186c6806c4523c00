//! Declarative pipeline specification types.
//!
//! A [`DataSpec`] is the pre-validated internal form a chart declaration is parsed into:
//! derived columns ([`TransformSpec`]), row filters ([`FilterClause`]), per-column
//! ranking/limiting ([`MetaSpec`]), and optional grouped statistics ([`StatsSpec`]).
//!
//! Transforms, operators, and statistics are closed enums dispatched through exhaustive
//! `match`, so an unknown operator name is unrepresentable and fails at deserialization
//! time rather than mid-evaluation.
//!
//! All spec types are serde-serializable, so a spec can be carried as JSON:
//!
//! ```rust
//! use chart_data_pipeline::spec::DataSpec;
//!
//! let spec = DataSpec::from_json(
//!     r#"{
//!         "transforms": [
//!             {"trans": "bin", "key": "price", "name": "price_bin", "binwidth": 10.0}
//!         ],
//!         "filters": [
//!             {"column": "price", "op": "ge", "operand": 0.0}
//!         ],
//!         "select": ["price_bin"]
//!     }"#,
//! )
//! .unwrap();
//! assert_eq!(spec.transforms.len(), 1);
//! assert_eq!(spec.filters.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::types::Value;

/// Temporal binning unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// Snaps to the most recent Sunday (day index 0).
    Week,
    Month,
    Quarter,
    Year,
    /// Snaps the year down to the nearest multiple of ten.
    Decade,
}

/// Bin width: a positive number for numeric columns, a [`TimeUnit`] for temporal ones.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinWidth {
    /// Numeric bin width.
    Width(f64),
    /// Temporal bin unit.
    Unit(TimeUnit),
}

/// The transform to apply, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "trans", rename_all = "snake_case")]
pub enum TransformKind {
    /// Quantize a numeric or temporal column into buckets.
    Bin { binwidth: BinWidth },
    /// Shift a column down by `lag` rows.
    Lag { lag: usize },
}

/// One derived-column declaration.
///
/// `name` is either freshly introduced or intentionally overwrites `key`'s column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    /// Transform and parameters.
    #[serde(flatten)]
    pub trans: TransformKind,
    /// Source column.
    pub key: String,
    /// Destination column.
    pub name: String,
}

/// Comparison/membership operator of a [`FilterClause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Lt,
    Le,
    Gt,
    Ge,
    /// Membership against a list operand.
    In,
}

/// One `(column, operator, operand)` filter clause.
///
/// Clauses are AND-combined in declaration order; a row passes iff every clause is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Column the clause tests.
    pub column: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Operand: a scalar for the comparisons, a list for `in`.
    pub operand: Operand,
}

impl FilterClause {
    /// Build a scalar comparison clause.
    pub fn cmp(column: impl Into<String>, op: FilterOp, operand: Value) -> Self {
        Self {
            column: column.into(),
            op,
            operand: Operand::Scalar(operand),
        }
    }

    /// Build an `in` membership clause.
    pub fn is_in(column: impl Into<String>, levels: Vec<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::In,
            operand: Operand::List(levels),
        }
    }
}

/// Filter operand shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// A list, for `in`.
    List(Vec<Value>),
    /// A single scalar, for the comparisons.
    Scalar(Value),
}

/// Statistic applied when reducing a group of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Sum,
    Mean,
    Count,
    Unique,
    Min,
    Max,
    Median,
    /// Five-number summary with outliers.
    Box,
}

impl StatKind {
    /// Spec-facing name of the statistic; doubles as the default destination column in
    /// meta pre-aggregation.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Count => "count",
            Self::Unique => "unique",
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
            Self::Box => "box",
        }
    }
}

/// One statistic declaration: reduce `key` into destination column `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatSpec {
    /// Which statistic.
    pub stat: StatKind,
    /// Source column.
    pub key: String,
    /// Destination column in the grouped output.
    pub name: String,
}

/// Aggregation request: statistics computed per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsSpec {
    /// Statistics to compute for every group.
    pub stats: Vec<StatSpec>,
    /// Grouping columns; empty means one group over the whole frame.
    #[serde(default)]
    pub groups: Vec<String>,
}

/// Per-column ranking/limiting declaration.
///
/// Derives the surviving `levels` of a column ("top N by metric") and folds them back
/// into the filter stage as an inclusion set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaSpec {
    /// Column whose levels are ranked.
    pub column: String,
    /// Field to sort by (a raw column, or the `stat` destination when pre-aggregating).
    pub sort: String,
    /// Optional pre-aggregation keyed on `column` before sorting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<StatKind>,
    /// Keep at most this many surviving levels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Sort ascending (`true`) or descending (`false`).
    #[serde(default)]
    pub asc: bool,
}

/// Complete declarative description of one pipeline run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSpec {
    /// Derived columns, applied in declaration order.
    #[serde(default)]
    pub transforms: Vec<TransformSpec>,
    /// User filters, AND-combined in declaration order.
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    /// Per-column ranking/limiting.
    #[serde(default)]
    pub meta: Vec<MetaSpec>,
    /// Optional grouped aggregation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsSpec>,
    /// Columns the chart layer will read; validated to exist after processing.
    #[serde(default)]
    pub select: Vec<String>,
}

impl DataSpec {
    /// Parse a spec from its JSON representation.
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json).map_err(PipelineError::from)
    }
}
