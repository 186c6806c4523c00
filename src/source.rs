//! Raw-data acquisition.
//!
//! The coordinator only sees the [`DataSource`] trait: a fetch of the raw
//! [`crate::types::RawTable`], plus an optional remote-compute capability for backends
//! that can evaluate a [`DataSpec`] themselves. Two implementations ship here:
//! [`MemorySource`] for in-process arrays and [`CsvSource`] for schema-first CSV files.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};

use crate::error::{PipelineError, PipelineResult};
use crate::spec::DataSpec;
use crate::types::{ColumnMeta, ColumnType, Field, Frame, MetaMap, RawTable, Schema, Value};

/// A handle to the raw dataset behind a pipeline.
pub trait DataSource {
    /// Fetch the raw rows and their column metadata.
    ///
    /// This is the pipeline's only suspension seam; implementations may block (file
    /// read, network fetch). The rest of a run executes synchronously once data arrives.
    fn fetch(&self) -> PipelineResult<RawTable>;

    /// Delegate a whole spec to a remote backend, if this source supports one.
    ///
    /// `None` means "no backend, process locally". `Some(result)` is used as the run's
    /// output verbatim.
    fn compute(&self, _spec: &DataSpec) -> Option<PipelineResult<(Frame, MetaMap)>> {
        None
    }
}

/// An in-memory raw dataset.
#[derive(Debug, Clone)]
pub struct MemorySource {
    table: RawTable,
}

impl MemorySource {
    /// Wrap an already-materialized table.
    pub fn new(table: RawTable) -> Self {
        Self { table }
    }

    /// Build a source from a frame, deriving plain per-column metadata from the schema.
    pub fn from_frame(frame: Frame) -> Self {
        let meta = meta_from_schema(&frame.schema);
        Self {
            table: RawTable { data: frame, meta },
        }
    }
}

impl DataSource for MemorySource {
    fn fetch(&self) -> PipelineResult<RawTable> {
        Ok(self.table.clone())
    }
}

/// Plain metadata entries for every schema field.
pub fn meta_from_schema(schema: &Schema) -> MetaMap {
    schema
        .fields
        .iter()
        .map(|f| (f.name.clone(), ColumnMeta::of_type(f.ty)))
        .collect()
}

/// Schema-first CSV file source.
///
/// Rules:
///
/// - The CSV must have headers, and they must contain every schema field (order can
///   differ).
/// - Each value parses according to its declared [`ColumnType`]: `Num` as float, `Cat`
///   as string, `Date` as RFC 3339 or `%Y-%m-%d` into epoch milliseconds.
/// - Empty cells map to null.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    schema: Schema,
}

impl CsvSource {
    /// Create a source reading `path` with the given declared schema.
    pub fn new(path: impl AsRef<Path>, schema: Schema) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema,
        }
    }
}

impl DataSource for CsvSource {
    fn fetch(&self) -> PipelineResult<RawTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?;
        let data = read_csv(&mut rdr, &self.schema)?;
        let meta = meta_from_schema(&self.schema);
        Ok(RawTable { data, meta })
    }
}

/// Read CSV data from an existing reader into a [`Frame`] shaped by `schema`.
pub fn read_csv<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    schema: &Schema,
) -> PipelineResult<Frame> {
    let headers = rdr.headers()?.clone();

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.fields.len());
    for field in &schema.fields {
        match headers.iter().position(|h| h == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => return Err(PipelineError::missing_column(&field.name)),
        }
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for (row_idx0, result) in rdr.records().enumerate() {
        // Report 1-based row number for users; +1 again because header is row 1.
        let user_row = row_idx0 + 2;
        let record = result?;

        let mut row: Vec<Value> = Vec::with_capacity(schema.fields.len());
        for (field, &csv_idx) in schema.fields.iter().zip(col_idxs.iter()) {
            let raw = record.get(csv_idx).unwrap_or("");
            row.push(parse_typed_value(user_row, &field.name, field.ty, raw)?);
        }
        rows.push(row);
    }

    Ok(Frame::new(schema.clone(), rows))
}

fn parse_typed_value(
    row: usize,
    column: &str,
    ty: ColumnType,
    raw: &str,
) -> PipelineResult<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }

    match ty {
        ColumnType::Cat => Ok(Value::Str(trimmed.to_owned())),
        ColumnType::Num => trimmed.parse::<f64>().map(Value::Num).map_err(|e| {
            PipelineError::Parse {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: e.to_string(),
            }
        }),
        ColumnType::Date => parse_timestamp(trimmed).map(Value::Time).ok_or_else(|| {
            PipelineError::Parse {
                row,
                column: column.to_owned(),
                raw: raw.to_owned(),
                message: "expected RFC 3339 datetime or YYYY-MM-DD date".to_string(),
            }
        }),
    }
}

fn parse_timestamp(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// A convenience constructor for schema-first fields.
pub fn schema_of(fields: &[(&str, ColumnType)]) -> Schema {
    Schema::new(
        fields
            .iter()
            .map(|(name, ty)| Field::new(*name, *ty))
            .collect(),
    )
}
