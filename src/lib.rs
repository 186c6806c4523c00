//! `chart-data-pipeline` turns a raw tabular dataset plus a declarative spec into the
//! exact aggregated, filtered, binned [`types::Frame`] a chart layer will render.
//!
//! It is a small interpreter for a declarative query language, run in a fixed order by
//! the [`pipeline::DataProcessor`] coordinator:
//!
//! 1. **Transforms** ([`spec::TransformSpec`]): derive columns by binning numeric or
//!    temporal values, or lagging a column by `n` rows.
//! 2. **Filters** ([`spec::FilterClause`]): an AND-combined predicate tree compiled to a
//!    single row predicate (`lt`/`le`/`gt`/`ge`/`in`).
//! 3. **Meta ranking** ([`spec::MetaSpec`]): "top N categories by metric" — rank a
//!    column's levels, keep the first `limit`, and fold the survivors back in as an
//!    inclusion filter.
//! 4. **Statistics** ([`spec::StatsSpec`]): group rows and reduce each group
//!    (sum/mean/count/unique/min/max/median/box).
//!
//! The result is a `{data, meta}` pair ([`pipeline::PipelineOutput`]): the final rows
//! (raw or grouped) plus accumulated per-column metadata (types, bin widths, surviving
//! levels).
//!
//! ## Quick example: group-and-sum
//!
//! ```rust
//! use chart_data_pipeline::pipeline::DataProcessor;
//! use chart_data_pipeline::source::MemorySource;
//! use chart_data_pipeline::spec::DataSpec;
//! use chart_data_pipeline::types::{ColumnType, Field, Frame, Schema, Value};
//!
//! let schema = Schema::new(vec![
//!     Field::new("region", ColumnType::Cat),
//!     Field::new("amount", ColumnType::Num),
//! ]);
//! let frame = Frame::new(
//!     schema,
//!     vec![
//!         vec![Value::Str("west".into()), Value::Num(10.0)],
//!         vec![Value::Str("east".into()), Value::Num(20.0)],
//!         vec![Value::Str("west".into()), Value::Num(30.0)],
//!     ],
//! );
//!
//! let spec = DataSpec::from_json(
//!     r#"{
//!         "stats": {
//!             "stats": [{"stat": "sum", "key": "amount", "name": "total"}],
//!             "groups": ["region"]
//!         },
//!         "select": ["region", "total"]
//!     }"#,
//! )
//! .unwrap();
//!
//! let mut processor = DataProcessor::new(MemorySource::from_frame(frame), spec.clone());
//! let out = processor.make(&spec).unwrap();
//!
//! assert_eq!(out.data.rows.len(), 2);
//! assert_eq!(
//!     out.data.rows[0],
//!     vec![Value::Str("west".to_string()), Value::Num(40.0)]
//! );
//! ```
//!
//! ## Errors
//!
//! Two failures abort a run with no partial result: [`error::PipelineError::InvalidSpec`]
//! (malformed transform/filter parameters, caught at compile time) and
//! [`error::PipelineError::MissingColumn`] (a `select`-ed column absent after
//! processing). Cancelling a run's [`pipeline::CancelToken`] aborts it with
//! [`error::PipelineError::Cancelled`] before its result is cached.
//!
//! ## Modules
//!
//! - [`spec`]: the declarative spec types (serde-serializable, closed enums)
//! - [`types`]: frame, values, and column metadata
//! - [`pipeline`]: the stage implementations and the coordinator
//! - [`source`]: the raw-data acquisition seam (in-memory, CSV, remote-compute)
//! - [`observe`]: observer hooks and run metrics
//! - [`error`]: the shared error type

pub mod error;
pub mod observe;
pub mod pipeline;
pub mod source;
pub mod spec;
pub mod types;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{CancelToken, DataProcessor, PipelineOutput};
