use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by the pipeline.
///
/// This is a single error enum shared across spec compilation, source ingestion, and the
/// coordinator. Both spec-level failures (`InvalidSpec`, `MissingColumn`) abort the whole
/// `make` invocation; no partial result is ever delivered.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed transform/filter parameters, detected at compile time.
    #[error("invalid spec: {message}")]
    InvalidSpec { message: String },

    /// A referenced column is absent after processing (or at clause compile time).
    #[error("missing column '{column}'")]
    MissingColumn { column: String },

    /// The run was cancelled via its [`crate::pipeline::CancelToken`] before completion.
    #[error("pipeline run cancelled")]
    Cancelled,

    /// Underlying I/O error while reading a source (e.g. file not found).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV source error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Spec (de)serialization error.
    #[error("spec json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A raw cell could not be parsed into the declared column type.
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    Parse {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },
}

impl PipelineError {
    /// Shorthand for an [`PipelineError::InvalidSpec`] with a formatted message.
    pub fn invalid_spec(message: impl Into<String>) -> Self {
        Self::InvalidSpec {
            message: message.into(),
        }
    }

    /// Shorthand for a [`PipelineError::MissingColumn`].
    pub fn missing_column(column: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
        }
    }
}
