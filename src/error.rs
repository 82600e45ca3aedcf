//! Error types for the evaluation harness

use thiserror::Error;

/// Result type alias for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Main error type for the evaluation harness
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Incompatible pipeline '{pipeline}': {reason}")]
    IncompatiblePipeline { pipeline: String, reason: String },

    #[error("Schema mismatch: unseen category '{value}' in column '{column}' and no fallback bucket reserved")]
    SchemaMismatch { column: String, value: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate fold for metric '{metric}': {reason}")]
    DegenerateFold { metric: String, reason: String },

    #[error("Metric '{metric}' undefined on a two-class fold: {reason}")]
    UndefinedMetric { metric: String, reason: String },

    #[error("Fit failed: {0}")]
    FitFailure(String),

    #[error("Predict failed: {0}")]
    PredictFailure(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Run cancelled")]
    Cancelled,
}

impl EvalError {
    /// Whether the error belongs to a single cell or trial rather than the whole run
    pub fn is_cell_level(&self) -> bool {
        matches!(
            self,
            EvalError::SchemaMismatch { .. }
                | EvalError::DegenerateFold { .. }
                | EvalError::UndefinedMetric { .. }
                | EvalError::FitFailure(_)
                | EvalError::PredictFailure(_)
                | EvalError::ModelNotFitted
        )
    }
}

impl From<polars::error::PolarsError> for EvalError {
    fn from(err: polars::error::PolarsError) -> Self {
        EvalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for EvalError {
    fn from(err: ndarray::ShapeError) -> Self {
        EvalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
