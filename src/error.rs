//! Error types for the churnlab pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// An expected column is missing or its contents are malformed
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A scoring metric cannot be computed for the given labels
    #[error("Metric '{metric}' is undefined: {reason}")]
    MetricUndefined { metric: String, reason: String },

    /// The model variant does not provide the requested introspection
    #[error("Model '{model}' does not support {capability}")]
    UnsupportedCapability { model: String, capability: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl PipelineError {
    /// Capability absence is reported as an informational skip, never a failure
    pub fn is_capability_absence(&self) -> bool {
        matches!(self, PipelineError::UnsupportedCapability { .. })
    }

    /// Errors that abort a run before any model is fitted
    pub fn is_fatal_setup_error(&self) -> bool {
        matches!(
            self,
            PipelineError::SchemaError(_)
                | PipelineError::ConfigError(_)
                | PipelineError::ValidationError(_)
        )
    }

    pub(crate) fn unsupported(model: impl Into<String>, capability: impl Into<String>) -> Self {
        PipelineError::UnsupportedCapability {
            model: model.into(),
            capability: capability.into(),
        }
    }

    pub(crate) fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        PipelineError::ShapeError {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for PipelineError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        PipelineError::ThreadPoolError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::SchemaError("missing column 'Exited'".to_string());
        assert_eq!(err.to_string(), "Schema error: missing column 'Exited'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::IoError(_)));
    }

    #[test]
    fn test_capability_absence_is_not_fatal() {
        let err = PipelineError::unsupported("logistic_regression", "feature importances");
        assert!(err.is_capability_absence());
        assert!(!err.is_fatal_setup_error());
        assert!(PipelineError::SchemaError("x".into()).is_fatal_setup_error());
    }
}
