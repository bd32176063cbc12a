//! Error types for fairfit

use thiserror::Error;

/// Result type alias for fairfit operations
pub type Result<T> = std::result::Result<T, FairfitError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum FairfitError {
    #[error("Unsupported model kind: {0}")]
    UnsupportedModelKind(String),

    #[error("Misaligned indices: expected {expected} predictions, got {actual}")]
    MisalignedIndices { expected: usize, actual: usize },

    #[error("Row index {index} out of bounds for dataset with {len} rows")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Technique '{technique}' failed: {source}")]
    TechniqueFailed {
        technique: String,
        #[source]
        source: Box<FairfitError>,
    },

    #[error("Technique '{technique}' did not finish within {timeout_secs}s")]
    TechniqueTimeout { technique: String, timeout_secs: f64 },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FairfitError {
    /// Wrap an error with the technique that raised it
    pub fn in_technique(self, technique: impl Into<String>) -> Self {
        FairfitError::TechniqueFailed {
            technique: technique.into(),
            source: Box::new(self),
        }
    }
}

impl From<polars::error::PolarsError> for FairfitError {
    fn from(err: polars::error::PolarsError) -> Self {
        FairfitError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FairfitError {
    fn from(err: serde_json::Error) -> Self {
        FairfitError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FairfitError {
    fn from(err: ndarray::ShapeError) -> Self {
        FairfitError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FairfitError::UnsupportedModelKind("naive_bayes".to_string());
        assert_eq!(err.to_string(), "Unsupported model kind: naive_bayes");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FairfitError = io_err.into();
        assert!(matches!(err, FairfitError::IoError(_)));
    }

    #[test]
    fn test_technique_wrapping_keeps_source() {
        let err = FairfitError::ModelNotFitted.in_technique("reweighing");
        assert_eq!(err.to_string(), "Technique 'reweighing' failed: Model not fitted");
        match err {
            FairfitError::TechniqueFailed { technique, source } => {
                assert_eq!(technique, "reweighing");
                assert!(matches!(*source, FairfitError::ModelNotFitted));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
