//! Error types for the model-selection pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No dataset found: looked for {}", format_paths(.searched))]
    MissingDataset { searched: Vec<PathBuf> },

    #[error("Target column '{0}' not found in dataset")]
    MissingTarget(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Training failed for {family}: {reason}")]
    TrainingFailure { family: String, reason: String },

    #[error("No validation data available for evaluation")]
    NoValidationData,

    #[error("Failed to write artifact {path}: {reason}")]
    ArtifactWriteError { path: PathBuf, reason: String },

    #[error("No candidate model survived training")]
    NoCandidates,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error must abort the whole run.
    ///
    /// Training and artifact failures are isolated to one family or one file.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::TrainingFailure { .. } | PipelineError::ArtifactWriteError { .. }
        )
    }

    pub(crate) fn training(family: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::TrainingFailure {
            family: family.into(),
            reason: reason.to_string(),
        }
    }
}

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("'{}'", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
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

impl From<serde_yaml::Error> for PipelineError {
    fn from(err: serde_yaml::Error) -> Self {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dataset_names_files() {
        let err = PipelineError::MissingDataset {
            searched: vec![PathBuf::from("train.csv"), PathBuf::from("full.csv")],
        };
        let msg = err.to_string();
        assert!(msg.contains("'train.csv'"));
        assert!(msg.contains("'full.csv'"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[test]
    fn test_fatality() {
        assert!(PipelineError::NoValidationData.is_fatal());
        assert!(PipelineError::MissingTarget("y".into()).is_fatal());
        assert!(!PipelineError::training("svm", "diverged").is_fatal());
        assert!(!PipelineError::ArtifactWriteError {
            path: PathBuf::from("x"),
            reason: "denied".into(),
        }
        .is_fatal());
    }
}
