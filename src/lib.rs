//! Vehicle load AutoML - model selection for overload classification
//!
//! Loads a vehicle dataset, prepares features, tunes five candidate
//! classifier families by cross-validated grid search, evaluates each on a
//! held-out split and persists every model together with the most accurate one.
//!
//! # Modules
//!
//! - [`data`] - Dataset discovery, CSV loading and the seeded split
//! - [`preprocessing`] - Column roles, scaling, label encoding
//! - [`training`] - Candidate families and the grid search
//! - [`evaluation`] - Metrics, held-out evaluation, diagnostics sinks
//! - [`selection`] - Winner selection
//! - [`export`] - Artifact persistence
//! - [`pipeline`] - The end-to-end run

// Core error handling
pub mod config;
pub mod error;

pub mod data;
pub mod evaluation;
pub mod export;
pub mod pipeline;
pub mod preprocessing;
pub mod selection;
pub mod training;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunSummary};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{DataPaths, OutputPaths, PipelineConfig};
    pub use crate::error::{PipelineError, Result};

    pub use crate::data::{DatasetLoader, LoadedDataset};
    pub use crate::evaluation::{DiagnosticsSink, EvaluationResult, Evaluator, JsonDiagnosticsSink};
    pub use crate::export::{ArtifactStore, PersistReport, VersionedArtifact};
    pub use crate::pipeline::{Pipeline, RunSummary};
    pub use crate::preprocessing::{ColumnRoles, FeaturePolicy, FeatureProcessor, FeatureSpec};
    pub use crate::selection::{select_and_persist, SelectionOutcome};
    pub use crate::training::{BinaryClassifier, CandidateModel, GridSearch, ModelFamily, ParamGrid, ParamValue};
}
