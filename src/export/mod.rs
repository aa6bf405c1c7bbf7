//! Artifact persistence
//!
//! Fitted models are written as JSON inside a versioned envelope, metrics
//! documents as YAML.

mod artifacts;

pub(crate) use artifacts::write_json_atomic;
pub use artifacts::{ArtifactStore, MetricsDocument, PersistReport, VersionedArtifact, FORMAT_VERSION};
