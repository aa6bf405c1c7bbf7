//! On-disk artifacts: fitted models, metrics documents, feature list, scaler
//!
//! Every write goes to a sibling temp file first and is renamed into place, so
//! a reader never observes a half-written artifact.

use crate::config::OutputPaths;
use crate::error::{PipelineError, Result};
use crate::evaluation::metrics::ClassificationReport;
use crate::evaluation::EvaluationResult;
use crate::preprocessing::{FeatureSpec, StandardScaler};
use crate::training::{CandidateModel, Hyperparameters, ModelFamily};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Bumped whenever the serialized model layout changes
pub const FORMAT_VERSION: u32 = 1;

/// Model wrapped with what a consumer needs to use it safely
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionedArtifact<M> {
    pub format_version: u32,
    pub family: ModelFamily,
    /// Column order the model expects
    pub feature_names: Vec<String>,
    /// Class labels; index = encoded value
    pub classes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub model: M,
}

/// Per-family metrics document (`<family>_metrics.yml`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsDocument {
    pub family: ModelFamily,
    pub accuracy: f64,
    pub cv_score: f64,
    pub classification_report: ClassificationReport,
    pub best_params: Hyperparameters,
    pub training_time: DateTime<Utc>,
    pub fit_seconds: f64,
}

impl MetricsDocument {
    pub fn from_result(result: &EvaluationResult) -> Self {
        Self {
            family: result.family,
            accuracy: result.accuracy,
            cv_score: result.cv_score,
            classification_report: result.report.clone(),
            best_params: result.best_params.clone(),
            training_time: result.evaluated_at,
            fit_seconds: result.fit_seconds,
        }
    }
}

/// Outcome of a batch of independent writes
#[derive(Debug, Default)]
pub struct PersistReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<PipelineError>,
}

impl PersistReport {
    /// Record one write; failures are logged and kept, never propagated
    pub fn record(&mut self, outcome: Result<PathBuf>) {
        match outcome {
            Ok(path) => {
                info!(path = %path.display(), "Artifact written");
                self.written.push(path);
            }
            Err(e) => {
                error!(error = %e, "Artifact write failed");
                self.failures.push(e);
            }
        }
    }

    /// Record a group of writes that succeed or fail together
    pub fn record_all(&mut self, outcome: Result<Vec<PathBuf>>) {
        match outcome {
            Ok(paths) => paths.into_iter().for_each(|path| self.record(Ok(path))),
            Err(e) => self.record(Err(e)),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: PersistReport) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
    }
}

/// Writes artifacts under the configured output locations
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    paths: OutputPaths,
}

impl ArtifactStore {
    pub fn new(paths: OutputPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.paths.models_dir, &self.paths.results_dir] {
            fs::create_dir_all(dir).map_err(|e| write_error(dir, e))?;
        }
        Ok(())
    }

    pub fn model_path(&self, family: ModelFamily) -> PathBuf {
        self.paths.models_dir.join(format!("{}_model.json", family.name()))
    }

    pub fn metrics_path(&self, family: ModelFamily) -> PathBuf {
        self.paths.results_dir.join(format!("{}_metrics.yml", family.name()))
    }

    pub fn write_feature_spec(&self, spec: &FeatureSpec) -> Result<PathBuf> {
        let path = self.paths.feature_list_path.clone();
        write_json_atomic(&path, spec)?;
        Ok(path)
    }

    pub fn write_scaler(&self, scaler: &StandardScaler) -> Result<PathBuf> {
        let path = self.paths.scaler_path.clone();
        write_json_atomic(&path, scaler)?;
        Ok(path)
    }

    /// `models/<family>_model.json` and `model_evaluation/<family>_metrics.yml`, both or neither.
    ///
    /// Both documents are staged before either is renamed into place; any
    /// failure removes whatever this call already produced.
    pub fn write_family(&self, result: &EvaluationResult, spec: &FeatureSpec) -> Result<Vec<PathBuf>> {
        let family = result.family.name();
        let model_path = self.model_path(result.family);
        let metrics_path = self.metrics_path(result.family);
        let family_error = |e: PipelineError| match e {
            PipelineError::ArtifactWriteError { path, reason } => PipelineError::ArtifactWriteError {
                path,
                reason: format!("family {}: {}", family, reason),
            },
            other => other,
        };

        let model_tmp = stage(&model_path, |w| {
            serde_json::to_writer_pretty(w, &envelope(result, spec)).map_err(|e| e.to_string())
        })
        .map_err(family_error)?;
        let metrics_tmp = match stage(&metrics_path, |w| {
            serde_yaml::to_writer(w, &MetricsDocument::from_result(result)).map_err(|e| e.to_string())
        }) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&model_tmp);
                return Err(family_error(e));
            }
        };

        let committed = commit(&model_tmp, &model_path).and_then(|_| {
            commit(&metrics_tmp, &metrics_path).map_err(|e| {
                let _ = fs::remove_file(&model_path);
                e
            })
        });
        if let Err(e) = committed {
            let _ = fs::remove_file(&model_tmp);
            let _ = fs::remove_file(&metrics_tmp);
            return Err(family_error(e));
        }
        Ok(vec![model_path, metrics_path])
    }

    /// The winner under its family-independent name
    pub fn write_best_model(&self, result: &EvaluationResult, spec: &FeatureSpec) -> Result<PathBuf> {
        let path = self.paths.best_model_path.clone();
        write_json_atomic(&path, &envelope(result, spec))?;
        Ok(path)
    }

    pub fn load_model(path: &Path) -> Result<VersionedArtifact<CandidateModel>> {
        let text = fs::read_to_string(path)?;
        let artifact: VersionedArtifact<CandidateModel> = serde_json::from_str(&text)?;
        if artifact.format_version != FORMAT_VERSION {
            return Err(PipelineError::ValidationError(format!(
                "Unsupported model format version {} (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }
        Ok(artifact)
    }
}

fn envelope<'a>(result: &'a EvaluationResult, spec: &FeatureSpec) -> VersionedArtifact<&'a CandidateModel> {
    VersionedArtifact {
        format_version: FORMAT_VERSION,
        family: result.family,
        feature_names: spec.feature_names.clone(),
        classes: spec.classes.clone(),
        created_at: result.evaluated_at,
        model: &result.model,
    }
}

fn write_error(path: &Path, e: impl ToString) -> PipelineError {
    PipelineError::ArtifactWriteError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |w| serde_json::to_writer_pretty(w, value).map_err(|e| e.to_string()))
}

fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), String>,
{
    let tmp = stage(path, write)?;
    commit(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        e
    })
}

/// Write the document to `.<name>.tmp` beside `path` and return the temp path
fn stage<F>(path: &Path, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<File>) -> std::result::Result<(), String>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_error(path, e))?;
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| write_error(path, "path has no file name"))?
        .to_string_lossy();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    let result = (|| {
        let file = File::create(&tmp).map_err(|e| e.to_string())?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer.flush().map_err(|e| e.to_string())
    })();

    match result {
        Ok(()) => Ok(tmp),
        Err(reason) => {
            let _ = fs::remove_file(&tmp);
            Err(write_error(path, reason))
        }
    }
}

fn commit(tmp: &Path, path: &Path) -> Result<()> {
    fs::rename(tmp, path).map_err(|e| write_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        write_json_atomic(&path, &vec![1, 2, 3]).unwrap();
        write_json_atomic(&path, &vec![4]).unwrap();

        let restored: Vec<i32> = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(restored, vec![4]);
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_write_failure_is_artifact_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let err = write_json_atomic(&blocker.join("doc.json"), &1).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactWriteError { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_persist_report_collects() {
        let mut report = PersistReport::default();
        report.record(Ok(PathBuf::from("a.json")));
        report.record(Err(write_error(Path::new("b.json"), "disk full")));
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_record_all_keeps_group_together() {
        let mut report = PersistReport::default();
        report.record_all(Ok(vec![PathBuf::from("a.json"), PathBuf::from("a.yml")]));
        report.record_all(Err(write_error(Path::new("b.json"), "family b: disk full")));
        assert_eq!(report.written.len(), 2);
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn test_store_paths() {
        let store = ArtifactStore::new(OutputPaths::rooted_at(Path::new("/out")));
        assert_eq!(
            store.model_path(ModelFamily::AdaBoost),
            PathBuf::from("/out/models/ada_boost_model.json")
        );
        assert_eq!(
            store.metrics_path(ModelFamily::Svm),
            PathBuf::from("/out/model_evaluation/svm_metrics.yml")
        );
    }
}
