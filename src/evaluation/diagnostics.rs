//! Where diagnostics go once computed
//!
//! Evaluation produces plain data; rendering or storing it is the sink's job.

use super::evaluator::{Diagnostics, EvaluationResult};
use crate::error::Result;
use crate::export::write_json_atomic;
use crate::training::ModelFamily;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// One row of the cross-family comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub family: ModelFamily,
    pub accuracy: f64,
    pub cv_score: f64,
}

impl ModelScore {
    pub fn from_results(results: &[EvaluationResult]) -> Vec<ModelScore> {
        results
            .iter()
            .map(|r| ModelScore {
                family: r.family,
                accuracy: r.accuracy,
                cv_score: r.cv_score,
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct ComparisonDocument<'a> {
    models: &'a [ModelScore],
    best: Option<ModelFamily>,
}

pub trait DiagnosticsSink {
    fn record_family(&self, diagnostics: &Diagnostics) -> Result<()>;

    /// Accuracy of every surviving family, in evaluation order
    fn record_comparison(&self, scores: &[ModelScore], best: Option<ModelFamily>) -> Result<()>;
}

/// Writes `<family>_diagnostics.json` and `model_comparison.json` into a directory
#[derive(Debug, Clone)]
pub struct JsonDiagnosticsSink {
    dir: PathBuf,
}

impl JsonDiagnosticsSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn family_path(&self, family: ModelFamily) -> PathBuf {
        self.dir.join(format!("{}_diagnostics.json", family.name()))
    }

    pub fn comparison_path(&self) -> PathBuf {
        self.dir.join("model_comparison.json")
    }
}

impl DiagnosticsSink for JsonDiagnosticsSink {
    fn record_family(&self, diagnostics: &Diagnostics) -> Result<()> {
        write_json_atomic(&self.family_path(diagnostics.family), diagnostics)
    }

    fn record_comparison(&self, scores: &[ModelScore], best: Option<ModelFamily>) -> Result<()> {
        write_json_atomic(&self.comparison_path(), &ComparisonDocument { models: scores, best })
    }
}

/// Drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnosticsSink;

impl DiagnosticsSink for NullDiagnosticsSink {
    fn record_family(&self, _diagnostics: &Diagnostics) -> Result<()> {
        Ok(())
    }

    fn record_comparison(&self, _scores: &[ModelScore], _best: Option<ModelFamily>) -> Result<()> {
        Ok(())
    }
}

/// Hand diagnostics to `sink`, logging instead of failing
pub fn emit_family(sink: &dyn DiagnosticsSink, diagnostics: &Diagnostics) {
    if let Err(e) = sink.record_family(diagnostics) {
        warn!(family = diagnostics.family.name(), error = %e, "Diagnostics sink failed");
    }
}

pub fn emit_comparison(sink: &dyn DiagnosticsSink, scores: &[ModelScore], best: Option<ModelFamily>) {
    if let Err(e) = sink.record_comparison(scores, best) {
        warn!(error = %e, "Comparison sink failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::ConfusionMatrix;
    use tempfile::TempDir;

    fn diagnostics() -> Diagnostics {
        Diagnostics {
            family: ModelFamily::Mlp,
            roc: None,
            confusion_matrix: ConfusionMatrix {
                labels: vec!["Not Overloaded".to_string(), "Overloaded".to_string()],
                counts: [[3, 1], [0, 4]],
            },
            feature_importances: Vec::new(),
        }
    }

    #[test]
    fn test_json_sink_writes_documents() {
        let dir = TempDir::new().unwrap();
        let sink = JsonDiagnosticsSink::new(dir.path());

        sink.record_family(&diagnostics()).unwrap();
        let text = std::fs::read_to_string(dir.path().join("mlp_diagnostics.json")).unwrap();
        let restored: Diagnostics = serde_json::from_str(&text).unwrap();
        assert_eq!(restored, diagnostics());

        let scores = vec![
            ModelScore { family: ModelFamily::RandomForest, accuracy: 0.9, cv_score: 0.88 },
            ModelScore { family: ModelFamily::Svm, accuracy: 0.8, cv_score: 0.81 },
        ];
        sink.record_comparison(&scores, Some(ModelFamily::RandomForest)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(sink.comparison_path()).unwrap()).unwrap();
        assert_eq!(json["best"], "random_forest");
        assert_eq!(json["models"][1]["family"], "svm");
    }

    #[test]
    fn test_sink_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let sink = JsonDiagnosticsSink::new(blocker.join("sub"));

        assert!(sink.record_family(&diagnostics()).is_err());
        emit_family(&sink, &diagnostics());
        emit_comparison(&sink, &[], None);
    }
}
