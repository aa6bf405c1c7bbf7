//! Model evaluation module
//!
//! Classification metrics, held-out evaluation and diagnostics sinks.

pub mod diagnostics;
pub mod evaluator;
pub mod metrics;

pub use diagnostics::{DiagnosticsSink, JsonDiagnosticsSink, ModelScore, NullDiagnosticsSink};
pub use evaluator::{Diagnostics, EvaluationResult, Evaluator, CONFUSION_ORDER, POSITIVE_LABEL};
pub use metrics::{accuracy, ClassificationReport, ConfusionMatrix, FeatureImportance, RocCurve};
