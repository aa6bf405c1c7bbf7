//! Held-out evaluation of a searched and refit model

use super::metrics::{
    accuracy, rank_importances, roc_curve, ClassificationReport, ConfusionMatrix, FeatureImportance, RocCurve,
};
use crate::error::{PipelineError, Result};
use crate::preprocessing::FeatureSpec;
use crate::training::{BinaryClassifier, CandidateModel, Hyperparameters, ModelFamily, SearchOutcome};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Class treated as positive for ROC analysis when present
pub const POSITIVE_LABEL: &str = "Overloaded";

/// Confusion matrix row/column order
pub const CONFUSION_ORDER: [&str; 2] = ["Not Overloaded", "Overloaded"];

/// Plot-ready data for one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub family: ModelFamily,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roc: Option<RocCurve>,
    pub confusion_matrix: ConfusionMatrix,
    /// Top-ranked importances, tree-based families only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_importances: Vec<FeatureImportance>,
}

/// One evaluated family; owns its model until persisted
#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub family: ModelFamily,
    pub model: CandidateModel,
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub best_params: Hyperparameters,
    /// Best mean CV accuracy from the search
    pub cv_score: f64,
    pub diagnostics: Diagnostics,
    pub evaluated_at: DateTime<Utc>,
    pub fit_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct Evaluator {
    top_importances: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(20)
    }
}

impl Evaluator {
    pub fn new(top_importances: usize) -> Self {
        Self { top_importances }
    }

    /// Score `outcome.model` on the validation split
    pub fn evaluate(
        &self,
        outcome: SearchOutcome,
        x_val: Option<&Array2<f64>>,
        y_val: Option<&Array1<f64>>,
        spec: &FeatureSpec,
    ) -> Result<EvaluationResult> {
        let (x_val, y_val) = match (x_val, y_val) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(PipelineError::NoValidationData),
        };
        if x_val.nrows() != y_val.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} labels", x_val.nrows()),
                actual: format!("{} labels", y_val.len()),
            });
        }

        let family = outcome.family;
        let model = outcome.model;
        let proba = model.predict_proba(x_val)?;
        let y_pred = model.predict(x_val)?;

        let acc = accuracy(y_val, &y_pred);
        let report = ClassificationReport::compute(y_val, &y_pred, &spec.classes);

        let diagnostics = Diagnostics {
            family,
            roc: self.roc(&proba, y_val, spec),
            confusion_matrix: ConfusionMatrix::compute(y_val, &y_pred, &spec.classes).reordered(&CONFUSION_ORDER),
            feature_importances: if family.is_tree_based() {
                model
                    .feature_importances()
                    .map(|imp| rank_importances(&spec.feature_names, &imp, self.top_importances))
                    .unwrap_or_default()
            } else {
                Vec::new()
            },
        };

        info!(
            family = family.name(),
            accuracy = acc,
            cv_accuracy = outcome.best_score,
            auc = diagnostics.roc.as_ref().map(|r| r.auc),
            "Model evaluated"
        );

        Ok(EvaluationResult {
            family,
            model,
            accuracy: acc,
            report,
            best_params: outcome.best_params,
            cv_score: outcome.best_score,
            diagnostics,
            evaluated_at: Utc::now(),
            fit_seconds: outcome.fit_seconds,
        })
    }

    /// ROC with "Overloaded" as positive, or the second class if it is absent
    fn roc(&self, proba: &Array1<f64>, y_val: &Array1<f64>, spec: &FeatureSpec) -> Option<RocCurve> {
        let positive_idx = spec.classes.iter().position(|c| c == POSITIVE_LABEL).unwrap_or(1);
        let positive_label = spec.classes.get(positive_idx)?;
        let is_positive: Vec<bool> = y_val.iter().map(|&y| (y > 0.5) == (positive_idx == 1)).collect();
        let scores = if positive_idx == 1 {
            proba.clone()
        } else {
            proba.mapv(|p| 1.0 - p)
        };
        roc_curve(&is_positive, &scores, positive_label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FeaturePolicy;
    use crate::training::{CVStrategy, GridSearch, ParamGrid, ParamValue};
    use ndarray::array;

    fn spec(classes: &[&str]) -> FeatureSpec {
        FeatureSpec {
            feature_names: vec!["weight".to_string(), "axles".to_string()],
            policy: FeaturePolicy::PreScaled,
            target: "overload_status".to_string(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            scaler: None,
        }
    }

    fn outcome(family: ModelFamily, grid: ParamGrid) -> SearchOutcome {
        let x = array![
            [0.0, 1.0], [0.1, 1.0], [0.2, 0.0], [0.3, 1.0], [0.4, 0.0], [0.5, 1.0],
            [1.0, 0.0], [1.1, 1.0], [1.2, 0.0], [1.3, 1.0], [1.4, 0.0], [1.5, 0.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        GridSearch::new(CVStrategy::default(), 42)
            .with_grid(family, grid)
            .search_and_fit(family, &x, &y)
            .unwrap()
    }

    #[test]
    fn test_no_validation_data() {
        let outcome = outcome(ModelFamily::AdaBoost, ParamGrid::new().with("n_estimators", vec![ParamValue::Int(5)]));
        let err = Evaluator::default()
            .evaluate(outcome, None, None, &spec(&["Not Overloaded", "Overloaded"]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoValidationData));
    }

    #[test]
    fn test_tree_family_diagnostics() {
        let outcome = outcome(ModelFamily::AdaBoost, ParamGrid::new().with("n_estimators", vec![ParamValue::Int(5)]));
        let x_val = array![[0.05, 1.0], [0.45, 0.0], [1.05, 1.0], [1.45, 0.0]];
        let y_val = array![0.0, 0.0, 1.0, 1.0];

        let result = Evaluator::new(1)
            .evaluate(outcome, Some(&x_val), Some(&y_val), &spec(&["Not Overloaded", "Overloaded"]))
            .unwrap();

        assert_eq!(result.accuracy, 1.0);
        assert_eq!(result.report.classes["Overloaded"].support, 2);
        assert_eq!(result.diagnostics.confusion_matrix.counts, [[2, 0], [0, 2]]);
        assert_eq!(result.diagnostics.confusion_matrix.labels, vec!["Not Overloaded", "Overloaded"]);

        let roc = result.diagnostics.roc.as_ref().unwrap();
        assert_eq!(roc.positive_label, "Overloaded");
        assert!((roc.auc - 1.0).abs() < 1e-12);

        assert_eq!(result.diagnostics.feature_importances.len(), 1);
        assert_eq!(result.diagnostics.feature_importances[0].feature, "weight");
    }

    #[test]
    fn test_non_tree_family_has_no_importances() {
        let grid = ParamGrid::new().with("kernel", vec!["linear".into()]);
        let outcome = outcome(ModelFamily::Svm, grid);
        let x_val = array![[0.05, 1.0], [1.45, 0.0]];
        let y_val = array![0.0, 1.0];

        let result = Evaluator::default()
            .evaluate(outcome, Some(&x_val), Some(&y_val), &spec(&["Not Overloaded", "Overloaded"]))
            .unwrap();
        assert!(result.diagnostics.feature_importances.is_empty());
        assert!(result.diagnostics.roc.is_some());
        assert!((0.0..=1.0).contains(&result.accuracy));
    }

    #[test]
    fn test_positive_label_falls_back_to_second_class() {
        let outcome = outcome(ModelFamily::AdaBoost, ParamGrid::new().with("n_estimators", vec![ParamValue::Int(5)]));
        let x_val = array![[0.05, 1.0], [1.45, 0.0]];
        let y_val = array![0.0, 1.0];
        let result = Evaluator::default()
            .evaluate(outcome, Some(&x_val), Some(&y_val), &spec(&["heavy", "light"]))
            .unwrap();
        assert_eq!(result.diagnostics.roc.unwrap().positive_label, "light");
        // Order unknown to the fixed layout leaves the matrix as computed
        assert_eq!(result.diagnostics.confusion_matrix.labels, vec!["heavy", "light"]);
    }
}
