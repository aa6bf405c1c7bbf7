//! Classifier trait and the fitted-model enum

use super::adaboost::AdaBoostClassifier;
use super::gradient_boosting::GradientBoostingClassifier;
use super::neural_network::MLPClassifier;
use super::random_forest::RandomForest;
use super::svm::SVMClassifier;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Binary classifier over encoded labels (0 = first class, 1 = second class)
pub trait BinaryClassifier: Send + Sync {
    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Probability of class 1 for each row
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Hard 0/1 predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_proba(x)?.mapv(|p| if p > 0.5 { 1.0 } else { 0.0 }))
    }

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }
}

/// Shape, finiteness and label checks shared by every `fit`
pub(crate) fn validate_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() < 2 || x.ncols() == 0 {
        return Err(PipelineError::ValidationError(format!(
            "Need at least 2 samples and 1 feature, got {}x{}",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(PipelineError::ValidationError(
            "Training data contains NaN or infinite values".to_string(),
        ));
    }
    Ok(())
}

/// Labels must be encoded 0/1 for classifiers
pub(crate) fn validate_binary_labels(y: &Array1<f64>) -> Result<()> {
    if y.iter().any(|&v| v != 0.0 && v != 1.0) {
        return Err(PipelineError::ValidationError(
            "Labels must be encoded as 0 or 1".to_string(),
        ));
    }
    Ok(())
}

/// A fitted (or fresh) model of one of the candidate families
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum CandidateModel {
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    AdaBoost(AdaBoostClassifier),
    Mlp(MLPClassifier),
    Svm(SVMClassifier),
}

impl CandidateModel {
    fn inner(&self) -> &dyn BinaryClassifier {
        match self {
            CandidateModel::RandomForest(m) => m,
            CandidateModel::GradientBoosting(m) => m,
            CandidateModel::AdaBoost(m) => m,
            CandidateModel::Mlp(m) => m,
            CandidateModel::Svm(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn BinaryClassifier {
        match self {
            CandidateModel::RandomForest(m) => m,
            CandidateModel::GradientBoosting(m) => m,
            CandidateModel::AdaBoost(m) => m,
            CandidateModel::Mlp(m) => m,
            CandidateModel::Svm(m) => m,
        }
    }
}

impl BinaryClassifier for CandidateModel {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        validate_binary_labels(y)?;
        self.inner_mut().fit(x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict_proba(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.inner().predict(x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.inner().feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_validate_training_data() {
        let x = array![[1.0], [2.0]];
        assert!(validate_training_data(&x, &array![0.0, 1.0]).is_ok());
        assert!(validate_training_data(&x, &array![0.0]).is_err());
        assert!(validate_training_data(&array![[f64::NAN], [1.0]], &array![0.0, 1.0]).is_err());
        assert!(validate_binary_labels(&array![0.0, 2.0]).is_err());
    }

    #[test]
    fn test_candidate_rejects_non_binary_labels() {
        let mut model = CandidateModel::AdaBoost(AdaBoostClassifier::new(5, 1.0));
        let x = array![[1.0], [2.0], [3.0]];
        assert!(model.fit(&x, &array![0.0, 1.0, 2.0]).is_err());
        assert!(model.fit(&x, &array![0.0, 1.0, 1.0]).is_ok());
        assert_eq!(model.predict(&x).unwrap().len(), 3);
    }

    #[test]
    fn test_candidate_json_round_trip() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = CandidateModel::RandomForest(RandomForest::new_classifier(5).with_random_state(1));
        model.fit(&x, &y).unwrap();

        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("\"kind\":\"random_forest\""));
        let restored: CandidateModel = serde_json::from_str(&json).unwrap();
        let before = model.predict_proba(&x).unwrap();
        let after = restored.predict_proba(&x).unwrap();
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
