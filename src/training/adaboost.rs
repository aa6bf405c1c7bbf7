//! AdaBoost (Adaptive Boosting) implementation
//!
//! Discrete SAMME over decision stumps for 0/1 labels. Misclassified samples
//! are up-weighted each round; the ensemble vote is turned into a probability
//! with a logistic link on the normalised alpha-weighted margin.

use super::models::{validate_training_data, BinaryClassifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A single decision stump: splits on one feature at one threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Stump {
    feature_index: usize,
    threshold: f64,
    /// Prediction when feature <= threshold
    left_label: f64,
    /// Prediction when feature > threshold
    right_label: f64,
}

impl Stump {
    fn predict_row(&self, row: &ArrayView1<f64>) -> f64 {
        if row[self.feature_index] <= self.threshold {
            self.left_label
        } else {
            self.right_label
        }
    }

    /// Weighted-error minimising stump via a sorted sweep per feature
    fn fit(x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> Stump {
        // Weight of each class on the right side starts as the whole total
        let total_pos: f64 = y.iter().zip(weights.iter()).filter(|&(&t, _)| t > 0.5).map(|(_, w)| w).sum();
        let total_neg: f64 = weights.sum() - total_pos;

        // Constant stump (majority class) is the fallback; both sides agree
        let majority = if total_pos > total_neg { 1.0 } else { 0.0 };
        let mut best = Stump {
            feature_index: 0,
            threshold: 0.0,
            left_label: majority,
            right_label: majority,
        };
        let mut best_error = total_pos.min(total_neg);

        for f in 0..x.ncols() {
            let mut order: Vec<usize> = (0..x.nrows()).collect();
            order.sort_by(|&a, &b| x[[a, f]].total_cmp(&x[[b, f]]));

            let mut left_pos = 0.0;
            let mut left_neg = 0.0;
            for pos in 0..order.len() - 1 {
                let i = order[pos];
                if y[i] > 0.5 {
                    left_pos += weights[i];
                } else {
                    left_neg += weights[i];
                }

                let value = x[[i, f]];
                let next_value = x[[order[pos + 1], f]];
                if next_value <= value {
                    continue;
                }

                let right_pos = total_pos - left_pos;
                let right_neg = total_neg - left_neg;
                // left=0/right=1 versus left=1/right=0
                let err_01 = left_pos + right_neg;
                let err_10 = left_neg + right_pos;
                let (error, left_label, right_label) = if err_01 <= err_10 {
                    (err_01, 0.0, 1.0)
                } else {
                    (err_10, 1.0, 0.0)
                };

                if error < best_error - 1e-12 {
                    best_error = error;
                    best = Stump {
                        feature_index: f,
                        threshold: (value + next_value) / 2.0,
                        left_label,
                        right_label,
                    };
                }
            }
        }
        best
    }
}

/// AdaBoost Classifier (SAMME, binary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaBoostClassifier {
    pub n_estimators: usize,
    pub learning_rate: f64,
    stumps: Vec<Stump>,
    alphas: Vec<f64>,
    n_features: usize,
}

impl Default for AdaBoostClassifier {
    fn default() -> Self {
        Self::new(50, 1.0)
    }
}

impl AdaBoostClassifier {
    pub fn new(n_estimators: usize, learning_rate: f64) -> Self {
        Self {
            n_estimators,
            learning_rate,
            stumps: Vec::new(),
            alphas: Vec::new(),
            n_features: 0,
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        if self.n_estimators == 0 || !(self.learning_rate > 0.0) {
            return Err(PipelineError::InvalidParameter {
                name: "n_estimators/learning_rate".to_string(),
                value: format!("{}/{}", self.n_estimators, self.learning_rate),
                reason: "both must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();
        self.stumps.clear();
        self.alphas.clear();

        let mut weights = Array1::from_elem(n_samples, 1.0 / n_samples as f64);

        for round in 0..self.n_estimators {
            let stump = Stump::fit(x, y, &weights);
            let preds: Vec<f64> = x.rows().into_iter().map(|row| stump.predict_row(&row)).collect();

            let total: f64 = weights.sum();
            let error: f64 = preds
                .iter()
                .zip(y.iter())
                .zip(weights.iter())
                .filter(|((p, t), _)| (*p - *t).abs() > 0.5)
                .map(|(_, w)| w)
                .sum::<f64>()
                / total;

            // Perfect fit: keep it with unit weight and stop
            if error <= 0.0 {
                self.stumps.push(stump);
                self.alphas.push(1.0);
                break;
            }

            // No better than chance for two classes
            if error >= 0.5 {
                if round == 0 {
                    return Err(PipelineError::ValidationError(format!(
                        "first weak learner is no better than chance (error {:.3})",
                        error
                    )));
                }
                break;
            }

            let alpha = self.learning_rate * ((1.0 - error) / error).ln();

            for ((w, p), t) in weights.iter_mut().zip(preds.iter()).zip(y.iter()) {
                if (*p - *t).abs() > 0.5 {
                    *w *= alpha.exp();
                }
            }
            let new_total = weights.sum();
            if !new_total.is_finite() || new_total <= 0.0 {
                return Err(PipelineError::ValidationError(
                    "sample weights diverged".to_string(),
                ));
            }
            weights /= new_total;

            self.stumps.push(stump);
            self.alphas.push(alpha);
        }

        Ok(())
    }

    /// Normalised vote margin in [-1, 1]: positive favours class 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.stumps.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let alpha_sum: f64 = self.alphas.iter().sum();
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let vote: f64 = self
                    .stumps
                    .iter()
                    .zip(self.alphas.iter())
                    .map(|(s, &a)| if s.predict_row(&row) > 0.5 { a } else { -a })
                    .sum();
                vote / alpha_sum
            })
            .collect())
    }

    pub fn n_stumps(&self) -> usize {
        self.stumps.len()
    }
}

impl BinaryClassifier for AdaBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        AdaBoostClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| 1.0 / (1.0 + (-d).exp())))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|d| if d > 0.0 { 1.0 } else { 0.0 }))
    }

    /// Alpha-weighted share of stumps splitting on each feature
    fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.stumps.is_empty() {
            return None;
        }
        let mut importances = Array1::<f64>::zeros(self.n_features);
        for (stump, &alpha) in self.stumps.iter().zip(self.alphas.iter()) {
            if stump.threshold.is_finite() {
                importances[stump.feature_index] += alpha;
            }
        }
        let total = importances.sum();
        if total > 0.0 {
            importances /= total;
        }
        Some(importances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn interleaved() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0],
            [5.0, 1.0], [6.0, 0.0], [7.0, 1.0], [8.0, 0.0]
        ];
        let y = array![0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_adaboost_fits() {
        let (x, y) = interleaved();
        let mut model = AdaBoostClassifier::new(20, 1.0);
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        let correct = preds.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 6, "expected at least 6 correct, got {}", correct);

        let probs = model.predict_proba(&x).unwrap();
        for (p, d) in probs.iter().zip(preds.iter()) {
            assert_eq!(*p > 0.5, *d == 1.0);
        }
    }

    #[test]
    fn test_perfect_stump_stops_early() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut model = AdaBoostClassifier::new(50, 0.5);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.n_stumps(), 1);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_chance_level_first_stump_fails() {
        // Identical features with opposing labels cannot be split
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];
        let mut model = AdaBoostClassifier::new(10, 1.0);
        assert!(model.fit(&x, &y).is_err());
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = interleaved();
        let mut model = AdaBoostClassifier::new(10, 1.0);
        model.fit(&x, &y).unwrap();
        let imp = BinaryClassifier::feature_importances(&model).unwrap();
        assert!((imp.sum() - 1.0).abs() < 1e-9);
    }
}
