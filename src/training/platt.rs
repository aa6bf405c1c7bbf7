//! Platt scaling (sigmoid calibration) of margin scores

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator
///
/// Fits P(y=1|f) = 1 / (1 + exp(-(A*f + B))) on raw decision values `f`,
/// with Platt's smoothed targets to avoid overfitting small samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlattScaling {
    a: Option<f64>,
    b: Option<f64>,
    max_iter: usize,
    tol: f64,
}

impl PlattScaling {
    pub fn new() -> Self {
        Self {
            a: None,
            b: None,
            max_iter: 100,
            tol: 1e-10,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Get fitted parameters `(A, B)`
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    /// Newton's method with backtracking on the cross-entropy
    pub fn fit(&mut self, scores: &Array1<f64>, labels: &Array1<f64>) -> Result<()> {
        let n = scores.len();
        if n != labels.len() {
            return Err(PipelineError::ValidationError(
                "Scores and labels must have same length".to_string(),
            ));
        }
        if n == 0 {
            return Err(PipelineError::ValidationError("Empty input".to_string()));
        }

        let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
        let n_neg = n as f64 - n_pos;
        let target_pos = (n_pos + 1.0) / (n_pos + 2.0);
        let target_neg = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = labels
            .iter()
            .map(|&y| if y > 0.5 { target_pos } else { target_neg })
            .collect();

        let mut a = 0.0;
        let mut b = ((n_pos + 1.0) / (n_neg + 1.0)).ln();
        let mut loss = objective(scores, &targets, a, b);

        for _ in 0..self.max_iter {
            let mut grad_a = 0.0;
            let mut grad_b = 0.0;
            let mut hess_aa = 1e-12;
            let mut hess_ab = 0.0;
            let mut hess_bb = 1e-12;

            for (&f, &t) in scores.iter().zip(targets.iter()) {
                let p = sigmoid(a * f + b);
                let d1 = p - t;
                let d2 = p * (1.0 - p);
                grad_a += f * d1;
                grad_b += d1;
                hess_aa += f * f * d2;
                hess_ab += f * d2;
                hess_bb += d2;
            }

            if grad_a.abs() < 1e-5 && grad_b.abs() < 1e-5 {
                break;
            }

            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-18 {
                break;
            }
            let delta_a = (hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = (hess_aa * grad_b - hess_ab * grad_a) / det;

            let mut step = 1.0;
            let mut improved = false;
            while step >= 1e-10 {
                let (na, nb) = (a - step * delta_a, b - step * delta_b);
                let new_loss = objective(scores, &targets, na, nb);
                if new_loss < loss {
                    a = na;
                    b = nb;
                    improved = (loss - new_loss).abs() > self.tol;
                    loss = new_loss;
                    break;
                }
                step /= 2.0;
            }
            if !improved {
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(())
    }

    /// Map decision values to probabilities of class 1
    pub fn calibrate(&self, scores: &Array1<f64>) -> Result<Array1<f64>> {
        let (a, b) = self.parameters().ok_or(PipelineError::ModelNotFitted)?;
        Ok(scores.mapv(|f| sigmoid(a * f + b)))
    }
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self::new()
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Numerically stable binary cross-entropy of `sigmoid(a*f + b)` against `targets`
fn objective(scores: &Array1<f64>, targets: &[f64], a: f64, b: f64) -> f64 {
    scores
        .iter()
        .zip(targets.iter())
        .map(|(&f, &t)| {
            let z = a * f + b;
            // -[t*ln(s(z)) + (1-t)*ln(1-s(z))] = ln(1+e^z) - t*z
            let softplus = if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() };
            softplus - t * z
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_platt_monotone_in_score() {
        let scores = array![-2.0, -1.5, -0.2, 0.3, 1.1, 2.4, -0.8, 0.9];
        let labels = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0];

        let mut platt = PlattScaling::new();
        platt.fit(&scores, &labels).unwrap();

        let (a, _) = platt.parameters().unwrap();
        assert!(a > 0.0);

        let probs = platt.calibrate(&array![-3.0, 0.0, 3.0]).unwrap();
        assert!(probs[0] < probs[1] && probs[1] < probs[2]);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_unfitted_calibrate_fails() {
        let platt = PlattScaling::new();
        assert!(platt.calibrate(&array![0.0]).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let mut platt = PlattScaling::new();
        assert!(platt.fit(&array![0.0, 1.0], &array![1.0]).is_err());
    }
}
