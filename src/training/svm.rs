//! Support Vector Machine classifier
//!
//! Binary C-SVC trained with SMO (Sequential Minimal Optimization). Class
//! probabilities come from Platt scaling of the decision function.

use super::models::{validate_training_data, BinaryClassifier};
use super::platt::PlattScaling;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// Linear kernel: K(x, y) = x · y
    Linear,
    /// Polynomial kernel: K(x, y) = (γ * x · y + r)^d
    Polynomial { degree: u32, coef0: f64 },
    /// Radial Basis Function (Gaussian): K(x, y) = exp(-γ * ||x - y||²)
    RBF,
}

impl KernelType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Some(KernelType::Linear),
            "poly" | "polynomial" => Some(KernelType::Polynomial { degree: 3, coef0: 0.0 }),
            "rbf" => Some(KernelType::RBF),
            _ => None,
        }
    }

    fn eval(&self, gamma: f64, a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
        match *self {
            KernelType::Linear => a.dot(b),
            KernelType::Polynomial { degree, coef0 } => (gamma * a.dot(b) + coef0).powi(degree as i32),
            KernelType::RBF => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }
}

/// Kernel coefficient
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// 1 / (n_features * X.var())
    Scale,
    /// 1 / n_features
    Auto,
    Value(f64),
}

impl Gamma {
    fn resolve(&self, x: &Array2<f64>) -> f64 {
        match *self {
            Gamma::Scale => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
            Gamma::Auto => 1.0 / x.ncols() as f64,
            Gamma::Value(g) => g,
        }
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub kernel: KernelType,
    pub gamma: Gamma,
    /// Tolerance for the KKT check
    pub tol: f64,
    /// Maximum number of full passes over the data
    pub max_iter: usize,
    /// Seed for the second-multiplier choice
    pub random_state: Option<u64>,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: KernelType::RBF,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1000,
            random_state: Some(42),
        }
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    support_vectors: Option<Array2<f64>>,
    /// alpha_i * y_i for every support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
    /// Gamma resolved against the training data
    gamma: f64,
    platt: Option<PlattScaling>,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
            gamma: 1.0,
            platt: None,
        }
    }

    pub fn config(&self) -> &SVMConfig {
        &self.config
    }

    pub fn n_support(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }

    /// Fit on 0/1 labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        if !(self.config.c > 0.0) {
            return Err(PipelineError::InvalidParameter {
                name: "C".to_string(),
                value: self.config.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let y_signed: Array1<f64> = y.mapv(|v| if v > 0.5 { 1.0 } else { -1.0 });
        if y_signed.iter().all(|&v| v == y_signed[0]) {
            return Err(PipelineError::ValidationError(
                "SVM requires samples from both classes".to_string(),
            ));
        }

        self.gamma = self.config.gamma.resolve(x);
        let (alphas, bias) = self.smo_train(x, &y_signed)?;

        let support: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = alphas[idx] * y_signed[idx];
        }

        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.bias = bias;

        let scores = self.decision_function(x)?;
        let mut platt = PlattScaling::new();
        platt.fit(&scores, y)?;
        self.platt = Some(platt);

        Ok(())
    }

    /// SMO with an error cache, returns `(alphas, bias)`
    fn smo_train(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array1<f64>, f64)> {
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(PipelineError::ValidationError(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let k = self.compute_kernel_matrix(x);
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        // errors[i] = f(x_i) - y_i; f is 0 at the start
        let mut errors: Array1<f64> = -y;

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let max_passes = 5;
        let mut passes = 0;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = errors[i];
                let violates = (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                // Second-choice heuristic: largest |E_i - E_j|, random on ties at zero
                let mut j = (0..n)
                    .filter(|&j| j != i)
                    .max_by(|&a, &b| (e_i - errors[a]).abs().total_cmp(&(e_i - errors[b]).abs()))
                    .unwrap_or((i + 1) % n);
                if (e_i - errors[j]).abs() < 1e-12 {
                    j = loop {
                        let cand = rng.gen_range(0..n);
                        if cand != i {
                            break cand;
                        }
                    };
                }
                let e_j = errors[j];

                let (alpha_i_old, alpha_j_old) = (alphas[i], alphas[j]);
                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (h - l).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                let alpha_j_new = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alpha_j_new - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                let alpha_i_new = alpha_i_old + y[i] * y[j] * (alpha_j_old - alpha_j_new);

                let d_i = y[i] * (alpha_i_new - alpha_i_old);
                let d_j = y[j] * (alpha_j_new - alpha_j_old);
                let b1 = bias - e_i - d_i * k[[i, i]] - d_j * k[[i, j]];
                let b2 = bias - e_j - d_i * k[[i, j]] - d_j * k[[j, j]];
                let new_bias = if alpha_i_new > 0.0 && alpha_i_new < c {
                    b1
                } else if alpha_j_new > 0.0 && alpha_j_new < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                let d_b = new_bias - bias;
                for m in 0..n {
                    errors[m] += d_i * k[[i, m]] + d_j * k[[j, m]] + d_b;
                }

                alphas[i] = alpha_i_new;
                alphas[j] = alpha_j_new;
                bias = new_bias;
                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        if !bias.is_finite() || alphas.iter().any(|a| !a.is_finite()) {
            return Err(PipelineError::ValidationError(
                "SMO did not converge to a finite solution".to_string(),
            ));
        }

        Ok((alphas, bias))
    }

    /// Compute kernel matrix, rows in parallel
    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let kernel = self.config.kernel;
        let gamma = self.gamma;

        let rows: Vec<f64> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let row_i = x.row(i);
                (0..n).map(move |j| kernel.eval(gamma, &row_i, &x.row(j)))
            })
            .collect();

        Array2::from_shape_vec((n, n), rows).unwrap_or_else(|_| Array2::zeros((n, n)))
    }

    /// Signed distance to the separating surface; positive favours class 1
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(PipelineError::ModelNotFitted),
        };
        if x.ncols() != sv.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let kernel = self.config.kernel;
        let scores: Vec<f64> = x
            .rows()
            .into_iter()
            .map(|row| {
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &c)| c * kernel.eval(self.gamma, &s, &row))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();
        Ok(Array1::from_vec(scores))
    }
}

impl BinaryClassifier for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let platt = self.platt.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        platt.calibrate(&self.decision_function(x)?)
    }

    /// Hard labels follow the margin sign, not the calibrated probability
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-2.0, -1.5], [-1.5, -2.0], [-2.2, -2.1], [-1.8, -1.2], [-1.0, -2.5],
            [2.0, 1.5], [1.5, 2.0], [2.2, 2.1], [1.8, 1.2], [1.0, 2.5]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_rbf_svm_separates_blobs() {
        let (x, y) = blobs();
        let mut svm = SVMClassifier::new(SVMConfig::default());
        svm.fit(&x, &y).unwrap();

        assert_eq!(svm.predict(&x).unwrap(), y);
        assert!(svm.n_support() > 0);

        let probs = svm.predict_proba(&x).unwrap();
        assert!(probs[0] < probs[9]);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_linear_kernel() {
        let (x, y) = blobs();
        let mut svm = SVMClassifier::new(SVMConfig {
            kernel: KernelType::Linear,
            c: 10.0,
            ..Default::default()
        });
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_gamma_scale() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // mean 1, population variance 1 over all four elements
        assert!((Gamma::Scale.resolve(&x) - 0.5).abs() < 1e-12);
        assert!((Gamma::Auto.resolve(&x) - 0.5).abs() < 1e-12);
        assert!((Gamma::Scale.resolve(&array![[1.0, 1.0]]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = array![[0.0], [1.0]];
        let mut svm = SVMClassifier::new(SVMConfig::default());
        assert!(svm.fit(&x, &array![1.0, 1.0]).is_err());
    }

    #[test]
    fn test_kernel_parse() {
        assert_eq!(KernelType::parse("rbf"), Some(KernelType::RBF));
        assert_eq!(KernelType::parse("linear"), Some(KernelType::Linear));
        assert_eq!(KernelType::parse("precomputed"), None);
    }
}
