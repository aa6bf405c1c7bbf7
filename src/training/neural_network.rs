//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! Feedforward network with a single logistic output unit trained on binary
//! cross-entropy. Mini-batch Adam with L2 penalty; training stops once the
//! epoch loss has not improved by `tol` for `n_iter_no_change` epochs.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::models::{validate_training_data, BinaryClassifier};
use crate::error::{PipelineError, Result};

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Rectified Linear Unit
    ReLU,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic sigmoid
    Logistic,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU
    }
}

impl Activation {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "relu" => Some(Activation::ReLU),
            "tanh" => Some(Activation::Tanh),
            "logistic" | "sigmoid" => Some(Activation::Logistic),
            _ => None,
        }
    }

    fn apply(self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Logistic => z.mapv(sigmoid),
        }
    }

    /// Derivative expressed in terms of the activation output
    fn derivative(self, a: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Tanh => a.mapv(|v| 1.0 - v * v),
            Activation::Logistic => a.mapv(|v| v * (1.0 - v)),
        }
    }
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    /// Adam step size
    pub learning_rate: f64,
    /// Maximum number of epochs
    pub max_epochs: usize,
    /// Batch size (capped at the sample count)
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// Minimum loss improvement that resets the patience counter
    pub tol: f64,
    pub n_iter_no_change: usize,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![100],
            activation: Activation::ReLU,
            learning_rate: 0.001,
            max_epochs: 200,
            batch_size: 200,
            alpha: 0.0001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            tol: 1e-4,
            n_iter_no_change: 10,
            random_state: Some(42),
        }
    }
}

/// Adam first/second moment buffers for one layer
#[derive(Debug, Clone)]
struct AdamState {
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

/// Multi-Layer Perceptron Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    n_features: usize,
    n_epochs: usize,
    final_loss: Option<f64>,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            n_features: 0,
            n_epochs: 0,
            final_loss: None,
        }
    }

    pub fn config(&self) -> &MLPConfig {
        &self.config
    }

    /// Epochs run by the last `fit`
    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.final_loss
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        validate_training_data(x, y)?;
        if self.config.hidden_layers.iter().any(|&w| w == 0) || self.config.max_epochs == 0 {
            return Err(PipelineError::InvalidParameter {
                name: "hidden_layers".to_string(),
                value: format!("{:?}", self.config.hidden_layers),
                reason: "layer widths and max_epochs must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        self.n_features = x.ncols();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        self.initialize_weights(&mut rng)?;

        let mut adam: Vec<AdamState> = self
            .weights
            .iter()
            .zip(self.biases.iter())
            .map(|(w, b)| AdamState {
                m_w: Array2::zeros(w.raw_dim()),
                v_w: Array2::zeros(w.raw_dim()),
                m_b: Array1::zeros(b.len()),
                v_b: Array1::zeros(b.len()),
            })
            .collect();

        let batch_size = self.config.batch_size.clamp(1, n_samples);
        let mut step = 0i32;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0usize;
        let mut indices: Vec<usize> = (0..n_samples).collect();

        self.n_epochs = 0;
        for _epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);
            let mut epoch_loss = 0.0;

            for batch in indices.chunks(batch_size) {
                let x_batch = x.select(Axis(0), batch);
                let y_batch = y.select(Axis(0), batch);

                let activations = self.forward(&x_batch);
                let (loss, gradients) = self.backward(&y_batch, &activations);
                epoch_loss += loss * batch.len() as f64;

                step += 1;
                self.adam_update(&mut adam, gradients, step);
            }

            let epoch_loss = epoch_loss / n_samples as f64;
            if !epoch_loss.is_finite() {
                return Err(PipelineError::ValidationError(format!(
                    "MLP loss diverged at epoch {}",
                    self.n_epochs + 1
                )));
            }
            self.n_epochs += 1;
            self.final_loss = Some(epoch_loss);

            if epoch_loss > best_loss - self.config.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(epoch_loss);
            if no_improvement > self.config.n_iter_no_change {
                break;
            }
        }

        Ok(())
    }

    /// Glorot uniform initialisation
    fn initialize_weights(&mut self, rng: &mut Xoshiro256PlusPlus) -> Result<()> {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![self.n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        // Logistic units get a wider init, as in Glorot & Bengio
        let gain = if self.config.activation == Activation::Logistic { 2.0 } else { 6.0 };

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let bound = (gain / (n_in + n_out) as f64).sqrt();
            let weights: Vec<f64> = (0..n_in * n_out).map(|_| rng.gen_range(-bound..bound)).collect();
            let biases: Vec<f64> = (0..n_out).map(|_| rng.gen_range(-bound..bound)).collect();
            self.weights.push(Array2::from_shape_vec((n_in, n_out), weights)?);
            self.biases.push(Array1::from_vec(biases));
        }
        Ok(())
    }

    /// Layer outputs, input first; the last entry is the (n, 1) probability column
    fn forward(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(self.weights.len() + 1);
        activations.push(x.clone());

        let last = self.weights.len() - 1;
        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i == last {
                z.mapv(sigmoid)
            } else {
                self.config.activation.apply(&z)
            };
            activations.push(a);
        }
        activations
    }

    /// Penalised cross-entropy of the batch and per-layer gradients
    fn backward(&self, y: &Array1<f64>, activations: &[Array2<f64>]) -> (f64, Vec<(Array2<f64>, Array1<f64>)>) {
        let n = y.len() as f64;
        let y_col = y.view().insert_axis(Axis(1));
        let output = &activations[activations.len() - 1];

        let eps = 1e-12;
        let mut loss = -output
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| {
                let p = p.clamp(eps, 1.0 - eps);
                t * p.ln() + (1.0 - t) * (1.0 - p).ln()
            })
            .sum::<f64>()
            / n;
        let sq_norm: f64 = self.weights.iter().map(|w| w.iter().map(|v| v * v).sum::<f64>()).sum();
        loss += 0.5 * self.config.alpha * sq_norm / n;

        let mut gradients = Vec::with_capacity(self.weights.len());
        // Sigmoid output with cross-entropy: dL/dz = p - y
        let mut delta = (output - &y_col) / n;

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.weights[i] * (self.config.alpha / n);
            let grad_b = delta.sum_axis(Axis(0));
            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.config.activation.derivative(&activations[i]);
            }
            gradients.push((grad_w, grad_b));
        }

        gradients.reverse();
        (loss, gradients)
    }

    fn adam_update(&mut self, states: &mut [AdamState], gradients: Vec<(Array2<f64>, Array1<f64>)>, step: i32) {
        let (b1, b2, eps) = (self.config.beta1, self.config.beta2, self.config.epsilon);
        let lr_t = self.config.learning_rate * (1.0 - b2.powi(step)).sqrt() / (1.0 - b1.powi(step));

        for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
            let state = &mut states[i];
            state.m_w = &state.m_w * b1 + &grad_w * (1.0 - b1);
            state.v_w = &state.v_w * b2 + &grad_w.mapv(|g| g * g) * (1.0 - b2);
            state.m_b = &state.m_b * b1 + &grad_b * (1.0 - b1);
            state.v_b = &state.v_b * b2 + &grad_b.mapv(|g| g * g) * (1.0 - b2);

            let step_w = &state.m_w / &state.v_w.mapv(|v| v.sqrt() + eps) * lr_t;
            let step_b = &state.m_b / &state.v_b.mapv(|v| v.sqrt() + eps) * lr_t;
            self.weights[i] -= &step_w;
            self.biases[i] -= &step_b;
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl BinaryClassifier for MLPClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        MLPClassifier::fit(self, x, y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.weights.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let activations = self.forward(x);
        Ok(activations[activations.len() - 1].column(0).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_classification_data() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [-1.0, -1.2], [-1.5, -0.8], [-0.8, -1.4], [-1.2, -1.0],
            [1.0, 1.2], [1.5, 0.8], [0.8, 1.4], [1.2, 1.0]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_mlp_classifier_learns_separable_data() {
        let (x, y) = create_classification_data();
        let config = MLPConfig {
            hidden_layers: vec![8],
            learning_rate: 0.05,
            max_epochs: 300,
            ..Default::default()
        };
        let mut mlp = MLPClassifier::new(config);
        mlp.fit(&x, &y).unwrap();

        assert_eq!(mlp.predict(&x).unwrap(), y);
        let probs = mlp.predict_proba(&x).unwrap();
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_tanh_activation() {
        let (x, y) = create_classification_data();
        let config = MLPConfig {
            hidden_layers: vec![4],
            activation: Activation::Tanh,
            learning_rate: 0.05,
            max_epochs: 300,
            ..Default::default()
        };
        let mut mlp = MLPClassifier::new(config);
        mlp.fit(&x, &y).unwrap();
        assert_eq!(mlp.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let (x, y) = create_classification_data();
        let config = MLPConfig {
            hidden_layers: vec![5],
            max_epochs: 20,
            ..Default::default()
        };
        let mut a = MLPClassifier::new(config.clone());
        let mut b = MLPClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
        assert!(a.n_epochs() > 0 && a.n_epochs() <= 20);
    }

    #[test]
    fn test_activation_parse() {
        assert_eq!(Activation::parse("relu"), Some(Activation::ReLU));
        assert_eq!(Activation::parse("tanh"), Some(Activation::Tanh));
        assert_eq!(Activation::parse("softsign"), None);
    }

    #[test]
    fn test_predict_before_fit() {
        let mlp = MLPClassifier::new(MLPConfig::default());
        assert!(matches!(
            mlp.predict_proba(&array![[0.0, 0.0]]),
            Err(PipelineError::ModelNotFitted)
        ));
    }
}
