//! Candidate model families and their default search spaces

use super::adaboost::AdaBoostClassifier;
use super::gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
use super::models::CandidateModel;
use super::neural_network::{Activation, MLPClassifier, MLPConfig};
use super::params::{Hyperparameters, ParamGrid, ParamValue};
use super::random_forest::RandomForest;
use super::svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier family considered by the search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    GradientBoosting,
    AdaBoost,
    Mlp,
    Svm,
}

impl ModelFamily {
    /// Evaluation order; earlier families win accuracy ties
    pub const ALL: [ModelFamily; 5] = [
        ModelFamily::RandomForest,
        ModelFamily::GradientBoosting,
        ModelFamily::AdaBoost,
        ModelFamily::Mlp,
        ModelFamily::Svm,
    ];

    /// Stable name used for artifact files and logs
    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::AdaBoost => "ada_boost",
            ModelFamily::Mlp => "mlp",
            ModelFamily::Svm => "svm",
        }
    }

    pub fn is_tree_based(&self) -> bool {
        matches!(
            self,
            ModelFamily::RandomForest | ModelFamily::GradientBoosting | ModelFamily::AdaBoost
        )
    }

    pub fn default_grid(&self) -> ParamGrid {
        match self {
            ModelFamily::RandomForest => ParamGrid::new()
                .with("n_estimators", vec![ParamValue::Int(100), ParamValue::Int(200)])
                .with(
                    "max_depth",
                    vec![ParamValue::Int(10), ParamValue::Int(20), ParamValue::None],
                )
                .with("min_samples_split", vec![ParamValue::Int(2), ParamValue::Int(5)]),
            ModelFamily::GradientBoosting => ParamGrid::new()
                .with("n_estimators", vec![ParamValue::Int(100), ParamValue::Int(200)])
                .with("learning_rate", vec![ParamValue::Float(0.01), ParamValue::Float(0.1)])
                .with("max_depth", vec![ParamValue::Int(3), ParamValue::Int(5)]),
            ModelFamily::AdaBoost => ParamGrid::new()
                .with("n_estimators", vec![ParamValue::Int(50), ParamValue::Int(100)])
                .with("learning_rate", vec![ParamValue::Float(0.1), ParamValue::Float(1.0)]),
            ModelFamily::Mlp => ParamGrid::new()
                .with(
                    "hidden_layer_sizes",
                    vec![ParamValue::Layers(vec![50]), ParamValue::Layers(vec![100])],
                )
                .with("activation", vec!["relu".into(), "tanh".into()])
                .with("alpha", vec![ParamValue::Float(0.001), ParamValue::Float(0.01)]),
            ModelFamily::Svm => ParamGrid::new()
                .with("C", vec![ParamValue::Int(1), ParamValue::Int(10)])
                .with("kernel", vec!["rbf".into()])
                .with("gamma", vec!["scale".into()]),
        }
    }

    /// Fresh, unfitted model for one grid point
    pub fn build(&self, params: &Hyperparameters, seed: u64) -> Result<CandidateModel> {
        let model = match self {
            ModelFamily::RandomForest => CandidateModel::RandomForest(
                RandomForest::new_classifier(params.usize_or("n_estimators", 100)?)
                    .with_max_depth(params.optional_usize("max_depth", None)?)
                    .with_min_samples_split(params.usize_or("min_samples_split", 2)?)
                    .with_min_samples_leaf(params.usize_or("min_samples_leaf", 1)?)
                    .with_random_state(seed),
            ),
            ModelFamily::GradientBoosting => {
                let config = GradientBoostingConfig {
                    n_estimators: params.usize_or("n_estimators", 100)?,
                    learning_rate: params.positive_f64_or("learning_rate", 0.1)?,
                    max_depth: params.usize_or("max_depth", 3)?,
                    min_samples_leaf: params.usize_or("min_samples_leaf", 1)?,
                    subsample: params.positive_f64_or("subsample", 1.0)?,
                    random_state: Some(seed),
                };
                CandidateModel::GradientBoosting(GradientBoostingClassifier::new(config))
            }
            ModelFamily::AdaBoost => CandidateModel::AdaBoost(AdaBoostClassifier::new(
                params.usize_or("n_estimators", 50)?,
                params.positive_f64_or("learning_rate", 1.0)?,
            )),
            ModelFamily::Mlp => {
                let activation_name = params.text_or("activation", "relu")?;
                let activation = Activation::parse(activation_name).ok_or_else(|| PipelineError::InvalidParameter {
                    name: "activation".to_string(),
                    value: activation_name.to_string(),
                    reason: "expected relu, tanh or logistic".to_string(),
                })?;
                let config = MLPConfig {
                    hidden_layers: params.layers_or("hidden_layer_sizes", &[100])?,
                    activation,
                    alpha: params.positive_f64_or("alpha", 0.0001)?,
                    learning_rate: params.positive_f64_or("learning_rate_init", 0.001)?,
                    max_epochs: params.usize_or("max_iter", 200)?,
                    random_state: Some(seed),
                    ..MLPConfig::default()
                };
                CandidateModel::Mlp(MLPClassifier::new(config))
            }
            ModelFamily::Svm => {
                let kernel_name = params.text_or("kernel", "rbf")?;
                let kernel = KernelType::parse(kernel_name).ok_or_else(|| PipelineError::InvalidParameter {
                    name: "kernel".to_string(),
                    value: kernel_name.to_string(),
                    reason: "expected linear, poly or rbf".to_string(),
                })?;
                let config = SVMConfig {
                    c: params.positive_f64_or("C", 1.0)?,
                    kernel,
                    gamma: parse_gamma(params)?,
                    random_state: Some(seed),
                    ..SVMConfig::default()
                };
                CandidateModel::Svm(SVMClassifier::new(config))
            }
        };
        Ok(model)
    }
}

fn parse_gamma(params: &Hyperparameters) -> Result<Gamma> {
    match params.get("gamma") {
        None => Ok(Gamma::Scale),
        Some(ParamValue::Text(s)) if s == "scale" => Ok(Gamma::Scale),
        Some(ParamValue::Text(s)) if s == "auto" => Ok(Gamma::Auto),
        Some(_) => params.positive_f64_or("gamma", 1.0).map(Gamma::Value),
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        ModelFamily::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| PipelineError::ValidationError(format!("Unknown model family '{}'", s)))
    }
}
