//! Model training module
//!
//! Provides the candidate classifier families and the search that tunes them:
//! - Random Forest, Gradient Boosting and AdaBoost (tree-based)
//! - Neural networks (MLP)
//! - Support Vector Machines with Platt-scaled probabilities
//! - Stratified k-fold grid search with a fresh refit of the winner

mod models;
mod platt;
pub mod adaboost;
pub mod cross_validation;
pub mod decision_tree;
pub mod family;
pub mod gradient_boosting;
pub mod neural_network;
pub mod params;
pub mod random_forest;
pub mod search;
pub mod svm;

pub use adaboost::AdaBoostClassifier;
pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use family::ModelFamily;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use models::{BinaryClassifier, CandidateModel};
pub use neural_network::{Activation, MLPClassifier, MLPConfig};
pub use params::{Hyperparameters, ParamGrid, ParamValue};
pub use platt::PlattScaling;
pub use random_forest::RandomForest;
pub use search::{GridScore, GridSearch, SearchOutcome};
pub use svm::{Gamma, KernelType, SVMClassifier, SVMConfig};
