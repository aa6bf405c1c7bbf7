//! Data preprocessing module
//!
//! Turns loaded splits into model-ready matrices:
//! - Column role resolution (categorical, one-hot, target)
//! - Feature policy selection (pre-scaled or raw plus scaler)
//! - Standard scaling fit on the training split only
//! - Binary label encoding

mod encoder;
mod scaler;
pub mod features;

pub use encoder::LabelEncoder;
pub use features::{feature_matrix, ColumnRoles, FeaturePolicy, FeatureProcessor, FeatureSpec, PreparedFeatures};
pub use scaler::StandardScaler;
