//! Dataset discovery and loading

pub mod loader;
pub mod metadata;

pub use loader::{read_csv, train_validation_split, DatasetLoader, LoadedDataset};
pub use metadata::{DatasetMetadata, FeatureMetadata};
