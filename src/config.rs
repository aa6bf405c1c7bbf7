//! Pipeline configuration
//!
//! Every input and output location is explicit here rather than ambient, so
//! tests can point a run at a temporary directory and shrink the grids.

use crate::training::{CVStrategy, ModelFamily, ParamGrid};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Input file locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPaths {
    /// Directory holding the dataset files
    pub data_dir: PathBuf,
    /// Pre-split training file name
    pub train_file: String,
    /// Pre-split validation file name
    pub validation_file: String,
    /// Full (unsplit) dataset file name
    pub full_file: String,
    /// Optional metadata descriptor file name
    pub metadata_file: String,
}

impl DataPaths {
    pub fn train_path(&self) -> PathBuf {
        self.data_dir.join(&self.train_file)
    }

    pub fn validation_path(&self) -> PathBuf {
        self.data_dir.join(&self.validation_file)
    }

    pub fn full_path(&self) -> PathBuf {
        self.data_dir.join(&self.full_file)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(&self.metadata_file)
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            train_file: "vehicle_data_train.csv".to_string(),
            validation_file: "vehicle_data_val.csv".to_string(),
            full_file: "vehicle_data.csv".to_string(),
            metadata_file: "dataset_metadata.yaml".to_string(),
        }
    }
}

/// Output artifact locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Per-family model artifacts and the feature list
    pub models_dir: PathBuf,
    /// Per-family metrics documents and diagnostics
    pub results_dir: PathBuf,
    /// Winning model under a family-independent name
    pub best_model_path: PathBuf,
    /// Fitted scaler (only written on the raw-plus-scaler path)
    pub scaler_path: PathBuf,
    /// Ordered feature list
    pub feature_list_path: PathBuf,
}

impl OutputPaths {
    /// Standard layout rooted at `root`
    pub fn rooted_at(root: &Path) -> Self {
        let models_dir = root.join("models");
        Self {
            feature_list_path: models_dir.join("model_features.json"),
            models_dir,
            results_dir: root.join("model_evaluation"),
            best_model_path: root.join("vehicle_load_model.json"),
            scaler_path: root.join("vehicle_load_scaler.json"),
        }
    }
}

impl Default for OutputPaths {
    fn default() -> Self {
        Self::rooted_at(Path::new("."))
    }
}

/// One family to train together with its search space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyConfig {
    pub family: ModelFamily,
    pub grid: ParamGrid,
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub data: DataPaths,
    pub output: OutputPaths,

    /// Seed for the split, CV shuffling and every model
    pub random_state: u64,

    /// Share of the full dataset held out when no pre-split files exist
    pub validation_fraction: f64,

    pub cv_strategy: CVStrategy,

    /// Families in evaluation order; earlier entries win accuracy ties
    pub families: Vec<FamilyConfig>,

    /// Categorical columns used when no metadata descriptor is present
    pub default_categorical: Vec<String>,

    /// Target column used when no metadata descriptor is present
    pub default_target: String,

    /// Number of ranked feature importances kept per tree-based family
    pub top_importances: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataPaths::default(),
            output: OutputPaths::default(),
            random_state: 42,
            validation_fraction: 0.2,
            cv_strategy: CVStrategy::StratifiedKFold {
                n_splits: 3,
                shuffle: false,
            },
            families: ModelFamily::ALL
                .iter()
                .map(|&family| FamilyConfig {
                    family,
                    grid: family.default_grid(),
                })
                .collect(),
            default_categorical: ["vehicle_type", "region", "road_condition", "weather"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            default_target: "overload_status".to_string(),
            top_importances: 20,
        }
    }
}

impl PipelineConfig {
    /// Read inputs from and write outputs under `root`
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.data.data_dir = root.to_path_buf();
        self.output = OutputPaths::rooted_at(root);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = fraction;
        self
    }

    pub fn with_cv_strategy(mut self, strategy: CVStrategy) -> Self {
        self.cv_strategy = strategy;
        self
    }

    /// Replace the search space of one family (adds the family if absent)
    pub fn with_grid(mut self, family: ModelFamily, grid: ParamGrid) -> Self {
        match self.families.iter_mut().find(|f| f.family == family) {
            Some(entry) => entry.grid = grid,
            None => self.families.push(FamilyConfig { family, grid }),
        }
        self
    }

    /// Restrict the run to `families`, keeping the given order
    pub fn with_families(mut self, families: &[ModelFamily]) -> Self {
        self.families = families
            .iter()
            .map(|&family| {
                let grid = self
                    .families
                    .iter()
                    .find(|f| f.family == family)
                    .map(|f| f.grid.clone())
                    .unwrap_or_else(|| family.default_grid());
                FamilyConfig { family, grid }
            })
            .collect();
        self
    }

    pub fn with_default_columns(mut self, categorical: Vec<String>, target: impl Into<String>) -> Self {
        self.default_categorical = categorical;
        self.default_target = target.into();
        self
    }

    pub fn with_top_importances(mut self, top: usize) -> Self {
        self.top_importances = top;
        self
    }

    pub fn family_order(&self) -> Vec<ModelFamily> {
        self.families.iter().map(|f| f.family).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ParamValue;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.random_state, 42);
        assert_eq!(config.family_order(), ModelFamily::ALL.to_vec());
        assert_eq!(config.cv_strategy.n_splits(), 3);
        assert_eq!(config.default_target, "overload_status");
        assert_eq!(config.output.best_model_path, PathBuf::from("./vehicle_load_model.json"));
    }

    #[test]
    fn test_with_root() {
        let config = PipelineConfig::default().with_root("/tmp/run");
        assert_eq!(config.data.train_path(), PathBuf::from("/tmp/run/vehicle_data_train.csv"));
        assert_eq!(
            config.output.feature_list_path,
            PathBuf::from("/tmp/run/models/model_features.json")
        );
        assert_eq!(config.output.results_dir, PathBuf::from("/tmp/run/model_evaluation"));
    }

    #[test]
    fn test_with_grid_and_families() {
        let small = ParamGrid::new().with("n_estimators", vec![ParamValue::Int(5)]);
        let config = PipelineConfig::default()
            .with_grid(ModelFamily::RandomForest, small.clone())
            .with_families(&[ModelFamily::Svm, ModelFamily::RandomForest]);

        assert_eq!(config.family_order(), vec![ModelFamily::Svm, ModelFamily::RandomForest]);
        assert_eq!(config.families[1].grid, small);
    }

    #[test]
    fn test_config_yaml_round_trip() {
        let config = PipelineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let restored: PipelineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(restored, config);
    }
}
