//! Dataset loading: pre-split files first, then a seeded split of the full file

use super::metadata::DatasetMetadata;
use crate::config::{DataPaths, PipelineConfig};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

/// Splits handed to feature preparation
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub train: DataFrame,
    pub validation: Option<DataFrame>,
    /// Present only when the splits were carved out of the full file
    pub full: Option<DataFrame>,
    pub metadata: Option<DatasetMetadata>,
}

/// Locates and reads the dataset files
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    paths: DataPaths,
    validation_fraction: f64,
    random_state: u64,
}

impl DatasetLoader {
    pub fn new(paths: DataPaths) -> Self {
        Self {
            paths,
            validation_fraction: 0.2,
            random_state: 42,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.data.clone())
            .with_validation_fraction(config.validation_fraction)
            .with_random_state(config.random_state)
    }

    pub fn with_validation_fraction(mut self, fraction: f64) -> Self {
        self.validation_fraction = fraction;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn load(&self) -> Result<LoadedDataset> {
        let metadata = DatasetMetadata::load_optional(&self.paths.metadata_path());
        if let Some(meta) = &metadata {
            info!(version = %meta.version_label(), "Loaded dataset metadata");
        }

        let train_path = self.paths.train_path();
        let val_path = self.paths.validation_path();
        let full_path = self.paths.full_path();

        if train_path.exists() && val_path.exists() {
            let train = read_csv(&train_path)?;
            let validation = read_csv(&val_path)?;
            info!(
                train_rows = train.height(),
                validation_rows = validation.height(),
                "Loaded pre-split dataset"
            );
            return Ok(LoadedDataset {
                train,
                validation: Some(validation),
                full: None,
                metadata,
            });
        }

        if full_path.exists() {
            if train_path.exists() != val_path.exists() {
                warn!("Only one pre-split file present, falling back to the full dataset");
            }
            let full = read_csv(&full_path)?;
            let (train, validation) = train_validation_split(&full, self.validation_fraction, self.random_state)?;
            info!(
                rows = full.height(),
                train_rows = train.height(),
                validation_rows = validation.height(),
                seed = self.random_state,
                "Split full dataset"
            );
            return Ok(LoadedDataset {
                train,
                validation: Some(validation),
                full: Some(full),
                metadata,
            });
        }

        Err(PipelineError::MissingDataset {
            searched: vec![train_path, val_path, full_path],
        })
    }
}

/// Read a headered CSV file, inferring the schema from the first 100 rows
pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| PipelineError::DataError(format!("{}: {}", path.display(), e)))
}

/// Seeded shuffle split into `(train, validation)`.
///
/// The validation part holds `ceil(fraction * n)` rows, the first ones of the
/// shuffled permutation; both parts are non-empty and disjoint.
pub fn train_validation_split(df: &DataFrame, fraction: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(PipelineError::InvalidParameter {
            name: "validation_fraction".to_string(),
            value: fraction.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }
    let n = df.height();
    if n < 2 {
        return Err(PipelineError::DataError(format!(
            "Need at least 2 rows to split, got {}",
            n
        )));
    }

    let n_val = ((fraction * n as f64).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<IdxSize> = (0..n as IdxSize).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let (val_idx, train_idx) = indices.split_at(n_val);
    let validation = df.take(&IdxCa::from_vec("idx".into(), val_idx.to_vec()))?;
    let train = df.take(&IdxCa::from_vec("idx".into(), train_idx.to_vec()))?;
    Ok((train, validation))
}
