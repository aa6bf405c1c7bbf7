//! Feature selection, scaling and label encoding for the training and
//! validation splits.
//!
//! The feature set is decided once from the training split:
//! - if any column ends with `_scaled`, the one-hot columns followed by the
//!   scaled columns are used as-is ([`FeaturePolicy::PreScaled`]);
//! - otherwise the raw numerical columns followed by the one-hot columns are
//!   used, with a [`StandardScaler`] fit on the numerical ones
//!   ([`FeaturePolicy::RawPlusScaler`]).
//!
//! The validation split is projected onto the same columns in the same order
//! and transformed with the training scaler.

use super::encoder::LabelEncoder;
use super::scaler::{float_column, StandardScaler};
use crate::config::PipelineConfig;
use crate::data::DatasetMetadata;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which columns are categorical and which is the label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub categorical: Vec<String>,
    pub target: String,
    /// Roles came from the dataset descriptor, so every categorical must be present
    pub declared: bool,
}

impl ColumnRoles {
    pub fn new(categorical: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            categorical,
            target: target.into(),
            declared: false,
        }
    }

    /// Descriptor roles when available, configured defaults otherwise
    pub fn resolve(metadata: Option<&DatasetMetadata>, config: &PipelineConfig) -> Self {
        match metadata.and_then(|m| m.features.as_ref()) {
            Some(features) => Self {
                categorical: features.categorical.clone(),
                target: features
                    .target
                    .clone()
                    .unwrap_or_else(|| config.default_target.clone()),
                declared: true,
            },
            None => Self::new(config.default_categorical.clone(), config.default_target.clone()),
        }
    }

    /// Column produced by one-hot encoding a categorical (`<categorical>_<level>`)
    pub fn is_one_hot(&self, column: &str) -> bool {
        self.categorical.iter().any(|c| one_hot_of(column, c))
    }
}

/// How the feature matrix is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeaturePolicy {
    /// Dataset ships `*_scaled` columns; no scaler is fitted
    PreScaled,
    /// Raw numerical columns standardised with a scaler fit on train
    RawPlusScaler,
}

/// Everything an inference-time consumer needs to rebuild the feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub feature_names: Vec<String>,
    pub policy: FeaturePolicy,
    pub target: String,
    /// Class labels; the encoded value is the index
    pub classes: Vec<String>,
    /// Persisted separately as its own artifact
    #[serde(skip)]
    pub scaler: Option<StandardScaler>,
}

impl FeatureSpec {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// Model-ready matrices plus the feature spec that produced them
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_val: Option<Array2<f64>>,
    pub y_val: Option<Array1<f64>>,
    pub spec: FeatureSpec,
}

pub struct FeatureProcessor {
    roles: ColumnRoles,
}

impl FeatureProcessor {
    pub fn new(roles: ColumnRoles) -> Self {
        Self { roles }
    }

    pub fn roles(&self) -> &ColumnRoles {
        &self.roles
    }

    pub fn prepare(&self, train: &DataFrame, validation: Option<&DataFrame>) -> Result<PreparedFeatures> {
        let target = self.roles.target.as_str();
        for split in std::iter::once(train).chain(validation) {
            if split.column(target).is_err() {
                return Err(PipelineError::MissingTarget(target.to_string()));
            }
        }
        if self.roles.declared {
            self.check_declared_categoricals(train, "training")?;
            if let Some(val) = validation {
                self.check_declared_categoricals(val, "validation")?;
            }
        }

        let columns: Vec<String> = train
            .get_column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        let one_hot: Vec<String> = columns
            .iter()
            .filter(|c| c.as_str() != target && self.roles.is_one_hot(c))
            .cloned()
            .collect();
        let scaled: Vec<String> = columns
            .iter()
            .filter(|c| c.as_str() != target && c.ends_with("_scaled"))
            .cloned()
            .collect();

        let policy = if scaled.is_empty() {
            FeaturePolicy::RawPlusScaler
        } else {
            FeaturePolicy::PreScaled
        };

        let (feature_names, numerical) = match policy {
            FeaturePolicy::PreScaled => {
                let mut names = one_hot.clone();
                names.extend(scaled.into_iter().filter(|c| !one_hot.contains(c)));
                (names, Vec::new())
            }
            FeaturePolicy::RawPlusScaler => {
                let numerical: Vec<String> = columns
                    .iter()
                    .filter(|c| {
                        c.as_str() != target
                            && !self.roles.categorical.contains(c)
                            && !self.roles.is_one_hot(c)
                    })
                    .cloned()
                    .collect();
                let mut names = numerical.clone();
                names.extend(one_hot.iter().cloned());
                (names, numerical)
            }
        };

        if feature_names.is_empty() {
            return Err(PipelineError::SchemaMismatch(
                "no usable feature columns in training split".to_string(),
            ));
        }
        if let Some(val) = validation {
            if let Some(missing) = feature_names.iter().find(|f| val.column(f.as_str()).is_err()) {
                return Err(PipelineError::SchemaMismatch(format!(
                    "feature '{}' missing from validation split",
                    missing
                )));
            }
        }

        let scaler = match policy {
            FeaturePolicy::RawPlusScaler if !numerical.is_empty() => Some(StandardScaler::fit(train, &numerical)?),
            _ => None,
        };
        let apply = |df: &DataFrame| -> Result<Array2<f64>> {
            match &scaler {
                Some(s) => feature_matrix(&s.transform(df)?, &feature_names),
                None => feature_matrix(df, &feature_names),
            }
        };

        let x_train = apply(train)?;
        let x_val = validation.map(&apply).transpose()?;

        let encoder = LabelEncoder::fit(train, target)?;
        let y_train = encoder.encode(train, target)?;
        let y_val = validation.map(|v| encoder.encode(v, target)).transpose()?;

        info!(
            policy = ?policy,
            n_features = feature_names.len(),
            features = ?feature_names,
            label = target,
            classes = ?encoder.classes(),
            "Prepared features"
        );

        Ok(PreparedFeatures {
            x_train,
            y_train,
            x_val,
            y_val,
            spec: FeatureSpec {
                feature_names,
                policy,
                target: target.to_string(),
                classes: encoder.classes().to_vec(),
                scaler,
            },
        })
    }

    fn check_declared_categoricals(&self, df: &DataFrame, split: &str) -> Result<()> {
        let names = df.get_column_names();
        for cat in &self.roles.categorical {
            let present = names
                .iter()
                .any(|c| c.as_str() == cat.as_str() || one_hot_of(c.as_str(), cat));
            if !present {
                return Err(PipelineError::SchemaMismatch(format!(
                    "categorical feature '{}' has no raw or one-hot column in the {} split",
                    cat, split
                )));
            }
        }
        Ok(())
    }
}

fn one_hot_of(column: &str, categorical: &str) -> bool {
    column
        .strip_prefix(categorical)
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|level| !level.is_empty())
}

/// Dense row-major matrix of `names` in order
pub fn feature_matrix(df: &DataFrame, names: &[String]) -> Result<Array2<f64>> {
    let mut x = Array2::zeros((df.height(), names.len()));
    for (j, name) in names.iter().enumerate() {
        let series = float_column(df, name)?;
        for (i, v) in series.f64()?.into_no_null_iter().enumerate() {
            x[[i, j]] = v;
        }
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureMetadata;

    fn roles() -> ColumnRoles {
        ColumnRoles::new(vec!["region".to_string(), "weather".to_string()], "status")
    }

    fn raw_train() -> DataFrame {
        df!(
            "weight" => &[10.0, 20.0, 30.0, 40.0],
            "region" => &["n", "s", "n", "s"],
            "region_n" => &[1i64, 0, 1, 0],
            "region_s" => &[0i64, 1, 0, 1],
            "status" => &["Overloaded", "Not Overloaded", "Overloaded", "Not Overloaded"]
        )
        .unwrap()
    }

    fn raw_val() -> DataFrame {
        df!(
            "region_s" => &[1i64, 0],
            "status" => &["Overloaded", "Not Overloaded"],
            "region_n" => &[0i64, 1],
            "weight" => &[25.0, 10.0],
            "region" => &["s", "n"]
        )
        .unwrap()
    }

    #[test]
    fn test_raw_policy_order_and_scaler() {
        let prepared = FeatureProcessor::new(roles())
            .prepare(&raw_train(), Some(&raw_val()))
            .unwrap();
        let spec = &prepared.spec;

        assert_eq!(spec.policy, FeaturePolicy::RawPlusScaler);
        assert_eq!(spec.feature_names, vec!["weight", "region_n", "region_s"]);
        assert_eq!(spec.classes, vec!["Not Overloaded", "Overloaded"]);

        let scaler = spec.scaler.as_ref().unwrap();
        assert_eq!(scaler.columns(), &["weight".to_string()]);

        // Same column order in both matrices, one-hot values untouched
        let x_val = prepared.x_val.unwrap();
        assert_eq!(x_val.ncols(), 3);
        assert_eq!(x_val[[0, 1]], 0.0);
        assert_eq!(x_val[[0, 2]], 1.0);

        // A validation row equal to a training row scales identically
        assert_eq!(x_val[[1, 0]], prepared.x_train[[0, 0]]);
        assert_eq!(prepared.y_train.to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(prepared.y_val.unwrap().to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_prescaled_policy() {
        let train = df!(
            "weight" => &[10.0, 20.0, 30.0],
            "weight_scaled" => &[-1.2, 0.0, 1.2],
            "region_n" => &[1i64, 0, 1],
            "status" => &["a", "b", "a"]
        )
        .unwrap();
        let prepared = FeatureProcessor::new(roles()).prepare(&train, None).unwrap();
        assert_eq!(prepared.spec.policy, FeaturePolicy::PreScaled);
        assert_eq!(prepared.spec.feature_names, vec!["region_n", "weight_scaled"]);
        assert!(prepared.spec.scaler.is_none());
        assert!(prepared.x_val.is_none());
        assert_eq!(prepared.x_train[[2, 1]], 1.2);
    }

    #[test]
    fn test_missing_target() {
        let val = raw_val().drop("status").unwrap();
        let err = FeatureProcessor::new(roles()).prepare(&raw_train(), Some(&val)).unwrap_err();
        assert!(matches!(err, PipelineError::MissingTarget(ref t) if t == "status"));
    }

    #[test]
    fn test_feature_missing_from_validation() {
        let val = raw_val().drop("region_s").unwrap();
        let err = FeatureProcessor::new(roles()).prepare(&raw_train(), Some(&val)).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }

    #[test]
    fn test_non_numeric_feature() {
        let train = df!(
            "weight" => &["light", "heavy", "light"],
            "status" => &["a", "b", "a"]
        )
        .unwrap();
        let err = FeatureProcessor::new(roles()).prepare(&train, None).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }

    #[test]
    fn test_declared_categorical_absent() {
        let metadata = DatasetMetadata {
            version: None,
            features: Some(FeatureMetadata {
                categorical: vec!["region".to_string(), "vehicle_type".to_string()],
                target: Some("status".to_string()),
            }),
        };
        let roles = ColumnRoles::resolve(Some(&metadata), &PipelineConfig::default());
        assert!(roles.declared);
        assert_eq!(roles.target, "status");

        let err = FeatureProcessor::new(roles).prepare(&raw_train(), None).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(ref m) if m.contains("vehicle_type")));
    }

    #[test]
    fn test_default_roles_without_metadata() {
        let roles = ColumnRoles::resolve(None, &PipelineConfig::default());
        assert!(!roles.declared);
        assert_eq!(roles.target, "overload_status");
        assert!(roles.is_one_hot("vehicle_type_truck"));
        assert!(!roles.is_one_hot("vehicle_type"));
        assert!(!roles.is_one_hot("regional_index"));
    }
}
