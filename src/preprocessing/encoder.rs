//! Target label encoding

use crate::error::{PipelineError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Maps the two target classes to 0/1 by sorted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the target column of the training split
    pub fn fit(df: &DataFrame, target: &str) -> Result<Self> {
        let labels = target_labels(df, target)?;
        let mut classes = labels;
        classes.sort();
        classes.dedup();

        if classes.len() != 2 {
            return Err(PipelineError::SchemaMismatch(format!(
                "target '{}' must have exactly 2 classes, found {}: {:?}",
                target,
                classes.len(),
                classes
            )));
        }
        Ok(Self { classes })
    }

    /// Encode the target column; unseen labels are a schema mismatch
    pub fn encode(&self, df: &DataFrame, target: &str) -> Result<Array1<f64>> {
        target_labels(df, target)?
            .iter()
            .map(|label| {
                self.index_of(label).map(|i| i as f64).ok_or_else(|| {
                    PipelineError::SchemaMismatch(format!(
                        "unknown label '{}' in target '{}'",
                        label, target
                    ))
                })
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    pub fn decode(&self, encoded: f64) -> Option<&str> {
        let idx = if encoded > 0.5 { 1 } else { 0 };
        self.classes.get(idx).map(String::as_str)
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

/// Target column read as strings
fn target_labels(df: &DataFrame, target: &str) -> Result<Vec<String>> {
    let series = df
        .column(target)
        .map_err(|_| PipelineError::MissingTarget(target.to_string()))?
        .as_materialized_series()
        .cast(&DataType::String)?;

    if series.null_count() > 0 {
        return Err(PipelineError::SchemaMismatch(format!(
            "target '{}' has {} missing values",
            target,
            series.null_count()
        )));
    }
    Ok(series
        .str()?
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_classes() {
        let df = df!("status" => &["Overloaded", "Not Overloaded", "Overloaded"]).unwrap();
        let encoder = LabelEncoder::fit(&df, "status").unwrap();
        assert_eq!(encoder.classes(), &["Not Overloaded".to_string(), "Overloaded".to_string()]);
        assert_eq!(encoder.encode(&df, "status").unwrap().to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(encoder.decode(1.0), Some("Overloaded"));
    }

    #[test]
    fn test_numeric_target_read_as_text() {
        let df = df!("y" => &[0i64, 1, 1, 0]).unwrap();
        let encoder = LabelEncoder::fit(&df, "y").unwrap();
        assert_eq!(encoder.classes(), &["0".to_string(), "1".to_string()]);
    }

    #[test]
    fn test_wrong_class_count() {
        let df = df!("y" => &["a", "a"]).unwrap();
        assert!(matches!(LabelEncoder::fit(&df, "y"), Err(PipelineError::SchemaMismatch(_))));

        let df = df!("y" => &["a", "b", "c"]).unwrap();
        assert!(matches!(LabelEncoder::fit(&df, "y"), Err(PipelineError::SchemaMismatch(_))));
    }

    #[test]
    fn test_unknown_label_and_missing_target() {
        let train = df!("y" => &["a", "b"]).unwrap();
        let val = df!("y" => &["a", "z"]).unwrap();
        let encoder = LabelEncoder::fit(&train, "y").unwrap();
        assert!(matches!(encoder.encode(&val, "y"), Err(PipelineError::SchemaMismatch(_))));
        assert!(matches!(encoder.encode(&val, "label"), Err(PipelineError::MissingTarget(_))));
    }
}
