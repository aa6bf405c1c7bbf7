//! Optional dataset descriptor (`dataset_metadata.yaml`)

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// Column roles declared by the descriptor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    #[serde(default)]
    pub categorical: Vec<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Descriptor written alongside the dataset by its generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Free-form version tag (string or number)
    #[serde(default)]
    pub version: Option<serde_yaml::Value>,
    #[serde(default)]
    pub features: Option<FeatureMetadata>,
}

impl DatasetMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Read the descriptor if present; a missing or unreadable file yields `None`
    pub fn load_optional(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load(path) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable dataset metadata");
                None
            }
        }
    }

    pub fn version_label(&self) -> String {
        match &self.version {
            Some(serde_yaml::Value::String(s)) => s.clone(),
            Some(serde_yaml::Value::Number(n)) => n.to_string(),
            Some(serde_yaml::Value::Bool(b)) => b.to_string(),
            _ => "unknown".to_string(),
        }
    }

    pub fn categorical(&self) -> Option<&[String]> {
        self.features.as_ref().map(|f| f.categorical.as_slice())
    }

    pub fn target(&self) -> Option<&str> {
        self.features.as_ref().and_then(|f| f.target.as_deref())
    }
}
