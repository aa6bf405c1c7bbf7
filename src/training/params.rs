//! Hyperparameter values, assignments and grids

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Unbounded / unset (e.g. `max_depth = None`)
    None,
    Int(i64),
    Float(f64),
    Text(String),
    /// Hidden layer widths for neural networks
    Layers(Vec<usize>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::None => write!(f, "None"),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
            ParamValue::Layers(v) => {
                let inner: Vec<String> = v.iter().map(|w| w.to_string()).collect();
                if inner.len() == 1 {
                    write!(f, "({},)", inner[0])
                } else {
                    write!(f, "({})", inner.join(", "))
                }
            }
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<Vec<usize>> for ParamValue {
    fn from(v: Vec<usize>) -> Self {
        ParamValue::Layers(v)
    }
}

/// One concrete hyperparameter assignment (a grid point)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hyperparameters(BTreeMap<String, ParamValue>);

impl Hyperparameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Positive integer parameter, falling back to `default` when absent
    pub fn usize_or(&self, name: &str, default: usize) -> Result<usize> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Int(v)) if *v > 0 => Ok(*v as usize),
            Some(other) => Err(invalid(name, other, "expected a positive integer")),
        }
    }

    /// Optional positive integer; `None` means unbounded
    pub fn optional_usize(&self, name: &str, default: Option<usize>) -> Result<Option<usize>> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::None) => Ok(None),
            Some(ParamValue::Int(v)) if *v > 0 => Ok(Some(*v as usize)),
            Some(other) => Err(invalid(name, other, "expected a positive integer or None")),
        }
    }

    /// Strictly positive float; integers are accepted
    pub fn positive_f64_or(&self, name: &str, default: f64) -> Result<f64> {
        let value = match self.0.get(name) {
            None => return Ok(default),
            Some(ParamValue::Float(v)) => *v,
            Some(ParamValue::Int(v)) => *v as f64,
            Some(other) => return Err(invalid(name, other, "expected a number")),
        };
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(invalid(name, &ParamValue::Float(value), "must be positive"))
        }
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str> {
        match self.0.get(name) {
            None => Ok(default),
            Some(ParamValue::Text(v)) => Ok(v.as_str()),
            Some(other) => Err(invalid(name, other, "expected a string")),
        }
    }

    pub fn layers_or(&self, name: &str, default: &[usize]) -> Result<Vec<usize>> {
        match self.0.get(name) {
            None => Ok(default.to_vec()),
            Some(ParamValue::Layers(v)) if !v.is_empty() && v.iter().all(|&w| w > 0) => Ok(v.clone()),
            Some(ParamValue::Int(v)) if *v > 0 => Ok(vec![*v as usize]),
            Some(other) => Err(invalid(name, other, "expected non-empty layer widths")),
        }
    }
}

impl fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn invalid(name: &str, value: &ParamValue, reason: &str) -> PipelineError {
    PipelineError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Hyperparameter search space: name -> ordered candidate list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParamValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.0.insert(name.to_string(), values);
        self
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        if self.0.is_empty() {
            return 1;
        }
        self.0.values().map(|v| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand the cartesian product.
    ///
    /// Keys are visited in sorted order and the last key varies fastest, so
    /// `{a: [1, 2], b: [x, y]}` yields `a=1,b=x`, `a=1,b=y`, `a=2,b=x`, `a=2,b=y`.
    /// An empty grid yields a single empty assignment.
    pub fn points(&self) -> Vec<Hyperparameters> {
        let mut points = vec![Hyperparameters::new()];
        for (name, values) in &self.0 {
            let mut next = Vec::with_capacity(points.len() * values.len());
            for point in &points {
                for value in values {
                    let mut extended = point.clone();
                    extended.0.insert(name.clone(), value.clone());
                    next.push(extended);
                }
            }
            points = next;
        }
        points
    }
}
