//! Standard (z-score) scaling of numerical columns

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-column `(x - mean) / scale` with the population standard deviation.
///
/// A constant column gets scale 1 so it maps to zero instead of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on `columns` of `df`; every column must be numeric without nulls
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut means = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());

        for name in columns {
            let series = float_column(df, name)?;
            let ca = series.f64()?;
            let mean = ca.mean().unwrap_or(0.0);
            let std = ca.std(0).unwrap_or(0.0);
            means.push(mean);
            scales.push(if std == 0.0 || !std.is_finite() { 1.0 } else { std });
        }

        Ok(Self {
            columns: columns.to_vec(),
            means,
            scales,
        })
    }

    /// Replace the fitted columns of `df` with their scaled values
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let replacements: Vec<Series> = self
            .columns
            .iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(name, (&mean, &scale))| {
                let series = float_column(df, name)?;
                let scaled: Float64Chunked = series
                    .f64()?
                    .into_iter()
                    .map(|v| v.map(|x| (x - mean) / scale))
                    .collect();
                Ok(scaled.with_name(name.as_str().into()).into_series())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }
        Ok(result)
    }

    /// Scale one row given in fitted-column order
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.columns.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} values", self.columns.len()),
                actual: format!("{} values", row.len()),
            });
        }
        Ok(row
            .iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(&x, (&m, &s))| (x - m) / s)
            .collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

/// Column cast to Float64, rejecting missing or non-numeric values
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Series> {
    let series = df
        .column(name)
        .map_err(|_| PipelineError::SchemaMismatch(format!("column '{}' not found", name)))?
        .as_materialized_series();

    if series.null_count() > 0 {
        return Err(PipelineError::SchemaMismatch(format!(
            "column '{}' has {} missing values",
            name,
            series.null_count()
        )));
    }
    if matches!(series.dtype(), DataType::String) {
        return Err(PipelineError::SchemaMismatch(format!(
            "column '{}' is not numeric",
            name
        )));
    }

    let cast = series.cast(&DataType::Float64).map_err(|_| {
        PipelineError::SchemaMismatch(format!("column '{}' is not numeric", name))
    })?;
    if cast.null_count() > 0 {
        return Err(PipelineError::SchemaMismatch(format!(
            "column '{}' is not numeric",
            name
        )));
    }
    Ok(cast)
}
