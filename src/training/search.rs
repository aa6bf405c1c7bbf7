//! Grid search under cross-validation followed by a fresh refit

use super::cross_validation::{CVResults, CVStrategy, CrossValidator};
use super::family::ModelFamily;
use super::models::{BinaryClassifier, CandidateModel};
use super::params::{Hyperparameters, ParamGrid};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::evaluation::metrics::accuracy;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// CV outcome of one grid point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridScore {
    pub params: Hyperparameters,
    /// Mean fold accuracy; `-inf` when the point failed
    pub mean_score: f64,
    pub std_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of searching one family
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub family: ModelFamily,
    /// Refit on the whole training split with `best_params`
    pub model: CandidateModel,
    pub best_params: Hyperparameters,
    pub best_score: f64,
    /// Every grid point, in grid order
    pub grid_scores: Vec<GridScore>,
    /// Wall time of the search plus refit
    pub fit_seconds: f64,
}

/// Exhaustive hyperparameter search
#[derive(Debug, Clone)]
pub struct GridSearch {
    strategy: CVStrategy,
    random_state: u64,
    grids: BTreeMap<ModelFamily, ParamGrid>,
}

impl GridSearch {
    pub fn new(strategy: CVStrategy, random_state: u64) -> Self {
        Self {
            strategy,
            random_state,
            grids: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut search = Self::new(config.cv_strategy, config.random_state);
        for entry in &config.families {
            search.grids.insert(entry.family, entry.grid.clone());
        }
        search
    }

    /// Override the grid of one family
    pub fn with_grid(mut self, family: ModelFamily, grid: ParamGrid) -> Self {
        self.grids.insert(family, grid);
        self
    }

    pub fn grid_for(&self, family: ModelFamily) -> ParamGrid {
        self.grids.get(&family).cloned().unwrap_or_else(|| family.default_grid())
    }

    /// Score every grid point by CV accuracy, then refit the best on all of `x`.
    ///
    /// Ties go to the earliest grid point. Failing points score `-inf`; the
    /// family fails only if every point (or the refit) fails.
    pub fn search_and_fit(&self, family: ModelFamily, x: &Array2<f64>, y: &Array1<f64>) -> Result<SearchOutcome> {
        let start = Instant::now();
        let points = self.grid_for(family).points();
        let splits = CrossValidator::new(self.strategy)
            .with_random_state(self.random_state)
            .split(y)
            .map_err(|e| PipelineError::training(family.name(), e))?;

        info!(
            family = family.name(),
            grid_points = points.len(),
            folds = splits.len(),
            "Starting grid search"
        );

        let folds: Vec<(Array2<f64>, Array1<f64>, Array2<f64>, Array1<f64>)> = splits
            .iter()
            .map(|s| {
                (
                    x.select(Axis(0), &s.train_indices),
                    y.select(Axis(0), &s.train_indices),
                    x.select(Axis(0), &s.test_indices),
                    y.select(Axis(0), &s.test_indices),
                )
            })
            .collect();

        let grid_scores: Vec<GridScore> = points
            .par_iter()
            .map(|params| {
                let scored = folds
                    .iter()
                    .map(|(x_tr, y_tr, x_te, y_te)| {
                        let mut model = family.build(params, self.random_state)?;
                        model.fit(x_tr, y_tr)?;
                        Ok(accuracy(y_te, &model.predict(x_te)?))
                    })
                    .collect::<Result<Vec<f64>>>();

                match scored {
                    Ok(scores) => {
                        let cv = CVResults::from_scores(scores);
                        debug!(family = family.name(), params = %params, score = cv.mean_score, "Grid point scored");
                        GridScore {
                            params: params.clone(),
                            mean_score: cv.mean_score,
                            std_score: cv.std_score,
                            error: None,
                        }
                    }
                    Err(e) => {
                        warn!(family = family.name(), params = %params, error = %e, "Grid point failed");
                        GridScore {
                            params: params.clone(),
                            mean_score: f64::NEG_INFINITY,
                            std_score: 0.0,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect();

        let best = grid_scores
            .iter()
            .filter(|g| g.error.is_none() && g.mean_score.is_finite())
            .fold(None::<&GridScore>, |best, g| match best {
                Some(b) if b.mean_score >= g.mean_score => Some(b),
                _ => Some(g),
            })
            .ok_or_else(|| {
                let reason = grid_scores
                    .iter()
                    .find_map(|g| g.error.clone())
                    .unwrap_or_else(|| "empty grid".to_string());
                PipelineError::training(family.name(), format!("every grid point failed (first error: {})", reason))
            })?;

        let best_params = best.params.clone();
        let best_score = best.mean_score;

        let mut model = family
            .build(&best_params, self.random_state)
            .map_err(|e| PipelineError::training(family.name(), e))?;
        model
            .fit(x, y)
            .map_err(|e| PipelineError::training(family.name(), format!("refit failed: {}", e)))?;

        let fit_seconds = start.elapsed().as_secs_f64();
        info!(
            family = family.name(),
            best_params = %best_params,
            cv_accuracy = best_score,
            seconds = fit_seconds,
            "Grid search finished"
        );

        Ok(SearchOutcome {
            family,
            model,
            best_params,
            best_score,
            grid_scores,
            fit_seconds,
        })
    }
}
