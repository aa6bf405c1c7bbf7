//! Winner selection and persistence of every evaluated model

use crate::error::{PipelineError, Result};
use crate::evaluation::EvaluationResult;
use crate::export::{ArtifactStore, PersistReport};
use crate::preprocessing::FeatureSpec;
use crate::training::{CandidateModel, Hyperparameters, ModelFamily};
use tracing::info;

/// The chosen model and what happened while writing artifacts
#[derive(Debug)]
pub struct SelectionOutcome {
    pub family: ModelFamily,
    pub accuracy: f64,
    pub best_params: Hyperparameters,
    pub model: CandidateModel,
    pub persist_report: PersistReport,
}

/// Index of the strictly most accurate result; the earliest wins ties
pub fn select_winner(results: &[EvaluationResult]) -> Option<usize> {
    results
        .iter()
        .enumerate()
        .fold(None::<(usize, f64)>, |best, (i, r)| match best {
            Some((_, acc)) if acc >= r.accuracy => best,
            _ => Some((i, r.accuracy)),
        })
        .map(|(i, _)| i)
}

/// Persist every model and metrics document, then the winner under its fixed name.
///
/// A family's model and metrics land together or not at all; a failed family
/// is collected in the report and never stops the others or the winner.
pub fn select_and_persist(
    mut results: Vec<EvaluationResult>,
    spec: &FeatureSpec,
    store: &ArtifactStore,
) -> Result<SelectionOutcome> {
    let winner_idx = select_winner(&results).ok_or(PipelineError::NoCandidates)?;

    let mut report = PersistReport::default();
    for result in &results {
        report.record_all(store.write_family(result, spec));
    }

    let winner = results.swap_remove(winner_idx);
    report.record(store.write_best_model(&winner, spec));

    info!(
        family = winner.family.name(),
        accuracy = winner.accuracy,
        best_params = %winner.best_params,
        path = %store.paths().best_model_path.display(),
        "Selected best model"
    );

    Ok(SelectionOutcome {
        family: winner.family,
        accuracy: winner.accuracy,
        best_params: winner.best_params,
        model: winner.model,
        persist_report: report,
    })
}
