//! End-to-end run: load, prepare, search each family, evaluate, select, persist

use crate::config::PipelineConfig;
use crate::data::DatasetLoader;
use crate::error::{PipelineError, Result};
use crate::evaluation::diagnostics::{emit_comparison, emit_family};
use crate::evaluation::{DiagnosticsSink, Evaluator, JsonDiagnosticsSink, ModelScore};
use crate::export::{ArtifactStore, PersistReport};
use crate::preprocessing::{ColumnRoles, FeatureProcessor, FeatureSpec};
use crate::selection::{select_and_persist, SelectionOutcome};
use crate::training::{GridSearch, ModelFamily};
use std::time::Instant;
use tracing::{error, info, warn};

/// What a completed run produced
#[derive(Debug)]
pub struct RunSummary {
    pub selection: SelectionOutcome,
    pub spec: FeatureSpec,
    /// Accuracy per surviving family, in evaluation order
    pub scores: Vec<ModelScore>,
    /// Families dropped after a training or evaluation failure
    pub dropped: Vec<ModelFamily>,
    /// Every artifact write of the run
    pub persist_report: PersistReport,
}

pub struct Pipeline {
    config: PipelineConfig,
    sink: Box<dyn DiagnosticsSink>,
}

impl Pipeline {
    /// Pipeline writing diagnostics next to the metrics documents
    pub fn new(config: PipelineConfig) -> Self {
        let sink = JsonDiagnosticsSink::new(config.output.results_dir.clone());
        Self {
            config,
            sink: Box::new(sink),
        }
    }

    pub fn with_sink(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loader and feature errors abort the run, as does a missing validation
    /// split. A family that fails to train or evaluate is dropped and the rest
    /// continue.
    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let config = &self.config;

        let loaded = DatasetLoader::from_config(config).load()?;
        let roles = ColumnRoles::resolve(loaded.metadata.as_ref(), config);
        info!(categorical = ?roles.categorical, label = %roles.target, "Resolved column roles");

        let prepared = FeatureProcessor::new(roles).prepare(&loaded.train, loaded.validation.as_ref())?;
        let spec = prepared.spec;

        let store = ArtifactStore::new(config.output.clone());
        let mut persist_report = PersistReport::default();
        if let Err(e) = store.ensure_dirs() {
            error!(error = %e, "Could not create output directories");
            persist_report.failures.push(e);
        }
        persist_report.record(store.write_feature_spec(&spec));
        if let Some(scaler) = &spec.scaler {
            persist_report.record(store.write_scaler(scaler));
        }

        let search = GridSearch::from_config(config);
        let evaluator = Evaluator::new(config.top_importances);
        let mut results = Vec::new();
        let mut dropped = Vec::new();

        for family in config.family_order() {
            let searched = search.search_and_fit(family, &prepared.x_train, &prepared.y_train);
            let Some(outcome) = isolate_family(family, "training", searched, PipelineError::is_fatal)? else {
                dropped.push(family);
                continue;
            };

            let evaluated = evaluator.evaluate(outcome, prepared.x_val.as_ref(), prepared.y_val.as_ref(), &spec);
            let Some(result) = isolate_family(family, "evaluation", evaluated, |e| {
                matches!(e, PipelineError::NoValidationData)
            })?
            else {
                dropped.push(family);
                continue;
            };
            emit_family(self.sink.as_ref(), &result.diagnostics);
            results.push(result);
        }

        let scores = ModelScore::from_results(&results);
        let mut selection = select_and_persist(results, &spec, &store)?;
        emit_comparison(self.sink.as_ref(), &scores, Some(selection.family));
        persist_report.merge(std::mem::take(&mut selection.persist_report));

        info!(
            winner = selection.family.name(),
            accuracy = selection.accuracy,
            families = scores.len(),
            dropped = dropped.len(),
            artifacts = persist_report.written.len(),
            failed_writes = persist_report.failures.len(),
            seconds = start.elapsed().as_secs_f64(),
            "Pipeline finished"
        );

        Ok(RunSummary {
            selection,
            spec,
            scores,
            dropped,
            persist_report,
        })
    }
}

/// `Ok(None)` drops the family after a warning; errors matching `fatal` end the run
fn isolate_family<T>(
    family: ModelFamily,
    stage: &str,
    outcome: Result<T>,
    fatal: impl Fn(&PipelineError) -> bool,
) -> Result<Option<T>> {
    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(e) if fatal(&e) => Err(e),
        Err(e) => {
            warn!(family = family.name(), stage, error = %e, "Dropping family");
            Ok(None)
        }
    }
}
