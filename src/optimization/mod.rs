//! Bias mitigation search
//!
//! Runs each requested technique against a base model kind, scores the
//! resulting predictor with the fitness function and keeps the lowest
//! fitness. Unknown technique names are skipped, never fatal.

use crate::config::{FailurePolicy, SearchConfig};
use crate::error::{FairfitError, Result};
use crate::fairness::FairnessReport;
use crate::fitness::{score_predictions, PredictionScore};
use crate::metrics::PerformanceReport;
use crate::mitigation::{Technique, TechniqueContext, TechniqueEntry, TechniqueId, TechniqueRegistry, TrainedPredictor};
use crate::training::ModelKind;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Score of one technique that produced a predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueEvaluation {
    pub technique: TechniqueId,
    pub performance: PerformanceReport,
    pub fairness: FairnessReport,
    pub fitness: f64,
    pub duration_secs: f64,
}

/// A technique that failed under `FailurePolicy::Continue`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueFailure {
    pub technique: TechniqueId,
    pub error: String,
}

/// Winning technique and its predictor
#[derive(Debug)]
pub struct BestModel {
    pub technique: TechniqueId,
    pub predictor: TrainedPredictor,
}

/// Result of a search.
///
/// `best` is `None` with infinite fitness when no technique produced a
/// predictor.
#[derive(Debug)]
pub struct OptimizationOutcome {
    pub best: Option<BestModel>,
    pub best_fitness: f64,
    /// Scored techniques in request order
    pub evaluations: Vec<TechniqueEvaluation>,
    pub failures: Vec<TechniqueFailure>,
}

impl Default for OptimizationOutcome {
    fn default() -> Self {
        Self {
            best: None,
            best_fitness: f64::INFINITY,
            evaluations: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl OptimizationOutcome {
    pub fn best_technique(&self) -> Option<TechniqueId> {
        self.best.as_ref().map(|b| b.technique)
    }

    pub fn found_candidate(&self) -> bool {
        self.best.is_some()
    }
}

struct TechniqueRun {
    predictor: TrainedPredictor,
    score: PredictionScore,
    duration_secs: f64,
}

/// Predict with the right protocol and score against the context's labels
pub fn evaluate_predictor(predictor: &TrainedPredictor, ctx: &TechniqueContext) -> Result<PredictionScore> {
    let groups = if predictor.requires_sensitive_features() {
        Some(ctx.group_keys()?)
    } else {
        None
    };
    let predictions = predictor.predict(ctx.x(), groups.as_deref())?;
    score_predictions(
        &ctx.features_with_protected,
        &ctx.features.rows,
        &ctx.protected_attribute,
        &ctx.labels.name,
        &predictions,
    )
}

fn execute(
    technique: &dyn Technique,
    base_model: ModelKind,
    ctx: &TechniqueContext,
) -> Result<(TrainedPredictor, PredictionScore)> {
    let predictor = technique.apply(base_model, ctx)?;
    let score = evaluate_predictor(&predictor, ctx)?;
    Ok((predictor, score))
}

/// Searches over mitigation techniques for the lowest-fitness predictor
#[derive(Debug, Clone)]
pub struct ModelOptimizer {
    registry: TechniqueRegistry,
    config: SearchConfig,
}

impl Default for ModelOptimizer {
    fn default() -> Self {
        Self::new(TechniqueRegistry::builtin(), SearchConfig::default())
    }
}

impl ModelOptimizer {
    pub fn new(registry: TechniqueRegistry, config: SearchConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn registry(&self) -> &TechniqueRegistry {
        &self.registry
    }

    /// Run every known technique in `techniques` and keep the predictor
    /// with the strictly lowest fitness; ties keep the earlier technique
    pub fn optimize(
        &self,
        base_model: ModelKind,
        techniques: &[TechniqueEntry],
        ctx: &TechniqueContext,
    ) -> Result<OptimizationOutcome> {
        self.config.validate()?;
        let ctx = Arc::new(ctx.clone().with_random_state(self.config.random_state));

        let resolved: Vec<(TechniqueId, Arc<dyn Technique>)> = techniques
            .iter()
            .filter_map(|entry| match entry {
                TechniqueEntry::Known(id) => match self.registry.get(*id) {
                    Some(t) => Some((*id, t)),
                    None => {
                        debug!(technique = %id, "Technique not registered, skipping");
                        None
                    }
                },
                TechniqueEntry::Unknown(name) => {
                    debug!(technique = %name, "Unknown technique, skipping");
                    None
                }
            })
            .collect();

        info!(
            model = %base_model,
            n_techniques = resolved.len(),
            parallel = self.config.parallel,
            "Starting technique search"
        );

        let outcome = if self.config.parallel {
            let runs: Vec<(TechniqueId, Result<TechniqueRun>)> = resolved
                .par_iter()
                .map(|(id, technique)| (*id, self.run_technique(*id, Arc::clone(technique), base_model, &ctx)))
                .collect();
            runs.into_iter()
                .try_fold(OptimizationOutcome::default(), |acc, (id, run)| self.absorb(acc, id, run))?
        } else {
            // Lazy, so an aborting failure stops the remaining techniques
            resolved
                .iter()
                .map(|(id, technique)| (*id, self.run_technique(*id, Arc::clone(technique), base_model, &ctx)))
                .try_fold(OptimizationOutcome::default(), |acc, (id, run)| self.absorb(acc, id, run))?
        };

        match outcome.best_technique() {
            Some(technique) => info!(
                technique = %technique,
                fitness = outcome.best_fitness,
                n_failures = outcome.failures.len(),
                "Technique search finished"
            ),
            None => info!(n_failures = outcome.failures.len(), "Technique search found no candidate"),
        }
        Ok(outcome)
    }

    fn run_technique(
        &self,
        id: TechniqueId,
        technique: Arc<dyn Technique>,
        base_model: ModelKind,
        ctx: &Arc<TechniqueContext>,
    ) -> Result<TechniqueRun> {
        let start = Instant::now();
        let (predictor, score) = match self.config.timeout()? {
            None => execute(technique.as_ref(), base_model, ctx)?,
            Some(timeout) => {
                let (tx, rx) = mpsc::channel();
                let worker_ctx = Arc::clone(ctx);
                thread::Builder::new()
                    .name(format!("technique-{}", id))
                    .spawn(move || {
                        // The receiver is gone once the search gave up waiting
                        let _ = tx.send(execute(technique.as_ref(), base_model, &worker_ctx));
                    })?;

                match rx.recv_timeout(timeout) {
                    Ok(result) => result?,
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(FairfitError::TechniqueTimeout {
                            technique: id.to_string(),
                            timeout_secs: timeout.as_secs_f64(),
                        })
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(FairfitError::TrainingError(
                            "technique worker exited without a result".to_string(),
                        ))
                    }
                }
            }
        };

        Ok(TechniqueRun {
            predictor,
            score,
            duration_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn absorb(
        &self,
        mut acc: OptimizationOutcome,
        id: TechniqueId,
        run: Result<TechniqueRun>,
    ) -> Result<OptimizationOutcome> {
        match run {
            Ok(run) => {
                let fitness = run.score.fitness;
                info!(
                    technique = %id,
                    performance = run.score.performance.score,
                    fairness = run.score.fairness.total(),
                    fitness,
                    "Evaluated technique"
                );
                acc.evaluations.push(TechniqueEvaluation {
                    technique: id,
                    performance: run.score.performance,
                    fairness: run.score.fairness,
                    fitness,
                    duration_secs: run.duration_secs,
                });
                if fitness < acc.best_fitness {
                    acc.best_fitness = fitness;
                    acc.best = Some(BestModel {
                        technique: id,
                        predictor: run.predictor,
                    });
                }
                Ok(acc)
            }
            Err(err) => {
                let err = match err {
                    timeout @ FairfitError::TechniqueTimeout { .. } => timeout,
                    other => other.in_technique(id.as_str()),
                };
                match self.config.failure_policy {
                    FailurePolicy::Abort => Err(err),
                    FailurePolicy::Continue => {
                        warn!(technique = %id, error = %err, "Technique failed, continuing");
                        acc.failures.push(TechniqueFailure {
                            technique: id,
                            error: err.to_string(),
                        });
                        Ok(acc)
                    }
                }
            }
        }
    }
}
