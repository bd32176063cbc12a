//! Hyperparameter tuning by exhaustive grid search

use super::{fit_model, persist, Technique, TechniqueContext, TechniqueId, TrainedPredictor};
use crate::config::TuningConfig;
use crate::error::Result;
use crate::training::{CVStrategy, CrossValidator, ModelKind, ModelParams};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Cross-validated score of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningTrial {
    pub trial_id: usize,
    pub params: ModelParams,
    /// Mean fold accuracy
    pub value: f64,
    pub fold_scores: Vec<f64>,
    pub duration_secs: f64,
}

/// Grid search over the base model's parameter grid, scored by k-fold
/// accuracy; the winner is refit on all rows
#[derive(Debug, Clone, Default)]
pub struct HyperparameterTuning {
    config: TuningConfig,
}

impl HyperparameterTuning {
    pub fn new(config: TuningConfig) -> Self {
        Self { config }
    }

    /// Score every grid point; trials come back in grid order
    pub fn search(&self, base_model: ModelKind, x: &Array2<f64>, y: &Array1<f64>) -> Result<Vec<TuningTrial>> {
        self.config.validate()?;
        let strategy = if self.config.stratified {
            CVStrategy::StratifiedKFold { n_splits: self.config.cv_folds, shuffle: true }
        } else {
            CVStrategy::KFold { n_splits: self.config.cv_folds, shuffle: true }
        };
        let splits = CrossValidator::new(strategy)
            .with_random_state(self.config.random_state)
            .split(x.nrows(), Some(y))?;

        let seed = self.config.random_state;
        base_model
            .param_grid()
            .into_par_iter()
            .enumerate()
            .map(|(trial_id, params)| {
                let start = Instant::now();
                let fold_scores = splits
                    .iter()
                    .map(|split| {
                        let x_train = x.select(Axis(0), &split.train_indices);
                        let y_train = y.select(Axis(0), &split.train_indices);
                        let model = fit_model(&params, &x_train, &y_train, seed)?;
                        let predictions = model.predict(&x.select(Axis(0), &split.test_indices))?;
                        let correct = split
                            .test_indices
                            .iter()
                            .zip(predictions.iter())
                            .filter(|&(&i, &p)| y[i] == p)
                            .count();
                        Ok(correct as f64 / split.test_indices.len().max(1) as f64)
                    })
                    .collect::<Result<Vec<f64>>>()?;

                let value = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;
                debug!(trial = trial_id, params = %params, score = value, "Tuning trial");
                Ok(TuningTrial {
                    trial_id,
                    params,
                    value,
                    fold_scores,
                    duration_secs: start.elapsed().as_secs_f64(),
                })
            })
            .collect()
    }
}

/// Highest mean accuracy; ties keep the earlier grid point
pub(crate) fn best_trial(trials: &[TuningTrial]) -> Option<&TuningTrial> {
    trials.iter().fold(None, |best: Option<&TuningTrial>, t| match best {
        Some(b) if b.value >= t.value => Some(b),
        _ => Some(t),
    })
}

impl Technique for HyperparameterTuning {
    fn id(&self) -> TechniqueId {
        TechniqueId::HyperparameterTuning
    }

    fn apply(&self, base_model: ModelKind, ctx: &TechniqueContext) -> Result<TrainedPredictor> {
        let trials = self.search(base_model, ctx.x(), ctx.y())?;
        let params = best_trial(&trials)
            .map(|t| t.params.clone())
            .unwrap_or_else(|| base_model.default_params());
        info!(model = %base_model, best = %params, n_trials = trials.len(), "Tuning finished");

        let model = fit_model(&params, ctx.x(), ctx.y(), ctx.random_state)?;
        let details = serde_json::json!({ "trials": trials });
        persist(ctx, self.id(), params, TrainedPredictor::Standard(model), details)
    }
}
