//! Post-processing with per-group decision thresholds
//!
//! Every protected group gets its own score threshold so that all groups are
//! selected at the same rate (demographic parity). The common rate is picked
//! from a grid to maximise training accuracy.

use super::{ModelArtifact, Technique, TechniqueContext, TechniqueId, TrainedPredictor};
use crate::error::{FairfitError, Result};
use crate::training::{Classifier, ModelKind};
use ndarray::{Array1, Array2};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Thresholds chosen for one selection rate
#[derive(Debug, Clone, PartialEq)]
struct ThresholdSet {
    selection_rate: f64,
    per_group: BTreeMap<String, f64>,
    fallback: f64,
}

/// Score at which `rate` of the given scores are selected.
///
/// A zero rate sits above every score in `[0, 1]`.
fn threshold_for_rate(scores: &mut [f64], rate: f64) -> f64 {
    scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    let n = scores.len();
    let k = (rate * n as f64).round() as usize;
    match k {
        _ if n == 0 => 0.5,
        0 => scores[0].max(1.0) + 1.0,
        k if k >= n => scores[n - 1],
        k => scores[k - 1],
    }
}

fn thresholds_for_rate(scores: &Array1<f64>, groups: &[String], rate: f64) -> ThresholdSet {
    let mut by_group: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (g, &s) in groups.iter().zip(scores.iter()) {
        by_group.entry(g.as_str()).or_default().push(s);
    }
    let per_group = by_group
        .into_iter()
        .map(|(g, mut s)| (g.to_string(), threshold_for_rate(&mut s, rate)))
        .collect();
    let mut all = scores.to_vec();
    ThresholdSet {
        selection_rate: rate,
        per_group,
        fallback: threshold_for_rate(&mut all, rate),
    }
}

fn apply_thresholds(scores: &Array1<f64>, groups: &[String], set: &ThresholdSet) -> Array1<f64> {
    scores
        .iter()
        .zip(groups.iter())
        .map(|(&s, g)| {
            let threshold = set.per_group.get(g).copied().unwrap_or(set.fallback);
            if s >= threshold { 1.0 } else { 0.0 }
        })
        .collect()
}

/// Most accurate threshold set over `grid_size + 1` evenly spaced rates;
/// ties keep the lower rate
fn select_thresholds(scores: &Array1<f64>, y: &Array1<f64>, groups: &[String], grid_size: usize) -> ThresholdSet {
    let grid_size = grid_size.max(1);
    let mut best: Option<(f64, ThresholdSet)> = None;
    for step in 0..=grid_size {
        let set = thresholds_for_rate(scores, groups, step as f64 / grid_size as f64);
        let predictions = apply_thresholds(scores, groups, &set);
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        let accuracy = correct as f64 / y.len().max(1) as f64;
        if best.as_ref().map_or(true, |(a, _)| accuracy > *a) {
            best = Some((accuracy, set));
        }
    }
    match best {
        Some((accuracy, set)) => {
            debug!(rate = set.selection_rate, accuracy, "Selected common selection rate");
            set
        }
        None => thresholds_for_rate(scores, groups, 0.5),
    }
}

/// A fitted scorer with one decision threshold per protected group
#[derive(Debug)]
pub struct ThresholdOptimizer {
    estimator: Box<dyn Classifier>,
    thresholds: ThresholdSet,
}

impl ThresholdOptimizer {
    /// Choose thresholds for an already fitted estimator on its training data
    pub fn fit(
        estimator: Box<dyn Classifier>,
        x: &Array2<f64>,
        y: &Array1<f64>,
        groups: &[String],
        grid_size: usize,
    ) -> Result<Self> {
        if groups.len() != x.nrows() || y.len() != x.nrows() {
            return Err(FairfitError::MisalignedIndices {
                expected: x.nrows(),
                actual: groups.len().min(y.len()),
            });
        }
        let scores = estimator.predict_proba(x)?;
        let thresholds = select_thresholds(&scores, y, groups, grid_size);
        Ok(Self { estimator, thresholds })
    }

    /// Predict with the threshold of each row's group; unseen groups use
    /// the threshold computed over all training rows
    pub fn predict(&self, x: &Array2<f64>, groups: &[String]) -> Result<Array1<f64>> {
        if groups.len() != x.nrows() {
            return Err(FairfitError::MisalignedIndices {
                expected: x.nrows(),
                actual: groups.len(),
            });
        }
        let scores = self.estimator.predict_proba(x)?;
        Ok(apply_thresholds(&scores, groups, &self.thresholds))
    }

    pub fn thresholds(&self) -> &BTreeMap<String, f64> {
        &self.thresholds.per_group
    }

    pub fn fallback_threshold(&self) -> f64 {
        self.thresholds.fallback
    }

    pub fn selection_rate(&self) -> f64 {
        self.thresholds.selection_rate
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "estimator": self.estimator.to_json()?,
            "thresholds": self.thresholds.per_group,
            "fallback_threshold": self.thresholds.fallback,
            "selection_rate": self.thresholds.selection_rate,
        }))
    }
}

/// Outcomes optimization with a [`ThresholdOptimizer`]
#[derive(Debug, Clone, Copy)]
pub struct OutcomesOptimization {
    /// Number of intervals in the selection-rate grid
    pub grid_size: usize,
}

impl Default for OutcomesOptimization {
    fn default() -> Self {
        Self { grid_size: 20 }
    }
}

impl Technique for OutcomesOptimization {
    fn id(&self) -> TechniqueId {
        TechniqueId::OutcomesOptimization
    }

    fn apply(&self, base_model: ModelKind, ctx: &TechniqueContext) -> Result<TrainedPredictor> {
        let params = base_model.default_params();
        let estimator = super::fit_model(&params, ctx.x(), ctx.y(), ctx.random_state)?;
        let groups = ctx.group_keys()?;
        let optimizer = ThresholdOptimizer::fit(estimator, ctx.x(), ctx.y(), &groups, self.grid_size)?;
        info!(
            model = %base_model,
            selection_rate = optimizer.selection_rate(),
            n_groups = optimizer.thresholds().len(),
            "Fitted group thresholds"
        );

        let details = serde_json::json!({
            "selection_rate": optimizer.selection_rate(),
            "thresholds": optimizer.thresholds(),
        });
        let predictor = TrainedPredictor::SensitiveFeatureAware(optimizer);
        ModelArtifact::new(self.id(), params, &predictor)?
            .with_details(details)
            .save(&ctx.output_dir)?;
        Ok(predictor)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support;
    use super::*;
    use ndarray::array;

    fn keys(groups: &[&str]) -> Vec<String> {
        groups.iter().map(|g| g.to_string()).collect()
    }

    #[test]
    fn test_threshold_for_rate_edges() {
        let mut scores = vec![0.2, 0.9, 0.5, 0.7];
        assert_eq!(threshold_for_rate(&mut scores, 0.5), 0.7);
        assert_eq!(threshold_for_rate(&mut scores, 1.0), 0.2);
        assert!(threshold_for_rate(&mut scores, 0.0) > 0.9);
    }

    #[test]
    fn test_group_thresholds_separate_shifted_scores() {
        // Group b scores sit lower but rank the same way
        let scores = array![0.9, 0.8, 0.7, 0.6, 0.4, 0.3, 0.2, 0.1];
        let y = array![1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let groups = keys(&["a", "a", "a", "a", "b", "b", "b", "b"]);

        let set = select_thresholds(&scores, &y, &groups, 20);
        assert_eq!(set.per_group["a"], 0.8);
        assert_eq!(set.per_group["b"], 0.3);
        assert_eq!((set.selection_rate * 4.0).round(), 2.0);
        assert_eq!(apply_thresholds(&scores, &groups, &set), y);
    }

    #[test]
    fn test_unseen_group_uses_fallback() {
        let scores = array![0.9, 0.1];
        let set = ThresholdSet {
            selection_rate: 0.5,
            per_group: BTreeMap::from([("a".to_string(), 0.95)]),
            fallback: 0.5,
        };
        let predictions = apply_thresholds(&scores, &keys(&["a", "c"]), &set);
        assert_eq!(predictions, array![0.0, 0.0]);
        let predictions = apply_thresholds(&scores, &keys(&["c", "c"]), &set);
        assert_eq!(predictions, array![1.0, 0.0]);
    }

    #[test]
    fn test_apply_equalises_training_selection() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::context(dir.path());
        let predictor = OutcomesOptimization::default()
            .apply(ModelKind::LogisticRegression, &ctx)
            .unwrap();

        let groups = ctx.group_keys().unwrap();
        let predictions = predictor.predict(ctx.x(), Some(&groups)).unwrap();
        let rate = |g: &str| {
            let rows: Vec<usize> = (0..groups.len()).filter(|&i| groups[i] == g).collect();
            rows.iter().map(|&i| predictions[i]).sum::<f64>() / rows.len() as f64
        };
        // Distinct scores per row, so each group hits the common rate exactly
        assert_eq!(rate("a"), rate("b"));
        assert!(dir.path().join("outcomes_optimization.json").exists());
    }

    #[test]
    fn test_predict_checks_group_length() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::context(dir.path());
        let estimator = super::super::fit_model(&ModelKind::Knn.default_params(), ctx.x(), ctx.y(), 0).unwrap();
        let groups = ctx.group_keys().unwrap();
        let optimizer = ThresholdOptimizer::fit(estimator, ctx.x(), ctx.y(), &groups, 10).unwrap();
        assert!(matches!(
            optimizer.predict(ctx.x(), &groups[..3]),
            Err(FairfitError::MisalignedIndices { .. })
        ));
    }
}
