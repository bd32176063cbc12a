//! Fairness metric engine
//!
//! Measures how far the protected-attribute make-up of correctly identified
//! positives drifts from the make-up of all actual positives. Every metric is
//! an L1 distance between two normalized group distributions, taken over the
//! union of groups (a group absent on one side counts as rate 0).
//!
//! All three metrics reduce to the same number. The predicted-positive
//! distribution is tallied over positive rows predicted 1, which is exactly
//! the true-positive row set, so `disparity`, `statistical_parity` and
//! `equal_opportunity` all measure the true-positive vs actual-positive
//! distance. They are kept as separate fields because the fairness score
//! sums them, which makes it three times that distance.

use crate::data::Dataset;
use crate::error::{FairfitError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

/// Normalized frequency of each protected group, ordered by group key
pub type GroupDistribution = BTreeMap<String, f64>;

/// Group-disparity statistics for one set of predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FairnessReport {
    /// Actual-positive vs predicted-positive group distribution distance
    pub disparity: f64,
    /// Predicted-positive vs actual-positive group distribution distance
    pub statistical_parity: f64,
    /// True-positive vs actual-positive group distribution distance
    pub equal_opportunity: f64,
}

impl FairnessReport {
    /// Report with every metric at zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// Fairness score: sum of the three metrics, lower is fairer
    pub fn total(&self) -> f64 {
        self.disparity + self.statistical_parity + self.equal_opportunity
    }
}

/// Normalized frequency distribution of the given keys
pub fn group_distribution<'a, I>(keys: I) -> GroupDistribution
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0usize;
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
        total += 1;
    }

    counts
        .into_iter()
        .map(|(k, c)| (k, c as f64 / total as f64))
        .collect()
}

/// Sum of absolute per-group differences over the union of groups
pub fn distribution_distance(a: &GroupDistribution, b: &GroupDistribution) -> f64 {
    let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .map(|k| {
            let pa = a.get(k).copied().unwrap_or(0.0);
            let pb = b.get(k).copied().unwrap_or(0.0);
            (pa - pb).abs()
        })
        .sum()
}

/// Compute the fairness report for predictions over `evaluation_indices`.
///
/// `predictions[i]` belongs to dataset row `evaluation_indices[i]`; the two
/// must have equal length. Predictions and target values must be 0/1. When
/// no evaluated row has a positive target every metric is zero.
pub fn fairness_metrics(
    dataset: &Dataset,
    evaluation_indices: &[usize],
    protected_attribute: &str,
    predictions: &Array1<f64>,
    target_column: &str,
) -> Result<FairnessReport> {
    if predictions.len() != evaluation_indices.len() {
        return Err(FairfitError::MisalignedIndices {
            expected: evaluation_indices.len(),
            actual: predictions.len(),
        });
    }
    if let Some(bad) = predictions.iter().find(|&&p| p != 0.0 && p != 1.0) {
        return Err(FairfitError::InvalidInput(format!(
            "Predictions must be 0 or 1, found {}",
            bad
        )));
    }

    let actuals = dataset.binary_labels(target_column, evaluation_indices)?;
    let groups = dataset.group_keys(protected_attribute, evaluation_indices)?;

    let positive: Vec<usize> = (0..actuals.len()).filter(|&i| actuals[i] == 1.0).collect();
    if positive.is_empty() {
        return Ok(FairnessReport::zero());
    }

    let actual_positive = group_distribution(positive.iter().map(|&i| groups[i].as_str()));

    // Aligned predictions: the positive rows, tallied where predicted positive
    let predicted_positive = group_distribution(
        positive
            .iter()
            .filter(|&&i| predictions[i] == 1.0)
            .map(|&i| groups[i].as_str()),
    );

    let disparity = distribution_distance(&actual_positive, &predicted_positive);
    let statistical_parity = distribution_distance(&predicted_positive, &actual_positive);

    let true_positives = group_distribution(
        (0..actuals.len())
            .filter(|&i| actuals[i] == 1.0 && predictions[i] == 1.0)
            .map(|i| groups[i].as_str()),
    );
    let equal_opportunity = distribution_distance(&true_positives, &actual_positive);

    trace!(
        disparity,
        statistical_parity,
        equal_opportunity,
        equal = disparity == statistical_parity && disparity == equal_opportunity,
        "disparity/statistical_parity/equal_opportunity equivalence"
    );

    Ok(FairnessReport {
        disparity,
        statistical_parity,
        equal_opportunity,
    })
}
