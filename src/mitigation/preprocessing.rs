//! Pre-processing techniques: SMOTE oversampling, reweighing and
//! disparate impact removal

use super::{fit_model, persist, Technique, TechniqueContext, TechniqueId, TrainedPredictor};
use crate::error::{FairfitError, Result};
use crate::training::ModelKind;
use ndarray::{Array1, Array2, Axis};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::debug;

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique) for 0/1 labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smote {
    /// Number of nearest neighbors
    k_neighbors: usize,
    /// Target size of every class relative to the majority class
    sampling_strategy: f64,
    seed: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self::new()
    }
}

impl Smote {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            sampling_strategy: 1.0,
            seed: 42,
        }
    }

    /// Set number of neighbors
    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    /// Set sampling strategy (ratio)
    pub fn with_sampling_strategy(mut self, ratio: f64) -> Self {
        self.sampling_strategy = ratio.clamp(0.1, 10.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(ai, bi)| (ai - bi).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// k nearest neighbors of `data[idx]` within `data`, excluding itself
    fn find_neighbors(idx: usize, data: &[Vec<f64>], k: usize) -> Vec<usize> {
        let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
        for (i, d) in data.iter().enumerate() {
            if i == idx {
                continue;
            }
            let candidate = DistIdx(Self::distance(&data[idx], d), i);
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(top) = heap.peek() {
                if candidate < *top {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }
        let mut neighbors: Vec<usize> = heap.into_iter().map(|DistIdx(_, i)| i).collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// Generate synthetic sample between two points
    fn generate_sample(point: &[f64], neighbor: &[f64], rng: &mut StdRng) -> Vec<f64> {
        let gap: f64 = rng.gen();
        point
            .iter()
            .zip(neighbor.iter())
            .map(|(&p, &n)| p + gap * (n - p))
            .collect()
    }

    /// Original rows followed by synthetic minority rows; also returns how
    /// many rows were synthesized
    pub fn fit_resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array2<f64>, Array1<f64>, usize)> {
        if x.nrows() != y.len() {
            return Err(FairfitError::MisalignedIndices {
                expected: x.nrows(),
                actual: y.len(),
            });
        }

        let mut class_indices: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            class_indices.entry(label.round() as i64).or_default().push(i);
        }
        if class_indices.len() < 2 {
            return Err(FairfitError::ValidationError(
                "Need at least 2 classes for SMOTE".to_string(),
            ));
        }

        let max_count = class_indices.values().map(Vec::len).max().unwrap_or(0);
        let target = (max_count as f64 * self.sampling_strategy) as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut data: Vec<f64> = x.iter().copied().collect();
        let mut labels: Vec<f64> = y.to_vec();
        let mut n_synthetic = 0;

        for (&class, indices) in &class_indices {
            let n_to_generate = target.saturating_sub(indices.len());
            if n_to_generate == 0 {
                continue;
            }

            let class_samples: Vec<Vec<f64>> = indices.iter().map(|&i| x.row(i).to_vec()).collect();
            let k = self.k_neighbors.min(class_samples.len() - 1);

            for _ in 0..n_to_generate {
                let idx = rng.gen_range(0..class_samples.len());
                let sample = &class_samples[idx];
                let neighbors = Self::find_neighbors(idx, &class_samples, k);

                // A lone sample can only be duplicated
                let synthetic = match neighbors.choose(&mut rng) {
                    Some(&n) => Self::generate_sample(sample, &class_samples[n], &mut rng),
                    None => sample.clone(),
                };
                data.extend(synthetic);
                labels.push(class as f64);
            }
            n_synthetic += n_to_generate;
            debug!(class, generated = n_to_generate, "SMOTE synthesized rows");
        }

        let n_rows = labels.len();
        let x_resampled = Array2::from_shape_vec((n_rows, x.ncols()), data)?;
        Ok((x_resampled, Array1::from_vec(labels), n_synthetic))
    }
}

/// Weight of one (group, label) cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellWeight {
    pub group: String,
    pub label: f64,
    pub count: usize,
    pub weight: f64,
}

/// Per-row reweighing weights.
///
/// Every row of the (group, label) cell gets `N / (n_groups * |cell|)`.
pub fn reweighing_weights(y: &Array1<f64>, groups: &[String]) -> Result<(Array1<f64>, Vec<CellWeight>)> {
    if groups.len() != y.len() {
        return Err(FairfitError::MisalignedIndices {
            expected: y.len(),
            actual: groups.len(),
        });
    }

    let mut cells: BTreeMap<(&str, i64), Vec<usize>> = BTreeMap::new();
    for (i, (g, &label)) in groups.iter().zip(y.iter()).enumerate() {
        cells.entry((g.as_str(), label.round() as i64)).or_default().push(i);
    }
    let n_groups = cells
        .keys()
        .map(|(g, _)| *g)
        .collect::<std::collections::BTreeSet<_>>()
        .len();

    let n = y.len() as f64;
    let mut weights: Array1<f64> = Array1::ones(y.len());
    let mut summary = Vec::with_capacity(cells.len());
    for ((group, label), rows) in cells {
        let weight = n / (n_groups as f64 * rows.len() as f64);
        for &i in &rows {
            weights[i] = weight;
        }
        summary.push(CellWeight {
            group: group.to_string(),
            label: label as f64,
            count: rows.len(),
            weight,
        });
    }
    Ok((weights, summary))
}

/// Draw `n` row positions with replacement, proportional to `weights`
pub fn weighted_resample(weights: &Array1<f64>, n: usize, seed: u64) -> Result<Vec<usize>> {
    let dist = WeightedIndex::new(weights.iter())
        .map_err(|e| FairfitError::InvalidInput(format!("Invalid sample weights: {}", e)))?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Ok((0..n).map(|_| dist.sample(&mut rng)).collect())
}

/// Remove group-level shifts from every feature column:
/// `x - mean(x | group) + mean(x)`.
///
/// Returns the repaired matrix and the per-group column means.
pub fn disparate_impact_repair(
    x: &Array2<f64>,
    groups: &[String],
) -> Result<(Array2<f64>, BTreeMap<String, Vec<f64>>)> {
    if groups.len() != x.nrows() {
        return Err(FairfitError::MisalignedIndices {
            expected: x.nrows(),
            actual: groups.len(),
        });
    }
    let overall = match x.mean_axis(Axis(0)) {
        Some(m) => m,
        None => return Ok((x.clone(), BTreeMap::new())),
    };

    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, g) in groups.iter().enumerate() {
        members.entry(g.as_str()).or_default().push(i);
    }

    let mut repaired = x.clone();
    let mut group_means = BTreeMap::new();
    for (group, rows) in members {
        let means = x.select(Axis(0), &rows).mean_axis(Axis(0)).unwrap_or_else(|| overall.clone());
        let shift = &overall - &means;
        for &i in &rows {
            let mut row = repaired.row_mut(i);
            row += &shift;
        }
        group_means.insert(group.to_string(), means.to_vec());
    }
    Ok((repaired, group_means))
}

/// Balance classes with SMOTE, then train
#[derive(Debug, Clone, Default)]
pub struct Oversampling {
    pub smote: Smote,
}

impl Technique for Oversampling {
    fn id(&self) -> TechniqueId {
        TechniqueId::Oversampling
    }

    fn apply(&self, base_model: ModelKind, ctx: &TechniqueContext) -> Result<TrainedPredictor> {
        let smote = self.smote.clone().with_seed(ctx.random_state);
        let (x, y, n_synthetic) = smote.fit_resample(ctx.x(), ctx.y())?;

        let params = base_model.default_params();
        let model = fit_model(&params, &x, &y, ctx.random_state)?;
        let details = serde_json::json!({
            "n_original": ctx.x().nrows(),
            "n_synthetic": n_synthetic,
        });
        persist(ctx, self.id(), params, TrainedPredictor::Standard(model), details)
    }
}

/// Train on a weighted resample that evens out (group, label) cells
#[derive(Debug, Clone, Copy, Default)]
pub struct Reweighing;

impl Technique for Reweighing {
    fn id(&self) -> TechniqueId {
        TechniqueId::Reweighing
    }

    fn apply(&self, base_model: ModelKind, ctx: &TechniqueContext) -> Result<TrainedPredictor> {
        let groups = ctx.group_keys()?;
        let (weights, cells) = reweighing_weights(ctx.y(), &groups)?;
        let rows = weighted_resample(&weights, ctx.y().len(), ctx.random_state)?;

        let params = base_model.default_params();
        let x = ctx.x().select(Axis(0), &rows);
        let y = ctx.y().select(Axis(0), &rows);
        let model = fit_model(&params, &x, &y, ctx.random_state)?;
        let details = serde_json::json!({ "cells": cells });
        persist(ctx, self.id(), params, TrainedPredictor::Standard(model), details)
    }
}

/// Train on features with group-level shifts removed
#[derive(Debug, Clone, Copy, Default)]
pub struct DisparateImpactRemoval;

impl Technique for DisparateImpactRemoval {
    fn id(&self) -> TechniqueId {
        TechniqueId::DisparateImpactRemoval
    }

    fn apply(&self, base_model: ModelKind, ctx: &TechniqueContext) -> Result<TrainedPredictor> {
        let groups = ctx.group_keys()?;
        let (repaired, group_means) = disparate_impact_repair(ctx.x(), &groups)?;

        let params = base_model.default_params();
        let model = fit_model(&params, &repaired, ctx.y(), ctx.random_state)?;
        let details = serde_json::json!({
            "features": ctx.features.names,
            "group_means": group_means,
        });
        persist(ctx, self.id(), params, TrainedPredictor::Standard(model), details)
    }
}
