//! Label massaging
//!
//! A ranker trained on the original labels scores every row. Within each
//! protected group the highest-scored negatives are promoted, or the
//! lowest-scored positives demoted, until the group's positive rate matches
//! the overall rate. The base model is then trained on the massaged labels.

use super::{fit_model, persist, Technique, TechniqueContext, TechniqueId, TrainedPredictor};
use crate::error::{FairfitError, Result};
use crate::training::ModelKind;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

/// Label changes made in one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupChanges {
    pub size: usize,
    pub positives_before: usize,
    pub promoted: usize,
    pub demoted: usize,
}

/// Relabel so every group reaches the overall positive rate.
///
/// `scores` rank rows within a group; equal scores keep row order.
pub fn massage_labels(
    labels: &Array1<f64>,
    scores: &Array1<f64>,
    groups: &[String],
) -> Result<(Array1<f64>, BTreeMap<String, GroupChanges>)> {
    if scores.len() != labels.len() || groups.len() != labels.len() {
        return Err(FairfitError::MisalignedIndices {
            expected: labels.len(),
            actual: scores.len().min(groups.len()),
        });
    }
    if labels.is_empty() {
        return Ok((labels.clone(), BTreeMap::new()));
    }

    let overall_rate = labels.sum() / labels.len() as f64;
    let mut members: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, g) in groups.iter().enumerate() {
        members.entry(g.as_str()).or_default().push(i);
    }

    let mut massaged = labels.clone();
    let mut changes = BTreeMap::new();
    for (group, rows) in members {
        let positives: Vec<usize> = rows.iter().copied().filter(|&i| labels[i] == 1.0).collect();
        let target = (overall_rate * rows.len() as f64).round() as usize;
        let mut entry = GroupChanges {
            size: rows.len(),
            positives_before: positives.len(),
            ..GroupChanges::default()
        };

        if positives.len() < target {
            let mut negatives: Vec<usize> = rows.iter().copied().filter(|&i| labels[i] != 1.0).collect();
            // Highest score first
            negatives.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
            entry.promoted = target - positives.len();
            for &i in negatives.iter().take(entry.promoted) {
                massaged[i] = 1.0;
            }
        } else if positives.len() > target {
            let mut positives = positives;
            positives.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));
            entry.demoted = positives.len() - target;
            for &i in positives.iter().take(entry.demoted) {
                massaged[i] = 0.0;
            }
        }

        debug!(group, promoted = entry.promoted, demoted = entry.demoted, "Massaged group labels");
        changes.insert(group.to_string(), entry);
    }

    Ok((massaged, changes))
}

/// Outcomes transformation by label massaging
#[derive(Debug, Clone, Copy, Default)]
pub struct OutcomesTransformation;

impl Technique for OutcomesTransformation {
    fn id(&self) -> TechniqueId {
        TechniqueId::OutcomesTransformation
    }

    fn apply(&self, base_model: ModelKind, ctx: &TechniqueContext) -> Result<TrainedPredictor> {
        let params = base_model.default_params();
        let ranker = fit_model(&params, ctx.x(), ctx.y(), ctx.random_state)?;
        let scores = ranker.predict_proba(ctx.x())?;

        let groups = ctx.group_keys()?;
        let (massaged, changes) = massage_labels(ctx.y(), &scores, &groups)?;

        let model = fit_model(&params, ctx.x(), &massaged, ctx.random_state)?;
        let details = serde_json::json!({ "groups": changes });
        persist(ctx, self.id(), params, TrainedPredictor::Standard(model), details)
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
    fn test_massaging_equalises_rates() {
        // Overall rate 0.5: group a has 3/4 positive, group b 1/4
        let labels = array![1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let scores = array![0.9, 0.6, 0.2, 0.8, 0.7, 0.1, 0.9, 0.3];
        let groups = keys(&["a", "a", "a", "a", "b", "b", "b", "b"]);

        let (massaged, changes) = massage_labels(&labels, &scores, &groups).unwrap();
        // Lowest-scored positive of a is row 2; best negative of b is row 4
        assert_eq!(massaged, array![1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
        assert_eq!(changes["a"].demoted, 1);
        assert_eq!(changes["b"].promoted, 1);
        assert_eq!(massaged.sum(), labels.sum());
    }

    #[test]
    fn test_balanced_groups_untouched() {
        let labels = array![1.0, 0.0, 1.0, 0.0];
        let scores = array![0.4, 0.6, 0.3, 0.7];
        let groups = keys(&["a", "a", "b", "b"]);
        let (massaged, changes) = massage_labels(&labels, &scores, &groups).unwrap();
        assert_eq!(massaged, labels);
        assert!(changes.values().all(|c| c.promoted == 0 && c.demoted == 0));
    }

    #[test]
    fn test_misaligned_scores() {
        let result = massage_labels(&array![1.0, 0.0], &array![0.5], &keys(&["a", "b"]));
        assert!(matches!(result, Err(FairfitError::MisalignedIndices { .. })));
    }

    #[test]
    fn test_apply_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::context(dir.path());
        let predictor = OutcomesTransformation.apply(ModelKind::LogisticRegression, &ctx).unwrap();
        assert_eq!(predictor.predict(ctx.x(), None).unwrap().len(), 40);
        assert!(dir.path().join("outcomes_transformation.json").exists());
    }
}
