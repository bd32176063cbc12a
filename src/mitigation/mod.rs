//! Bias mitigation techniques
//!
//! Each technique turns a base model kind plus training data into a trained
//! predictor:
//! - Hyperparameter tuning (grid search with cross-validation)
//! - Outcomes transformation (label massaging)
//! - Outcomes optimization (per-group decision thresholds)
//! - Oversampling (SMOTE)
//! - Reweighing
//! - Disparate impact removal
//!
//! Techniques that need the protected attribute at prediction time return
//! [`TrainedPredictor::SensitiveFeatureAware`]; everything else returns a
//! plain classifier.

mod massaging;
mod preprocessing;
mod threshold;
mod tuning;

pub use massaging::{massage_labels, GroupChanges, OutcomesTransformation};
pub use preprocessing::{
    disparate_impact_repair, reweighing_weights, weighted_resample, CellWeight, DisparateImpactRemoval,
    Oversampling, Reweighing, Smote,
};
pub use threshold::{OutcomesOptimization, ThresholdOptimizer};
pub use tuning::{HyperparameterTuning, TuningTrial};

use crate::config::TuningConfig;
use crate::data::{one_hot_encode, Dataset, FeatureMatrix, Labels};
use crate::error::{FairfitError, Result};
use crate::training::{Classifier, ModelKind, ModelParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Identifier of a built-in technique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechniqueId {
    HyperparameterTuning,
    OutcomesTransformation,
    OutcomesOptimization,
    Oversampling,
    Reweighing,
    DisparateImpactRemoval,
}

impl TechniqueId {
    pub const ALL: [TechniqueId; 6] = [
        TechniqueId::HyperparameterTuning,
        TechniqueId::OutcomesTransformation,
        TechniqueId::OutcomesOptimization,
        TechniqueId::Oversampling,
        TechniqueId::Reweighing,
        TechniqueId::DisparateImpactRemoval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TechniqueId::HyperparameterTuning => "hyperparameter_tuning",
            TechniqueId::OutcomesTransformation => "outcomes_transformation",
            TechniqueId::OutcomesOptimization => "outcomes_optimization",
            TechniqueId::Oversampling => "oversampling",
            TechniqueId::Reweighing => "reweighing",
            TechniqueId::DisparateImpactRemoval => "disparate_impact_removal",
        }
    }
}

impl fmt::Display for TechniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TechniqueId {
    type Err = FairfitError;

    fn from_str(s: &str) -> Result<Self> {
        TechniqueId::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| FairfitError::InvalidInput(format!("Unknown technique: {}", s)))
    }
}

/// One entry of a requested technique list.
///
/// Unrecognized names are kept so the search can skip them in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechniqueEntry {
    Known(TechniqueId),
    Unknown(String),
}

impl TechniqueEntry {
    /// Parse a technique name; never fails
    pub fn parse(name: &str) -> Self {
        match name.parse::<TechniqueId>() {
            Ok(id) => TechniqueEntry::Known(id),
            Err(_) => TechniqueEntry::Unknown(name.to_string()),
        }
    }

    /// Parse a comma-separated list, ignoring empty items
    pub fn parse_list(list: &str) -> Vec<Self> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }

    pub fn name(&self) -> &str {
        match self {
            TechniqueEntry::Known(id) => id.as_str(),
            TechniqueEntry::Unknown(name) => name,
        }
    }
}

impl From<TechniqueId> for TechniqueEntry {
    fn from(id: TechniqueId) -> Self {
        TechniqueEntry::Known(id)
    }
}

/// Everything a technique needs to train and persist a model
#[derive(Debug, Clone)]
pub struct TechniqueContext {
    /// Encoded features; `features.rows` are rows of `features_with_protected`
    pub features: FeatureMatrix,
    /// Training labels aligned with `features`
    pub labels: Labels,
    pub protected_attribute: String,
    /// Directory for model artifacts
    pub output_dir: PathBuf,
    /// Source dataset holding the protected attribute and the label column
    pub features_with_protected: Dataset,
    pub random_state: u64,
}

impl TechniqueContext {
    pub fn new(
        features: FeatureMatrix,
        labels: Labels,
        protected_attribute: impl Into<String>,
        output_dir: impl Into<PathBuf>,
        features_with_protected: Dataset,
    ) -> Result<Self> {
        let protected_attribute = protected_attribute.into();
        if labels.len() != features.n_samples() {
            return Err(FairfitError::MisalignedIndices {
                expected: features.n_samples(),
                actual: labels.len(),
            });
        }
        features_with_protected.check_rows(&features.rows)?;
        features_with_protected.column(&protected_attribute)?;
        features_with_protected.column(&labels.name)?;

        Ok(Self {
            features,
            labels,
            protected_attribute,
            output_dir: output_dir.into(),
            features_with_protected,
            random_state: 42,
        })
    }

    /// Context over a prepared dataset: every column except the protected
    /// attribute and the target becomes a feature
    pub fn from_dataset(
        dataset: &Dataset,
        protected_attribute: &str,
        target_column: &str,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        dataset.column(protected_attribute)?;
        let features = one_hot_encode(dataset, &[protected_attribute, target_column])?;
        let values = dataset.binary_labels(target_column, &features.rows)?;
        Self::new(
            features,
            Labels::new(target_column, values),
            protected_attribute,
            output_dir,
            dataset.clone(),
        )
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Protected group key of every feature row
    pub fn group_keys(&self) -> Result<Vec<String>> {
        self.features_with_protected
            .group_keys(&self.protected_attribute, &self.features.rows)
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.features.values
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.labels.values
    }
}

/// A fitted model together with its prediction protocol
#[derive(Debug)]
pub enum TrainedPredictor {
    /// Predicts from features alone
    Standard(Box<dyn Classifier>),
    /// Needs the protected group of every row to predict
    SensitiveFeatureAware(ThresholdOptimizer),
}

impl TrainedPredictor {
    pub fn requires_sensitive_features(&self) -> bool {
        matches!(self, TrainedPredictor::SensitiveFeatureAware(_))
    }

    /// Hard 0/1 predictions; `groups` is required by sensitive-feature-aware models
    pub fn predict(&self, x: &Array2<f64>, groups: Option<&[String]>) -> Result<Array1<f64>> {
        match self {
            TrainedPredictor::Standard(model) => model.predict(x),
            TrainedPredictor::SensitiveFeatureAware(optimizer) => {
                let groups = groups.ok_or_else(|| {
                    FairfitError::InvalidInput(
                        "Threshold optimizer needs the protected attribute to predict".to_string(),
                    )
                })?;
                optimizer.predict(x, groups)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrainedPredictor::Standard(model) => model.name(),
            TrainedPredictor::SensitiveFeatureAware(_) => "threshold_optimizer",
        }
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        match self {
            TrainedPredictor::Standard(model) => model.to_json(),
            TrainedPredictor::SensitiveFeatureAware(optimizer) => optimizer.to_json(),
        }
    }
}

/// Persisted record of a technique's chosen model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub technique: TechniqueId,
    pub params: ModelParams,
    /// Technique-specific details (trial history, thresholds, weights)
    pub details: serde_json::Value,
    /// Fitted model state
    pub model: serde_json::Value,
}

impl ModelArtifact {
    pub fn new(technique: TechniqueId, params: ModelParams, predictor: &TrainedPredictor) -> Result<Self> {
        Ok(Self {
            technique,
            params,
            details: serde_json::Value::Null,
            model: predictor.to_json()?,
        })
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Write to `<output_dir>/<technique>.json`, creating the directory
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(format!("{}.json", self.technique));
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        debug!(technique = %self.technique, path = %path.display(), "Saved model artifact");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// A bias mitigation technique
pub trait Technique: Send + Sync {
    fn id(&self) -> TechniqueId;

    /// Train a predictor for `base_model` on the context's data
    fn apply(&self, base_model: ModelKind, ctx: &TechniqueContext) -> Result<TrainedPredictor>;
}

/// Fit a freshly built model
pub(crate) fn fit_model(
    params: &ModelParams,
    x: &Array2<f64>,
    y: &Array1<f64>,
    seed: u64,
) -> Result<Box<dyn Classifier>> {
    let mut model = params.build(seed);
    model.fit(x, y)?;
    Ok(model)
}

/// Save a standard predictor's artifact and hand the predictor back
pub(crate) fn persist(
    ctx: &TechniqueContext,
    technique: TechniqueId,
    params: ModelParams,
    predictor: TrainedPredictor,
    details: serde_json::Value,
) -> Result<TrainedPredictor> {
    ModelArtifact::new(technique, params, &predictor)?
        .with_details(details)
        .save(&ctx.output_dir)?;
    Ok(predictor)
}

/// Techniques available to the search, keyed by id
#[derive(Clone, Default)]
pub struct TechniqueRegistry {
    techniques: BTreeMap<TechniqueId, Arc<dyn Technique>>,
}

impl TechniqueRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in technique with default tuning settings
    pub fn builtin() -> Self {
        Self::builtin_with(TuningConfig::default())
    }

    pub fn builtin_with(tuning: TuningConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(HyperparameterTuning::new(tuning)));
        registry.register(Arc::new(OutcomesTransformation));
        registry.register(Arc::new(OutcomesOptimization::default()));
        registry.register(Arc::new(Oversampling::default()));
        registry.register(Arc::new(Reweighing));
        registry.register(Arc::new(DisparateImpactRemoval));
        registry
    }

    /// Add or replace a technique
    pub fn register(&mut self, technique: Arc<dyn Technique>) {
        self.techniques.insert(technique.id(), technique);
    }

    pub fn get(&self, id: TechniqueId) -> Option<Arc<dyn Technique>> {
        self.techniques.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<TechniqueId> {
        self.techniques.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }
}

impl fmt::Debug for TechniqueRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TechniqueRegistry")
            .field("techniques", &self.ids())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technique_id_names() {
        for id in TechniqueId::ALL {
            assert_eq!(id.as_str().parse::<TechniqueId>().unwrap(), id);
        }
        assert!("fair_smote".parse::<TechniqueId>().is_err());
    }

    #[test]
    fn test_entry_parse_keeps_unknown() {
        let entries = TechniqueEntry::parse_list("hyperparameter_tuning, bogus,,reweighing");
        assert_eq!(
            entries,
            vec![
                TechniqueEntry::Known(TechniqueId::HyperparameterTuning),
                TechniqueEntry::Unknown("bogus".to_string()),
                TechniqueEntry::Known(TechniqueId::Reweighing),
            ]
        );
        assert_eq!(entries[1].name(), "bogus");
    }

    #[test]
    fn test_context_alignment_checked() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::context(dir.path());
        let short = Labels::new("target", Array1::zeros(3));
        let result = TechniqueContext::new(
            ctx.features.clone(),
            short,
            "group",
            dir.path(),
            ctx.features_with_protected.clone(),
        );
        assert!(matches!(result, Err(FairfitError::MisalignedIndices { .. })));
    }

    #[test]
    fn test_context_group_keys() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::context(dir.path());
        let keys = ctx.group_keys().unwrap();
        assert_eq!(keys.len(), 40);
        assert_eq!(&keys[..2], &["a".to_string(), "b".to_string()]);
        assert_eq!(ctx.features.names, vec!["signal".to_string(), "noise".to_string()]);
    }

    #[test]
    fn test_builtin_registry_has_every_technique() {
        let registry = TechniqueRegistry::builtin();
        assert_eq!(registry.ids(), TechniqueId::ALL.to_vec());
        for id in TechniqueId::ALL {
            assert_eq!(registry.get(id).unwrap().id(), id);
        }
    }

    #[test]
    fn test_sensitive_predictor_requires_groups() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::context(dir.path());
        let predictor = OutcomesOptimization::default()
            .apply(ModelKind::LogisticRegression, &ctx)
            .unwrap();
        assert!(predictor.requires_sensitive_features());
        assert!(predictor.predict(ctx.x(), None).is_err());

        let keys = ctx.group_keys().unwrap();
        assert_eq!(predictor.predict(ctx.x(), Some(&keys)).unwrap().len(), 40);
    }

    #[test]
    fn test_artifact_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_support::context(dir.path());
        let params = ModelKind::LogisticRegression.default_params();
        let model = fit_model(&params, ctx.x(), ctx.y(), 0).unwrap();
        let predictor = TrainedPredictor::Standard(model);

        let artifact = ModelArtifact::new(TechniqueId::Reweighing, params, &predictor)
            .unwrap()
            .with_details(serde_json::json!({ "note": "x" }));
        let path = artifact.save(&dir.path().join("nested")).unwrap();
        assert!(path.ends_with("reweighing.json"));
        assert_eq!(ModelArtifact::load(&path).unwrap(), artifact);
    }
}
