//! Configuration for evaluation, tuning and the technique search

use crate::error::{FairfitError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for a single fitness evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Fraction of rows held out for scoring
    pub test_size: f64,

    /// Seed for the split and for randomized classifiers
    pub random_state: u64,

    /// Shuffle rows before splitting
    pub shuffle: bool,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            shuffle: true,
        }
    }
}

impl FitnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    /// Builder method to set the seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(FairfitError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        Ok(())
    }
}

/// What the driver does when a technique fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the search and return the error
    #[default]
    Abort,
    /// Record the failure and move on to the next technique
    Continue,
}

/// Settings for the technique search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Failure handling per technique
    pub failure_policy: FailurePolicy,

    /// Evaluate techniques on the rayon pool
    pub parallel: bool,

    /// Wall-clock limit for one technique (fit + scoring)
    pub technique_timeout_secs: Option<f64>,

    /// Seed handed to every technique
    pub random_state: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            parallel: false,
            technique_timeout_secs: None,
            random_state: 42,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Builder method to enable parallel evaluation
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Builder method to set a per-technique timeout
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.technique_timeout_secs = Some(secs);
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Per-technique timeout as a `Duration`, if one is set
    pub fn timeout(&self) -> Result<Option<Duration>> {
        let Some(secs) = self.technique_timeout_secs else {
            return Ok(None);
        };
        if !(secs.is_finite() && secs > 0.0) {
            return Err(FairfitError::ConfigError(format!(
                "technique_timeout_secs must be positive, got {}",
                secs
            )));
        }
        Duration::try_from_secs_f64(secs).map(Some).map_err(|_| {
            FairfitError::ConfigError(format!("technique_timeout_secs is too large, got {}", secs))
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.timeout().map(|_| ())
    }
}

/// Settings for the hyperparameter tuning technique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    /// Cross-validation folds per candidate
    pub cv_folds: usize,

    /// Preserve class balance across folds
    pub stratified: bool,

    pub random_state: u64,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            cv_folds: 3,
            stratified: true,
            random_state: 42,
        }
    }
}

impl TuningConfig {
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(FairfitError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FairfitConfig {
    pub fitness: FitnessConfig,
    pub search: SearchConfig,
    pub tuning: TuningConfig,
}

impl FairfitConfig {
    /// Load and validate a JSON configuration file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: FairfitConfig = serde_json::from_str(&content)
            .map_err(|e| FairfitError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.fitness.validate()?;
        self.search.validate()?;
        self.tuning.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FairfitConfig::default();
        assert_eq!(config.fitness.test_size, 0.2);
        assert_eq!(config.fitness.random_state, 42);
        assert_eq!(config.search.failure_policy, FailurePolicy::Abort);
        assert!(!config.search.parallel);
        assert_eq!(config.tuning.cv_folds, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let search = SearchConfig::new()
            .with_failure_policy(FailurePolicy::Continue)
            .with_parallel(true)
            .with_timeout(2.5);
        assert_eq!(search.technique_timeout_secs, Some(2.5));
        assert!(search.parallel);

        let fitness = FitnessConfig::new().with_test_size(0.3).with_random_state(7);
        assert_eq!(fitness.test_size, 0.3);
        assert_eq!(fitness.random_state, 7);
    }

    #[test]
    fn test_partial_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"search": {{"failure_policy": "continue"}}, "fitness": {{"test_size": 0.25}}}}"#).unwrap();

        let config = FairfitConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.search.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.fitness.test_size, 0.25);
        assert_eq!(config.fitness.random_state, 42);
        assert_eq!(config.tuning, TuningConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(FitnessConfig::new().with_test_size(1.0).validate().is_err());
        assert!(SearchConfig::new().with_timeout(0.0).validate().is_err());
        assert!(SearchConfig::new().with_timeout(f64::NAN).validate().is_err());
        assert!(TuningConfig::default().with_cv_folds(1).validate().is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = FairfitConfig::default();
        let parsed: FairfitConfig = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_oversized_timeout_rejected() {
        let config = SearchConfig::new().with_timeout(1e20);
        assert!(matches!(config.validate(), Err(FairfitError::ConfigError(_))));
        assert!(config.timeout().is_err());

        let ok = SearchConfig::new().with_timeout(1.5);
        assert_eq!(ok.timeout().unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(SearchConfig::new().timeout().unwrap(), None);
    }
}
