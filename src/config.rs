//! Run configuration
//!
//! [`EvaluationConfig`] gathers every recognized option of a benchmark or tuning run.
//! It can be loaded from and saved to JSON; command-line flags override loaded values.

use crate::benchmark::BenchmarkRunner;
use crate::error::{EvalError, Result};
use crate::learners::LearnerKind;
use crate::metrics::Metric;
use crate::optimizer::{OptimizeDirection, SearchSpace, TunerConfig};
use crate::resampling::Resampling;
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Options for benchmark and tuning runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Number of cross-validation folds
    pub folds: usize,
    /// Keep the class ratio in every fold
    pub stratify: bool,
    /// Use a single train/test split with this training fraction instead of k-fold
    pub holdout_ratio: Option<f64>,
    /// Tuner trial budget
    pub trial_budget: usize,
    /// Base seed for folds, learners and tuning
    pub seed: u64,
    /// Metric the tuner optimizes
    pub target_metric: Metric,
    /// Overrides the target metric's natural direction
    pub direction: Option<OptimizeDirection>,
    /// Worker threads (None = all available)
    pub n_jobs: Option<usize>,
    /// Search spaces keyed by learner name; missing learners use the default space
    pub search_spaces: BTreeMap<String, SearchSpace>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            stratify: false,
            holdout_ratio: None,
            trial_budget: 20,
            seed: 42,
            target_metric: Metric::Auc,
            direction: None,
            n_jobs: None,
            search_spaces: BTreeMap::new(),
        }
    }
}

impl EvaluationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    pub fn with_holdout(mut self, ratio: f64) -> Self {
        self.holdout_ratio = Some(ratio);
        self
    }

    pub fn with_trial_budget(mut self, budget: usize) -> Self {
        self.trial_budget = budget;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_target_metric(mut self, metric: Metric) -> Self {
        self.target_metric = metric;
        self
    }

    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_search_space(mut self, learner: impl Into<String>, space: SearchSpace) -> Self {
        self.search_spaces.insert(learner.into(), space);
        self
    }

    /// Reject values that would fail only after work has started
    pub fn validate(&self) -> Result<()> {
        if self.folds < 2 {
            return Err(EvalError::ConfigError(format!(
                "fold count must be at least 2, got {}",
                self.folds
            )));
        }
        if self.trial_budget == 0 {
            return Err(EvalError::ConfigError("trial budget must be at least 1".to_string()));
        }
        if let Some(ratio) = self.holdout_ratio {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(EvalError::ConfigError(format!(
                    "holdout ratio must be in (0, 1), got {}",
                    ratio
                )));
            }
        }
        if self.n_jobs == Some(0) {
            return Err(EvalError::ConfigError("n_jobs must be at least 1".to_string()));
        }
        for (name, space) in &self.search_spaces {
            space.validate_for(&LearnerKind::from_name(name)?)?;
        }
        Ok(())
    }

    pub fn resampling(&self) -> Resampling {
        match (self.holdout_ratio, self.stratify) {
            (Some(ratio), _) => Resampling::Holdout { ratio },
            (None, true) => Resampling::StratifiedKFold { folds: self.folds },
            (None, false) => Resampling::KFold { folds: self.folds },
        }
    }

    pub fn parallel(&self) -> ParallelConfig {
        ParallelConfig { n_jobs: self.n_jobs }
    }

    pub fn runner(&self) -> BenchmarkRunner {
        BenchmarkRunner::new(self.seed).with_parallel(self.parallel())
    }

    pub fn tuner_config(&self) -> TunerConfig {
        TunerConfig {
            n_trials: self.trial_budget,
            random_state: self.seed,
            n_jobs: self.n_jobs,
            direction: self.direction,
        }
    }

    /// Configured space for `learner`, or its default bounds
    pub fn search_space(&self, learner: &LearnerKind) -> SearchSpace {
        self.search_spaces
            .get(learner.name())
            .cloned()
            .unwrap_or_else(|| SearchSpace::default_for(learner))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EvaluationConfig::default();
        assert_eq!(config.folds, 5);
        assert_eq!(config.trial_budget, 20);
        assert_eq!(config.resampling(), Resampling::KFold { folds: 5 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(EvaluationConfig::new().with_folds(1).validate().is_err());
        assert!(EvaluationConfig::new().with_trial_budget(0).validate().is_err());
        assert!(EvaluationConfig::new().with_holdout(1.0).validate().is_err());

        let bad_space = EvaluationConfig::new()
            .with_search_space("decision_tree", SearchSpace::new().float("alpha", 0.0, 1.0));
        assert!(matches!(
            bad_space.validate(),
            Err(EvalError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_resampling_selection() {
        let config = EvaluationConfig::new().with_folds(3).with_stratify(true);
        assert_eq!(config.resampling(), Resampling::StratifiedKFold { folds: 3 });
        assert_eq!(
            config.with_holdout(0.8).resampling(),
            Resampling::Holdout { ratio: 0.8 }
        );
    }

    #[test]
    fn test_json_roundtrip_and_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = EvaluationConfig::new()
            .with_seed(7)
            .with_target_metric(Metric::Mcc)
            .with_search_space("lda", SearchSpace::new().float("shrinkage", 0.0, 0.5));
        config.save_json(&path).unwrap();
        assert_eq!(EvaluationConfig::from_json_file(&path).unwrap(), config);

        std::fs::write(&path, r#"{"folds": 10, "target_metric": "recall"}"#).unwrap();
        let partial = EvaluationConfig::from_json_file(&path).unwrap();
        assert_eq!(partial.folds, 10);
        assert_eq!(partial.target_metric, Metric::Recall);
        assert_eq!(partial.trial_budget, 20);
    }
}
