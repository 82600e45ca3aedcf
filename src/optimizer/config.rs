//! Tuning configuration

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeDirection {
    Minimize,
    Maximize,
}

impl OptimizeDirection {
    /// Whether `candidate` strictly improves on `incumbent`
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            OptimizeDirection::Minimize => candidate < incumbent,
            OptimizeDirection::Maximize => candidate > incumbent,
        }
    }
}

/// Configuration for random-search tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Number of configurations to sample and evaluate
    pub n_trials: usize,
    /// Base seed for sampling and for every trial's resampling units
    pub random_state: u64,
    /// Worker threads across trials (None = all available)
    pub n_jobs: Option<usize>,
    /// Overrides the target metric's natural direction
    pub direction: Option<OptimizeDirection>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            n_trials: 20,
            random_state: 42,
            n_jobs: None,
            direction: None,
        }
    }
}

impl TunerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_n_jobs(mut self, n_jobs: usize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_direction(mut self, direction: OptimizeDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trials == 0 {
            return Err(EvalError::ConfigError("trial budget must be at least 1".to_string()));
        }
        if self.n_jobs == Some(0) {
            return Err(EvalError::ConfigError("n_jobs must be at least 1".to_string()));
        }
        Ok(())
    }
}
