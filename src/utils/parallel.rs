//! Worker pool and cancellation utilities

use crate::error::{EvalError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Configuration for the worker pool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Number of worker threads (None = use all available)
    pub n_jobs: Option<usize>,
}

impl ParallelConfig {
    /// Create a new parallel configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every unit on the calling thread
    pub fn sequential() -> Self {
        Self { n_jobs: Some(1) }
    }

    /// Set number of threads
    pub fn with_jobs(mut self, n: usize) -> Self {
        self.n_jobs = Some(n);
        self
    }

    /// Get the number of threads to use
    pub fn num_threads(&self) -> usize {
        self.n_jobs.unwrap_or_else(rayon::current_num_threads).max(1)
    }

    /// Map every unit on a bounded pool; output order matches input order
    pub fn map_units<T, U, F>(&self, units: Vec<T>, f: F) -> Result<Vec<U>>
    where
        T: Send,
        U: Send,
        F: Fn(T) -> U + Send + Sync,
    {
        if self.num_threads() == 1 {
            return Ok(units.into_iter().map(f).collect());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.num_threads())
            .build()
            .map_err(|e| EvalError::ConfigError(format!("failed to build worker pool: {}", e)))?;

        Ok(pool.install(|| units.into_par_iter().map(f).collect()))
    }
}

/// Shared flag used to abandon units that have not started yet
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_units_preserves_order() {
        let config = ParallelConfig::new().with_jobs(4);
        let results = config.map_units((0..1000).collect(), |x: i32| x * 2).unwrap();

        assert_eq!(results.len(), 1000);
        assert_eq!(results[0], 0);
        assert_eq!(results[500], 1000);
    }

    #[test]
    fn test_sequential_config() {
        let config = ParallelConfig::sequential();
        assert_eq!(config.num_threads(), 1);
    }

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
