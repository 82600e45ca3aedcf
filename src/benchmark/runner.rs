//! Benchmark execution
//!
//! Every (pipeline, fold) pair is an independent unit of work. Units run on a bounded
//! worker pool; each derives its random seed from the run seed and its own identity,
//! so results do not depend on scheduling or on the number of workers.

use super::result::{BenchmarkResult, CellFailure, CellKey, CellOutcome, FailureStage, Prediction};
use crate::error::{EvalError, Result};
use crate::learners::{Learner, Predict};
use crate::resampling::{Fold, Resampling};
use crate::task::Task;
use crate::utils::{derive_seed, CancellationToken, ParallelConfig};
use std::collections::{BTreeMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs every pipeline on every fold of a task
#[derive(Debug, Clone)]
pub struct BenchmarkRunner {
    seed: u64,
    parallel: ParallelConfig,
    cancel: Option<CancellationToken>,
}

impl Default for BenchmarkRunner {
    fn default() -> Self {
        Self::new(42)
    }
}

impl BenchmarkRunner {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            parallel: ParallelConfig::default(),
            cancel: None,
        }
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Units not yet started when the token fires are recorded as cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Instantiate `resampling` once and evaluate every pipeline on the same folds
    pub fn run<L: Learner>(
        &self,
        task: &Task,
        pipelines: &[L],
        resampling: &Resampling,
    ) -> Result<BenchmarkResult> {
        let folds = resampling.instantiate(task, self.seed)?;
        info!(
            task = task.id(),
            resampling = %resampling,
            pipelines = pipelines.len(),
            "Starting benchmark"
        );
        self.run_on_folds(task, pipelines, &folds)
    }

    /// Evaluate every pipeline on pre-instantiated folds
    pub fn run_on_folds<L: Learner>(
        &self,
        task: &Task,
        pipelines: &[L],
        folds: &[Fold],
    ) -> Result<BenchmarkResult> {
        let start = Instant::now();

        let mut seen = HashSet::new();
        for pipeline in pipelines {
            let id = pipeline.id();
            if !seen.insert(id.clone()) {
                return Err(EvalError::ConfigError(format!(
                    "pipeline id '{}' is used more than once",
                    id
                )));
            }
        }

        let mut accepted = Vec::with_capacity(pipelines.len());
        let mut rejected = BTreeMap::new();
        for pipeline in pipelines {
            match pipeline.check_compatible(task) {
                Ok(()) => accepted.push(pipeline),
                Err(EvalError::IncompatiblePipeline { pipeline: id, reason }) => {
                    warn!(pipeline = %id, %reason, "Pipeline rejected before execution");
                    rejected.insert(id, reason);
                }
                Err(e) => return Err(e),
            }
        }

        let units: Vec<(&L, &Fold)> = accepted
            .iter()
            .flat_map(|&pipeline| folds.iter().map(move |fold| (pipeline, fold)))
            .collect();

        let outcomes = self.parallel.map_units(units, |(pipeline, fold)| {
            let id = pipeline.id();
            let outcome = self.evaluate_cell(task, pipeline, fold, derive_seed(self.seed, &id, fold.id));
            (CellKey::new(id, fold.id), outcome)
        })?;

        let cells: BTreeMap<CellKey, CellOutcome> = outcomes.into_iter().collect();
        let result = BenchmarkResult {
            task_id: task.id().to_string(),
            pipeline_ids: accepted.iter().map(|p| p.id()).collect(),
            folds: folds.to_vec(),
            cells,
            rejected,
            seed: self.seed,
            elapsed_secs: start.elapsed().as_secs_f64(),
        };

        info!(
            task = task.id(),
            cells = result.n_cells(),
            completed = result.n_completed(),
            failed = result.failures().len(),
            elapsed_secs = result.elapsed_secs(),
            "Benchmark finished"
        );

        Ok(result)
    }

    fn evaluate_cell<L: Learner>(&self, task: &Task, pipeline: &L, fold: &Fold, seed: u64) -> CellOutcome {
        if self.cancel.as_ref().map_or(false, CancellationToken::is_cancelled) {
            return CellOutcome::Cancelled;
        }

        let id = pipeline.id();
        let failed = |stage: FailureStage, message: String| {
            warn!(pipeline = %id, fold = fold.id, %stage, %message, "Cell failed");
            CellOutcome::Failed(CellFailure { stage, message })
        };

        let (train_x, train_y) = match task.select_rows(&fold.train) {
            Ok(data) => data,
            Err(e) => return failed(FailureStage::Fit, e.to_string()),
        };
        let (test_x, test_y) = match task.select_rows(&fold.test) {
            Ok(data) => data,
            Err(e) => return failed(FailureStage::Predict, e.to_string()),
        };

        let fit_start = Instant::now();
        let model = match catch_panic(|| pipeline.fit(&train_x, &train_y, seed)) {
            Ok(model) => model,
            Err(message) => return failed(FailureStage::Fit, message),
        };
        let fit_secs = fit_start.elapsed().as_secs_f64();

        let predict_start = Instant::now();
        let scores = match catch_panic(|| model.predict_proba(&test_x)) {
            Ok(scores) => scores,
            Err(message) => return failed(FailureStage::Predict, message),
        };
        let predict_secs = predict_start.elapsed().as_secs_f64();

        if scores.len() != fold.test.len() {
            return failed(
                FailureStage::Predict,
                format!(
                    "model returned {} scores for {} test rows",
                    scores.len(),
                    fold.test.len()
                ),
            );
        }
        if let Some(bad) = scores.iter().find(|s| !(0.0..=1.0).contains(*s)) {
            return failed(
                FailureStage::Predict,
                format!("score {} is not a probability", bad),
            );
        }

        debug!(pipeline = %id, fold = fold.id, fit_secs, predict_secs, "Cell completed");

        let mut prediction = Prediction::new(fold.test.clone(), scores, test_y);
        prediction.fit_secs = fit_secs;
        prediction.predict_secs = predict_secs;
        CellOutcome::Completed(prediction)
    }
}

/// Run `f`, turning both errors and panics into a message
fn catch_panic<T>(f: impl FnOnce() -> Result<T>) -> std::result::Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("learner panicked: {}", detail))
        }
    }
}
