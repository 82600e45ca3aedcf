//! Random-search hyperparameter tuning
//!
//! Every trial samples one configuration from the search space, binds it into the
//! template pipeline's learner and evaluates it on the same folds with the benchmark
//! runner. Trials are independent units; each derives its sampling and evaluation
//! seeds from the tuner seed and its own index.

use super::archive::{TrialResult, TuningArchive};
use super::config::{OptimizeDirection, TunerConfig};
use super::search_space::{SearchSpace, TrialParams};
use crate::benchmark::BenchmarkRunner;
use crate::error::Result;
use crate::learners::Learner;
use crate::metrics::{Metric, MetricAggregator};
use crate::pipeline::PipelineSpec;
use crate::resampling::{Fold, Resampling};
use crate::task::Task;
use crate::utils::{derive_seed, CancellationToken, ParallelConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a tuning run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningResult {
    pub pipeline_id: String,
    pub target_metric: Metric,
    pub direction: OptimizeDirection,
    pub archive: TuningArchive,
    pub best_index: Option<usize>,
    pub elapsed_secs: f64,
}

impl TuningResult {
    /// Best trial, `None` when every trial failed
    pub fn best(&self) -> Option<&TrialResult> {
        self.best_index.map(|idx| &self.archive.trials()[idx])
    }

    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best().map(|t| &t.params)
    }

    pub fn best_value(&self) -> Option<f64> {
        self.best().and_then(|t| t.value)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Random-search tuner
#[derive(Debug, Clone, Default)]
pub struct Tuner {
    config: TunerConfig,
    cancel: Option<CancellationToken>,
}

impl Tuner {
    pub fn new(config: TunerConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Trials not yet started when the token fires are recorded as failed
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Sample and evaluate `n_trials` configurations of `template`'s learner
    pub fn tune(
        &self,
        task: &Task,
        template: &PipelineSpec,
        space: &SearchSpace,
        resampling: &Resampling,
        target: Metric,
    ) -> Result<TuningResult> {
        self.config.validate()?;
        space.validate_for(template.learner())?;
        template.check_compatible(task)?;

        let start = Instant::now();
        let seed = self.config.random_state;
        let folds = resampling.instantiate(task, seed)?;
        let direction = self.config.direction.unwrap_or_else(|| target.direction());

        info!(
            task = task.id(),
            pipeline = %template.id(),
            trials = self.config.n_trials,
            metric = %target,
            ?direction,
            "Starting tuning"
        );

        let parallel = ParallelConfig {
            n_jobs: self.config.n_jobs,
        };
        let trials = parallel.map_units((0..self.config.n_trials).collect(), |trial_id| {
            self.run_trial(task, template, space, &folds, target, trial_id)
        })?;

        let mut archive = TuningArchive::new();
        for trial in trials {
            archive.add_trial(trial);
        }
        let best_index = archive.best_index(direction);

        match best_index.map(|idx| &archive.trials()[idx]) {
            Some(best) => info!(
                trial = best.trial_id,
                value = best.value.unwrap_or(f64::NAN),
                "Tuning finished"
            ),
            None => warn!("Tuning finished without a usable trial"),
        }

        Ok(TuningResult {
            pipeline_id: template.id(),
            target_metric: target,
            direction,
            archive,
            best_index,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn run_trial(
        &self,
        task: &Task,
        template: &PipelineSpec,
        space: &SearchSpace,
        folds: &[Fold],
        target: Metric,
        trial_id: usize,
    ) -> TrialResult {
        let start = Instant::now();
        let seed = self.config.random_state;

        let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(seed, "trial", trial_id));
        let params = space.sample(&mut rng);

        if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return TrialResult::failed(trial_id, params, "cancelled");
        }

        let evaluated = template
            .learner()
            .with_params(&params)
            .map(|learner| template.with_learner(learner))
            .and_then(|spec| {
                let mut runner = BenchmarkRunner::new(derive_seed(seed, "trial-eval", trial_id))
                    .with_parallel(ParallelConfig::sequential());
                if let Some(token) = &self.cancel {
                    runner = runner.with_cancellation(token.clone());
                }
                let result = runner.run_on_folds(task, std::slice::from_ref(&spec), folds)?;
                let report = MetricAggregator::new(vec![target]).aggregate(&result);
                let scores = report.pipeline(&spec.id());
                Ok((
                    scores.and_then(|s| s.mean(target)),
                    scores.map(|s| s.failures.len()).unwrap_or(0),
                ))
            });

        let mut trial = match evaluated {
            Ok((value, n_failed_cells)) => TrialResult {
                trial_id,
                params,
                value,
                n_failed_cells,
                error: value.is_none().then(|| {
                    format!("no fold produced a value for {}", target)
                }),
                duration_secs: 0.0,
            },
            Err(e) => {
                warn!(trial = trial_id, error = %e, "Trial failed");
                TrialResult::failed(trial_id, params, e.to_string())
            }
        };
        trial.duration_secs = start.elapsed().as_secs_f64();

        debug!(trial = trial_id, value = ?trial.value, "Trial finished");
        trial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learners::LearnerKind;
    use polars::prelude::*;

    fn task() -> Task {
        let x: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let noise: Vec<f64> = (0..60).map(|i| ((i * 7) % 11) as f64).collect();
        let y: Vec<&str> = (0..60).map(|i| if i >= 30 { "pos" } else { "neg" }).collect();
        let df = df!("x" => x, "noise" => noise, "y" => y).unwrap();
        Task::new("separable", df, "y", "pos").unwrap()
    }

    #[test]
    fn test_trials_stay_in_bounds() {
        let template = PipelineSpec::standard(LearnerKind::from_name("decision_tree").unwrap());
        let space = SearchSpace::default_for(template.learner());
        let tuner = Tuner::new(TunerConfig::new().with_n_trials(6).with_n_jobs(2));

        let result = tuner
            .tune(&task(), &template, &space, &Resampling::KFold { folds: 3 }, Metric::Accuracy)
            .unwrap();

        assert_eq!(result.archive.len(), 6);
        for (i, trial) in result.archive.trials().iter().enumerate() {
            assert_eq!(trial.trial_id, i);
            for param in space.parameters() {
                assert!(param.contains(&trial.params[&param.name]));
            }
        }
        assert_eq!(result.direction, OptimizeDirection::Maximize);
        assert!(result.best().is_some());
    }

    #[test]
    fn test_unknown_parameter_rejected_before_work() {
        let template = PipelineSpec::new(LearnerKind::from_name("decision_tree").unwrap());
        let space = SearchSpace::new().float("momentum", 0.0, 1.0);
        let err = Tuner::default()
            .tune(&task(), &template, &space, &Resampling::default(), Metric::Auc)
            .unwrap_err();
        assert!(matches!(err, crate::error::EvalError::InvalidParameter { .. }));
    }

    #[test]
    fn test_direction_override() {
        let template = PipelineSpec::new(LearnerKind::Featureless);
        let tuner = Tuner::new(
            TunerConfig::new()
                .with_n_trials(2)
                .with_direction(OptimizeDirection::Minimize),
        );
        let result = tuner
            .tune(&task(), &template, &SearchSpace::new(), &Resampling::KFold { folds: 3 }, Metric::Accuracy)
            .unwrap();
        assert_eq!(result.direction, OptimizeDirection::Minimize);
        assert_eq!(result.best_index, Some(0));
    }
}
