//! Append-only record of tuning trials

use super::config::OptimizeDirection;
use super::search_space::TrialParams;
use serde::{Deserialize, Serialize};

/// Result of a single trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number, also the sampling order
    pub trial_id: usize,
    /// Parameters bound into the learner
    pub params: TrialParams,
    /// Target metric averaged over folds; `None` when no fold produced a value
    pub value: Option<f64>,
    /// Folds whose fit or predict failed
    pub n_failed_cells: usize,
    /// Why the whole trial produced nothing, if it did
    pub error: Option<String>,
    /// Trial duration in seconds
    pub duration_secs: f64,
}

impl TrialResult {
    /// A trial that ran and produced a value
    pub fn completed(trial_id: usize, params: TrialParams, value: f64) -> Self {
        Self {
            trial_id,
            params,
            value: Some(value),
            n_failed_cells: 0,
            error: None,
            duration_secs: 0.0,
        }
    }

    pub fn failed(trial_id: usize, params: TrialParams, error: impl Into<String>) -> Self {
        Self {
            trial_id,
            params,
            value: None,
            n_failed_cells: 0,
            error: Some(error.into()),
            duration_secs: 0.0,
        }
    }

    /// Finite value usable for selection
    fn score(&self) -> Option<f64> {
        self.value.filter(|v| v.is_finite())
    }
}

/// Every trial attempted during a tuning run, in trial order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TuningArchive {
    trials: Vec<TrialResult>,
}

impl TuningArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_trial(&mut self, trial: TrialResult) {
        self.trials.push(trial);
    }

    pub fn trials(&self) -> &[TrialResult] {
        &self.trials
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Index of the best-scoring trial; ties go to the earliest
    pub fn best_index(&self, direction: OptimizeDirection) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, trial) in self.trials.iter().enumerate() {
            let Some(value) = trial.score() else {
                continue;
            };
            match best {
                Some((_, incumbent)) if !direction.is_better(value, incumbent) => {}
                _ => best = Some((idx, value)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    pub fn best(&self, direction: OptimizeDirection) -> Option<&TrialResult> {
        self.best_index(direction).map(|idx| &self.trials[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive_with(values: &[f64]) -> TuningArchive {
        let mut archive = TuningArchive::new();
        for (i, &v) in values.iter().enumerate() {
            archive.add_trial(TrialResult::completed(i, TrialParams::new(), v));
        }
        archive
    }

    #[test]
    fn test_best_higher_is_better() {
        let archive = archive_with(&[0.70, 0.85, 0.62]);
        let best = archive.best(OptimizeDirection::Maximize).unwrap();
        assert_eq!(best.trial_id, 1);
        assert_eq!(best.value, Some(0.85));
    }

    #[test]
    fn test_best_lower_is_better() {
        let archive = archive_with(&[0.30, 0.15, 0.38]);
        assert_eq!(archive.best_index(OptimizeDirection::Minimize), Some(1));
    }

    #[test]
    fn test_ties_go_to_earliest_trial() {
        let archive = archive_with(&[0.5, 0.9, 0.9, 0.1]);
        assert_eq!(archive.best_index(OptimizeDirection::Maximize), Some(1));
    }

    #[test]
    fn test_failed_trials_never_win() {
        let mut archive = archive_with(&[0.6]);
        archive.add_trial(TrialResult::failed(1, TrialParams::new(), "fit failed"));
        archive.add_trial(TrialResult::completed(2, TrialParams::new(), f64::NAN));
        assert_eq!(archive.best_index(OptimizeDirection::Maximize), Some(0));
        assert_eq!(archive.len(), 3);

        let empty = TuningArchive::new();
        assert!(empty.best(OptimizeDirection::Minimize).is_none());
    }
}
