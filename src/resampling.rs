//! Resampling strategies
//!
//! A strategy is instantiated once per run into concrete folds. The same folds are
//! then shared by every pipeline of a benchmark, or every trial of a tuning run, so
//! scores are compared on identical partitions.

use crate::error::{EvalError, Result};
use crate::task::Task;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resampling strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Resampling {
    /// Shuffled k-fold cross-validation
    KFold { folds: usize },
    /// K-fold keeping the class ratio of the task in every test fold
    StratifiedKFold { folds: usize },
    /// Single split with `ratio` of the rows used for training
    Holdout { ratio: f64 },
}

impl Default for Resampling {
    fn default() -> Self {
        Resampling::KFold { folds: 5 }
    }
}

impl fmt::Display for Resampling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resampling::KFold { folds } => write!(f, "{}-fold CV", folds),
            Resampling::StratifiedKFold { folds } => write!(f, "stratified {}-fold CV", folds),
            Resampling::Holdout { ratio } => write!(f, "holdout ({:.0}% train)", ratio * 100.0),
        }
    }
}

/// One train/test partition of the task's rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub id: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Resampling {
    /// Number of folds the strategy yields
    pub fn iterations(&self) -> usize {
        match self {
            Resampling::KFold { folds } | Resampling::StratifiedKFold { folds } => *folds,
            Resampling::Holdout { .. } => 1,
        }
    }

    /// Partition the task's rows; identical seeds yield identical folds
    pub fn instantiate(&self, task: &Task, seed: u64) -> Result<Vec<Fold>> {
        self.split(task.n_rows(), Some(task.truth()), seed)
    }

    /// Partition `n_rows` rows; `truth` is required for stratification
    pub fn split(&self, n_rows: usize, truth: Option<&[bool]>, seed: u64) -> Result<Vec<Fold>> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let folds = match self {
            Resampling::KFold { folds } => {
                let mut indices: Vec<usize> = (0..n_rows).collect();
                indices.shuffle(&mut rng);
                Self::assign_round_robin(&[indices], n_rows, *folds)
            }
            Resampling::StratifiedKFold { folds } => {
                let truth = truth.ok_or_else(|| {
                    EvalError::ConfigError("stratified k-fold requires labels".to_string())
                })?;
                if truth.len() != n_rows {
                    return Err(EvalError::ShapeError {
                        expected: format!("{} labels", n_rows),
                        actual: format!("{} labels", truth.len()),
                    });
                }
                let mut positives: Vec<usize> = (0..n_rows).filter(|&i| truth[i]).collect();
                let mut negatives: Vec<usize> = (0..n_rows).filter(|&i| !truth[i]).collect();
                positives.shuffle(&mut rng);
                negatives.shuffle(&mut rng);
                Self::assign_round_robin(&[positives, negatives], n_rows, *folds)
            }
            Resampling::Holdout { ratio } => {
                if !(*ratio > 0.0 && *ratio < 1.0) {
                    return Err(EvalError::ConfigError(format!(
                        "holdout ratio must be in (0, 1), got {}",
                        ratio
                    )));
                }
                let mut indices: Vec<usize> = (0..n_rows).collect();
                indices.shuffle(&mut rng);
                let n_train = (n_rows as f64 * ratio).round() as usize;
                let mut train = indices[..n_train].to_vec();
                let mut test = indices[n_train..].to_vec();
                train.sort_unstable();
                test.sort_unstable();
                vec![Fold { id: 0, train, test }]
            }
        };

        for fold in &folds {
            if fold.train.is_empty() || fold.test.is_empty() {
                return Err(EvalError::InsufficientData(format!(
                    "{} on {} rows leaves fold {} with {} training and {} test rows",
                    self,
                    n_rows,
                    fold.id,
                    fold.train.len(),
                    fold.test.len()
                )));
            }
        }

        Ok(folds)
    }

    /// Deal shuffled rows into `k` test folds, continuing the deal across groups
    fn assign_round_robin(groups: &[Vec<usize>], n_rows: usize, k: usize) -> Vec<Fold> {
        let k = k.max(1);
        let mut fold_of = vec![0usize; n_rows];
        let mut position = 0usize;
        for group in groups {
            for &row in group {
                fold_of[row] = position % k;
                position += 1;
            }
        }

        (0..k)
            .map(|id| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..n_rows).partition(|&row| fold_of[row] == id);
                Fold { id, train, test }
            })
            .collect()
    }
}
