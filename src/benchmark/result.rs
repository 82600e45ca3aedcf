//! Benchmark results

use crate::resampling::Fold;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies one (pipeline, fold) cell of a benchmark
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub pipeline_id: String,
    pub fold_id: usize,
}

impl CellKey {
    pub fn new(pipeline_id: impl Into<String>, fold_id: usize) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            fold_id,
        }
    }
}

/// Scores produced for one fold's test rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Task row indices, in the order of the other vectors
    pub row_ids: Vec<usize>,
    /// Positive-class probability per row
    pub scores: Vec<f64>,
    /// `scores >= 0.5`
    pub predicted: Vec<bool>,
    /// Positive-class indicator per row
    pub truth: Vec<bool>,
    pub fit_secs: f64,
    pub predict_secs: f64,
}

impl Prediction {
    /// Score cut-off for a positive label
    pub const THRESHOLD: f64 = 0.5;

    pub fn new(row_ids: Vec<usize>, scores: Vec<f64>, truth: Vec<bool>) -> Self {
        let predicted = scores.iter().map(|&s| s >= Self::THRESHOLD).collect();
        Self {
            row_ids,
            scores,
            predicted,
            truth,
            fit_secs: 0.0,
            predict_secs: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }
}

/// Where a cell failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Fit,
    Predict,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Fit => write!(f, "fit"),
            FailureStage::Predict => write!(f, "predict"),
        }
    }
}

/// Failure recorded in place of a cell's prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFailure {
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of one cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CellOutcome {
    Completed(Prediction),
    Failed(CellFailure),
    /// Not started before the run was cancelled
    Cancelled,
}

impl CellOutcome {
    pub fn prediction(&self) -> Option<&Prediction> {
        match self {
            CellOutcome::Completed(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CellOutcome::Completed(_))
    }
}

/// Outcome of every cell of a benchmark run
#[derive(Debug, Clone)]
pub struct BenchmarkResult {
    pub(crate) task_id: String,
    pub(crate) pipeline_ids: Vec<String>,
    pub(crate) folds: Vec<Fold>,
    pub(crate) cells: BTreeMap<CellKey, CellOutcome>,
    pub(crate) rejected: BTreeMap<String, String>,
    pub(crate) seed: u64,
    pub(crate) elapsed_secs: f64,
}

impl BenchmarkResult {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Pipelines that were run, in submission order
    pub fn pipeline_ids(&self) -> &[String] {
        &self.pipeline_ids
    }

    pub fn folds(&self) -> &[Fold] {
        &self.folds
    }

    /// Pipelines skipped as incompatible with the task, with the reason
    pub fn rejected(&self) -> &BTreeMap<String, String> {
        &self.rejected
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn cell(&self, pipeline_id: &str, fold_id: usize) -> Option<&CellOutcome> {
        self.cells.get(&CellKey::new(pipeline_id, fold_id))
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &CellOutcome)> {
        self.cells.iter()
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn n_completed(&self) -> usize {
        self.cells.values().filter(|c| c.is_completed()).count()
    }

    /// Every failed cell with its failure
    pub fn failures(&self) -> Vec<(&CellKey, &CellFailure)> {
        self.cells
            .iter()
            .filter_map(|(key, outcome)| match outcome {
                CellOutcome::Failed(failure) => Some((key, failure)),
                _ => None,
            })
            .collect()
    }
}
