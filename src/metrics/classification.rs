//! Binary classification measures
//!
//! Every measure is computed from one fold's predictions. A measure that needs a class
//! the test partition lacks (for instance AUC on a single-class partition) returns
//! [`EvalError::DegenerateFold`]. Precision without a single positive prediction
//! returns [`EvalError::UndefinedMetric`]. Aggregation excludes such folds and records
//! the reason.

use crate::error::{EvalError, Result};
use crate::optimizer::OptimizeDirection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    Auc,
    ClassificationError,
    FalsePositiveRate,
    FalseNegativeRate,
    Precision,
    Recall,
    Mcc,
}

impl Metric {
    pub const ALL: [Metric; 8] = [
        Metric::Accuracy,
        Metric::Auc,
        Metric::ClassificationError,
        Metric::FalsePositiveRate,
        Metric::FalseNegativeRate,
        Metric::Precision,
        Metric::Recall,
        Metric::Mcc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Auc => "auc",
            Metric::ClassificationError => "classification_error",
            Metric::FalsePositiveRate => "false_positive_rate",
            Metric::FalseNegativeRate => "false_negative_rate",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::Mcc => "mcc",
        }
    }

    /// Whether larger values are better
    pub fn direction(&self) -> OptimizeDirection {
        match self {
            Metric::ClassificationError | Metric::FalsePositiveRate | Metric::FalseNegativeRate => {
                OptimizeDirection::Minimize
            }
            _ => OptimizeDirection::Maximize,
        }
    }

    /// Compute the measure for one fold
    pub fn evaluate(&self, scores: &[f64], predicted: &[bool], truth: &[bool]) -> Result<f64> {
        if predicted.len() != truth.len() || scores.len() != truth.len() {
            return Err(EvalError::ShapeError {
                expected: format!("{} predictions", truth.len()),
                actual: format!("{} scores, {} labels", scores.len(), predicted.len()),
            });
        }
        if truth.is_empty() {
            return Err(self.degenerate("empty test partition"));
        }

        let cm = ConfusionMatrix::from_labels(predicted, truth);
        match self {
            Metric::Accuracy => Ok(cm.accuracy()),
            Metric::ClassificationError => Ok(1.0 - cm.accuracy()),
            Metric::Auc => {
                if cm.positives() == 0 || cm.negatives() == 0 {
                    return Err(self.degenerate("test partition contains a single class"));
                }
                Ok(roc_auc(scores, truth))
            }
            Metric::Recall => {
                if cm.positives() == 0 {
                    return Err(self.degenerate("no positive rows in test partition"));
                }
                Ok(cm.tp as f64 / cm.positives() as f64)
            }
            Metric::FalseNegativeRate => {
                if cm.positives() == 0 {
                    return Err(self.degenerate("no positive rows in test partition"));
                }
                Ok(cm.fn_ as f64 / cm.positives() as f64)
            }
            Metric::FalsePositiveRate => {
                if cm.negatives() == 0 {
                    return Err(self.degenerate("no negative rows in test partition"));
                }
                Ok(cm.fp as f64 / cm.negatives() as f64)
            }
            Metric::Precision => {
                let predicted_positive = cm.tp + cm.fp;
                if predicted_positive == 0 && (cm.positives() == 0 || cm.negatives() == 0) {
                    return Err(self.degenerate("test partition contains a single class"));
                }
                if predicted_positive == 0 {
                    return Err(EvalError::UndefinedMetric {
                        metric: self.name().to_string(),
                        reason: "no positive predictions".to_string(),
                    });
                }
                Ok(cm.tp as f64 / predicted_positive as f64)
            }
            Metric::Mcc => {
                if cm.positives() == 0 || cm.negatives() == 0 {
                    return Err(self.degenerate("test partition contains a single class"));
                }
                Ok(cm.mcc())
            }
        }
    }

    fn degenerate(&self, reason: &str) -> EvalError {
        EvalError::DegenerateFold {
            metric: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Metric {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "accuracy" | "acc" => Ok(Metric::Accuracy),
            "auc" | "roc_auc" => Ok(Metric::Auc),
            "classification_error" | "ce" => Ok(Metric::ClassificationError),
            "false_positive_rate" | "fpr" => Ok(Metric::FalsePositiveRate),
            "false_negative_rate" | "fnr" => Ok(Metric::FalseNegativeRate),
            "precision" | "ppv" => Ok(Metric::Precision),
            "recall" | "tpr" | "sensitivity" => Ok(Metric::Recall),
            "mcc" => Ok(Metric::Mcc),
            other => Err(EvalError::ConfigError(format!("unknown metric '{}'", other))),
        }
    }
}

/// Counts of a binary confusion matrix
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(predicted: &[bool], truth: &[bool]) -> Self {
        let mut cm = Self::default();
        for (&p, &t) in predicted.iter().zip(truth.iter()) {
            match (p, t) {
                (true, true) => cm.tp += 1,
                (true, false) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (false, true) => cm.fn_ += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn positives(&self) -> usize {
        self.tp + self.fn_
    }

    pub fn negatives(&self) -> usize {
        self.tn + self.fp
    }

    pub fn accuracy(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        (self.tp + self.tn) as f64 / self.total() as f64
    }

    /// Matthews correlation; 0.0 when all predictions fall in one class
    pub fn mcc(&self) -> f64 {
        let (tp, fp, tn, fn_) = (self.tp as f64, self.fp as f64, self.tn as f64, self.fn_ as f64);
        let denom = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        if denom == 0.0 {
            0.0
        } else {
            (tp * tn - fp * fn_) / denom
        }
    }
}

/// Rank-based area under the ROC curve; tied scores share their average rank
pub fn roc_auc(scores: &[f64], truth: &[bool]) -> f64 {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // positions i..=j are tied; ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let n_pos = truth.iter().filter(|&&t| t).count() as f64;
    let n_neg = truth.len() as f64 - n_pos;
    let rank_sum: f64 = ranks
        .iter()
        .zip(truth.iter())
        .filter(|(_, t)| **t)
        .map(|(r, _)| r)
        .sum();

    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}
