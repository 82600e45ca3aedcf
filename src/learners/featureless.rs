//! Baseline learner that ignores all features

use crate::error::{EvalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Predicts the training positive rate for every row
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturelessClassifier {
    positive_rate: Option<f64>,
}

impl FeaturelessClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, y: &Array1<f64>) -> Result<&mut Self> {
        if y.is_empty() {
            return Err(EvalError::FitFailure("empty training partition".to_string()));
        }
        self.positive_rate = y.mean();
        Ok(self)
    }

    pub fn positive_rate(&self) -> Option<f64> {
        self.positive_rate
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let rate = self.positive_rate.ok_or(EvalError::ModelNotFitted)?;
        Ok(Array1::from_elem(x.nrows(), rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicts_training_rate() {
        let y = Array1::from_vec(vec![1.0, 0.0, 0.0, 0.0]);
        let mut model = FeaturelessClassifier::new();
        model.fit(&y).unwrap();

        let proba = model.predict_proba(&Array2::zeros((3, 0))).unwrap();
        assert_eq!(proba.to_vec(), vec![0.25; 3]);
    }

    #[test]
    fn test_unfitted() {
        let model = FeaturelessClassifier::new();
        assert!(matches!(
            model.predict_proba(&Array2::zeros((1, 0))),
            Err(EvalError::ModelNotFitted)
        ));
    }
}
