//! Learners
//!
//! A learner turns training features and binary truth into a model that produces a
//! positive-class probability per row. [`LearnerKind`] covers the built-in algorithms;
//! anything implementing [`Learner`] can be benchmarked, including full preprocessing
//! pipelines.

pub mod decision_tree;
pub mod featureless;
pub mod features;
pub mod gradient_boosting;
pub mod linear_models;
pub mod neural_network;
pub mod random_forest;

pub use decision_tree::{Criterion, DecisionTree};
pub use featureless::FeaturelessClassifier;
pub use features::FeatureLayout;
pub use gradient_boosting::{GradientBoostingClassifier, GradientBoostingConfig};
pub use linear_models::{LinearDiscriminant, LogisticRegression};
pub use neural_network::{Activation, MLPClassifier, MLPConfig};
pub use random_forest::{MaxFeatures, RandomForest};

use crate::error::{EvalError, Result};
use crate::optimizer::{ParameterValue, TrialParams};
use crate::task::{frame::ColumnKind, Task};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fitted model able to score unseen rows
pub trait Predict: Send + Sync {
    /// Positive-class probability per row, in row order
    fn predict_proba(&self, features: &DataFrame) -> Result<Vec<f64>>;
}

/// Anything that can be fitted on a training partition
pub trait Learner: Send + Sync {
    type Model: Predict;

    /// Identifier used as the row key in reports
    fn id(&self) -> String;

    /// Reject tasks whose data this learner cannot consume
    fn check_compatible(&self, task: &Task) -> Result<()>;

    /// Fit on training rows; `seed` drives every random choice made while fitting
    fn fit(&self, features: &DataFrame, truth: &[bool], seed: u64) -> Result<Self::Model>;
}

/// Data a learner can consume directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerProperties {
    /// Accepts missing cells
    pub missings: bool,
    /// Accepts categorical columns
    pub categorical: bool,
}

/// Built-in learning algorithms with their hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "learner", content = "params", rename_all = "snake_case")]
pub enum LearnerKind {
    Featureless,
    LogisticRegression(LogisticRegression),
    #[serde(rename = "lda")]
    LinearDiscriminant(LinearDiscriminant),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingConfig),
    NeuralNetwork(MLPConfig),
}

impl LearnerKind {
    /// Every built-in learner with default hyperparameters
    pub fn all() -> Vec<LearnerKind> {
        vec![
            LearnerKind::Featureless,
            LearnerKind::LogisticRegression(LogisticRegression::new()),
            LearnerKind::LinearDiscriminant(LinearDiscriminant::new()),
            LearnerKind::DecisionTree(DecisionTree::new_classifier()),
            LearnerKind::RandomForest(RandomForest::default()),
            LearnerKind::GradientBoosting(GradientBoostingConfig::default()),
            LearnerKind::NeuralNetwork(MLPConfig::default()),
        ]
    }

    /// Look a learner up by name, with default hyperparameters
    pub fn from_name(name: &str) -> Result<LearnerKind> {
        LearnerKind::all()
            .into_iter()
            .find(|l| l.name() == name)
            .ok_or_else(|| {
                EvalError::ConfigError(format!(
                    "unknown learner '{}', expected one of: {}",
                    name,
                    LearnerKind::all()
                        .iter()
                        .map(|l| l.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            LearnerKind::Featureless => "featureless",
            LearnerKind::LogisticRegression(_) => "logistic_regression",
            LearnerKind::LinearDiscriminant(_) => "lda",
            LearnerKind::DecisionTree(_) => "decision_tree",
            LearnerKind::RandomForest(_) => "random_forest",
            LearnerKind::GradientBoosting(_) => "gradient_boosting",
            LearnerKind::NeuralNetwork(_) => "neural_network",
        }
    }

    pub fn properties(&self) -> LearnerProperties {
        let (missings, categorical) = match self {
            LearnerKind::Featureless => (true, true),
            LearnerKind::LogisticRegression(_) => (false, false),
            LearnerKind::LinearDiscriminant(_) => (false, false),
            LearnerKind::DecisionTree(_) => (true, true),
            LearnerKind::RandomForest(_) => (false, true),
            LearnerKind::GradientBoosting(_) => (true, false),
            LearnerKind::NeuralNetwork(_) => (false, false),
        };
        LearnerProperties {
            missings,
            categorical,
        }
    }

    /// Names of the hyperparameters [`LearnerKind::with_params`] accepts
    pub fn tunable_params(&self) -> &'static [&'static str] {
        match self {
            LearnerKind::Featureless => &[],
            LearnerKind::LogisticRegression(_) => LogisticRegression::TUNABLE,
            LearnerKind::LinearDiscriminant(_) => LinearDiscriminant::TUNABLE,
            LearnerKind::DecisionTree(_) => DecisionTree::TUNABLE,
            LearnerKind::RandomForest(_) => RandomForest::TUNABLE,
            LearnerKind::GradientBoosting(_) => GradientBoostingConfig::TUNABLE,
            LearnerKind::NeuralNetwork(_) => MLPConfig::TUNABLE,
        }
    }

    /// Copy of this learner with the given hyperparameters bound
    pub fn with_params(&self, params: &TrialParams) -> Result<LearnerKind> {
        let mut learner = self.clone();
        for (name, value) in params {
            learner.set_param(name, value)?;
        }
        Ok(learner)
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match self {
            LearnerKind::Featureless => Err(unknown_param("featureless", name)),
            LearnerKind::LogisticRegression(m) => m.set_param(name, value),
            LearnerKind::LinearDiscriminant(m) => m.set_param(name, value),
            LearnerKind::DecisionTree(m) => m.set_param(name, value),
            LearnerKind::RandomForest(m) => m.set_param(name, value),
            LearnerKind::GradientBoosting(c) => c.set_param(name, value),
            LearnerKind::NeuralNetwork(c) => c.set_param(name, value),
        }
    }

    fn fit_matrix(&self, x: &Array2<f64>, y: &Array1<f64>, seed: u64) -> Result<TrainedModel> {
        Ok(match self {
            LearnerKind::Featureless => {
                let mut model = FeaturelessClassifier::new();
                model.fit(y)?;
                TrainedModel::Featureless(model)
            }
            LearnerKind::LogisticRegression(m) => {
                let mut model = m.clone();
                model.fit(x, y)?;
                TrainedModel::LogisticRegression(model)
            }
            LearnerKind::LinearDiscriminant(m) => {
                let mut model = m.clone();
                model.fit(x, y)?;
                TrainedModel::LinearDiscriminant(model)
            }
            LearnerKind::DecisionTree(m) => {
                let mut model = m.clone();
                model.random_state = Some(seed);
                model.fit(x, y)?;
                TrainedModel::DecisionTree(model)
            }
            LearnerKind::RandomForest(m) => {
                let mut model = m.clone();
                model.random_state = Some(seed);
                model.fit(x, y)?;
                TrainedModel::RandomForest(model)
            }
            LearnerKind::GradientBoosting(c) => {
                let mut model = GradientBoostingClassifier::new(GradientBoostingConfig {
                    random_state: Some(seed),
                    ..c.clone()
                });
                model.fit(x, y)?;
                TrainedModel::GradientBoosting(model)
            }
            LearnerKind::NeuralNetwork(c) => {
                let mut model = MLPClassifier::new(MLPConfig {
                    random_state: Some(seed),
                    ..c.clone()
                });
                model.fit(x, y)?;
                TrainedModel::NeuralNetwork(model)
            }
        })
    }
}

impl fmt::Display for LearnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl Learner for LearnerKind {
    type Model = FittedModel;

    fn id(&self) -> String {
        self.name().to_string()
    }

    fn check_compatible(&self, task: &Task) -> Result<()> {
        let props = self.properties();
        if task.has_categorical() && !props.categorical {
            return Err(EvalError::IncompatiblePipeline {
                pipeline: self.id(),
                reason: "categorical features present and learner accepts numeric input only"
                    .to_string(),
            });
        }
        if !props.missings
            && (task.has_missing(ColumnKind::Numeric) || task.has_missing(ColumnKind::Categorical))
        {
            return Err(EvalError::IncompatiblePipeline {
                pipeline: self.id(),
                reason: "missing values present and learner cannot handle them".to_string(),
            });
        }
        Ok(())
    }

    fn fit(&self, features: &DataFrame, truth: &[bool], seed: u64) -> Result<FittedModel> {
        if features.height() != truth.len() {
            return Err(EvalError::ShapeError {
                expected: format!("{} labels", features.height()),
                actual: format!("{} labels", truth.len()),
            });
        }

        let layout = FeatureLayout::fit(features, self.properties(), self.name())?;
        let x = layout.transform(features)?;
        let y: Array1<f64> = truth.iter().map(|&t| if t { 1.0 } else { 0.0 }).collect();
        let model = self.fit_matrix(&x, &y, seed)?;

        Ok(FittedModel { layout, model })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TrainedModel {
    Featureless(FeaturelessClassifier),
    LogisticRegression(LogisticRegression),
    LinearDiscriminant(LinearDiscriminant),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoostingClassifier),
    NeuralNetwork(MLPClassifier),
}

/// Model produced by a [`LearnerKind`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    layout: FeatureLayout,
    model: TrainedModel,
}

impl Predict for FittedModel {
    fn predict_proba(&self, features: &DataFrame) -> Result<Vec<f64>> {
        let x = self.layout.transform(features)?;
        let proba = match &self.model {
            TrainedModel::Featureless(m) => m.predict_proba(&x)?,
            TrainedModel::LogisticRegression(m) => m.predict_proba(&x)?,
            TrainedModel::LinearDiscriminant(m) => m.predict_proba(&x)?,
            TrainedModel::DecisionTree(m) => m.predict(&x)?,
            TrainedModel::RandomForest(m) => m.predict_proba(&x)?,
            TrainedModel::GradientBoosting(m) => m.predict_proba(&x)?,
            TrainedModel::NeuralNetwork(m) => m.predict_proba(&x)?,
        };
        Ok(proba.to_vec())
    }
}

pub(crate) fn unknown_param(learner: &str, name: &str) -> EvalError {
    EvalError::InvalidParameter {
        name: name.to_string(),
        value: String::new(),
        reason: format!("not a hyperparameter of '{}'", learner),
    }
}

pub(crate) fn invalid_param(name: &str, value: impl fmt::Display, reason: &str) -> EvalError {
    EvalError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub(crate) fn float_param(name: &str, value: &ParameterValue) -> Result<f64> {
    value
        .as_float()
        .ok_or_else(|| invalid_param(name, value, "expected a number"))
}

pub(crate) fn count_param(name: &str, value: &ParameterValue, min: usize) -> Result<usize> {
    match value.as_int() {
        Some(v) if v >= min as i64 => Ok(v as usize),
        Some(v) => Err(invalid_param(name, v, &format!("must be at least {}", min))),
        None => Err(invalid_param(name, value, "expected an integer")),
    }
}

/// Depth limit; 0 yields a single leaf
pub(crate) fn optional_depth_param(name: &str, value: &ParameterValue) -> Result<Option<usize>> {
    count_param(name, value, 0).map(Some)
}

pub(crate) fn choice_param<'a>(name: &str, value: &'a ParameterValue) -> Result<&'a str> {
    value
        .as_string()
        .ok_or_else(|| invalid_param(name, value, "expected a string choice"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_task() -> Task {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let y: Vec<&str> = (0..40).map(|i| if i >= 20 { "pos" } else { "neg" }).collect();
        Task::new("steps", df!("x" => x, "y" => y).unwrap(), "y", "pos").unwrap()
    }

    #[test]
    fn test_every_learner_fits_and_predicts() {
        let task = numeric_task();
        let (features, truth) = task.select_rows(&(0..40).collect::<Vec<_>>()).unwrap();

        for learner in LearnerKind::all() {
            let model = learner.fit(&features, &truth, 1).unwrap();
            let proba = model.predict_proba(&features).unwrap();
            assert_eq!(proba.len(), 40, "{}", learner);
            assert!(
                proba.iter().all(|p| (0.0..=1.0).contains(p)),
                "{} produced out-of-range scores",
                learner
            );
        }
    }

    #[test]
    fn test_compatibility_with_categorical_task() {
        let df = df!(
            "port" => &["S", "C", "S", "Q"],
            "y" => &["a", "b", "a", "b"]
        )
        .unwrap();
        let task = Task::new("cat", df, "y", "a").unwrap();

        let logreg = LearnerKind::LogisticRegression(LogisticRegression::new());
        assert!(matches!(
            logreg.check_compatible(&task),
            Err(EvalError::IncompatiblePipeline { .. })
        ));
        assert!(LearnerKind::Featureless.check_compatible(&task).is_ok());
        assert!(LearnerKind::DecisionTree(DecisionTree::new_classifier())
            .check_compatible(&task)
            .is_ok());
    }

    #[test]
    fn test_with_params_binds_values() {
        let forest = LearnerKind::RandomForest(RandomForest::default());
        let mut params = TrialParams::new();
        params.insert("n_estimators".into(), ParameterValue::Int(7));

        match forest.with_params(&params).unwrap() {
            LearnerKind::RandomForest(rf) => assert_eq!(rf.n_estimators, 7),
            other => panic!("unexpected learner {}", other),
        }

        params.insert("bogus".into(), ParameterValue::Float(1.0));
        assert!(matches!(
            forest.with_params(&params),
            Err(EvalError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_from_name() {
        assert_eq!(LearnerKind::from_name("lda").unwrap().name(), "lda");
        assert!(LearnerKind::from_name("svm").is_err());
    }
}
