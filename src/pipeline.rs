//! Pipeline specifications
//!
//! A [`PipelineSpec`] is an ordered list of preprocessing steps terminated by a
//! learner. It is itself a [`Learner`]: fitting runs every step on the training rows,
//! then fits the learner on the transformed frame.

use crate::error::{EvalError, Result};
use crate::learners::{FittedModel, Learner, LearnerKind, Predict};
use crate::preprocessing::{validate_steps, Preprocessor, Step};
use crate::task::{frame::ColumnKind, Task};
use crate::utils::derive_seed;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Preprocessing steps followed by a learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSpec {
    id: String,
    steps: Vec<Step>,
    learner: LearnerKind,
}

impl PipelineSpec {
    /// Bare learner with no preprocessing, identified by the learner's name
    pub fn new(learner: LearnerKind) -> Self {
        Self {
            id: learner.name().to_string(),
            steps: Vec::new(),
            learner,
        }
    }

    /// Steps a learner needs to run on any task: schema alignment and constant
    /// removal always, plus imputation and encoding for what the learner lacks
    pub fn standard(learner: LearnerKind) -> Self {
        let props = learner.properties();
        let mut steps = vec![Step::align_with_bucket(), Step::RemoveConstant];
        if !props.missings {
            steps.push(Step::ImputeCategorical);
            steps.push(Step::ImputeNumeric);
        }
        if !props.categorical {
            steps.push(Step::EncodeOneHot);
        }

        let id = format!("{}.{}", steps_prefix(&steps), learner.name());
        Self { id, steps, learner }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Append a step; order is checked when the pipeline is validated
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Compose with further steps, keeping the learner
    pub fn chain(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Same steps and id around a different learner
    pub fn with_learner(&self, learner: LearnerKind) -> Self {
        Self {
            id: self.id.clone(),
            steps: self.steps.clone(),
            learner,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn learner(&self) -> &LearnerKind {
        &self.learner
    }

    pub fn validate(&self) -> Result<()> {
        validate_steps(&self.steps).map_err(|reason| EvalError::IncompatiblePipeline {
            pipeline: self.id.clone(),
            reason,
        })
    }

    fn has_step(&self, wanted: fn(&Step) -> bool) -> bool {
        self.steps.iter().any(wanted)
    }
}

fn steps_prefix(steps: &[Step]) -> String {
    steps.iter().map(Step::name).collect::<Vec<_>>().join(".")
}

impl From<LearnerKind> for PipelineSpec {
    fn from(learner: LearnerKind) -> Self {
        Self::new(learner)
    }
}

impl Learner for PipelineSpec {
    type Model = FittedPipeline;

    fn id(&self) -> String {
        self.id.clone()
    }

    /// Check what is left for the learner once every step has run
    fn check_compatible(&self, task: &Task) -> Result<()> {
        self.validate()?;

        let props = self.learner.properties();
        let encodes = self.has_step(|s| matches!(s, Step::EncodeOneHot));
        let imputes_cat = self.has_step(|s| matches!(s, Step::ImputeCategorical));
        let imputes_num = self.has_step(|s| matches!(s, Step::ImputeNumeric));

        let incompatible = |reason: &str| EvalError::IncompatiblePipeline {
            pipeline: self.id.clone(),
            reason: reason.to_string(),
        };

        if task.has_categorical() && !encodes && !props.categorical {
            return Err(incompatible(
                "categorical features reach a learner that accepts numeric input only",
            ));
        }
        if !props.missings {
            if task.has_missing(ColumnKind::Numeric) && !imputes_num {
                return Err(incompatible(
                    "missing numeric values reach a learner that cannot handle them",
                ));
            }
            if task.has_missing(ColumnKind::Categorical) && !imputes_cat && !encodes {
                return Err(incompatible(
                    "missing categorical values reach a learner that cannot handle them",
                ));
            }
        }
        Ok(())
    }

    fn fit(&self, features: &DataFrame, truth: &[bool], seed: u64) -> Result<FittedPipeline> {
        let (preprocessor, transformed) =
            Preprocessor::fit(&self.steps, features, derive_seed(seed, "preprocess", 0))?;
        let model = self
            .learner
            .fit(&transformed, truth, derive_seed(seed, "learner", 0))?;

        Ok(FittedPipeline {
            preprocessor,
            model,
        })
    }
}

/// Fitted preprocessing chain and model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedPipeline {
    preprocessor: Preprocessor,
    model: FittedModel,
}

impl FittedPipeline {
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }
}

impl Predict for FittedPipeline {
    fn predict_proba(&self, features: &DataFrame) -> Result<Vec<f64>> {
        let transformed = self.preprocessor.transform(features)?;
        self.model.predict_proba(&transformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learners::LogisticRegression;

    fn titanic_like() -> Task {
        let df = df!(
            "age" => &[Some(22.0), None, Some(26.0), Some(35.0), Some(54.0), Some(2.0), Some(27.0), Some(14.0)],
            "port" => &[Some("S"), Some("C"), Some("S"), None, Some("S"), Some("Q"), Some("S"), Some("C")],
            "survived" => &["no", "yes", "yes", "yes", "no", "no", "yes", "yes"]
        )
        .unwrap();
        Task::new("titanic", df, "survived", "yes").unwrap()
    }

    #[test]
    fn test_bare_numeric_learner_rejected() {
        let spec = PipelineSpec::new(LearnerKind::LogisticRegression(LogisticRegression::new()));
        let err = spec.check_compatible(&titanic_like()).unwrap_err();
        assert!(matches!(err, EvalError::IncompatiblePipeline { .. }));
    }

    #[test]
    fn test_standard_pipeline_is_compatible() {
        let spec = PipelineSpec::standard(LearnerKind::LogisticRegression(LogisticRegression::new()));
        assert_eq!(spec.id(), "align.constant.impute_cat.impute_num.encode.logistic_regression");
        spec.check_compatible(&titanic_like()).unwrap();
    }

    #[test]
    fn test_out_of_order_steps_rejected() {
        let spec = PipelineSpec::new(LearnerKind::Featureless)
            .with_step(Step::EncodeOneHot)
            .with_step(Step::ImputeNumeric);
        assert!(matches!(
            spec.check_compatible(&titanic_like()),
            Err(EvalError::IncompatiblePipeline { .. })
        ));
    }

    #[test]
    fn test_fit_and_predict_unseen_rows() {
        let task = titanic_like();
        let spec = PipelineSpec::standard(LearnerKind::LogisticRegression(LogisticRegression::new()));

        let (train_x, train_y) = task.select_rows(&[0, 1, 2, 3, 4, 6]).unwrap();
        let (test_x, _) = task.select_rows(&[5, 7]).unwrap();

        let model = spec.fit(&train_x, &train_y, 1).unwrap();
        let scores = model.predict_proba(&test_x).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }
}
