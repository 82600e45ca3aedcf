//! Ordered preprocessing chain
//!
//! Steps run in a fixed order: schema alignment, constant removal, categorical
//! imputation, numeric imputation, one-hot encoding. Each step is fitted on the output
//! of the previous one, using training rows only, and the fitted chain is replayed
//! unchanged on prediction rows.

use super::{CategoricalImputer, ConstantRemover, NumericImputer, OneHotEncoder, SchemaAligner};
use crate::error::{EvalError, Result};
use crate::utils::derive_seed;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Unfitted preprocessing step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    /// Map categories unseen at fit time to `other_bucket`, or reject them
    AlignSchema { other_bucket: Option<String> },
    /// Drop columns with at most one distinct value in the training rows
    RemoveConstant,
    /// Fill missing categorical cells by sampling the training distribution
    ImputeCategorical,
    /// Fill missing numeric cells with the training mean
    ImputeNumeric,
    /// One indicator column per training category
    EncodeOneHot,
}

impl Step {
    /// Fallback bucket name used by [`Step::align_with_bucket`]
    pub const OTHER_BUCKET: &'static str = ".other";

    pub fn align_with_bucket() -> Self {
        Step::AlignSchema {
            other_bucket: Some(Self::OTHER_BUCKET.to_string()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Step::AlignSchema { .. } => "align",
            Step::RemoveConstant => "constant",
            Step::ImputeCategorical => "impute_cat",
            Step::ImputeNumeric => "impute_num",
            Step::EncodeOneHot => "encode",
        }
    }

    /// Position in the fixed chain order
    pub fn rank(&self) -> usize {
        match self {
            Step::AlignSchema { .. } => 0,
            Step::RemoveConstant => 1,
            Step::ImputeCategorical => 2,
            Step::ImputeNumeric => 3,
            Step::EncodeOneHot => 4,
        }
    }

    /// Learn the step's state from training rows
    pub fn fit(&self, df: &DataFrame, seed: u64) -> Result<FittedStep> {
        Ok(match self {
            Step::AlignSchema { other_bucket } => {
                FittedStep::AlignSchema(SchemaAligner::fit(df, other_bucket.clone())?)
            }
            Step::RemoveConstant => FittedStep::RemoveConstant(ConstantRemover::fit(df)?),
            Step::ImputeCategorical => {
                FittedStep::ImputeCategorical(CategoricalImputer::fit(df, seed)?)
            }
            Step::ImputeNumeric => FittedStep::ImputeNumeric(NumericImputer::fit(df)?),
            Step::EncodeOneHot => FittedStep::EncodeOneHot(OneHotEncoder::fit(df)?),
        })
    }
}

/// Step with state learned from a training partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedStep {
    AlignSchema(SchemaAligner),
    RemoveConstant(ConstantRemover),
    ImputeCategorical(CategoricalImputer),
    ImputeNumeric(NumericImputer),
    EncodeOneHot(OneHotEncoder),
}

impl FittedStep {
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            FittedStep::AlignSchema(s) => s.apply(df),
            FittedStep::RemoveConstant(s) => s.apply(df),
            FittedStep::ImputeCategorical(s) => s.apply(df),
            FittedStep::ImputeNumeric(s) => s.apply(df),
            FittedStep::EncodeOneHot(s) => s.apply(df),
        }
    }
}

/// Check that steps follow the fixed order and appear at most once
pub fn validate_steps(steps: &[Step]) -> std::result::Result<(), String> {
    for pair in steps.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.rank() == b.rank() {
            return Err(format!("step '{}' appears more than once", a.name()));
        }
        if a.rank() > b.rank() {
            return Err(format!(
                "step '{}' must run before step '{}'",
                b.name(),
                a.name()
            ));
        }
    }
    Ok(())
}

/// Fitted preprocessing chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preprocessor {
    steps: Vec<FittedStep>,
}

impl Preprocessor {
    /// Fit every step in sequence and return the chain with the transformed training rows
    pub fn fit(steps: &[Step], df: &DataFrame, seed: u64) -> Result<(Self, DataFrame)> {
        validate_steps(steps).map_err(EvalError::ConfigError)?;

        let start = Instant::now();
        let mut current = df.clone();
        let mut fitted = Vec::with_capacity(steps.len());

        for (i, step) in steps.iter().enumerate() {
            let state = step.fit(&current, derive_seed(seed, step.name(), i))?;
            current = state.apply(&current)?;
            fitted.push(state);
        }

        debug!(
            steps = steps.len(),
            rows = current.height(),
            columns = current.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Preprocessor fitted"
        );

        Ok((Self { steps: fitted }, current))
    }

    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut current = df.clone();
        for step in &self.steps {
            current = step.apply(&current)?;
        }
        Ok(current)
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
