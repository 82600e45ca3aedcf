//! evalkit - Reproducible evaluation of binary classifiers
//!
//! Cross-validated benchmarking of learners and preprocessing pipelines on a single
//! binary classification task, with per-metric aggregation and random-search tuning.
//!
//! # Modules
//!
//! ## Data
//! - [`task`] - Validated task: features, target and positive label
//! - [`resampling`] - K-fold, stratified k-fold and holdout partitions
//!
//! ## Models
//! - [`preprocessing`] - Schema alignment, constant removal, imputation, one-hot encoding
//! - [`learners`] - Built-in binary classifiers
//! - [`pipeline`] - Preprocessing steps bound to a learner
//!
//! ## Evaluation
//! - [`benchmark`] - Runs every pipeline on every fold
//! - [`metrics`] - Fold-level measures and report aggregation
//! - [`optimizer`] - Random-search hyperparameter tuning
//!
//! ## Services
//! - [`config`] - Run configuration
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data
pub mod task;
pub mod resampling;

// Models
pub mod preprocessing;
pub mod learners;
pub mod pipeline;

// Evaluation
pub mod benchmark;
pub mod metrics;
pub mod optimizer;

// Utilities and services
pub mod utils;
pub mod config;
pub mod cli;

pub use error::{EvalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{EvalError, Result};

    // Task and resampling
    pub use crate::task::Task;
    pub use crate::resampling::{Fold, Resampling};

    // Models
    pub use crate::preprocessing::{Preprocessor, Step};
    pub use crate::learners::{Learner, LearnerKind, LearnerProperties, Predict};
    pub use crate::pipeline::{FittedPipeline, PipelineSpec};

    // Evaluation
    pub use crate::benchmark::{BenchmarkResult, BenchmarkRunner, CellOutcome};
    pub use crate::metrics::{Metric, MetricAggregator, MetricReport};
    pub use crate::optimizer::{
        OptimizeDirection, SearchSpace, TrialParams, Tuner, TunerConfig, TuningArchive,
        TuningResult,
    };

    // Configuration
    pub use crate::config::EvaluationConfig;
    pub use crate::utils::{CancellationToken, DataLoader, ParallelConfig};
}
