//! Benchmarking pipelines over resampling folds

mod result;
mod runner;

pub use result::{
    BenchmarkResult, CellFailure, CellKey, CellOutcome, FailureStage, Prediction,
};
pub use runner::BenchmarkRunner;
