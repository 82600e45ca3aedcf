//! Hyperparameter tuning
//!
//! Random search over a declared [`SearchSpace`], evaluated with the benchmark runner
//! on a fixed set of folds. Every trial is kept in a [`TuningArchive`].

mod archive;
mod config;
mod search_space;
mod tuner;

pub use archive::{TrialResult, TuningArchive};
pub use config::{OptimizeDirection, TunerConfig};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
pub use tuner::{Tuner, TuningResult};
