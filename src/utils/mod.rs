//! Utility modules

pub mod data_loader;
pub mod parallel;
pub mod seed;

pub use data_loader::{DataLoader, DatasetSummary, ColumnSummary};
pub use parallel::{ParallelConfig, CancellationToken};
pub use seed::derive_seed;
