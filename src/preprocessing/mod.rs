//! Data preprocessing steps
//!
//! Every step is a two-phase transform: `fit` learns state from training rows and
//! `apply` replays that state on any frame with the same columns.

mod constant;
mod encoder;
mod imputer;
mod pipeline;
mod schema;

pub use constant::ConstantRemover;
pub use encoder::OneHotEncoder;
pub use imputer::{CategoricalImputer, NumericImputer};
pub use pipeline::{validate_steps, FittedStep, Preprocessor, Step};
pub use schema::SchemaAligner;
