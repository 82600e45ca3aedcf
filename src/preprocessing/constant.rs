//! Constant-column removal

use crate::error::{EvalError, Result};
use crate::task::frame::{self, ColumnKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Drops columns that held at most one distinct non-missing value at fit time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantRemover {
    dropped: Vec<String>,
}

impl ConstantRemover {
    pub fn fit(df: &DataFrame) -> Result<Self> {
        let mut dropped = Vec::new();

        for name in frame::column_names(df) {
            let distinct = match frame::column_kind(df, &name)? {
                ColumnKind::Numeric => frame::numeric_values(df, &name)?
                    .into_iter()
                    .flatten()
                    // -0.0 and 0.0 are one value
                    .map(|v| if v == 0.0 { 0u64 } else { v.to_bits() })
                    .collect::<HashSet<u64>>()
                    .len(),
                ColumnKind::Categorical => frame::string_values(df, &name)?
                    .into_iter()
                    .flatten()
                    .collect::<HashSet<String>>()
                    .len(),
            };

            if distinct <= 1 {
                dropped.push(name);
            }
        }

        Ok(Self { dropped })
    }

    /// Columns removed by this step
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();
        for name in &self.dropped {
            result = result.drop(name).map_err(|_| {
                EvalError::DataError(format!("column '{}' recorded at fit time is missing", name))
            })?;
        }
        Ok(result)
    }
}
