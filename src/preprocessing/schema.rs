//! Categorical schema alignment
//!
//! Records the category set of every categorical column seen at fit time. At apply
//! time, values outside that set are rewritten to the reserved fallback bucket, or
//! rejected with [`EvalError::SchemaMismatch`] when no bucket was reserved.

use crate::error::{EvalError, Result};
use crate::task::frame::{self, ColumnKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAligner {
    categories: BTreeMap<String, BTreeSet<String>>,
    other_bucket: Option<String>,
}

impl SchemaAligner {
    /// Record the category set of every categorical column
    pub fn fit(df: &DataFrame, other_bucket: Option<String>) -> Result<Self> {
        let mut categories = BTreeMap::new();

        for name in frame::column_names(df) {
            if frame::column_kind(df, &name)? != ColumnKind::Categorical {
                continue;
            }
            let seen: BTreeSet<String> = frame::string_values(df, &name)?
                .into_iter()
                .flatten()
                .collect();
            categories.insert(name, seen);
        }

        Ok(Self {
            categories,
            other_bucket,
        })
    }

    pub fn categories(&self, column: &str) -> Option<&BTreeSet<String>> {
        self.categories.get(column)
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for (name, known) in &self.categories {
            let values = frame::string_values(df, name)?;
            let mut changed = false;

            let aligned: Vec<Option<String>> = values
                .into_iter()
                .map(|value| match value {
                    Some(v) if !known.contains(&v) => match &self.other_bucket {
                        Some(bucket) => {
                            changed = true;
                            Ok(Some(bucket.clone()))
                        }
                        None => Err(EvalError::SchemaMismatch {
                            column: name.clone(),
                            value: v,
                        }),
                    },
                    other => Ok(other),
                })
                .collect::<Result<_>>()?;

            if changed {
                result.with_column(frame::string_column(name, aligned))?;
            }
        }

        Ok(result)
    }
}
