//! One-hot encoding of categorical columns

use crate::error::{EvalError, Result};
use crate::task::frame::{self, ColumnKind};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Expands every categorical column into one indicator column per training category
///
/// Indicator columns are named `<column>.<category>` and replace the source column in
/// place. Missing cells and categories unseen at fit time encode as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: BTreeMap<String, Vec<String>>,
}

impl OneHotEncoder {
    pub fn fit(df: &DataFrame) -> Result<Self> {
        let mut categories = BTreeMap::new();

        for name in frame::column_names(df) {
            if frame::column_kind(df, &name)? != ColumnKind::Categorical {
                continue;
            }
            let levels: BTreeSet<String> = frame::string_values(df, &name)?
                .into_iter()
                .flatten()
                .collect();
            categories.insert(name, levels.into_iter().collect());
        }

        Ok(Self { categories })
    }

    /// Names of the indicator columns produced for `column`
    pub fn output_names(&self, column: &str) -> Vec<String> {
        self.categories
            .get(column)
            .map(|levels| levels.iter().map(|l| format!("{}.{}", column, l)).collect())
            .unwrap_or_default()
    }

    /// Replace each encoded column in place; the row count is kept even when no
    /// columns remain
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for (name, levels) in &self.categories {
            let position = result.get_column_index(name).ok_or_else(|| {
                EvalError::DataError(format!("column '{}' recorded at fit time is missing", name))
            })?;
            let values = frame::string_values(df, name)?;
            result.drop_in_place(name)?;

            for (offset, level) in levels.iter().enumerate() {
                let indicator: Vec<Option<f64>> = values
                    .iter()
                    .map(|v| Some(if v.as_deref() == Some(level.as_str()) { 1.0 } else { 0.0 }))
                    .collect();
                result.insert_column(
                    position + offset,
                    frame::float_column(&format!("{}.{}", name, level), indicator),
                )?;
            }
        }

        Ok(result)
    }
}
