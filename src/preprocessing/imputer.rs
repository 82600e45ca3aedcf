//! Missing value imputation
//!
//! Both imputers learn their fill values from the training partition only and reuse
//! them unchanged when applied to held-out rows.

use crate::error::Result;
use crate::task::frame::{self, ColumnKind};
use crate::utils::derive_seed;
use polars::prelude::*;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fills numeric cells with the training mean of their column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericImputer {
    fill_values: BTreeMap<String, f64>,
}

impl NumericImputer {
    /// Compute the mean of every numeric column; all-missing columns fall back to 0.0
    pub fn fit(df: &DataFrame) -> Result<Self> {
        let mut fill_values = BTreeMap::new();

        for name in frame::column_names(df) {
            if frame::column_kind(df, &name)? != ColumnKind::Numeric {
                continue;
            }
            let observed: Vec<f64> = frame::numeric_values(df, &name)?
                .into_iter()
                .flatten()
                .filter(|v| v.is_finite())
                .collect();

            let mean = if observed.is_empty() {
                0.0
            } else {
                observed.iter().sum::<f64>() / observed.len() as f64
            };
            fill_values.insert(name, mean);
        }

        Ok(Self { fill_values })
    }

    pub fn fill_value(&self, column: &str) -> Option<f64> {
        self.fill_values.get(column).copied()
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for (name, &fill) in &self.fill_values {
            if df.column(name).map(|c| c.null_count()).unwrap_or(0) == 0 {
                continue;
            }
            let filled: Vec<Option<f64>> = frame::numeric_values(df, name)?
                .into_iter()
                .map(|v| Some(v.unwrap_or(fill)))
                .collect();
            result.with_column(frame::float_column(name, filled))?;
        }

        Ok(result)
    }
}

/// Fills categorical cells with a value drawn from the training distribution
///
/// One value is drawn per column at fit time, proportionally to the observed
/// frequencies, and every missing cell of that column receives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoricalImputer {
    fill_values: BTreeMap<String, String>,
}

impl CategoricalImputer {
    pub fn fit(df: &DataFrame, seed: u64) -> Result<Self> {
        let mut fill_values = BTreeMap::new();

        for name in frame::column_names(df) {
            if frame::column_kind(df, &name)? != ColumnKind::Categorical {
                continue;
            }
            let observed: Vec<String> = frame::string_values(df, &name)?
                .into_iter()
                .flatten()
                .collect();
            if observed.is_empty() {
                continue;
            }

            let mut rng = ChaCha8Rng::seed_from_u64(derive_seed(seed, &name, 0));
            let drawn = observed[rng.gen_range(0..observed.len())].clone();
            fill_values.insert(name, drawn);
        }

        Ok(Self { fill_values })
    }

    pub fn fill_value(&self, column: &str) -> Option<&str> {
        self.fill_values.get(column).map(String::as_str)
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut result = df.clone();

        for (name, fill) in &self.fill_values {
            if df.column(name).map(|c| c.null_count()).unwrap_or(0) == 0 {
                continue;
            }
            let filled: Vec<Option<String>> = frame::string_values(df, name)?
                .into_iter()
                .map(|v| Some(v.unwrap_or_else(|| fill.clone())))
                .collect();
            result.with_column(frame::string_column(name, filled))?;
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_imputer_uses_training_mean() {
        let train = df!("age" => &[Some(5.0), Some(15.0), None]).unwrap();
        let test = df!("age" => &[None, Some(50.0), None]).unwrap();

        let imputer = NumericImputer::fit(&train).unwrap();
        assert_eq!(imputer.fill_value("age"), Some(10.0));

        let out = imputer.apply(&test).unwrap();
        let ages = frame::numeric_values(&out, "age").unwrap();
        assert_eq!(ages, vec![Some(10.0), Some(50.0), Some(10.0)]);
    }

    #[test]
    fn test_numeric_imputer_all_missing_column() {
        let train = df!("age" => &[None::<f64>, None]).unwrap();
        let imputer = NumericImputer::fit(&train).unwrap();
        assert_eq!(imputer.fill_value("age"), Some(0.0));
    }

    #[test]
    fn test_categorical_imputer_draws_observed_value() {
        let train = df!("port" => &[Some("S"), Some("C"), None, Some("S")]).unwrap();
        let imputer = CategoricalImputer::fit(&train, 7).unwrap();

        let fill = imputer.fill_value("port").unwrap().to_string();
        assert!(fill == "S" || fill == "C");

        let out = imputer.apply(&train).unwrap();
        assert_eq!(out.column("port").unwrap().null_count(), 0);
        assert_eq!(frame::string_values(&out, "port").unwrap()[2], Some(fill));
    }

    #[test]
    fn test_categorical_imputer_is_seeded() {
        let train = df!("port" => &[Some("S"), Some("C"), Some("Q"), None]).unwrap();
        let a = CategoricalImputer::fit(&train, 11).unwrap();
        let b = CategoricalImputer::fit(&train, 11).unwrap();
        assert_eq!(a.fill_value("port"), b.fill_value("port"));
    }
}
