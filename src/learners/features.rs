//! Conversion from feature frames to dense matrices

use super::LearnerProperties;
use crate::error::{EvalError, Result};
use crate::task::frame::{self, ColumnKind};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Encoding {
    Numeric,
    /// Sorted training categories; a value's code is its position
    Ordinal(Vec<String>),
}

/// Column layout captured at fit time and replayed at predict time
///
/// Missing cells and unseen categories become `NaN`, which only learners that
/// declare support for missing values will ever receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureLayout {
    columns: Vec<(String, Encoding)>,
    allow_missing: bool,
}

impl FeatureLayout {
    pub fn fit(df: &DataFrame, properties: LearnerProperties, learner: &str) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());

        for name in frame::column_names(df) {
            let col = df.column(&name)?;
            if col.null_count() > 0 && !properties.missings {
                return Err(EvalError::FitFailure(format!(
                    "learner '{}' cannot handle missing values in column '{}'",
                    learner, name
                )));
            }

            let encoding = match frame::column_kind(df, &name)? {
                ColumnKind::Numeric => Encoding::Numeric,
                ColumnKind::Categorical if properties.categorical => {
                    let levels: BTreeSet<String> = frame::string_values(df, &name)?
                        .into_iter()
                        .flatten()
                        .collect();
                    Encoding::Ordinal(levels.into_iter().collect())
                }
                ColumnKind::Categorical => {
                    return Err(EvalError::FitFailure(format!(
                        "learner '{}' requires numeric input, column '{}' is categorical",
                        learner, name
                    )))
                }
            };
            columns.push((name, encoding));
        }

        Ok(Self {
            columns,
            allow_missing: properties.missings,
        })
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Build the `(rows, features)` matrix for `df`
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let n_rows = df.height();
        let mut data: Vec<Vec<f64>> = Vec::with_capacity(self.columns.len());

        for (name, encoding) in &self.columns {
            let values: Vec<f64> = match encoding {
                Encoding::Numeric => frame::numeric_values(df, name)?
                    .into_iter()
                    .map(|v| v.unwrap_or(f64::NAN))
                    .collect(),
                Encoding::Ordinal(levels) => frame::string_values(df, name)?
                    .into_iter()
                    .map(|v| {
                        v.and_then(|s| levels.binary_search(&s).ok())
                            .map(|code| code as f64)
                            .unwrap_or(f64::NAN)
                    })
                    .collect(),
            };

            if !self.allow_missing && matches!(encoding, Encoding::Numeric) && values.iter().any(|v| v.is_nan()) {
                return Err(EvalError::PredictFailure(format!(
                    "missing values in column '{}'",
                    name
                )));
            }
            data.push(values);
        }

        Ok(Array2::from_shape_fn((n_rows, data.len()), |(i, j)| data[j][i]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NUMERIC_ONLY: LearnerProperties = LearnerProperties {
        missings: false,
        categorical: false,
    };

    #[test]
    fn test_ordinal_codes_and_unseen_levels() {
        let train = df!("port" => &["S", "C", "Q"], "fare" => &[1.0, 2.0, 3.0]).unwrap();
        let props = LearnerProperties {
            missings: false,
            categorical: true,
        };
        let layout = FeatureLayout::fit(&train, props, "tree").unwrap();

        let test = df!("port" => &["Q", "X"], "fare" => &[4.0, 5.0]).unwrap();
        let x = layout.transform(&test).unwrap();
        assert_eq!(x.dim(), (2, 2));
        assert_eq!(x[[0, 0]], 1.0);
        assert!(x[[1, 0]].is_nan());
        assert_eq!(x[[1, 1]], 5.0);
    }

    #[test]
    fn test_categorical_rejected_for_numeric_learner() {
        let train = df!("port" => &["S", "C"]).unwrap();
        let err = FeatureLayout::fit(&train, NUMERIC_ONLY, "logreg").unwrap_err();
        assert!(matches!(err, EvalError::FitFailure(_)));
    }

    #[test]
    fn test_missing_rejected_at_predict() {
        let train = df!("age" => &[1.0, 2.0]).unwrap();
        let layout = FeatureLayout::fit(&train, NUMERIC_ONLY, "logreg").unwrap();
        let test = df!("age" => &[None, Some(2.0)]).unwrap();
        assert!(matches!(layout.transform(&test), Err(EvalError::PredictFailure(_))));
    }
}
