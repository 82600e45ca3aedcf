//! Binary classification task definition
//!
//! A [`Task`] binds a data frame to a target column and the label treated as the
//! positive class. It is validated once at construction and never mutated afterwards;
//! resampling, pipelines and the benchmark runner only read from it.

pub mod frame;

use crate::error::{EvalError, Result};
use frame::{column_names, is_numeric_dtype, take_rows, ColumnKind};
use polars::prelude::*;
use std::collections::BTreeSet;

/// Immutable binary classification task
#[derive(Debug, Clone)]
pub struct Task {
    id: String,
    /// Feature columns only, normalized to `Float64` / `String`
    features: DataFrame,
    kinds: Vec<(String, ColumnKind)>,
    target_column: String,
    positive_label: String,
    negative_label: String,
    /// `true` where the row's target equals the positive label
    truth: Vec<bool>,
}

impl Task {
    /// Validate `data` and build a task
    pub fn new(
        id: impl Into<String>,
        data: DataFrame,
        target_column: impl Into<String>,
        positive_label: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        let target_column = target_column.into();
        let positive_label = positive_label.into();

        if data.height() == 0 {
            return Err(EvalError::InvalidTask(format!("task '{}' has zero rows", id)));
        }

        let target = data.column(&target_column).map_err(|_| {
            EvalError::InvalidTask(format!("target column '{}' not found", target_column))
        })?;

        if target.null_count() > 0 {
            return Err(EvalError::InvalidTask(format!(
                "target column '{}' contains {} missing values",
                target_column,
                target.null_count()
            )));
        }

        let labels = frame::string_values(&data, &target_column)?;
        let labels: Vec<String> = labels.into_iter().flatten().collect();
        let distinct: BTreeSet<&str> = labels.iter().map(String::as_str).collect();

        if distinct.len() != 2 {
            return Err(EvalError::InvalidTask(format!(
                "target column '{}' must be binary, found {} distinct labels",
                target_column,
                distinct.len()
            )));
        }
        if !distinct.contains(positive_label.as_str()) {
            return Err(EvalError::InvalidTask(format!(
                "positive label '{}' does not occur in target column '{}'",
                positive_label, target_column
            )));
        }

        let negative_label = distinct
            .iter()
            .find(|label| **label != positive_label.as_str())
            .map(|label| label.to_string())
            .ok_or_else(|| EvalError::InvalidTask("missing negative label".to_string()))?;

        let truth = labels.iter().map(|label| *label == positive_label).collect();

        let (features, kinds) = Self::normalize_features(&data, &target_column)?;

        Ok(Self {
            id,
            features,
            kinds,
            target_column,
            positive_label,
            negative_label,
            truth,
        })
    }

    /// Cast numeric features to `Float64` and everything else to `String`
    fn normalize_features(
        data: &DataFrame,
        target_column: &str,
    ) -> Result<(DataFrame, Vec<(String, ColumnKind)>)> {
        let mut columns = Vec::new();
        let mut kinds = Vec::new();

        for col in data.get_columns() {
            let name = col.name().to_string();
            if name == target_column {
                continue;
            }

            let (casted, kind) = if is_numeric_dtype(col.dtype()) {
                (col.cast(&DataType::Float64), ColumnKind::Numeric)
            } else {
                (col.cast(&DataType::String), ColumnKind::Categorical)
            };

            let casted = casted.map_err(|e| {
                EvalError::InvalidTask(format!("column '{}' cannot be normalized: {}", name, e))
            })?;
            columns.push(casted);
            kinds.push((name, kind));
        }

        let features = if columns.is_empty() {
            data.select([target_column])?.drop(target_column)?
        } else {
            DataFrame::new(columns)?
        };
        Ok((features, kinds))
    }

    /// Build a new task from transformed data, keeping target and positive label
    pub fn with_data(&self, id: impl Into<String>, data: DataFrame) -> Result<Self> {
        Self::new(id, data, self.target_column.clone(), self.positive_label.clone())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn n_rows(&self) -> usize {
        self.truth.len()
    }

    pub fn n_features(&self) -> usize {
        self.kinds.len()
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn positive_label(&self) -> &str {
        &self.positive_label
    }

    pub fn negative_label(&self) -> &str {
        &self.negative_label
    }

    /// Label string for a binary outcome
    pub fn label_name(&self, positive: bool) -> &str {
        if positive {
            &self.positive_label
        } else {
            &self.negative_label
        }
    }

    /// Feature columns (target excluded)
    pub fn features(&self) -> &DataFrame {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<String> {
        column_names(&self.features)
    }

    /// Kind of every feature column, in column order
    pub fn feature_kinds(&self) -> &[(String, ColumnKind)] {
        &self.kinds
    }

    pub fn feature_kind(&self, name: &str) -> Option<ColumnKind> {
        self.kinds
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, kind)| *kind)
    }

    /// Read-only access to a feature column
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.features
            .column(name)
            .map_err(|_| EvalError::DataError(format!("column '{}' not found", name)))
    }

    /// Positive-class indicator per row
    pub fn truth(&self) -> &[bool] {
        &self.truth
    }

    pub fn positive_count(&self) -> usize {
        self.truth.iter().filter(|&&t| t).count()
    }

    pub fn has_categorical(&self) -> bool {
        self.kinds.iter().any(|(_, kind)| *kind == ColumnKind::Categorical)
    }

    /// Whether any feature of the given kind has missing cells
    pub fn has_missing(&self, kind: ColumnKind) -> bool {
        self.kinds.iter().any(|(name, k)| {
            *k == kind
                && self
                    .features
                    .column(name)
                    .map(|c| c.null_count() > 0)
                    .unwrap_or(false)
        })
    }

    /// Features and labels for a subset of rows
    pub fn select_rows(&self, rows: &[usize]) -> Result<(DataFrame, Vec<bool>)> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.n_rows()) {
            return Err(EvalError::DataError(format!(
                "row index {} out of range for task with {} rows",
                bad,
                self.n_rows()
            )));
        }
        let features = take_rows(&self.features, rows)?;
        let truth = rows.iter().map(|&r| self.truth[r]).collect();
        Ok((features, truth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passengers() -> DataFrame {
        df!(
            "fare" => &[Some(7.25), Some(71.28), None, Some(8.05)],
            "port" => &[Some("S"), Some("C"), Some("S"), None],
            "pclass" => &[3i64, 1, 3, 3],
            "survived" => &["no", "yes", "yes", "no"]
        )
        .unwrap()
    }

    #[test]
    fn test_task_construction() {
        let task = Task::new("titanic", passengers(), "survived", "yes").unwrap();

        assert_eq!(task.n_rows(), 4);
        assert_eq!(task.n_features(), 3);
        assert_eq!(task.negative_label(), "no");
        assert_eq!(task.truth(), &[false, true, true, false]);
        assert_eq!(task.feature_kind("pclass"), Some(ColumnKind::Numeric));
        assert_eq!(task.feature_kind("port"), Some(ColumnKind::Categorical));
        assert!(task.has_missing(ColumnKind::Numeric));
        assert!(task.has_missing(ColumnKind::Categorical));
        assert!(task.column("survived").is_err());
    }

    #[test]
    fn test_missing_target_column() {
        let err = Task::new("t", passengers(), "label", "yes").unwrap_err();
        assert!(matches!(err, EvalError::InvalidTask(_)));
    }

    #[test]
    fn test_three_labels_rejected() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0],
            "y" => &["a", "b", "c"]
        )
        .unwrap();
        let err = Task::new("t", df, "y", "a").unwrap_err();
        assert!(matches!(err, EvalError::InvalidTask(_)));
    }

    #[test]
    fn test_positive_label_must_occur() {
        let err = Task::new("t", passengers(), "survived", "maybe").unwrap_err();
        assert!(matches!(err, EvalError::InvalidTask(_)));
    }

    #[test]
    fn test_zero_rows_rejected() {
        let df = df!(
            "x" => Vec::<f64>::new(),
            "y" => Vec::<&str>::new()
        )
        .unwrap();
        let err = Task::new("t", df, "y", "a").unwrap_err();
        assert!(matches!(err, EvalError::InvalidTask(_)));
    }

    #[test]
    fn test_numeric_target() {
        let df = df!(
            "x" => &[1.0, 2.0, 3.0, 4.0],
            "y" => &[0i64, 1, 1, 0]
        )
        .unwrap();
        let task = Task::new("t", df, "y", "1").unwrap();
        assert_eq!(task.positive_count(), 2);
        assert_eq!(task.label_name(false), "0");
    }

    #[test]
    fn test_select_rows() {
        let task = Task::new("titanic", passengers(), "survived", "yes").unwrap();
        let (features, truth) = task.select_rows(&[1, 3]).unwrap();
        assert_eq!(features.height(), 2);
        assert_eq!(truth, vec![true, false]);
        assert!(task.select_rows(&[10]).is_err());
    }
}
