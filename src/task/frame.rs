//! Column helpers over polars data frames
//!
//! Feature columns are normalized to two physical types: `Float64` for numeric data and
//! `String` for categorical data. Missing cells are polars nulls and surface here as
//! `None`.

use crate::error::{EvalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Logical kind of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Check if dtype is numeric
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Kind of a column as stored in the frame
pub fn column_kind(df: &DataFrame, name: &str) -> Result<ColumnKind> {
    let col = df
        .column(name)
        .map_err(|_| EvalError::DataError(format!("column '{}' not found", name)))?;
    if is_numeric_dtype(col.dtype()) {
        Ok(ColumnKind::Numeric)
    } else {
        Ok(ColumnKind::Categorical)
    }
}

/// Read a column as optional floats
pub fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df
        .column(name)
        .map_err(|_| EvalError::DataError(format!("column '{}' not found", name)))?;
    let casted = col.cast(&DataType::Float64)?;
    let ca = casted.as_materialized_series().f64()?;
    Ok(ca.into_iter().collect())
}

/// Read a column as optional strings
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df
        .column(name)
        .map_err(|_| EvalError::DataError(format!("column '{}' not found", name)))?;
    let casted = col.cast(&DataType::String)?;
    let ca = casted.as_materialized_series().str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Build a `Float64` column
pub fn float_column(name: &str, values: Vec<Option<f64>>) -> Column {
    Series::new(name.into(), values).into()
}

/// Build a `String` column
pub fn string_column(name: &str, values: Vec<Option<String>>) -> Column {
    Series::new(name.into(), values).into()
}

/// Replace (or append) a column in a copy of `df`
pub fn replace_column(df: &DataFrame, column: Column) -> Result<DataFrame> {
    let mut result = df.clone();
    result.with_column(column)?;
    Ok(result)
}

/// Gather rows by position
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("rows".into(), rows.iter().map(|&r| r as IdxSize).collect());
    Ok(df.take(&idx)?)
}

/// Names of all columns in order
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect()
}
