//! Search space definition for hyperparameters

use crate::error::{EvalError, Result};
use crate::learners::LearnerKind;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParameterType {
    /// Continuous float parameter
    Float {
        low: f64,
        high: f64,
        #[serde(default)]
        log_scale: bool,
    },
    /// Integer parameter
    Int { low: i64, high: i64 },
    /// Categorical parameter
    Categorical { choices: Vec<String> },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: false,
            },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float {
                low,
                high,
                log_scale: true,
            },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Categorical {
                choices: choices.into_iter().map(String::from).collect(),
            },
        }
    }

    /// Sample a value uniformly within the bounds (log-uniformly on log scale)
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float {
                low,
                high,
                log_scale,
            } => {
                let val = if *log_scale {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
                } else {
                    rng.gen::<f64>() * (high - low) + low
                };
                // exp/ln round trips can land a hair outside the bounds
                ParameterValue::Float(val.clamp(*low, *high))
            }
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            ParameterType::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::String(choices[idx].clone())
            }
        }
    }

    /// Whether `value` lies within this parameter's bounds or choices
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (&self.param_type, value) {
            (ParameterType::Float { low, high, .. }, v) => {
                v.as_float().map_or(false, |x| x >= *low && x <= *high)
            }
            (ParameterType::Int { low, high }, ParameterValue::Int(v)) => v >= low && v <= high,
            (ParameterType::Categorical { choices }, ParameterValue::String(s)) => {
                choices.iter().any(|c| c == s)
            }
            _ => false,
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| EvalError::InvalidParameter {
            name: self.name.clone(),
            value: format!("{:?}", self.param_type),
            reason: reason.to_string(),
        };

        match &self.param_type {
            ParameterType::Float {
                low,
                high,
                log_scale,
            } => {
                if !low.is_finite() || !high.is_finite() {
                    return Err(invalid("bounds must be finite"));
                }
                if low > high {
                    return Err(invalid("lower bound exceeds upper bound"));
                }
                if *log_scale && *low <= 0.0 {
                    return Err(invalid("log-scale bounds must be positive"));
                }
            }
            ParameterType::Int { low, high } => {
                if low > high {
                    return Err(invalid("lower bound exceeds upper bound"));
                }
            }
            ParameterType::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(invalid("no choices given"));
                }
            }
        }
        Ok(())
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int; floats only convert when integral
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

/// Sampled configuration, keyed by parameter name
pub type TrialParams = BTreeMap<String, ParameterValue>;

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add a log-scale float parameter
    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::log_float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Add a categorical parameter
    pub fn categorical(self, name: impl Into<String>, choices: Vec<&str>) -> Self {
        self.add(Parameter::categorical(name, choices))
    }

    /// Default bounds for every tunable hyperparameter of `learner`
    pub fn default_for(learner: &LearnerKind) -> Self {
        match learner {
            LearnerKind::Featureless => Self::new(),
            LearnerKind::LogisticRegression(_) => Self::new()
                .log_float("alpha", 1e-6, 1.0)
                .log_float("learning_rate", 1e-3, 1.0),
            LearnerKind::LinearDiscriminant(_) => Self::new().float("shrinkage", 0.0, 1.0),
            LearnerKind::DecisionTree(_) => Self::new()
                .int("max_depth", 1, 30)
                .int("min_samples_split", 2, 60)
                .int("min_samples_leaf", 1, 30)
                .categorical("criterion", vec!["gini", "entropy"]),
            LearnerKind::RandomForest(_) => Self::new()
                .int("n_estimators", 50, 300)
                .int("min_samples_leaf", 1, 20)
                .float("max_features", 0.1, 1.0),
            LearnerKind::GradientBoosting(_) => Self::new()
                .int("n_estimators", 20, 300)
                .log_float("learning_rate", 1e-3, 0.5)
                .int("max_depth", 1, 8)
                .float("subsample", 0.5, 1.0),
            LearnerKind::NeuralNetwork(_) => Self::new()
                .int("hidden_units", 2, 64)
                .log_float("learning_rate", 1e-4, 0.1)
                .log_float("alpha", 1e-6, 1e-1)
                .categorical("activation", vec!["relu", "tanh"]),
        }
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check bounds, choices and name uniqueness
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(EvalError::ConfigError(format!(
                    "parameter '{}' declared more than once",
                    param.name
                )));
            }
            param.validate()?;
        }
        Ok(())
    }

    /// Check every parameter is a tunable hyperparameter of `learner`
    pub fn validate_for(&self, learner: &LearnerKind) -> Result<()> {
        self.validate()?;
        let tunable = learner.tunable_params();
        for param in &self.parameters {
            if !tunable.contains(&param.name.as_str()) {
                return Err(EvalError::InvalidParameter {
                    name: param.name.clone(),
                    value: String::new(),
                    reason: format!(
                        "not tunable for learner '{}' (tunable: {})",
                        learner.name(),
                        tunable.join(", ")
                    ),
                });
            }
        }
        Ok(())
    }

    /// Sample a random configuration, drawing parameters in declaration order
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("subsample", 0.5, 1.0)
            .int("n_estimators", 10, 1000)
            .categorical("criterion", vec!["gini", "entropy"]);

        assert_eq!(space.len(), 3);
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let space = SearchSpace::new()
            .log_float("lr", 0.0001, 0.1)
            .int("depth", 1, 3)
            .categorical("criterion", vec!["gini", "entropy"]);

        for _ in 0..200 {
            let params = space.sample(&mut rng);
            for param in space.parameters() {
                assert!(param.contains(&params[&param.name]), "{:?}", params);
            }
        }
    }

    #[test]
    fn test_validation_rejects_bad_bounds() {
        assert!(SearchSpace::new().float("x", 2.0, 1.0).validate().is_err());
        assert!(SearchSpace::new().log_float("x", 0.0, 1.0).validate().is_err());
        assert!(SearchSpace::new().categorical("c", vec![]).validate().is_err());
        assert!(SearchSpace::new().int("n", 1, 2).int("n", 1, 3).validate().is_err());
    }

    #[test]
    fn test_default_spaces_match_learners() {
        for learner in LearnerKind::all() {
            let space = SearchSpace::default_for(&learner);
            space.validate_for(&learner).unwrap();
        }
    }

    #[test]
    fn test_unknown_parameter_for_learner() {
        let space = SearchSpace::new().int("n_estimators", 1, 5);
        let err = space.validate_for(&LearnerKind::Featureless).unwrap_err();
        assert!(matches!(err, EvalError::InvalidParameter { .. }));
    }

    #[test]
    fn test_json_round_trip_shape() {
        let json = r#"{"parameters":[{"name":"alpha","type":"float","low":0.001,"high":1.0,"log_scale":true},{"name":"max_depth","type":"int","low":1,"high":5}]}"#;
        let space: SearchSpace = serde_json::from_str(json).unwrap();
        assert_eq!(space.len(), 2);
        assert_eq!(space.get("max_depth").unwrap().param_type, ParameterType::Int { low: 1, high: 5 });
    }
}
