//! Neural Network (Multi-Layer Perceptron) classifier
//!
//! Feedforward network with one sigmoid output unit, trained with mini-batch SGD with
//! momentum on the binary cross-entropy. Inputs are standardized with training
//! statistics.

use super::linear_models::Standardizer;
use super::{choice_param, count_param, float_param, invalid_param, unknown_param};
use crate::error::{EvalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Activation function for hidden layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Rectified Linear Unit
    #[default]
    ReLU,
    Sigmoid,
    Tanh,
}

/// Neural Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPConfig {
    /// Hidden layer sizes
    pub hidden_layers: Vec<usize>,
    /// Activation function for hidden layers
    pub activation: Activation,
    pub learning_rate: f64,
    /// Number of epochs
    pub max_epochs: usize,
    pub batch_size: usize,
    /// L2 regularization
    pub alpha: f64,
    pub momentum: f64,
    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for MLPConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![16],
            activation: Activation::ReLU,
            learning_rate: 0.01,
            max_epochs: 100,
            batch_size: 32,
            alpha: 0.0001,
            momentum: 0.9,
            random_state: None,
        }
    }
}

impl MLPConfig {
    pub const TUNABLE: &'static [&'static str] =
        &["hidden_units", "learning_rate", "alpha", "max_epochs", "activation"];

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "hidden_units" => self.hidden_layers = vec![count_param(name, value, 1)?],
            "max_epochs" => self.max_epochs = count_param(name, value, 1)?,
            "learning_rate" => {
                let lr = float_param(name, value)?;
                if lr <= 0.0 {
                    return Err(invalid_param(name, lr, "must be positive"));
                }
                self.learning_rate = lr;
            }
            "alpha" => {
                let alpha = float_param(name, value)?;
                if alpha < 0.0 {
                    return Err(invalid_param(name, alpha, "must be non-negative"));
                }
                self.alpha = alpha;
            }
            "activation" => {
                self.activation = match choice_param(name, value)? {
                    "relu" => Activation::ReLU,
                    "sigmoid" => Activation::Sigmoid,
                    "tanh" => Activation::Tanh,
                    other => {
                        return Err(invalid_param(
                            name,
                            other,
                            "expected 'relu', 'sigmoid' or 'tanh'",
                        ))
                    }
                }
            }
            _ => return Err(unknown_param("neural_network", name)),
        }
        Ok(())
    }
}

/// Multi-Layer Perceptron binary classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPClassifier {
    config: MLPConfig,
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    standardizer: Option<Standardizer>,
}

impl MLPClassifier {
    pub fn new(config: MLPConfig) -> Self {
        Self {
            config,
            weights: Vec::new(),
            biases: Vec::new(),
            standardizer: None,
        }
    }

    /// Fit the model
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples != y.len() {
            return Err(EvalError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(EvalError::FitFailure("empty training partition".to_string()));
        }

        let standardizer = Standardizer::fit(x);
        let xs = standardizer.transform(x);
        let y_col = y.clone().insert_axis(Axis(1));

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state.unwrap_or(0));
        self.initialize_weights(x.ncols(), &mut rng);

        let mut velocities_w: Vec<Array2<f64>> =
            self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect();
        let mut velocities_b: Vec<Array1<f64>> =
            self.biases.iter().map(|b| Array1::zeros(b.len())).collect();

        let batch_size = self.config.batch_size.max(1);
        let mut indices: Vec<usize> = (0..n_samples).collect();

        for _epoch in 0..self.config.max_epochs {
            indices.shuffle(&mut rng);

            for batch in indices.chunks(batch_size) {
                let x_batch = xs.select(Axis(0), batch);
                let y_batch = y_col.select(Axis(0), batch);

                let (activations, z_values) = self.forward(&x_batch);
                let gradients = self.backward(&y_batch, &activations, &z_values);

                for (i, (grad_w, grad_b)) in gradients.into_iter().enumerate() {
                    let grad_w = grad_w + &self.weights[i] * self.config.alpha;
                    velocities_w[i] = &velocities_w[i] * self.config.momentum
                        - &grad_w * self.config.learning_rate;
                    velocities_b[i] = &velocities_b[i] * self.config.momentum
                        - &grad_b * self.config.learning_rate;

                    self.weights[i] += &velocities_w[i];
                    self.biases[i] += &velocities_b[i];
                }
            }
        }

        if self
            .weights
            .iter()
            .any(|w| w.iter().any(|v| !v.is_finite()))
        {
            return Err(EvalError::FitFailure("network weights diverged".to_string()));
        }

        self.standardizer = Some(standardizer);
        Ok(())
    }

    /// Predict positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let standardizer = self.standardizer.as_ref().ok_or(EvalError::ModelNotFitted)?;
        let (activations, _) = self.forward(&standardizer.transform(x));
        let output = activations
            .last()
            .ok_or(EvalError::ModelNotFitted)?
            .column(0)
            .to_owned();
        Ok(output)
    }

    fn initialize_weights(&mut self, n_features: usize, rng: &mut Xoshiro256PlusPlus) {
        self.weights.clear();
        self.biases.clear();

        let mut layer_sizes = vec![n_features];
        layer_sizes.extend(&self.config.hidden_layers);
        layer_sizes.push(1);

        for pair in layer_sizes.windows(2) {
            let (n_in, n_out) = (pair[0], pair[1]);
            let scale = (2.0 / (n_in + n_out).max(1) as f64).sqrt();
            let weights =
                Array2::from_shape_fn((n_in, n_out), |_| rng.gen::<f64>() * 2.0 * scale - scale);

            self.weights.push(weights);
            self.biases.push(Array1::zeros(n_out));
        }
    }

    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let mut activations = vec![x.clone()];
        let mut z_values = Vec::with_capacity(self.weights.len());
        let last = self.weights.len().saturating_sub(1);

        for (i, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = activations[i].dot(w) + b;
            let a = if i < last {
                self.activate(&z)
            } else {
                z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
            };
            z_values.push(z);
            activations.push(a);
        }

        (activations, z_values)
    }

    fn backward(
        &self,
        y: &Array2<f64>,
        activations: &[Array2<f64>],
        z_values: &[Array2<f64>],
    ) -> Vec<(Array2<f64>, Array1<f64>)> {
        let n = y.nrows() as f64;
        let mut gradients = Vec::with_capacity(self.weights.len());

        // sigmoid output with cross-entropy: dL/dz = a - y
        let mut delta = (&activations[activations.len() - 1] - y) / n;

        for i in (0..self.weights.len()).rev() {
            let grad_w = activations[i].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0));
            gradients.push((grad_w, grad_b));

            if i > 0 {
                delta = delta.dot(&self.weights[i].t()) * self.activate_derivative(&z_values[i - 1]);
            }
        }

        gradients.reverse();
        gradients
    }

    fn activate(&self, z: &Array2<f64>) -> Array2<f64> {
        match self.config.activation {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::Sigmoid => z.mapv(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => z.mapv(f64::tanh),
        }
    }

    fn activate_derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self.config.activation {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::Sigmoid => z.mapv(|v| {
                let s = 1.0 / (1.0 + (-v).exp());
                s * (1.0 - s)
            }),
            Activation::Tanh => z.mapv(|v| 1.0 - v.tanh().powi(2)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| {
            let offset = if i < 30 { -2.0 } else { 2.0 };
            offset + ((i + j) % 5) as f64 * 0.1
        });
        let y = Array1::from_shape_fn(60, |i| if i < 30 { 0.0 } else { 1.0 });
        (x, y)
    }

    #[test]
    fn test_mlp_classifier() {
        let (x, y) = create_data();
        let config = MLPConfig {
            max_epochs: 50,
            random_state: Some(5),
            ..Default::default()
        };
        let mut model = MLPClassifier::new(config);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 60);
        assert!(proba[0] < 0.5);
        assert!(proba[59] > 0.5);
    }

    #[test]
    fn test_activation_param() {
        let mut config = MLPConfig::default();
        config.set_param("activation", &ParameterValue::String("tanh".into())).unwrap();
        assert_eq!(config.activation, Activation::Tanh);
        assert!(config.set_param("activation", &ParameterValue::String("gelu".into())).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let model = MLPClassifier::new(MLPConfig::default());
        assert!(model.predict_proba(&Array2::zeros((1, 2))).is_err());
    }
}
