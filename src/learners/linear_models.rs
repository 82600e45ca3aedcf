//! Linear classifiers: logistic regression and linear discriminant analysis

use super::{count_param, float_param, invalid_param, unknown_param};
use crate::error::{EvalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve the symmetric positive-definite system `Ax = b` by Cholesky decomposition,
/// retrying once with a small ridge when `A` is not positive definite.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    cholesky_solve_inner(a, b).or_else(|| {
        let mut a_reg = a.clone();
        let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64 + 1e-10;
        for k in 0..n {
            a_reg[[k, k]] += ridge;
        }
        cholesky_solve_inner(&a_reg, b)
    })
}

fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L * y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Backward substitution: L^T * x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// Per-column centering and scaling learned from training rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    pub fn fit(x: &Array2<f64>) -> Self {
        let n_features = x.ncols();
        let mean = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(n_features));
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-12 && s.is_finite() { s } else { 1.0 });
        Self { mean, scale }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}

/// Logistic regression for binary classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Fitted coefficients on the standardized scale
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: Option<f64>,
    /// Regularization strength (L2)
    pub alpha: f64,
    /// Maximum iterations
    pub max_iter: usize,
    /// Convergence tolerance
    pub tol: f64,
    /// Learning rate
    pub learning_rate: f64,
    standardizer: Option<Standardizer>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub const TUNABLE: &'static [&'static str] = &["alpha", "learning_rate", "max_iter"];

    /// Create a new logistic regression model
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: None,
            alpha: 1e-4,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.5,
            standardizer: None,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set learning rate
    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "alpha" => {
                let alpha = float_param(name, value)?;
                if alpha < 0.0 {
                    return Err(invalid_param(name, alpha, "must be non-negative"));
                }
                self.alpha = alpha;
            }
            "learning_rate" => {
                let lr = float_param(name, value)?;
                if lr <= 0.0 {
                    return Err(invalid_param(name, lr, "must be positive"));
                }
                self.learning_rate = lr;
            }
            "max_iter" => self.max_iter = count_param(name, value, 1)?,
            _ => return Err(unknown_param("logistic_regression", name)),
        }
        Ok(())
    }

    /// Fit the model using full-batch gradient descent on standardized inputs
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

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

        let mut weights = Array1::<f64>::zeros(n_features);
        let mut bias = 0.0;

        for _iter in 0..self.max_iter {
            let predictions = sigmoid(&(xs.dot(&weights) + bias));

            let errors = &predictions - y;
            let dw = (xs.t().dot(&errors) / n_samples as f64) + (self.alpha * &weights);
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            weights = weights - self.learning_rate * dw;
            bias -= self.learning_rate * db;
        }

        if weights.iter().any(|w| !w.is_finite()) || !bias.is_finite() {
            return Err(EvalError::FitFailure(
                "logistic regression diverged".to_string(),
            ));
        }

        self.coefficients = Some(weights);
        self.intercept = Some(bias);
        self.standardizer = Some(standardizer);
        Ok(self)
    }

    /// Predict probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(coefficients), Some(standardizer)) = (&self.coefficients, &self.standardizer)
        else {
            return Err(EvalError::ModelNotFitted);
        };
        let intercept = self.intercept.unwrap_or(0.0);

        Ok(sigmoid(&(standardizer.transform(x).dot(coefficients) + intercept)))
    }
}

/// Linear discriminant analysis with a pooled, optionally shrunk, covariance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearDiscriminant {
    /// Shrinkage towards a scaled identity, in [0, 1]
    pub shrinkage: f64,
    weights: Option<Array1<f64>>,
    bias: f64,
}

impl Default for LinearDiscriminant {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearDiscriminant {
    pub const TUNABLE: &'static [&'static str] = &["shrinkage"];

    pub fn new() -> Self {
        Self {
            shrinkage: 0.0,
            weights: None,
            bias: 0.0,
        }
    }

    pub fn with_shrinkage(mut self, shrinkage: f64) -> Self {
        self.shrinkage = shrinkage;
        self
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "shrinkage" => {
                let s = float_param(name, value)?;
                if !(0.0..=1.0).contains(&s) {
                    return Err(invalid_param(name, s, "must be in [0, 1]"));
                }
                self.shrinkage = s;
            }
            _ => return Err(unknown_param("lda", name)),
        }
        Ok(())
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(EvalError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let pos: Vec<usize> = (0..n_samples).filter(|&i| y[i] >= 0.5).collect();
        let neg: Vec<usize> = (0..n_samples).filter(|&i| y[i] < 0.5).collect();
        if pos.is_empty() || neg.is_empty() {
            return Err(EvalError::FitFailure(
                "LDA needs both classes in the training partition".to_string(),
            ));
        }

        let x_pos = x.select(Axis(0), &pos);
        let x_neg = x.select(Axis(0), &neg);
        let zeros = || Array1::<f64>::zeros(n_features);
        let mu_pos = x_pos.mean_axis(Axis(0)).unwrap_or_else(zeros);
        let mu_neg = x_neg.mean_axis(Axis(0)).unwrap_or_else(zeros);

        let centered_pos = &x_pos - &mu_pos;
        let centered_neg = &x_neg - &mu_neg;
        let dof = (n_samples.saturating_sub(2)).max(1) as f64;
        let mut cov = (centered_pos.t().dot(&centered_pos) + centered_neg.t().dot(&centered_neg)) / dof;

        let avg_var = if n_features > 0 {
            cov.diag().sum() / n_features as f64
        } else {
            0.0
        };
        let target = avg_var.max(1e-12);
        cov *= 1.0 - self.shrinkage;
        for k in 0..n_features {
            cov[[k, k]] += self.shrinkage * target + 1e-9 * target;
        }

        let diff = &mu_pos - &mu_neg;
        let weights = cholesky_solve(&cov, &diff).ok_or_else(|| {
            EvalError::FitFailure("pooled covariance is singular".to_string())
        })?;

        let midpoint = (&mu_pos + &mu_neg) * 0.5;
        let prior_log_ratio = (pos.len() as f64 / neg.len() as f64).ln();
        self.bias = prior_log_ratio - midpoint.dot(&weights);
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let weights = self.weights.as_ref().ok_or(EvalError::ModelNotFitted)?;
        Ok(sigmoid(&(x.dot(weights) + self.bias)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = array![
            [1.0, 2.0],
            [1.5, 1.8],
            [2.0, 2.2],
            [1.2, 2.5],
            [6.0, 8.0],
            [6.5, 7.5],
            [7.0, 8.2],
            [6.2, 7.9]
        ];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_logistic_regression() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        for (p, t) in proba.iter().zip(y.iter()) {
            assert_eq!(*p >= 0.5, *t == 1.0);
        }
    }

    #[test]
    fn test_lda_separates_classes() {
        let (x, y) = separable();
        let mut model = LinearDiscriminant::new().with_shrinkage(0.1);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&array![[1.0, 2.0], [7.0, 8.0]]).unwrap();
        assert!(proba[0] < 0.5);
        assert!(proba[1] > 0.5);
    }

    #[test]
    fn test_lda_single_class_fails() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0, 1.0];
        let err = LinearDiscriminant::new().fit(&x, &y).unwrap_err();
        assert!(matches!(err, EvalError::FitFailure(_)));
    }

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();
        let back = a.dot(&x);
        assert!((back[0] - 2.0).abs() < 1e-10);
        assert!((back[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_constant_column_standardizes_safely() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let s = Standardizer::fit(&x);
        assert!(s.transform(&x).iter().all(|v| v.is_finite()));
    }
}
