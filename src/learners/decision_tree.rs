//! CART decision tree
//!
//! Binary splits of the form `x[feature] <= threshold`. Cells holding `NaN` never
//! satisfy the comparison and therefore always follow the right branch, both while
//! growing and while predicting. Leaves store the mean target of their rows, which for
//! 0/1 targets is the positive-class probability.

use super::{choice_param, count_param, invalid_param, optional_depth_param, unknown_param};
use crate::error::{EvalError, Result};
use crate::optimizer::ParameterValue;
use ndarray::{Array1, Array2};
use rand::seq::index;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value: f64,
        n_samples: usize,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Entropy (classification)
    Entropy,
    /// Mean squared error (regression)
    Mse,
}

/// Sufficient statistics of a set of targets
#[derive(Debug, Clone, Copy, Default)]
struct NodeStats {
    count: usize,
    sum: f64,
    sq_sum: f64,
}

impl NodeStats {
    fn add(&mut self, y: f64) {
        self.count += 1;
        self.sum += y;
        self.sq_sum += y * y;
    }

    fn minus(&self, other: &NodeStats) -> NodeStats {
        NodeStats {
            count: self.count - other.count,
            sum: self.sum - other.sum,
            sq_sum: self.sq_sum - other.sq_sum,
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered per split (all when `None`)
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    /// Seed for per-split feature sampling
    pub random_state: Option<u64>,
    n_features: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new_classifier()
    }
}

impl DecisionTree {
    pub const TUNABLE: &'static [&'static str] =
        &["max_depth", "min_samples_split", "min_samples_leaf", "criterion"];

    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self {
            root: None,
            max_depth: Some(30),
            min_samples_split: 20,
            min_samples_leaf: 7,
            max_features: None,
            criterion: Criterion::Gini,
            random_state: None,
            n_features: 0,
        }
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self {
            criterion: Criterion::Mse,
            min_samples_split: 2,
            min_samples_leaf: 1,
            ..Self::new_classifier()
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criterion = criterion;
        self
    }

    pub fn set_param(&mut self, name: &str, value: &ParameterValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = optional_depth_param(name, value)?,
            "min_samples_split" => self.min_samples_split = count_param(name, value, 2)?,
            "min_samples_leaf" => self.min_samples_leaf = count_param(name, value, 1)?,
            "criterion" => {
                self.criterion = match choice_param(name, value)? {
                    "gini" => Criterion::Gini,
                    "entropy" => Criterion::Entropy,
                    other => {
                        return Err(invalid_param(name, other, "expected 'gini' or 'entropy'"))
                    }
                }
            }
            _ => return Err(unknown_param("decision_tree", name)),
        }
        Ok(())
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    /// Fit the tree to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(EvalError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(EvalError::FitFailure("cannot grow a tree on zero rows".to_string()));
        }

        self.n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.random_state.unwrap_or(0));
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng));

        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        rng: &mut Xoshiro256PlusPlus,
    ) -> TreeNode {
        let mut stats = NodeStats::default();
        for &i in indices {
            stats.add(y[i]);
        }

        let n_samples = indices.len();
        let leaf = TreeNode::Leaf {
            value: stats.mean(),
            n_samples,
        };

        if n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || self.impurity(&stats) <= 1e-12
        {
            return leaf;
        }

        let features = self.candidate_features(rng);
        let Some(split) = self.find_best_split(x, y, indices, &stats, &features) else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, split.feature_idx]] <= split.threshold);

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, rng));

        TreeNode::Split {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
            n_samples,
        }
    }

    fn candidate_features(&self, rng: &mut Xoshiro256PlusPlus) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut chosen = index::sample(rng, self.n_features, k.max(1)).into_vec();
                chosen.sort_unstable();
                chosen
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        total: &NodeStats,
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let parent_impurity = self.impurity(total);
        let n = total.count as f64;
        let mut best: Option<SplitCandidate> = None;

        for &feature_idx in features {
            let mut present: Vec<(f64, f64)> = indices
                .iter()
                .map(|&i| (x[[i, feature_idx]], y[i]))
                .filter(|(v, _)| !v.is_nan())
                .collect();
            if present.len() < 2 {
                continue;
            }
            present.sort_by(|a, b| a.0.total_cmp(&b.0));

            // rows with NaN stay on the right side of every threshold
            let mut left = NodeStats::default();
            for k in 0..present.len() - 1 {
                left.add(present[k].1);
                if present[k].0 == present[k + 1].0 {
                    continue;
                }
                let right = total.minus(&left);
                if left.count < self.min_samples_leaf || right.count < self.min_samples_leaf {
                    continue;
                }

                let weighted = (left.count as f64 * self.impurity(&left)
                    + right.count as f64 * self.impurity(&right))
                    / n;
                let gain = parent_impurity - weighted;

                if gain > best.map_or(1e-12, |b| b.gain + 1e-12) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (present[k].0 + present[k + 1].0) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn impurity(&self, stats: &NodeStats) -> f64 {
        if stats.count == 0 {
            return 0.0;
        }
        let p = stats.mean();
        match self.criterion {
            Criterion::Gini => 2.0 * p * (1.0 - p),
            Criterion::Entropy => {
                let term = |q: f64| if q > 0.0 { -q * q.ln() } else { 0.0 };
                term(p) + term(1.0 - p)
            }
            Criterion::Mse => (stats.sq_sum / stats.count as f64 - p * p).max(0.0),
        }
    }

    /// Mean target of the leaf each row falls into
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(EvalError::ModelNotFitted)?;

        if x.ncols() != self.n_features {
            return Err(EvalError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split {
                            feature_idx,
                            threshold,
                            left,
                            right,
                            ..
                        } => {
                            node = if row[*feature_idx] <= *threshold { &**left } else { &**right };
                        }
                    }
                }
            })
            .collect())
    }

    /// Number of leaves in the fitted tree
    pub fn n_leaves(&self) -> usize {
        fn count(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        self.root.as_ref().map_or(0, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(40, |i| if i >= 20 { 1.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_separable_split() {
        let (x, y) = step_data();
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict(&array![[3.0], [35.0]]).unwrap();
        assert_eq!(proba[0], 0.0);
        assert_eq!(proba[1], 1.0);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_nan_routed_right() {
        let (x, y) = step_data();
        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict(&array![[f64::NAN]]).unwrap();
        assert_eq!(proba[0], 1.0);
    }

    #[test]
    fn test_max_depth_zero_is_stump_leaf() {
        let (x, y) = step_data();
        let mut tree = DecisionTree::new_classifier().with_max_depth(0);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[0.0]]).unwrap()[0], 0.5);
    }

    #[test]
    fn test_regressor_mean_leaves() {
        let x = array![[1.0], [2.0], [10.0], [11.0]];
        let y = array![1.0, 1.0, 5.0, 5.0];
        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&array![[1.5], [10.5]]).unwrap().to_vec(), vec![1.0, 5.0]);
    }

    #[test]
    fn test_set_param() {
        let mut tree = DecisionTree::new_classifier();
        tree.set_param("criterion", &ParameterValue::String("entropy".into())).unwrap();
        tree.set_param("max_depth", &ParameterValue::Int(4)).unwrap();
        assert_eq!(tree.criterion, Criterion::Entropy);
        assert_eq!(tree.max_depth, Some(4));
        assert!(tree.set_param("depth", &ParameterValue::Int(4)).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let tree = DecisionTree::new_classifier();
        assert!(matches!(tree.predict(&array![[1.0]]), Err(EvalError::ModelNotFitted)));
    }
}
