//! CART decision tree
//!
//! Splits are found with a sorted sweep per candidate feature, and the
//! candidate features of each node are scanned in parallel.

use super::models::{check_shapes, distinct_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node with prediction value
    Leaf {
        value: f64,
        n_samples: usize,
        /// Class frequencies, indexed like the tree's classes (empty for regression)
        distribution: Vec<f64>,
    },
    /// Internal node; samples with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Impurity criterion
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Criterion {
    /// Gini impurity (classification)
    Gini,
    /// Mean squared error (regression)
    Mse,
}

/// Sufficient statistics of a set of samples
#[derive(Debug, Clone)]
enum NodeStats {
    Classes(Vec<usize>),
    Moments { sum: f64, sq_sum: f64 },
}

impl NodeStats {
    fn impurity(&self, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        let n = n as f64;
        match self {
            NodeStats::Classes(counts) => {
                1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
            }
            NodeStats::Moments { sum, sq_sum } => (sq_sum / n - (sum / n).powi(2)).max(0.0),
        }
    }

    fn add(&mut self, target: Target) {
        match (self, target) {
            (NodeStats::Classes(counts), Target::Class(c)) => counts[c] += 1,
            (NodeStats::Moments { sum, sq_sum }, Target::Value(v)) => {
                *sum += v;
                *sq_sum += v * v;
            }
            _ => {}
        }
    }

    fn remove(&mut self, target: Target) {
        match (self, target) {
            (NodeStats::Classes(counts), Target::Class(c)) => counts[c] -= 1,
            (NodeStats::Moments { sum, sq_sum }, Target::Value(v)) => {
                *sum -= v;
                *sq_sum -= v * v;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Class(usize),
    Value(f64),
}

/// Candidate split of one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Decision tree model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth; `None` grows until leaves are pure
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features drawn at random for each node; `None` uses all of them
    pub max_features: Option<usize>,
    pub criterion: Criterion,
    pub random_state: u64,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
    classes: Vec<f64>,
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new_classifier() -> Self {
        Self::with_criterion(Criterion::Gini)
    }

    /// Create a new regressor tree
    pub fn new_regressor() -> Self {
        Self::with_criterion(Criterion::Mse)
    }

    fn with_criterion(criterion: Criterion) -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
            random_state: 0,
            n_features: 0,
            feature_importances: None,
            classes: Vec::new(),
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    fn is_classification(&self) -> bool {
        self.criterion == Criterion::Gini
    }

    /// Fit against a fixed class list, so trees grown on bootstrap samples
    /// report distributions with the same columns.
    pub(crate) fn fit_with_classes(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        classes: Vec<f64>,
    ) -> Result<()> {
        check_shapes(x, y)?;
        self.n_features = x.ncols();

        let targets: Vec<Target> = if self.is_classification() {
            y.iter()
                .map(|v| {
                    classes
                        .iter()
                        .position(|c| c == v)
                        .map(Target::Class)
                        .ok_or_else(|| PipelineError::TrainingError(format!("unknown class {}", v)))
                })
                .collect::<Result<_>>()?
        } else {
            y.iter().map(|&v| Target::Value(v)).collect()
        };
        self.classes = classes;

        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..x.nrows()).collect();

        let root = self.build_tree(x, &targets, &indices, 0, &mut importances, &mut rng);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|imp| *imp /= total);
        }

        self.root = Some(root);
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn empty_stats(&self) -> NodeStats {
        if self.is_classification() {
            NodeStats::Classes(vec![0; self.classes.len()])
        } else {
            NodeStats::Moments { sum: 0.0, sq_sum: 0.0 }
        }
    }

    fn stats_of(&self, targets: &[Target], indices: &[usize]) -> NodeStats {
        let mut stats = self.empty_stats();
        for &i in indices {
            stats.add(targets[i]);
        }
        stats
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        targets: &[Target],
        indices: &[usize],
        depth: usize,
        importances: &mut [f64],
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let stats = self.stats_of(targets, indices);
        let impurity = stats.impurity(n_samples);

        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.is_some_and(|d| depth >= d)
            || impurity <= f64::EPSILON;

        if should_stop {
            return self.make_leaf(&stats, n_samples);
        }

        let features = self.candidate_features(rng);
        let Some(best) = self.find_best_split(x, targets, indices, &stats, &features) else {
            return self.make_leaf(&stats, n_samples);
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        importances[best.feature_idx] += n_samples as f64 * best.gain;

        let left = Box::new(self.build_tree(x, targets, &left_indices, depth + 1, importances, rng));
        let right = Box::new(self.build_tree(x, targets, &right_indices, depth + 1, importances, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Features considered at a node, in ascending index order
    fn candidate_features(&self, rng: &mut ChaCha8Rng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < self.n_features => {
                let mut picked = index::sample(rng, self.n_features, k.max(1)).into_vec();
                picked.sort_unstable();
                picked
            }
            _ => (0..self.n_features).collect(),
        }
    }

    fn find_best_split(
        &self,
        x: &Array2<f64>,
        targets: &[Target],
        indices: &[usize],
        parent: &NodeStats,
        features: &[usize],
    ) -> Option<SplitCandidate> {
        let parent_impurity = parent.impurity(indices.len());

        let per_feature: Vec<Option<SplitCandidate>> = features
            .par_iter()
            .map(|&feature_idx| {
                self.best_split_for_feature(x, targets, indices, parent, parent_impurity, feature_idx)
            })
            .collect();

        // first feature wins ties
        per_feature.into_iter().flatten().fold(None, |best, cand| match best {
            Some(b) if b.gain >= cand.gain => Some(b),
            _ => Some(cand),
        })
    }

    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        targets: &[Target],
        indices: &[usize],
        parent: &NodeStats,
        parent_impurity: f64,
        feature_idx: usize,
    ) -> Option<SplitCandidate> {
        let n = indices.len();
        let mut order = indices.to_vec();
        order.sort_by(|&a, &b| x[[a, feature_idx]].total_cmp(&x[[b, feature_idx]]));

        let mut left = self.empty_stats();
        let mut right = parent.clone();
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n - 1 {
            let sample = order[pos];
            left.add(targets[sample]);
            right.remove(targets[sample]);

            let here = x[[sample, feature_idx]];
            let next = x[[order[pos + 1], feature_idx]];
            if here == next {
                continue;
            }

            let n_left = pos + 1;
            let n_right = n - n_left;
            if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                continue;
            }

            let weighted = (n_left as f64 * left.impurity(n_left)
                + n_right as f64 * right.impurity(n_right))
                / n as f64;
            let gain = parent_impurity - weighted;

            if gain > best.map_or(0.0, |b| b.gain) {
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold: (here + next) / 2.0,
                    gain,
                });
            }
        }

        best
    }

    fn make_leaf(&self, stats: &NodeStats, n_samples: usize) -> TreeNode {
        match stats {
            NodeStats::Classes(counts) => {
                let total = n_samples.max(1) as f64;
                // smallest class wins ties
                let best = counts
                    .iter()
                    .enumerate()
                    .fold((0, 0), |acc, (i, &c)| if c > acc.1 { (i, c) } else { acc })
                    .0;
                TreeNode::Leaf {
                    value: self.classes.get(best).copied().unwrap_or(0.0),
                    n_samples,
                    distribution: counts.iter().map(|&c| c as f64 / total).collect(),
                }
            }
            NodeStats::Moments { sum, .. } => TreeNode::Leaf {
                value: if n_samples > 0 { sum / n_samples as f64 } else { 0.0 },
                n_samples,
                distribution: Vec::new(),
            },
        }
    }

    fn leaf_for<'a>(&'a self, mut node: &'a TreeNode, sample: ArrayView1<f64>) -> &'a TreeNode {
        while let TreeNode::Split { feature_idx, threshold, left, right, .. } = node {
            node = if sample[*feature_idx] <= *threshold { &**left } else { &**right };
        }
        node
    }

    fn check_input(&self, x: &Array2<f64>) -> Result<&TreeNode> {
        let root = self.root.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(root)
    }

    /// Get tree depth
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
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

impl Model for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let classes = if self.is_classification() {
            distinct_classes(y)
        } else {
            Vec::new()
        };
        self.fit_with_classes(x, y, classes)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.check_input(x)?;
        Ok(x.outer_iter()
            .map(|row| match self.leaf_for(root, row) {
                TreeNode::Leaf { value, .. } => *value,
                TreeNode::Split { .. } => 0.0,
            })
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_classification() {
            return Err(PipelineError::UnsupportedOperation(
                "regression tree has no class probabilities".to_string(),
            ));
        }
        let root = self.check_input(x)?;
        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for (i, row) in x.outer_iter().enumerate() {
            if let TreeNode::Leaf { distribution, .. } = self.leaf_for(root, row) {
                for (j, p) in distribution.iter().enumerate() {
                    proba[[i, j]] = *p;
                }
            }
        }
        Ok(proba)
    }

    fn classes(&self) -> Option<&[f64]> {
        self.is_classification().then_some(self.classes.as_slice())
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn is_fitted(&self) -> bool {
        self.root.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier_separates_classes() {
        let x = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn test_regressor_fits_training_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut tree = DecisionTree::new_regressor();
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_max_depth() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![0.0, 1.0, 0.0, 1.0];

        let mut tree = DecisionTree::new_classifier().with_max_depth(Some(1));
        tree.fit(&x, &y).unwrap();

        assert!(tree.depth() <= 1);
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit(&x, &y).unwrap();

        let importances = tree.feature_importances().unwrap();
        assert_eq!(importances[0], 1.0);
        assert_eq!(importances[1], 0.0);
    }

    #[test]
    fn test_proba_uses_given_classes() {
        let x = array![[0.0], [1.0]];
        let y = array![0.0, 2.0];

        let mut tree = DecisionTree::new_classifier();
        tree.fit_with_classes(&x, &y, vec![0.0, 1.0, 2.0]).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        assert_eq!(proba.row(1).to_vec(), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_random_feature_subset_is_seeded() {
        let x = array![[1.0, 5.0, 0.0], [2.0, 4.0, 1.0], [3.0, 3.0, 0.0], [4.0, 2.0, 1.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let fit = |seed| {
            let mut tree = DecisionTree::new_regressor()
                .with_max_features(Some(1))
                .with_random_state(seed);
            tree.fit(&x, &y).unwrap();
            tree
        };
        assert_eq!(fit(7), fit(7));
    }

    #[test]
    fn test_min_samples_split_makes_leaf() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 2.0, 3.0];
        let mut tree = DecisionTree::new_regressor().with_min_samples_split(10);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict(&x).unwrap(), array![2.0, 2.0, 2.0]);
    }
}
