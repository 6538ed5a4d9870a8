//! Random Forest implementation

use super::decision_tree::DecisionTree;
use super::models::{check_shapes, distinct_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for the number of features drawn at each split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// All features
    All,
}

impl MaxFeatures {
    fn resolve(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
    is_classification: bool,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
    classes: Vec<f64>,
}

impl RandomForest {
    /// Create a new classifier forest; each split draws sqrt(n_features) features
    pub fn new_classifier(n_estimators: usize) -> Self {
        Self::build(n_estimators, true, MaxFeatures::Sqrt)
    }

    /// Create a new regressor forest; each split sees every feature
    pub fn new_regressor(n_estimators: usize) -> Self {
        Self::build(n_estimators, false, MaxFeatures::All)
    }

    fn build(n_estimators: usize, is_classification: bool, max_features: MaxFeatures) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features,
            bootstrap: true,
            random_state: 42,
            is_classification,
            feature_importances: None,
            n_features: 0,
            classes: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn grow_tree(&self, x: &Array2<f64>, y: &Array1<f64>, tree_idx: usize) -> Result<DecisionTree> {
        let n_samples = x.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state.wrapping_add(tree_idx as u64));

        let sample_indices: Vec<usize> = if self.bootstrap {
            (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
        } else {
            (0..n_samples).collect()
        };
        let x_boot = x.select(Axis(0), &sample_indices);
        let y_boot = y.select(Axis(0), &sample_indices);

        let base = if self.is_classification {
            DecisionTree::new_classifier()
        } else {
            DecisionTree::new_regressor()
        };
        let mut tree = base
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
            .with_max_features(Some(self.max_features.resolve(self.n_features)))
            .with_random_state(rng.next_u64());

        tree.fit_with_classes(&x_boot, &y_boot, self.classes.clone())?;
        Ok(tree)
    }

    fn average_importances(&self) -> Option<Array1<f64>> {
        let mut total = Array1::zeros(self.n_features);
        for importances in self.trees.iter().filter_map(|t| t.feature_importances()) {
            total += &importances;
        }
        let sum = total.sum();
        (sum > 0.0).then(|| total / sum)
    }

    fn check_fitted(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        Ok(())
    }
}

impl Model for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        self.n_features = x.ncols();
        self.classes = if self.is_classification {
            distinct_classes(y)
        } else {
            Vec::new()
        };

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| self.grow_tree(x, y, tree_idx))
            .collect::<Result<Vec<_>>>()?;

        self.trees = trees;
        self.feature_importances = self.average_importances();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_fitted()?;

        if self.is_classification {
            let proba = self.predict_proba(x)?;
            return Ok(proba
                .outer_iter()
                .map(|row| {
                    let best = row
                        .iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc })
                        .0;
                    self.classes[best]
                })
                .collect());
        }

        let predictions = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        let mut mean = Array1::zeros(x.nrows());
        for p in &predictions {
            mean += p;
        }
        Ok(mean / predictions.len() as f64)
    }

    /// Mean of the trees' leaf class frequencies
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_fitted()?;
        if !self.is_classification {
            return Err(PipelineError::UnsupportedOperation(
                "random forest regressor has no class probabilities".to_string(),
            ));
        }

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict_proba(x))
            .collect::<Result<Vec<_>>>()?;

        let mut proba = Array2::zeros((x.nrows(), self.classes.len()));
        for p in &per_tree {
            proba += p;
        }
        Ok(proba / per_tree.len() as f64)
    }

    fn classes(&self) -> Option<&[f64]> {
        self.is_classification.then_some(self.classes.as_slice())
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classifier() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [0.2, 0.2], [1.0, 1.0], [1.1, 1.1], [1.2, 1.2]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut rf = RandomForest::new_classifier(10);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 5, "only {} correct", correct);
    }

    #[test]
    fn test_regressor() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut rf = RandomForest::new_regressor(10);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let mse: f64 = predictions.iter().zip(y.iter()).map(|(p, a)| (p - a).powi(2)).sum::<f64>() / 5.0;
        assert!(mse < 1.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let x = array![[0.0, 0.0], [0.5, 0.2], [1.0, 1.0], [1.2, 0.9]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut rf = RandomForest::new_classifier(10);
        rf.fit(&x, &y).unwrap();

        let proba = rf.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (4, 2));
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let x = array![[1.0, 3.0], [2.0, 1.0], [3.0, 4.0], [4.0, 2.0], [5.0, 5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];

        let mut a = RandomForest::new_regressor(5).with_random_state(3);
        let mut b = RandomForest::new_regressor(5).with_random_state(3);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rf = RandomForest::new_regressor(10);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_regressor_has_no_proba() {
        let mut rf = RandomForest::new_regressor(2);
        rf.fit(&array![[1.0], [2.0]], &array![1.0, 2.0]).unwrap();
        assert!(matches!(
            rf.predict_proba(&array![[1.0]]),
            Err(PipelineError::UnsupportedOperation(_))
        ));
    }
}
