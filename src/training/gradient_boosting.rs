//! Gradient boosted regression trees with squared-error loss

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::decision_tree::DecisionTree;
use super::models::{check_shapes, Model};
use crate::error::{PipelineError, Result};

/// Gradient Boosting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Maximum tree depth
    pub max_depth: usize,
    /// Minimum samples per leaf
    pub min_samples_leaf: usize,
    pub random_state: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_leaf: 1,
            random_state: 42,
        }
    }
}

/// Gradient Boosting Regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    trees: Vec<DecisionTree>,
    initial_prediction: f64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            initial_prediction: 0.0,
            feature_importances: None,
            n_features: 0,
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }
}

impl Model for GradientBoostingRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        if self.config.learning_rate <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "learning_rate".to_string(),
                value: self.config.learning_rate.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        self.n_features = n_features;
        self.trees.clear();
        self.initial_prediction = y.mean().unwrap_or(0.0);

        let mut predictions = Array1::from_elem(n_samples, self.initial_prediction);
        let mut importances = Array1::<f64>::zeros(n_features);

        for round in 0..self.config.n_estimators {
            let residuals = y - &predictions;

            let mut tree = DecisionTree::new_regressor()
                .with_max_depth(Some(self.config.max_depth))
                .with_min_samples_leaf(self.config.min_samples_leaf)
                .with_random_state(rng.next_u64());
            tree.fit(x, &residuals)?;

            let step = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &step);

            if let Some(tree_importance) = tree.feature_importances() {
                importances += &tree_importance;
            }

            self.trees.push(tree);

            if round % 25 == 0 {
                let mse = residuals.mapv(|r| r * r).mean().unwrap_or(0.0);
                debug!(round, mse, "Boosting round");
            }
        }

        let total = importances.sum();
        self.feature_importances = (total > 0.0).then(|| importances / total);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(PipelineError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let mut predictions = Array1::from_elem(x.nrows(), self.initial_prediction);
        for tree in &self.trees {
            let step = tree.predict(x)?;
            predictions.scaled_add(self.config.learning_rate, &step);
        }

        Ok(predictions)
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

    fn quadratic() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| if j == 0 { i as f64 / 10.0 } else { (i % 7) as f64 });
        let y = x.column(0).mapv(|v| v * v);
        (x, y)
    }

    #[test]
    fn test_fits_nonlinear_target() {
        let (x, y) = quadratic();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig::default());
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|e| e * e).mean().unwrap();
        assert!(mse < 0.1, "MSE too high: {}", mse);

        let importances = model.feature_importances().unwrap();
        assert!(importances[0] > importances[1]);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = quadratic();
        let config = GradientBoostingConfig {
            n_estimators: 20,
            ..Default::default()
        };

        let mut a = GradientBoostingRegressor::new(config.clone());
        let mut b = GradientBoostingRegressor::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_importances_normalized() {
        let (x, y) = quadratic();
        let mut model = GradientBoostingRegressor::new(GradientBoostingConfig {
            n_estimators: 10,
            ..Default::default()
        });
        model.fit(&x, &y).unwrap();

        let importances: Array1<f64> = model.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!((importances.sum() - 1.0).abs() < 1e-9);
        assert!(importances.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_predict_before_fit() {
        let model = GradientBoostingRegressor::new(GradientBoostingConfig::default());
        assert!(matches!(model.predict(&Array2::zeros((1, 1))), Err(PipelineError::ModelNotFitted)));
    }
}
