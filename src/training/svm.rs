//! Support Vector Machines with an RBF kernel
//!
//! The classifier uses simplified SMO (one-vs-rest for more than two
//! classes). The regressor solves the epsilon-insensitive dual by
//! coordinate descent, with the bias folded into the kernel as `K + 1`.

use super::models::{check_shapes, distinct_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Largest training set for which the full kernel matrix is materialized
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// RBF kernel width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// `1 / (n_features * var(X))`, resolved when fitting
    Scale,
    Value(f64),
}

impl Gamma {
    fn resolve(&self, x: &Array2<f64>) -> f64 {
        match *self {
            Gamma::Value(g) => g,
            Gamma::Scale => {
                let var = x.var(0.0);
                let denom = x.ncols() as f64 * var;
                if denom > 0.0 && denom.is_finite() {
                    1.0 / denom
                } else {
                    1.0
                }
            }
        }
    }
}

/// Radial basis function kernel: `exp(-gamma * ||a - b||^2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct RbfKernel {
    gamma: f64,
}

impl RbfKernel {
    fn compute(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let sq: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q).powi(2)).sum();
        (-self.gamma * sq).exp()
    }

    fn matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(PipelineError::InvalidInput(format!(
                "{} samples exceed the SVM kernel matrix limit of {}",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (0..n).map(|j| self.compute(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row) in rows.into_iter().enumerate() {
            for (j, v) in row.into_iter().enumerate() {
                k[[i, j]] = v;
            }
        }
        Ok(k)
    }
}

/// SVM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    pub gamma: Gamma,
    /// Tolerance for stopping criterion
    pub tol: f64,
    /// Maximum number of passes over the data
    pub max_iter: usize,
    /// Half-width of the SVR insensitive tube
    pub epsilon: f64,
    pub random_state: u64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 200,
            epsilon: 0.1,
            random_state: 42,
        }
    }
}

impl SVMConfig {
    fn validate(&self) -> Result<()> {
        if self.c <= 0.0 {
            return Err(PipelineError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if let Gamma::Value(g) = self.gamma {
            if g <= 0.0 {
                return Err(PipelineError::InvalidParameter {
                    name: "gamma".to_string(),
                    value: g.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Decision function `sum(coef_i * k(sv_i, x)) + bias`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KernelExpansion {
    support_vectors: Array2<f64>,
    coef: Array1<f64>,
    bias: f64,
}

impl KernelExpansion {
    fn from_dual(x: &Array2<f64>, coef: &Array1<f64>, bias: f64) -> Self {
        let support: Vec<usize> = coef
            .iter()
            .enumerate()
            .filter(|(_, c)| c.abs() > 1e-8)
            .map(|(i, _)| i)
            .collect();
        Self {
            support_vectors: x.select(Axis(0), &support),
            coef: coef.select(Axis(0), &support),
            bias,
        }
    }

    fn decision(&self, kernel: &RbfKernel, x: &Array2<f64>) -> Array1<f64> {
        let values: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.support_vectors
                    .outer_iter()
                    .zip(self.coef.iter())
                    .map(|(sv, c)| c * kernel.compute(sv, row))
                    .sum::<f64>()
                    + self.bias
            })
            .collect();
        Array1::from_vec(values)
    }
}

fn check_features(expected: usize, x: &Array2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(PipelineError::ShapeError {
            expected: format!("{} features", expected),
            actual: format!("{} features", x.ncols()),
        });
    }
    Ok(())
}

/// Support Vector Classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMClassifier {
    config: SVMConfig,
    kernel: Option<RbfKernel>,
    /// One expansion for binary problems, one per class otherwise
    machines: Vec<KernelExpansion>,
    classes: Vec<f64>,
    n_features: usize,
}

impl SVMClassifier {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            machines: Vec::new(),
            classes: Vec::new(),
            n_features: 0,
        }
    }

    /// Simplified SMO on labels in {-1, +1}; returns (alpha * y, bias)
    fn smo_train(&self, k: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n = y.len();
        let c = self.config.c;
        let tol = self.config.tol;
        let mut alphas: Array1<f64> = Array1::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            (0..n).map(|j| alphas[j] * y[j] * k[[j, idx]]).sum::<f64>() + bias
        };

        let mut passes = 0;
        let mut iterations = 0;
        while passes < 5 && iterations < self.config.max_iter && n > 1 {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];
                let violates = (y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0);
                if !violates {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];
                let (ai_old, aj_old) = (alphas[i], alphas[j]);

                let (lo, hi) = if y[i] != y[j] {
                    ((aj_old - ai_old).max(0.0), (c + aj_old - ai_old).min(c))
                } else {
                    ((ai_old + aj_old - c).max(0.0), (ai_old + aj_old).min(c))
                };
                if (hi - lo).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (aj_old - y[j] * (e_i - e_j) / eta).clamp(lo, hi);
                if (alphas[j] - aj_old).abs() < 1e-5 {
                    continue;
                }
                alphas[i] = ai_old + y[i] * y[j] * (aj_old - alphas[j]);

                let b1 = bias - e_i
                    - y[i] * (alphas[i] - ai_old) * k[[i, i]]
                    - y[j] * (alphas[j] - aj_old) * k[[i, j]];
                let b2 = bias - e_j
                    - y[i] * (alphas[i] - ai_old) * k[[i, j]]
                    - y[j] * (alphas[j] - aj_old) * k[[j, j]];
                bias = if alphas[i] > 0.0 && alphas[i] < c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }

            iterations += 1;
            passes = if num_changed == 0 { passes + 1 } else { 0 };
        }

        debug!(iterations, "SMO finished");
        (&alphas * y, bias)
    }

    /// Raw decision values, one column per machine
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let kernel = self.kernel.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        check_features(self.n_features, x)?;

        let mut scores = Array2::zeros((x.nrows(), self.machines.len()));
        for (m, machine) in self.machines.iter().enumerate() {
            scores.column_mut(m).assign(&machine.decision(kernel, x));
        }
        Ok(scores)
    }

    /// Total number of support vectors across machines
    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
    }
}

impl Model for SVMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        self.config.validate()?;

        let classes = distinct_classes(y);
        if classes.len() < 2 {
            return Err(PipelineError::InvalidInput(
                "SVM requires at least 2 distinct classes".to_string(),
            ));
        }

        let kernel = RbfKernel { gamma: self.config.gamma.resolve(x) };
        let k = kernel.matrix(x)?;

        // binary: a single machine for the last class
        let positives: &[f64] = if classes.len() == 2 { &classes[1..] } else { &classes };

        self.machines = positives
            .iter()
            .map(|&cls| {
                let y_binary = y.mapv(|v| if v == cls { 1.0 } else { -1.0 });
                let (coef, bias) = self.smo_train(&k, &y_binary);
                KernelExpansion::from_dual(x, &coef, bias)
            })
            .collect();

        self.kernel = Some(kernel);
        self.classes = classes;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision_function(x)?;

        if self.classes.len() == 2 {
            return Ok(scores
                .column(0)
                .mapv(|s| if s >= 0.0 { self.classes[1] } else { self.classes[0] }));
        }

        Ok(scores
            .outer_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &s)| if s > acc.1 { (i, s) } else { acc })
                    .0;
                self.classes[best]
            })
            .collect())
    }

    fn classes(&self) -> Option<&[f64]> {
        Some(&self.classes)
    }

    fn is_fitted(&self) -> bool {
        self.kernel.is_some()
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    kernel: Option<RbfKernel>,
    expansion: Option<KernelExpansion>,
    n_features: usize,
}

impl SVMRegressor {
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            kernel: None,
            expansion: None,
            n_features: 0,
        }
    }

    /// Number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.expansion.as_ref().map_or(0, |e| e.support_vectors.nrows())
    }
}

fn soft_threshold(v: f64, t: f64) -> f64 {
    if v > t {
        v - t
    } else if v < -t {
        v + t
    } else {
        0.0
    }
}

impl Model for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        self.config.validate()?;

        let n = x.nrows();
        let c = self.config.c;
        let kernel = RbfKernel { gamma: self.config.gamma.resolve(x) };
        // K + 1 carries the bias
        let k = kernel.matrix(x)? + 1.0;

        // beta = alpha - alpha*, f = K beta
        let mut beta: Array1<f64> = Array1::zeros(n);
        let mut f: Array1<f64> = Array1::zeros(n);
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let mut epochs = 0;
        for _ in 0..self.config.max_iter {
            epochs += 1;
            order.shuffle(&mut rng);
            let mut max_delta: f64 = 0.0;

            for &i in &order {
                let kii = k[[i, i]];
                let g = f[i] - y[i];
                let updated = soft_threshold(beta[i] - g / kii, self.config.epsilon / kii).clamp(-c, c);
                let delta = updated - beta[i];
                if delta != 0.0 {
                    beta[i] = updated;
                    f.scaled_add(delta, &k.column(i));
                    max_delta = max_delta.max(delta.abs());
                }
            }

            if max_delta < self.config.tol {
                break;
            }
        }
        debug!(epochs, "SVR coordinate descent finished");

        let bias = beta.sum();
        self.expansion = Some(KernelExpansion::from_dual(x, &beta, bias));
        self.kernel = Some(kernel);
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (kernel, expansion) = self
            .kernel
            .as_ref()
            .zip(self.expansion.as_ref())
            .ok_or(PipelineError::ModelNotFitted)?;
        check_features(self.n_features, x)?;
        Ok(expansion.decision(kernel, x))
    }

    fn is_fitted(&self) -> bool {
        self.expansion.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_gamma_scale() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // var of all entries = 1, two features
        assert!((Gamma::Scale.resolve(&x) - 0.5).abs() < 1e-12);
        assert_eq!(Gamma::Value(0.3).resolve(&x), 0.3);
        assert_eq!(Gamma::Scale.resolve(&array![[1.0], [1.0]]), 1.0);
    }

    #[test]
    fn test_binary_classifier() {
        let x = array![[0.0, 0.0], [0.2, 0.1], [0.1, 0.3], [3.0, 3.0], [3.2, 2.9], [2.8, 3.1]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut svc = SVMClassifier::new(SVMConfig { c: 10.0, ..Default::default() });
        svc.fit(&x, &y).unwrap();

        assert_eq!(svc.predict(&x).unwrap(), y);
        assert!(svc.n_support_vectors() > 0);
        assert!(svc.predict_proba(&x).is_err());
    }

    #[test]
    fn test_multiclass_classifier() {
        let x = array![[0.0, 0.0], [0.1, 0.1], [4.0, 0.0], [4.1, 0.1], [0.0, 4.0], [0.1, 4.1]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut svc = SVMClassifier::new(SVMConfig { c: 10.0, ..Default::default() });
        svc.fit(&x, &y).unwrap();

        assert_eq!(svc.decision_function(&x).unwrap().ncols(), 3);
        assert_eq!(svc.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_regressor_fits_smooth_curve() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64 / 10.0);
        let y = x.column(0).mapv(f64::sin);

        let mut svr = SVMRegressor::new(SVMConfig { c: 10.0, epsilon: 0.01, ..Default::default() });
        svr.fit(&x, &y).unwrap();

        let pred = svr.predict(&x).unwrap();
        let mse = (&pred - &y).mapv(|e| e * e).mean().unwrap();
        assert!(mse < 0.02, "MSE too high: {}", mse);
    }

    #[test]
    fn test_regressor_tube_keeps_coefficients_bounded() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.0, 10.0, 20.0, 30.0];

        let config = SVMConfig { c: 0.5, ..Default::default() };
        let mut svr = SVMRegressor::new(config);
        svr.fit(&x, &y).unwrap();

        let expansion = svr.expansion.as_ref().unwrap();
        assert!(expansion.coef.iter().all(|b| b.abs() <= 0.5 + 1e-12));
    }

    #[test]
    fn test_invalid_c() {
        let mut svr = SVMRegressor::new(SVMConfig { c: 0.0, ..Default::default() });
        assert!(matches!(
            svr.fit(&array![[0.0], [1.0]], &array![0.0, 1.0]),
            Err(PipelineError::InvalidParameter { .. })
        ));
    }
}
