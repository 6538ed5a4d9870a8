//! Linear model implementations

use super::models::{check_shapes, distinct_classes, Model};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Solve a symmetric positive-definite system Ax = b with a Cholesky
/// factorization, retrying once with a small ridge when A is not PD.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    cholesky_factor(a)
        .or_else(|| {
            let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n.max(1) as f64;
            let mut a_reg = a.clone();
            for k in 0..n {
                a_reg[[k, k]] += ridge;
            }
            cholesky_factor(&a_reg)
        })
        .map(|l| {
            // L y = b
            let mut y = Array1::zeros(n);
            for i in 0..n {
                let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
                y[i] = (b[i] - sum) / l[[i, i]];
            }
            // L^T x = y
            let mut x = Array1::zeros(n);
            for i in (0..n).rev() {
                let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
                x[i] = (y[i] - sum) / l[[i, i]];
            }
            x
        })
}

/// Lower-triangular L with A = L L^T, `None` when A is not positive definite
fn cholesky_factor(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(l)
}

/// Gauss-Jordan inversion with partial pivoting
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    // [M | I]
    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&a, &b| aug[[a, col]].abs().total_cmp(&aug[[b, col]].abs()))
            .unwrap_or(col);

        if pivot_row != col {
            for j in 0..2 * n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    Some(aug.slice(ndarray::s![.., n..]).to_owned())
}

/// Ordinary least squares, with optional L2 penalty on the coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Fitted coefficients
    pub coefficients: Option<Array1<f64>>,
    /// Fitted intercept
    pub intercept: f64,
    /// L2 regularization strength; 0 is plain OLS
    pub alpha: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            alpha: 0.0,
        }
    }

    /// Set regularization strength
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

impl Model for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let n_features = x.ncols();

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::TrainingError("empty training set".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let x_c = x - &x_mean.view().insert_axis(Axis(0));
        let y_c = y - y_mean;

        // (X^T X + alpha I) w = X^T y
        let mut xtx = x_c.t().dot(&x_c);
        for i in 0..n_features {
            xtx[[i, i]] += self.alpha;
        }
        let xty = x_c.t().dot(&y_c);

        let coefficients = match cholesky_solve(&xtx, &xty) {
            Some(w) => w,
            None => matrix_inverse(&xtx).map(|inv| inv.dot(&xty)).ok_or_else(|| {
                PipelineError::ComputationError("singular normal equations".to_string())
            })?,
        };

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        let coef = self.coefficients.as_ref()?;
        let total: f64 = coef.iter().map(|c| c.abs()).sum();
        (total > 0.0).then(|| coef.mapv(|c| c.abs() / total))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Logistic regression trained by batch gradient descent.
///
/// Two classes use a single sigmoid; more classes train one binary model per
/// class and normalize the scores into probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// One row of weights per binary sub-model
    pub weights: Option<Array2<f64>>,
    pub intercepts: Array1<f64>,
    /// Sorted class labels
    pub classes: Vec<f64>,
    /// L2 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub learning_rate: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            weights: None,
            intercepts: Array1::zeros(0),
            classes: Vec::new(),
            alpha: 0.01,
            max_iter: 1000,
            tol: 1e-6,
            learning_rate: 0.1,
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    fn fit_binary(&self, x: &Array2<f64>, y: &Array1<f64>) -> (Array1<f64>, f64) {
        let n_samples = x.nrows() as f64;
        let mut w = Array1::zeros(x.ncols());
        let mut b = 0.0;

        for _ in 0..self.max_iter {
            let p = (x.dot(&w) + b).mapv(sigmoid);
            let errors = &p - y;
            let dw = x.t().dot(&errors) / n_samples + self.alpha * &w;
            let db = errors.mean().unwrap_or(0.0);

            let grad_norm = (dw.mapv(|v| v * v).sum() + db * db).sqrt();
            if grad_norm < self.tol {
                break;
            }

            w = w - self.learning_rate * dw;
            b -= self.learning_rate * db;
        }

        (w, b)
    }

    fn scores(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self.weights.as_ref().ok_or(PipelineError::ModelNotFitted)?;
        if x.ncols() != weights.ncols() {
            return Err(PipelineError::ShapeError {
                expected: format!("{} features", weights.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        let linear = x.dot(&weights.t()) + &self.intercepts.view().insert_axis(Axis(0));
        Ok(linear.mapv(sigmoid))
    }
}

impl Model for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let classes = distinct_classes(y);
        if classes.len() < 2 {
            return Err(PipelineError::TrainingError(
                "logistic regression needs at least two classes".to_string(),
            ));
        }

        // binary: one model for the positive (last) class
        let targets: Vec<f64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        let mut weights = Array2::zeros((targets.len(), x.ncols()));
        let mut intercepts = Array1::zeros(targets.len());
        for (k, &class) in targets.iter().enumerate() {
            let y_bin = y.mapv(|v| if v == class { 1.0 } else { 0.0 });
            let (w, b) = self.fit_binary(x, &y_bin);
            weights.row_mut(k).assign(&w);
            intercepts[k] = b;
        }

        self.weights = Some(weights);
        self.intercepts = intercepts;
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        Ok(proba
            .outer_iter()
            .map(|row| {
                let best = row
                    .iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc })
                    .0;
                self.classes[best]
            })
            .collect())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let scores = self.scores(x)?;

        if self.classes.len() == 2 {
            let mut proba = Array2::zeros((x.nrows(), 2));
            for (i, p) in scores.column(0).iter().enumerate() {
                proba[[i, 0]] = 1.0 - p;
                proba[[i, 1]] = *p;
            }
            return Ok(proba);
        }

        let mut proba = scores;
        let k = proba.ncols() as f64;
        for mut row in proba.outer_iter_mut() {
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            } else {
                row.fill(1.0 / k);
            }
        }
        Ok(proba)
    }

    fn classes(&self) -> Option<&[f64]> {
        Some(&self.classes)
    }

    fn is_fitted(&self) -> bool {
        self.weights.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_exact_fit() {
        // y = 2*x1 + 3*x2 + 1
        let x = array![[1.0, 1.0], [2.0, 1.0], [1.0, 2.0], [2.0, 2.0], [3.0, 1.0]];
        let y = array![6.0, 8.0, 9.0, 11.0, 10.0];

        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let coef = model.coefficients.as_ref().unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-8);
        assert!((coef[1] - 3.0).abs() < 1e-8);
        assert!((model.intercept - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_ridge_handles_collinear_features() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0], [4.0, 4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];

        let mut model = LinearRegression::new().with_alpha(0.1);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        assert!((pred[3] - 8.0).abs() < 0.5);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LinearRegression::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(PipelineError::ModelNotFitted)));
    }

    #[test]
    fn test_matrix_inverse() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = matrix_inverse(&m).unwrap();
        let id = m.dot(&inv);
        assert!((id[[0, 0]] - 1.0).abs() < 1e-10);
        assert!(id[[0, 1]].abs() < 1e-10);
        assert!(matrix_inverse(&array![[1.0, 2.0], [2.0, 4.0]]).is_none());
    }

    #[test]
    fn test_logistic_binary() {
        let x = array![[1.0, 1.0], [1.5, 1.5], [2.0, 2.0], [5.0, 5.0], [5.5, 5.5], [6.0, 6.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 2));
        assert!(proba[[0, 0]] > 0.5);
        assert!(proba[[5, 1]] > 0.5);
    }

    #[test]
    fn test_logistic_multiclass_probabilities_sum_to_one() {
        let x = array![[0.0, 0.0], [0.2, 0.1], [3.0, 0.0], [3.1, 0.2], [0.0, 3.0], [0.1, 3.2]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];

        let mut model = LogisticRegression::new().with_learning_rate(0.5);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 3);
        for row in proba.outer_iter() {
            assert!((row.sum() - 1.0).abs() < 1e-10);
        }
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_logistic_single_class_rejected() {
        let mut model = LogisticRegression::new();
        assert!(model.fit(&array![[1.0], [2.0]], &array![1.0, 1.0]).is_err());
    }
}
