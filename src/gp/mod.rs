//! Gaussian Process regression with a Matérn 5/2 kernel.
//!
//! This is the regression capability behind the auxiliary (feasibility)
//! surrogate: zero prior mean, Gaussian observation noise, exact inference
//! by Cholesky decomposition and hyperparameters fitted by maximizing the
//! log marginal likelihood (see [`GpRegression::optimize`]).
//!
//! Training inputs are used as given (no normalization) so that the
//! fitted lengthscale lives in the same units as the candidate points;
//! finite-difference steps are derived from it.

mod kernel;
mod optimize;

use core::fmt;

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};

pub use kernel::Matern52;
pub use optimize::{Bounds, FitOptions, HyperparameterBounds};

use crate::error::{Error, Result};

/// `ln(2π)`.
const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// Kernel and noise hyperparameters of a GP regression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hyperparameters {
    /// Kernel lengthscale `ℓ`.
    pub lengthscale: f64,
    /// Kernel signal variance `σ²`.
    pub variance: f64,
    /// Gaussian observation noise variance `σn²`.
    pub noise_variance: f64,
}

/// Posterior moments and their gradients with respect to the inputs.
#[derive(Clone, Debug)]
pub struct GradientPrediction {
    /// Posterior mean, one entry per point.
    pub mean: DVector<f64>,
    /// Posterior (noise-free) standard deviation, one entry per point.
    pub std: DVector<f64>,
    /// `∂mean/∂x`, shape `[n, d]`.
    pub d_mean: DMatrix<f64>,
    /// `∂std/∂x`, shape `[n, d]`.
    pub d_std: DMatrix<f64>,
}

/// A fitted GP regression model.
#[derive(Clone)]
pub struct GpRegression {
    /// Training inputs, one row per observation.
    x_train: DMatrix<f64>,
    kernel: Matern52,
    noise_variance: f64,
    /// Cholesky factor L of K + σn²I.
    cholesky: Cholesky<f64, Dyn>,
    /// α = (K + σn²I)^{-1} y.
    alpha: DVector<f64>,
    log_likelihood: f64,
}

impl fmt::Debug for GpRegression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpRegression")
            .field("n_train", &self.x_train.nrows())
            .field("input_dim", &self.x_train.ncols())
            .field("kernel", &self.kernel)
            .field("noise_variance", &self.noise_variance)
            .field("log_likelihood", &self.log_likelihood)
            .finish_non_exhaustive()
    }
}

impl GpRegression {
    /// Conditions a GP on `(x, y)` with fixed hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if `x` and `y` disagree on the
    /// number of observations, `Error::InvalidHyperparameter` for a
    /// non-positive noise variance and `Error::FitFailed` if the training
    /// set is empty or the covariance matrix is not positive definite.
    pub fn fit_fixed(
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        kernel: Matern52,
        noise_variance: f64,
    ) -> Result<Self> {
        let n = x.nrows();
        if y.len() != n {
            return Err(Error::DimensionMismatch {
                expected: n,
                got: y.len(),
            });
        }
        if n == 0 {
            return Err(Error::FitFailed("empty training set"));
        }
        if !(noise_variance.is_finite() && noise_variance > 0.0) {
            return Err(Error::InvalidHyperparameter {
                name: "noise_variance",
                value: noise_variance,
            });
        }

        let mut k = kernel.matrix(x);
        for i in 0..n {
            k[(i, i)] += noise_variance;
        }
        let cholesky = Cholesky::new(k)
            .ok_or(Error::FitFailed("covariance matrix is not positive definite"))?;
        let alpha = cholesky.solve(y);

        let half_log_det: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        #[allow(clippy::cast_precision_loss)]
        let log_likelihood = -0.5 * y.dot(&alpha) - half_log_det - 0.5 * n as f64 * LN_2PI;

        Ok(Self {
            x_train: x.clone(),
            kernel,
            noise_variance,
            cholesky,
            alpha,
            log_likelihood,
        })
    }

    /// Returns the number of input dimensions.
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.x_train.ncols()
    }

    /// Returns the number of training observations.
    #[must_use]
    pub fn n_train(&self) -> usize {
        self.x_train.nrows()
    }

    /// Returns the fitted kernel.
    #[must_use]
    pub fn kernel(&self) -> &Matern52 {
        &self.kernel
    }

    /// Returns the fitted hyperparameters.
    #[must_use]
    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            lengthscale: self.kernel.lengthscale(),
            variance: self.kernel.variance(),
            noise_variance: self.noise_variance,
        }
    }

    /// Returns the log marginal likelihood of the training data.
    #[must_use]
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    /// Gradient of the log marginal likelihood with respect to
    /// `(log ℓ, log σ², log σn²)`.
    ///
    /// `∂/∂θ = ½ tr((ααᵀ - K⁻¹) ∂K/∂θ)`
    pub(crate) fn log_likelihood_gradient(&self) -> [f64; 3] {
        let n = self.n_train();
        let k_inv = self.cholesky.inverse();
        let w = &self.alpha * self.alpha.transpose() - k_inv;

        let d_lengthscale = self.kernel.d_matrix_d_log_lengthscale(&self.x_train);
        // ∂K/∂log σ² is the noise-free Gram matrix itself.
        let d_variance = self.kernel.matrix(&self.x_train);

        let mut grad = [0.0; 3];
        for i in 0..n {
            for j in 0..n {
                grad[0] += w[(i, j)] * d_lengthscale[(i, j)];
                grad[1] += w[(i, j)] * d_variance[(i, j)];
            }
            grad[2] += w[(i, i)] * self.noise_variance;
        }
        grad.map(|g| 0.5 * g)
    }

    fn check_dim(&self, x: &DMatrix<f64>) -> Result<()> {
        if x.ncols() == self.input_dim() {
            Ok(())
        } else {
            Err(Error::DimensionMismatch {
                expected: self.input_dim(),
                got: x.ncols(),
            })
        }
    }

    /// Noise-free posterior mean at each row of `x`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if `x` has the wrong column count.
    pub fn predict_mean(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.check_dim(x)?;
        Ok(self.kernel.cross(x, &self.x_train) * &self.alpha)
    }

    /// Noise-free posterior mean and standard deviation at each row of `x`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if `x` has the wrong column count.
    pub fn predict(&self, x: &DMatrix<f64>) -> Result<(DVector<f64>, DVector<f64>)> {
        self.check_dim(x)?;
        let k_star = self.kernel.cross(x, &self.x_train);
        let mean = &k_star * &self.alpha;
        let v = self.cholesky.solve(&k_star.transpose());
        let std = DVector::from_fn(x.nrows(), |i, _| {
            let explained = k_star.row(i).transpose().dot(&v.column(i));
            (self.kernel.variance() - explained).max(0.0).sqrt()
        });
        Ok((mean, std))
    }

    /// Posterior moments and their analytic input gradients.
    ///
    /// The variance is floored at `var_floor` before taking the square root
    /// so that `∂std/∂x = (∂var/∂x) / (2 std)` stays finite at training points.
    ///
    /// # Errors
    ///
    /// Returns `Error::DimensionMismatch` if `x` has the wrong column count.
    pub fn predict_with_gradient(
        &self,
        x: &DMatrix<f64>,
        var_floor: f64,
    ) -> Result<GradientPrediction> {
        self.check_dim(x)?;
        let (m, d) = (x.nrows(), x.ncols());
        let n = self.n_train();

        let k_star = self.kernel.cross(x, &self.x_train);
        let mean = &k_star * &self.alpha;
        // Column i holds (K + σn²I)^{-1} k(x_i, X).
        let v = self.cholesky.solve(&k_star.transpose());

        let mut std = DVector::zeros(m);
        let mut d_mean = DMatrix::zeros(m, d);
        let mut d_std = DMatrix::zeros(m, d);
        let mut dk = vec![0.0; d];

        for i in 0..m {
            let explained = k_star.row(i).transpose().dot(&v.column(i));
            let var = (self.kernel.variance() - explained).max(var_floor);
            std[i] = var.sqrt();

            for r in 0..n {
                self.kernel.grad_first(x, i, &self.x_train, r, &mut dk);
                for (c, &g) in dk.iter().enumerate() {
                    d_mean[(i, c)] += self.alpha[r] * g;
                    // ∂var/∂x = -2 (∂k/∂x)ᵀ K⁻¹ k
                    d_std[(i, c)] -= 2.0 * g * v[(r, i)];
                }
            }
            for c in 0..d {
                d_std[(i, c)] /= 2.0 * std[i];
            }
        }

        Ok(GradientPrediction {
            mean,
            std,
            d_mean,
            d_std,
        })
    }

    /// Minimum posterior mean over the training inputs.
    #[must_use]
    pub fn min_training_mean(&self) -> f64 {
        (self.kernel.cross(&self.x_train, &self.x_train) * &self.alpha)
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min)
    }
}
