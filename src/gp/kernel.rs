//! Matérn 5/2 covariance with a single (isotropic) lengthscale.

use nalgebra::DMatrix;

use crate::error::{Error, Result};

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;

/// Matérn 5/2 kernel.
///
/// `k(x1, x2) = σ² (1 + √5 r + 5/3 r²) exp(-√5 r)`
/// where `r = ‖x1 - x2‖ / ℓ`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matern52 {
    lengthscale: f64,
    variance: f64,
}

impl Matern52 {
    /// Creates a kernel with the given lengthscale `ℓ` and signal variance `σ²`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHyperparameter` if either value is not finite
    /// and strictly positive.
    pub fn new(lengthscale: f64, variance: f64) -> Result<Self> {
        if !(lengthscale.is_finite() && lengthscale > 0.0) {
            return Err(Error::InvalidHyperparameter {
                name: "lengthscale",
                value: lengthscale,
            });
        }
        if !(variance.is_finite() && variance > 0.0) {
            return Err(Error::InvalidHyperparameter {
                name: "variance",
                value: variance,
            });
        }
        Ok(Self {
            lengthscale,
            variance,
        })
    }

    /// Returns the lengthscale `ℓ`.
    #[must_use]
    pub fn lengthscale(&self) -> f64 {
        self.lengthscale
    }

    /// Returns the signal variance `σ²`.
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Kernel value as a function of the scaled distance `r`.
    fn of_r(&self, r: f64) -> f64 {
        let sqrt5_r = SQRT_5 * r;
        self.variance * (1.0 + sqrt5_r + 5.0 / 3.0 * r * r) * (-sqrt5_r).exp()
    }

    /// Scaled distance between row `i` of `a` and row `j` of `b`.
    fn scaled_distance(&self, a: &DMatrix<f64>, i: usize, b: &DMatrix<f64>, j: usize) -> f64 {
        let mut r_sq = 0.0;
        for c in 0..a.ncols() {
            let diff = (a[(i, c)] - b[(j, c)]) / self.lengthscale;
            r_sq += diff * diff;
        }
        r_sq.sqrt()
    }

    /// Gram matrix `K(X, X)` without observation noise.
    pub(crate) fn matrix(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let n = x.nrows();
        let mut k = DMatrix::zeros(n, n);
        for i in 0..n {
            k[(i, i)] = self.variance;
            for j in 0..i {
                let v = self.of_r(self.scaled_distance(x, i, x, j));
                k[(i, j)] = v;
                k[(j, i)] = v;
            }
        }
        k
    }

    /// Cross-covariance `K(A, B)` of shape `[a.nrows(), b.nrows()]`.
    pub(crate) fn cross(&self, a: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
            self.of_r(self.scaled_distance(a, i, b, j))
        })
    }

    /// `∂K/∂(log ℓ)` over the training inputs.
    ///
    /// `σ² 5/3 r² (1 + √5 r) exp(-√5 r)`
    pub(crate) fn d_matrix_d_log_lengthscale(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let n = x.nrows();
        let mut dk = DMatrix::zeros(n, n);
        for i in 0..n {
            for j in 0..i {
                let r = self.scaled_distance(x, i, x, j);
                let v = self.variance * 5.0 / 3.0 * r * r * (1.0 + SQRT_5 * r) * (-SQRT_5 * r).exp();
                dk[(i, j)] = v;
                dk[(j, i)] = v;
            }
        }
        dk
    }

    /// Gradient of `k(a_i, b_j)` with respect to the coordinates of `a_i`,
    /// written into `out` (length `a.ncols()`).
    ///
    /// `-σ² 5/3 (1 + √5 r) exp(-√5 r) (a_i - b_j) / ℓ²`, finite at `r = 0`.
    pub(crate) fn grad_first(
        &self,
        a: &DMatrix<f64>,
        i: usize,
        b: &DMatrix<f64>,
        j: usize,
        out: &mut [f64],
    ) {
        let r = self.scaled_distance(a, i, b, j);
        let scale = -self.variance * 5.0 / 3.0 * (1.0 + SQRT_5 * r) * (-SQRT_5 * r).exp()
            / (self.lengthscale * self.lengthscale);
        for (c, slot) in out.iter_mut().enumerate() {
            *slot = scale * (a[(i, c)] - b[(j, c)]);
        }
    }
}
