//! Capability interface for the auxiliary (feasibility) surrogate.

use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::gp::GpRegression;

/// A fitted regression model that can report its noise-free posterior mean.
///
/// The feasibility probability only needs the posterior mean and the
/// model's characteristic lengthscale (to size finite-difference steps).
/// Implementations must be reentrant: predictions take `&self` and may be
/// called from several threads at once.
pub trait MeanSurrogate: Send + Sync {
    /// Number of input dimensions the model was fitted on.
    fn input_dim(&self) -> usize;

    /// Noise-free posterior mean at each row of `points`.
    ///
    /// # Errors
    ///
    /// Implementations return `Error::DimensionMismatch` when `points` has
    /// the wrong column count.
    fn predict_mean(&self, points: &DMatrix<f64>) -> Result<DVector<f64>>;

    /// Characteristic lengthscale after fitting.
    fn lengthscale(&self) -> f64;

    /// Signal variance after fitting, if the model has one.
    fn variance(&self) -> Option<f64> {
        None
    }
}

impl MeanSurrogate for GpRegression {
    fn input_dim(&self) -> usize {
        GpRegression::input_dim(self)
    }

    fn predict_mean(&self, points: &DMatrix<f64>) -> Result<DVector<f64>> {
        GpRegression::predict_mean(self, points)
    }

    fn lengthscale(&self) -> f64 {
        self.kernel().lengthscale()
    }

    fn variance(&self) -> Option<f64> {
        Some(self.kernel().variance())
    }
}
