use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::gp::{GpRegression, GradientPrediction};

/// Predictive variance floor applied by the GP implementation.
const VARIANCE_FLOOR: f64 = 1e-10;

/// Capability interface for the surrogate of the primary objective.
///
/// The acquisition only borrows the primary model; it never fits or
/// updates it. Predictions are noise-free and must be reentrant.
pub trait PrimarySurrogate {
    /// Number of input dimensions the model was fitted on.
    fn input_dim(&self) -> usize;

    /// Posterior mean and standard deviation at each row of `points`.
    ///
    /// # Errors
    ///
    /// Implementations return `Error::DimensionMismatch` for a batch with
    /// the wrong column count.
    fn predict(&self, points: &DMatrix<f64>) -> Result<(DVector<f64>, DVector<f64>)>;

    /// Posterior moments together with their input gradients.
    ///
    /// # Errors
    ///
    /// Implementations return `Error::DimensionMismatch` for a batch with
    /// the wrong column count.
    fn predict_with_gradient(&self, points: &DMatrix<f64>) -> Result<GradientPrediction>;

    /// Incumbent value used as `fmin` in Expected Improvement.
    fn best_observed(&self) -> f64;
}

impl PrimarySurrogate for GpRegression {
    fn input_dim(&self) -> usize {
        GpRegression::input_dim(self)
    }

    fn predict(&self, points: &DMatrix<f64>) -> Result<(DVector<f64>, DVector<f64>)> {
        let (mean, std) = GpRegression::predict(self, points)?;
        let floor = VARIANCE_FLOOR.sqrt();
        Ok((mean, std.map(|s| s.max(floor))))
    }

    fn predict_with_gradient(&self, points: &DMatrix<f64>) -> Result<GradientPrediction> {
        GpRegression::predict_with_gradient(self, points, VARIANCE_FLOOR)
    }

    fn best_observed(&self) -> f64 {
        self.min_training_mean()
    }
}

impl<P: PrimarySurrogate + ?Sized> PrimarySurrogate for &P {
    fn input_dim(&self) -> usize {
        (**self).input_dim()
    }

    fn predict(&self, points: &DMatrix<f64>) -> Result<(DVector<f64>, DVector<f64>)> {
        (**self).predict(points)
    }

    fn predict_with_gradient(&self, points: &DMatrix<f64>) -> Result<GradientPrediction> {
        (**self).predict_with_gradient(points)
    }

    fn best_observed(&self) -> f64 {
        (**self).best_observed()
    }
}
