//! Finite-difference gradient of the feasibility probability.
//!
//! The auxiliary surrogate is only queried for its posterior mean, so the
//! probability's input gradient is estimated with symmetric central
//! differences. The step is tied to the surrogate's lengthscale:
//! `delta = lengthscale / 1000` for every dimension.

use nalgebra::DMatrix;

use crate::error::{Error, Result};
use crate::probability::{ProbabilityParams, probability};
use crate::surrogate::MeanSurrogate;

/// Ratio between the surrogate lengthscale and the finite-difference step.
pub const STEP_DIVISOR: f64 = 1000.0;

/// Gradient of the feasibility probability, shape `[n, d]`.
///
/// Column `i` is `(P(x + delta e_i) - P(x - delta e_i)) / (2 delta)`,
/// computed for every dimension. `points` is left untouched; perturbations
/// are applied to copies. Without an auxiliary model the probability is
/// constant and the gradient is zero.
///
/// # Errors
///
/// Returns `Error::InvalidLengthscale` unless `lengthscale` is finite and
/// positive, and propagates surrogate errors.
pub fn probability_gradient(
    points: &DMatrix<f64>,
    surrogate: Option<&dyn MeanSurrogate>,
    params: &ProbabilityParams,
    lengthscale: f64,
) -> Result<DMatrix<f64>> {
    if !(lengthscale.is_finite() && lengthscale > 0.0) {
        return Err(Error::InvalidLengthscale(lengthscale));
    }
    let delta = lengthscale / STEP_DIVISOR;
    let (n, d) = points.shape();
    let mut gradient = DMatrix::zeros(n, d);

    for i in 0..d {
        let mut lower = points.clone();
        let mut upper = points.clone();
        lower.column_mut(i).add_scalar_mut(-delta);
        upper.column_mut(i).add_scalar_mut(delta);

        let p_lower = probability(&lower, surrogate, params)?.probability;
        let p_upper = probability(&upper, surrogate, params)?.probability;

        gradient.set_column(i, &((p_upper - p_lower) / (2.0 * delta)));
    }

    Ok(gradient)
}
