//! Feasibility probability from the auxiliary surrogate's posterior mean.
//!
//! The auxiliary target follows the "lower is better" convention (for
//! example a negative mixing enthalpy marks a phase-stable composition), so
//! the mean is mapped through an *inverted* logistic:
//!
//! `P = 1 / (1 + exp((mean - midpoint) / beta))`
//!
//! `P` is 0.5 at the midpoint, tends to 1 for very negative means and to 0
//! for very positive ones. Smaller `beta` gives a sharper transition.

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::surrogate::MeanSurrogate;

/// Default sigmoid scale.
pub const DEFAULT_BETA: f64 = 0.025;
/// Default sigmoid midpoint.
pub const DEFAULT_MIDPOINT: f64 = 0.0;
/// Placeholder mean reported when there is no auxiliary model.
pub const NEUTRAL_MEAN: f64 = 0.5;

/// Midpoint and scale of the mean → probability transform.
///
/// # Examples
///
/// ```
/// use fusion_ei::ProbabilityParams;
///
/// let params = ProbabilityParams::new(0.0, 0.025)?;
/// assert!((params.transform(0.0) - 0.5).abs() < 1e-12);
/// assert!(params.transform(-0.1) > 0.95);
/// # Ok::<(), fusion_ei::Error>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawProbabilityParams"))]
pub struct ProbabilityParams {
    midpoint: f64,
    beta: f64,
}

/// Unchecked wire form; deserialization goes through [`ProbabilityParams::new`].
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawProbabilityParams {
    midpoint: f64,
    beta: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawProbabilityParams> for ProbabilityParams {
    type Error = Error;

    fn try_from(raw: RawProbabilityParams) -> Result<Self> {
        Self::new(raw.midpoint, raw.beta)
    }
}

impl Default for ProbabilityParams {
    fn default() -> Self {
        Self {
            midpoint: DEFAULT_MIDPOINT,
            beta: DEFAULT_BETA,
        }
    }
}

impl ProbabilityParams {
    /// Creates transform parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidMidpoint` if `midpoint` is not finite and
    /// `Error::InvalidBeta` unless `beta` is finite and positive.
    pub fn new(midpoint: f64, beta: f64) -> Result<Self> {
        if !midpoint.is_finite() {
            return Err(Error::InvalidMidpoint(midpoint));
        }
        if !(beta.is_finite() && beta > 0.0) {
            return Err(Error::InvalidBeta(beta));
        }
        Ok(Self { midpoint, beta })
    }

    /// Returns the midpoint (mean with probability 0.5).
    #[must_use]
    pub fn midpoint(&self) -> f64 {
        self.midpoint
    }

    /// Returns the scale `beta`.
    #[must_use]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Maps a posterior mean to a probability.
    #[must_use]
    pub fn transform(&self, mean: f64) -> f64 {
        inverted_sigmoid(mean, self.midpoint, self.beta)
    }
}

/// `1 / (1 + exp((mean - midpoint) / beta))`, evaluated without overflow.
#[must_use]
pub fn inverted_sigmoid(mean: f64, midpoint: f64, beta: f64) -> f64 {
    let z = (mean - midpoint) / beta;
    if z <= 0.0 {
        1.0 / (1.0 + z.exp())
    } else {
        let e = (-z).exp();
        e / (1.0 + e)
    }
}

/// Posterior mean and feasibility probability for a batch of points.
#[derive(Clone, Debug, PartialEq)]
pub struct Feasibility {
    /// Auxiliary posterior mean, one entry per point.
    pub mean: DVector<f64>,
    /// Feasibility probability, one entry per point.
    pub probability: DVector<f64>,
}

/// Evaluates the feasibility probability at each row of `points`.
///
/// Without an auxiliary model every point gets mean 0.5 and probability
/// exactly 1, so the feasibility term leaves the primary acquisition
/// unchanged. Points outside the training range are accepted as-is.
///
/// # Errors
///
/// Propagates `Error::DimensionMismatch` from the surrogate.
pub fn probability(
    points: &DMatrix<f64>,
    surrogate: Option<&dyn MeanSurrogate>,
    params: &ProbabilityParams,
) -> Result<Feasibility> {
    let Some(surrogate) = surrogate else {
        let n = points.nrows();
        return Ok(Feasibility {
            mean: DVector::from_element(n, NEUTRAL_MEAN),
            probability: DVector::from_element(n, 1.0),
        });
    };

    let mean = surrogate.predict_mean(points)?;
    let probability = mean.map(|m| params.transform(m));
    Ok(Feasibility { mean, probability })
}
