//! Standard normal quantities for Expected Improvement.

use nalgebra::DVector;

/// Smallest standard deviation used when normalizing the improvement.
pub const STD_FLOOR: f64 = 1e-10;

/// Standard normal density, CDF and normalized improvement per point.
#[derive(Clone, Debug, PartialEq)]
pub struct Quantiles {
    /// `φ(u)`.
    pub pdf: DVector<f64>,
    /// `Φ(u)`.
    pub cdf: DVector<f64>,
    /// `u = (fmin - mean - jitter) / std`.
    pub u: DVector<f64>,
}

/// Computes `(φ, Φ, u)` for Expected Improvement under minimization.
///
/// Standard deviations below [`STD_FLOOR`] are floored so that points with
/// no predictive uncertainty still get a finite `u`.
#[must_use]
pub fn get_quantiles(jitter: f64, fmin: f64, mean: &DVector<f64>, std: &DVector<f64>) -> Quantiles {
    let u = mean.zip_map(std, |m, s| (fmin - m - jitter) / s.max(STD_FLOOR));
    Quantiles {
        pdf: u.map(norm_pdf),
        cdf: u.map(norm_cdf),
        u,
    }
}

/// Standard normal PDF.
pub(crate) fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF (Abramowitz-Stegun rational approximation).
pub(crate) fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 { cdf } else { 1.0 - cdf }
}
