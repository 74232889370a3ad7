//! Marginal-likelihood fitting with bounded hyperparameters and restarts.
//!
//! Each hyperparameter is optimized in an unconstrained coordinate `θ`:
//! a bounded parameter is `p = low + (high - low) σ(θ)`, an unbounded
//! positive one is `p = exp(θ)`. The negative log marginal likelihood is
//! minimized with `wolfe_bfgs` (BFGS under a strong-Wolfe line search).
//! Restart 0 starts from the initial guess. Further restarts draw each
//! bounded `θ` afresh from N(0, 1) and perturb each unbounded `θ` by N(0, 1)
//! noise. The restart with the highest likelihood wins.

use nalgebra::{DMatrix, DVector};
use ndarray::Array1;
use wolfe_bfgs::{Bfgs, BfgsSolution};

use super::{GpRegression, Hyperparameters, Matern52};
use crate::error::{Error, Result};
use crate::rng_util;

/// Gradient-norm convergence threshold.
const GRAD_TOL: f64 = 1e-6;
/// Cost reported to the optimizer where the model cannot be conditioned.
const UNDEFINED_COST: f64 = 1e10;
/// Clamp on `θ` for `exp` transforms.
const MAX_LOG: f64 = 40.0;

/// A closed interval constraint on a positive hyperparameter.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    /// Lower bound (inclusive).
    pub low: f64,
    /// Upper bound (inclusive).
    pub high: f64,
}

impl Bounds {
    /// Creates a bound `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHyperparameter` unless `0 < low <= high` and
    /// both are finite.
    pub fn new(low: f64, high: f64) -> Result<Self> {
        if !(low.is_finite() && low > 0.0) {
            return Err(Error::InvalidHyperparameter {
                name: "lower bound",
                value: low,
            });
        }
        if !(high.is_finite() && high >= low) {
            return Err(Error::InvalidHyperparameter {
                name: "upper bound",
                value: high,
            });
        }
        Ok(Self { low, high })
    }
}

/// Optional bounds for each hyperparameter; `None` means positive and unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HyperparameterBounds {
    /// Bound on the kernel lengthscale.
    pub lengthscale: Option<Bounds>,
    /// Bound on the kernel signal variance.
    pub variance: Option<Bounds>,
    /// Bound on the observation noise variance.
    pub noise_variance: Option<Bounds>,
}

/// Optimizer settings for [`GpRegression::optimize`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FitOptions {
    /// Number of optimizer runs; the first starts at the initial guess.
    pub n_restarts: usize,
    /// Maximum BFGS iterations per restart.
    pub max_iters: usize,
    /// RNG seed for the restart perturbations.
    pub seed: Option<u64>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            n_restarts: 5,
            max_iters: 1000,
            seed: None,
        }
    }
}

/// Map between a hyperparameter and its unconstrained coordinate.
#[derive(Clone, Copy, Debug)]
enum Transform {
    Positive,
    Bounded { low: f64, high: f64 },
    /// Degenerate bound (`low == high`): the parameter is held fixed.
    Fixed(f64),
}

fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

impl Transform {
    fn from_bounds(bounds: Option<Bounds>) -> Self {
        match bounds {
            None => Self::Positive,
            Some(b) if b.high > b.low => Self::Bounded {
                low: b.low,
                high: b.high,
            },
            Some(b) => Self::Fixed(b.low),
        }
    }

    fn to_free(self, p: f64) -> f64 {
        match self {
            Self::Positive => p.ln().clamp(-MAX_LOG, MAX_LOG),
            Self::Bounded { low, high } => {
                let s = ((p - low) / (high - low)).clamp(1e-9, 1.0 - 1e-9);
                (s / (1.0 - s)).ln()
            }
            Self::Fixed(_) => 0.0,
        }
    }

    fn to_param(self, theta: f64) -> f64 {
        match self {
            Self::Positive => theta.clamp(-MAX_LOG, MAX_LOG).exp(),
            Self::Bounded { low, high } => low + (high - low) * sigmoid(theta),
            Self::Fixed(value) => value,
        }
    }

    /// `∂(log p)/∂θ`.
    fn d_log_param(self, theta: f64) -> f64 {
        match self {
            Self::Positive if theta.abs() > MAX_LOG => 0.0,
            Self::Positive => 1.0,
            Self::Bounded { low, high } => {
                let s = sigmoid(theta);
                (high - low) * s * (1.0 - s) / self.to_param(theta)
            }
            Self::Fixed(_) => 0.0,
        }
    }

    /// Starting coordinate for a random restart.
    fn restart_start(self, theta0: f64, rng: &mut fastrand::Rng) -> f64 {
        match self {
            Self::Positive => theta0 + rng_util::standard_normal(rng),
            Self::Bounded { .. } => rng_util::standard_normal(rng),
            Self::Fixed(_) => theta0,
        }
    }
}

/// Negative log marginal likelihood over `θ = (ℓ, σ², σn²)` coordinates.
struct NegLogLikelihood<'a> {
    x: &'a DMatrix<f64>,
    y: &'a DVector<f64>,
    transforms: [Transform; 3],
}

impl NegLogLikelihood<'_> {
    fn params(&self, theta: &DVector<f64>) -> Hyperparameters {
        Hyperparameters {
            lengthscale: self.transforms[0].to_param(theta[0]),
            variance: self.transforms[1].to_param(theta[1]),
            noise_variance: self.transforms[2].to_param(theta[2]),
        }
    }

    fn free(&self, p: &Hyperparameters) -> DVector<f64> {
        DVector::from_vec(vec![
            self.transforms[0].to_free(p.lengthscale),
            self.transforms[1].to_free(p.variance),
            self.transforms[2].to_free(p.noise_variance),
        ])
    }

    /// Cost and gradient, or `None` where the model cannot be conditioned.
    fn evaluate(&self, theta: &DVector<f64>) -> Option<(f64, DVector<f64>)> {
        let p = self.params(theta);
        let kernel = Matern52::new(p.lengthscale, p.variance).ok()?;
        let gp = GpRegression::fit_fixed(self.x, self.y, kernel, p.noise_variance).ok()?;
        let lml = gp.log_likelihood();
        if !lml.is_finite() {
            return None;
        }
        let g = gp.log_likelihood_gradient();
        let grad = DVector::from_fn(3, |i, _| -g[i] * self.transforms[i].d_log_param(theta[i]));
        if grad.iter().any(|v| !v.is_finite()) {
            return None;
        }
        Some((-lml, grad))
    }
}

/// Minimizes from `start`, or returns `None` if the start is undefined.
///
/// A run that stops early (line-search failure or iteration cap) keeps its
/// start, so a restart never reports a worse point than where it began.
fn minimize(
    objective: &NegLogLikelihood<'_>,
    start: DVector<f64>,
    max_iters: usize,
) -> Option<(DVector<f64>, f64)> {
    let (start_cost, _) = objective.evaluate(&start)?;
    let n = start.len();
    let cost_and_grad = |theta: &Array1<f64>| -> (f64, Array1<f64>) {
        let theta = DVector::from_iterator(n, theta.iter().copied());
        match objective.evaluate(&theta) {
            Some((cost, grad)) => (cost, Array1::from_iter(grad.iter().copied())),
            None => (UNDEFINED_COST, Array1::zeros(n)),
        }
    };

    match Bfgs::new(Array1::from_iter(start.iter().copied()), cost_and_grad)
        .with_tolerance(GRAD_TOL)
        .with_max_iterations(max_iters)
        .run()
    {
        Ok(BfgsSolution {
            final_point,
            final_value,
            ..
        }) if final_value.is_finite() && final_value <= start_cost => {
            trace_debug!(neg_log_likelihood = final_value, "BFGS converged");
            Some((DVector::from_iterator(n, final_point.iter().copied()), final_value))
        }
        _ => {
            trace_debug!("BFGS stopped without improving; keeping restart start");
            Some((start, start_cost))
        }
    }
}

impl GpRegression {
    /// Fits hyperparameters by maximizing the log marginal likelihood.
    ///
    /// `init` is clamped into `bounds` before optimization. The returned
    /// model is conditioned on the best hyperparameters found across all
    /// restarts.
    ///
    /// # Errors
    ///
    /// Returns `Error::TooFewRestarts` for zero restarts, any error of
    /// [`fit_fixed`](Self::fit_fixed) on malformed data, and
    /// `Error::FitFailed` if no restart reached a finite likelihood.
    pub fn optimize(
        x: &DMatrix<f64>,
        y: &DVector<f64>,
        init: Hyperparameters,
        bounds: &HyperparameterBounds,
        options: &FitOptions,
    ) -> Result<Self> {
        if options.n_restarts == 0 {
            return Err(Error::TooFewRestarts { got: 0, min: 1 });
        }
        if y.len() != x.nrows() {
            return Err(Error::DimensionMismatch {
                expected: x.nrows(),
                got: y.len(),
            });
        }
        if x.nrows() == 0 {
            return Err(Error::FitFailed("empty training set"));
        }

        let objective = NegLogLikelihood {
            x,
            y,
            transforms: [
                Transform::from_bounds(bounds.lengthscale),
                Transform::from_bounds(bounds.variance),
                Transform::from_bounds(bounds.noise_variance),
            ],
        };
        let theta0 = objective.free(&init);
        let mut rng = rng_util::rng_from_seed(options.seed);
        let mut best: Option<(DVector<f64>, f64)> = None;

        for restart in 0..options.n_restarts {
            let start = if restart == 0 {
                theta0.clone()
            } else {
                DVector::from_fn(3, |i, _| {
                    objective.transforms[i].restart_start(theta0[i], &mut rng)
                })
            };

            if let Some((theta, cost)) = minimize(&objective, start, options.max_iters) {
                trace_debug!(restart, neg_log_likelihood = cost, "optimizer restart finished");
                if best.as_ref().is_none_or(|(_, c)| cost < *c) {
                    best = Some((theta, cost));
                }
            } else {
                trace_debug!(restart, "optimizer restart skipped: undefined start");
            }
        }

        let (theta, _) =
            best.ok_or(Error::FitFailed("no restart produced a finite marginal likelihood"))?;
        let p = objective.params(&theta);
        let model =
            Self::fit_fixed(x, y, Matern52::new(p.lengthscale, p.variance)?, p.noise_variance)?;
        trace_info!(
            lengthscale = p.lengthscale,
            variance = p.variance,
            noise_variance = p.noise_variance,
            log_likelihood = model.log_likelihood(),
            "hyperparameters optimized"
        );
        Ok(model)
    }
}
