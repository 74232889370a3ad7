//! Construction of the auxiliary surrogate from tabular data.
//!
//! The auxiliary surrogate is a Matérn 5/2 GP fitted once to an
//! independently collected dataset. Sparse auxiliary data easily drives an
//! unconstrained marginal-likelihood fit to degenerate hyperparameters,
//! which in turn makes the feasibility probability collapse to a step or a
//! constant. The fit therefore runs with hard bounds on the noise and
//! signal variance and with several restarts.
//!
//! # Auto-estimated hyperparameters
//!
//! | Value | When absent or `<= 0` | Floor when the estimate is 0 |
//! |-------|------------------------|------------------------------|
//! | noise variance | `0.01 · var(Y)` | `1e-12` |
//! | signal variance | `var(Y)` | `1` |
//! | lengthscale | `max(X) - min(X)` | `1` |
//!
//! # Bounds during fitting
//!
//! - noise variance ∈ `[1e-12, noise + max(Y)²]`
//! - signal variance ∈ `[variance · 1e-12, variance + max(Y)²]`

use nalgebra::{DMatrix, DVector};

use crate::dataset::AuxiliaryDataset;
use crate::error::{Error, Result};
use crate::gp::{Bounds, FitOptions, GpRegression, HyperparameterBounds, Hyperparameters};

/// Default kernel lengthscale.
pub const DEFAULT_LENGTHSCALE: f64 = 0.03;
/// Default kernel signal variance.
pub const DEFAULT_VARIANCE: f64 = 2.0;
/// Default (and minimum) number of optimizer restarts.
pub const MIN_RESTARTS: usize = 5;
/// Default maximum optimizer iterations per restart.
const DEFAULT_MAX_ITERS: usize = 1000;
/// Smallest admissible noise variance.
pub const NOISE_VARIANCE_FLOOR: f64 = 1e-12;

/// Initial hyperparameters and optimizer settings for the auxiliary surrogate.
///
/// `None` (or a non-positive value) for a hyperparameter means "estimate it
/// from the data".
///
/// # Examples
///
/// ```
/// use fusion_ei::HyperparameterConfig;
///
/// let config = HyperparameterConfig::builder()
///     .lengthscale(0.05)
///     .variance(1.0)
///     .n_restarts(8)
///     .seed(42)
///     .build()?;
/// assert_eq!(config.n_restarts(), 8);
/// # Ok::<(), fusion_ei::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HyperparameterConfig {
    lengthscale: Option<f64>,
    variance: Option<f64>,
    noise_variance: Option<f64>,
    n_restarts: usize,
    max_iters: usize,
    seed: Option<u64>,
}

impl Default for HyperparameterConfig {
    fn default() -> Self {
        Self {
            lengthscale: Some(DEFAULT_LENGTHSCALE),
            variance: Some(DEFAULT_VARIANCE),
            noise_variance: None,
            n_restarts: MIN_RESTARTS,
            max_iters: DEFAULT_MAX_ITERS,
            seed: None,
        }
    }
}

impl HyperparameterConfig {
    /// Creates a builder for configuring a `HyperparameterConfig`.
    #[must_use]
    pub fn builder() -> HyperparameterConfigBuilder {
        HyperparameterConfigBuilder::new()
    }

    /// Initial lengthscale, `None` if estimated from data.
    #[must_use]
    pub fn lengthscale(&self) -> Option<f64> {
        self.lengthscale
    }

    /// Initial signal variance, `None` if estimated from data.
    #[must_use]
    pub fn variance(&self) -> Option<f64> {
        self.variance
    }

    /// Initial noise variance, `None` if estimated from data.
    #[must_use]
    pub fn noise_variance(&self) -> Option<f64> {
        self.noise_variance
    }

    /// Number of optimizer restarts.
    #[must_use]
    pub fn n_restarts(&self) -> usize {
        self.n_restarts
    }

    /// Maximum optimizer iterations per restart.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Seed for the restart perturbations.
    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Resolves the initial hyperparameters and fitting bounds for `(x, y)`.
    ///
    /// Applies the auto-estimates and floors listed in the module docs.
    /// `x` and `y` must be non-empty.
    ///
    /// # Errors
    ///
    /// Returns `Error::FitFailed` for empty data.
    pub fn resolve(
        &self,
        x: &DMatrix<f64>,
        y: &DVector<f64>,
    ) -> Result<(Hyperparameters, HyperparameterBounds)> {
        if y.is_empty() || x.is_empty() {
            return Err(Error::FitFailed("empty training set"));
        }
        let y_var = population_variance(y);
        let y_max = y.max();
        let y_max_sq = y_max * y_max;

        let noise_variance = match positive(self.noise_variance) {
            Some(v) => v,
            None => {
                let estimate = 0.01 * y_var;
                trace_debug!(estimate, "noise variance estimated from target variance");
                if estimate <= 0.0 {
                    NOISE_VARIANCE_FLOOR
                } else {
                    estimate
                }
            }
        };

        let variance = match positive(self.variance) {
            Some(v) => v,
            None => {
                trace_debug!(estimate = y_var, "signal variance estimated from target variance");
                if y_var <= 0.0 { 1.0 } else { y_var }
            }
        };

        let lengthscale = match positive(self.lengthscale) {
            Some(v) => v,
            None => {
                let span = x.max() - x.min();
                trace_debug!(estimate = span, "lengthscale estimated from input range");
                if span <= 0.0 { 1.0 } else { span }
            }
        };

        let bounds = HyperparameterBounds {
            lengthscale: None,
            variance: Some(Bounds::new(
                variance * 1e-12,
                (variance + y_max_sq).max(variance * 1e-12),
            )?),
            noise_variance: Some(Bounds::new(
                NOISE_VARIANCE_FLOOR,
                (noise_variance + y_max_sq).max(NOISE_VARIANCE_FLOOR),
            )?),
        };

        Ok((
            Hyperparameters {
                lengthscale,
                variance,
                noise_variance,
            },
            bounds,
        ))
    }

    /// Checks that every value is finite and enough restarts are requested.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHyperparameter` for a NaN or infinite value and
    /// `Error::TooFewRestarts` for fewer than 5 restarts.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("lengthscale", self.lengthscale),
            ("variance", self.variance),
            ("noise_variance", self.noise_variance),
        ] {
            if let Some(v) = value
                && !v.is_finite()
            {
                return Err(Error::InvalidHyperparameter { name, value: v });
            }
        }
        if self.n_restarts < MIN_RESTARTS {
            return Err(Error::TooFewRestarts {
                got: self.n_restarts,
                min: MIN_RESTARTS,
            });
        }
        Ok(())
    }

    fn fit_options(&self) -> FitOptions {
        FitOptions {
            n_restarts: self.n_restarts,
            max_iters: self.max_iters,
            seed: self.seed,
        }
    }
}

/// Builder for [`HyperparameterConfig`].
///
/// Defaults:
/// - `lengthscale`: 0.03
/// - `variance`: 2.0
/// - `noise_variance`: estimated from data
/// - `n_restarts`: 5 (also the minimum)
/// - `max_iters`: 1000
/// - `seed`: random
#[derive(Clone, Debug)]
pub struct HyperparameterConfigBuilder {
    config: HyperparameterConfig,
}

impl Default for HyperparameterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperparameterConfigBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: HyperparameterConfig::default(),
        }
    }

    /// Sets the initial lengthscale. Non-positive values request an estimate.
    #[must_use]
    pub fn lengthscale(mut self, v: f64) -> Self {
        self.config.lengthscale = Some(v);
        self
    }

    /// Estimates the initial lengthscale from the input range.
    #[must_use]
    pub fn auto_lengthscale(mut self) -> Self {
        self.config.lengthscale = None;
        self
    }

    /// Sets the initial signal variance. Non-positive values request an estimate.
    #[must_use]
    pub fn variance(mut self, v: f64) -> Self {
        self.config.variance = Some(v);
        self
    }

    /// Estimates the initial signal variance from the target variance.
    #[must_use]
    pub fn auto_variance(mut self) -> Self {
        self.config.variance = None;
        self
    }

    /// Sets the initial noise variance. Non-positive values request an estimate.
    #[must_use]
    pub fn noise_variance(mut self, v: f64) -> Self {
        self.config.noise_variance = Some(v);
        self
    }

    /// Sets the number of optimizer restarts (at least 5).
    #[must_use]
    pub fn n_restarts(mut self, n: usize) -> Self {
        self.config.n_restarts = n;
        self
    }

    /// Sets the maximum optimizer iterations per restart.
    #[must_use]
    pub fn max_iters(mut self, n: usize) -> Self {
        self.config.max_iters = n;
        self
    }

    /// Sets the random seed for reproducible restarts.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// See [`HyperparameterConfig::validate`].
    pub fn build(self) -> Result<HyperparameterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|&v| v > 0.0)
}

/// Population variance (divides by `n`).
#[allow(clippy::cast_precision_loss)]
fn population_variance(y: &DVector<f64>) -> f64 {
    let n = y.len() as f64;
    let mean = y.sum() / n;
    y.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Fits the auxiliary surrogate, or returns `None` when there is no data.
///
/// An absent or empty dataset is not an error: it means there is no
/// auxiliary knowledge and the feasibility probability is identically 1.
///
/// # Errors
///
/// Returns `Error::TooFewRestarts` or `Error::InvalidHyperparameter` for
/// a config that fails [`HyperparameterConfig::validate`],
/// `Error::NoInputVariables`, `Error::MissingColumn` or
/// `Error::NonFiniteData` for a malformed dataset and `Error::FitFailed`
/// if no optimizer restart produces a usable model.
///
/// # Examples
///
/// ```
/// use fusion_ei::{build_auxiliary_model, AuxiliaryDataset, HyperparameterConfig};
///
/// let config = HyperparameterConfig::default();
/// let none = build_auxiliary_model(None, "dGmix", &["CsPbI"], &config)?;
/// assert!(none.is_none());
///
/// let empty = AuxiliaryDataset::new();
/// assert!(build_auxiliary_model(Some(&empty), "dGmix", &["CsPbI"], &config)?.is_none());
/// # Ok::<(), fusion_ei::Error>(())
/// ```
pub fn build_auxiliary_model<S: AsRef<str>>(
    dataset: Option<&AuxiliaryDataset>,
    target_variable: &str,
    input_variables: &[S],
    config: &HyperparameterConfig,
) -> Result<Option<GpRegression>> {
    config.validate()?;
    let Some(dataset) = dataset.filter(|d| !d.is_empty()) else {
        trace_info!("no auxiliary data; feasibility probability disabled");
        return Ok(None);
    };

    let x = dataset.design_matrix(input_variables)?;
    let y = dataset.target(target_variable)?;
    let (init, bounds) = config.resolve(&x, &y)?;

    trace_info!(
        n_rows = x.nrows(),
        input_dim = x.ncols(),
        target_variable,
        lengthscale = init.lengthscale,
        variance = init.variance,
        noise_variance = init.noise_variance,
        "fitting auxiliary surrogate"
    );

    GpRegression::optimize(&x, &y, init, &bounds, &config.fit_options()).map(Some)
}
