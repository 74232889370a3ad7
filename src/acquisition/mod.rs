//! Expected Improvement weighted by a data-fusion feasibility probability.
//!
//! [`FusionExpectedImprovement`] scores candidate points for minimization as
//!
//! `α(x) = EI(x) · P(x)`
//!
//! where `EI` comes from the primary surrogate of the objective and `P` is
//! the feasibility probability of the auxiliary surrogate (see
//! [`probability`](crate::probability)). Without auxiliary data `P ≡ 1` and
//! `α` reduces to plain Expected Improvement.
//!
//! # Gradient
//!
//! `∇α = ∇EI · P + EI · ∇P`. The EI part is analytic,
//! `∇EI = φ(u) ∇s - Φ(u) ∇m`; the probability part uses central finite
//! differences with a step of `lengthscale / 1000` of the fitted auxiliary
//! model.
//!
//! # Configuration
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `jitter` | 0.01 | Exploration margin subtracted from the improvement |
//! | `beta` | 0.025 | Sigmoid scale of the probability transform |
//! | `midpoint` | 0 | Auxiliary mean with probability 0.5 |
//! | `hyperparameters` | see [`HyperparameterConfig`] | Auxiliary GP initial values and restarts |
//! | `dataset` | none | Auxiliary observations |
//! | `target_variable` | none | Auxiliary target column, required with a non-empty dataset |
//! | `input_variables` | none | Auxiliary input columns |
//! | `model` | none | Pre-fitted auxiliary model, takes precedence over `dataset` |
//!
//! # Examples
//!
//! ```
//! use fusion_ei::gp::{GpRegression, Matern52};
//! use fusion_ei::{AuxiliaryDataset, FusionExpectedImprovement, HyperparameterConfig};
//! use nalgebra::{DMatrix, DVector};
//!
//! // Primary surrogate of the objective over three composition fractions.
//! let x = DMatrix::from_row_slice(3, 3, &[0.2, 0.3, 0.5, 0.6, 0.2, 0.2, 0.1, 0.8, 0.1]);
//! let y = DVector::from_vec(vec![1.0, 0.4, 0.7]);
//! let primary = GpRegression::fit_fixed(&x, &y, Matern52::new(0.5, 1.0)?, 1e-4)?;
//!
//! // Auxiliary mixing enthalpies (negative means stable).
//! let dataset = AuxiliaryDataset::from_rows(
//!     &["CsPbI", "MAPbI", "FAPbI", "dGmix"],
//!     &[
//!         vec![0.0, 0.0, 1.0, -0.02],
//!         vec![0.5, 0.0, 0.5, 0.01],
//!         vec![0.0, 0.5, 0.5, -0.03],
//!         vec![0.3, 0.3, 0.4, -0.01],
//!     ],
//! )?;
//!
//! let acquisition = FusionExpectedImprovement::builder(&primary)
//!     .jitter(0.01)
//!     .dataset(dataset)
//!     .target_variable("dGmix")
//!     .input_variables(["CsPbI", "MAPbI", "FAPbI"])
//!     .hyperparameters(HyperparameterConfig::builder().seed(7).build()?)
//!     .build()?;
//!
//! let candidates = DMatrix::from_row_slice(2, 3, &[0.1, 0.1, 0.8, 0.4, 0.4, 0.2]);
//! let (value, gradient) = acquisition.evaluate_with_gradient(&candidates)?;
//! assert_eq!(value.len(), 2);
//! assert_eq!(gradient.shape(), (2, 3));
//! # Ok::<(), fusion_ei::Error>(())
//! ```

mod primary;
mod quantiles;

use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

pub use primary::PrimarySurrogate;
pub use quantiles::{Quantiles, STD_FLOOR, get_quantiles};

use crate::auxiliary::{HyperparameterConfig, build_auxiliary_model};
use crate::dataset::AuxiliaryDataset;
use crate::error::{Error, Result};
use crate::gradient::probability_gradient;
use crate::probability::{DEFAULT_BETA, DEFAULT_MIDPOINT, ProbabilityParams, probability};
use crate::report::{
    DEFAULT_GRID_INTERVAL, FeasibilityKind, FeasibilityObserver, FeasibilitySummary, ternary_grid,
};
use crate::surrogate::MeanSurrogate;

/// Default exploration jitter.
pub const DEFAULT_JITTER: f64 = 0.01;

/// Plain configuration record for [`FusionExpectedImprovement`].
///
/// Every field has a default, so a partially filled record (for example one
/// deserialized with the `serde` feature) is always complete. The auxiliary
/// dataset itself is passed separately to
/// [`FusionExpectedImprovement::from_config`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FusionConfig {
    /// Exploration jitter.
    pub jitter: f64,
    /// Sigmoid scale of the probability transform.
    pub beta: f64,
    /// Auxiliary mean mapped to probability 0.5.
    pub midpoint: f64,
    /// Auxiliary target column.
    pub target_variable: Option<String>,
    /// Auxiliary input columns, in the order of the candidate coordinates.
    pub input_variables: Vec<String>,
    /// Auxiliary GP hyperparameters.
    pub hyperparameters: HyperparameterConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            jitter: DEFAULT_JITTER,
            beta: DEFAULT_BETA,
            midpoint: DEFAULT_MIDPOINT,
            target_variable: None,
            input_variables: Vec::new(),
            hyperparameters: HyperparameterConfig::default(),
        }
    }
}

/// Expected Improvement multiplied by an auxiliary feasibility probability.
///
/// The auxiliary model is fitted once in [`build`](FusionExpectedImprovementBuilder::build)
/// and never changes afterwards. All evaluation methods take `&self`, so
/// one instance can score disjoint batches from several threads when `P`
/// is `Sync`.
pub struct FusionExpectedImprovement<P> {
    primary: P,
    jitter: f64,
    params: ProbabilityParams,
    auxiliary: Option<Arc<dyn MeanSurrogate>>,
    target_variable: Option<String>,
}

/// Per-point pieces of Expected Improvement.
struct EiTerms {
    std: DVector<f64>,
    quantiles: Quantiles,
    ei: DVector<f64>,
}

impl EiTerms {
    fn new(jitter: f64, fmin: f64, mean: &DVector<f64>, std: DVector<f64>) -> Self {
        let quantiles = get_quantiles(jitter, fmin, mean, &std);
        let ei = DVector::from_fn(std.len(), |i, _| {
            let s = std[i].max(STD_FLOOR);
            s * (quantiles.u[i] * quantiles.cdf[i] + quantiles.pdf[i])
        });
        Self { std, quantiles, ei }
    }
}

impl<P: PrimarySurrogate> FusionExpectedImprovement<P> {
    /// The value gradient returned by
    /// [`evaluate_with_gradient`](Self::evaluate_with_gradient) is analytic
    /// in the primary model.
    pub const ANALYTICAL_GRADIENT: bool = true;

    /// Creates a builder around the primary surrogate.
    ///
    /// Pass `&model` to borrow a model owned by the surrounding optimizer.
    #[must_use]
    pub fn builder(primary: P) -> FusionExpectedImprovementBuilder<P> {
        FusionExpectedImprovementBuilder::new(primary)
    }

    /// Creates the acquisition from a configuration record.
    ///
    /// # Errors
    ///
    /// See [`FusionExpectedImprovementBuilder::build`].
    pub fn from_config(
        primary: P,
        config: FusionConfig,
        dataset: Option<AuxiliaryDataset>,
    ) -> Result<Self> {
        let mut builder = Self::builder(primary)
            .jitter(config.jitter)
            .beta(config.beta)
            .midpoint(config.midpoint)
            .input_variables(config.input_variables)
            .hyperparameters(config.hyperparameters);
        if let Some(target) = config.target_variable {
            builder = builder.target_variable(target);
        }
        if let Some(dataset) = dataset {
            builder = builder.dataset(dataset);
        }
        builder.build()
    }

    /// Returns the primary surrogate.
    #[must_use]
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// Returns the exploration jitter.
    #[must_use]
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Returns the probability transform parameters.
    #[must_use]
    pub fn params(&self) -> &ProbabilityParams {
        &self.params
    }

    /// Returns the fitted auxiliary model, `None` without auxiliary data.
    #[must_use]
    pub fn auxiliary_model(&self) -> Option<&dyn MeanSurrogate> {
        self.auxiliary.as_deref()
    }

    /// Returns the auxiliary target column, if one was set.
    #[must_use]
    pub fn target_variable(&self) -> Option<&str> {
        self.target_variable.as_deref()
    }

    /// Fitted lengthscale of the auxiliary model.
    #[must_use]
    pub fn lengthscale(&self) -> Option<f64> {
        self.auxiliary.as_ref().map(|m| m.lengthscale())
    }

    /// Fitted signal variance of the auxiliary model.
    #[must_use]
    pub fn variance(&self) -> Option<f64> {
        self.auxiliary.as_ref().and_then(|m| m.variance())
    }

    /// Acquisition value `EI(x) · P(x)` for each row of `x`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NonFiniteCandidate` if any coordinate is NaN or
    /// infinite, `Error::DimensionMismatch` for the wrong column count, and
    /// propagates model errors.
    pub fn evaluate(&self, x: &DMatrix<f64>) -> Result<DVector<f64>> {
        self.validate(x)?;
        let (mean, std) = self.primary.predict(x)?;
        let terms = EiTerms::new(self.jitter, self.primary.best_observed(), &mean, std);
        let feasibility = probability(x, self.auxiliary.as_deref(), &self.params)?;

        trace_debug!(
            n_points = x.nrows(),
            max_ei = terms.ei.max(),
            min_probability = feasibility.probability.min(),
            "evaluated fusion acquisition"
        );

        Ok(terms.ei.component_mul(&feasibility.probability))
    }

    /// Acquisition value and its gradient with respect to `x`.
    ///
    /// Returns `(EI·P, ∇EI·P + EI·∇P)` with the gradient of shape `[n, d]`.
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub fn evaluate_with_gradient(&self, x: &DMatrix<f64>) -> Result<(DVector<f64>, DMatrix<f64>)> {
        self.validate(x)?;
        let prediction = self.primary.predict_with_gradient(x)?;
        let terms = EiTerms::new(
            self.jitter,
            self.primary.best_observed(),
            &prediction.mean,
            prediction.std,
        );
        let p = probability(x, self.auxiliary.as_deref(), &self.params)?.probability;

        let (n, d) = x.shape();
        let d_p = match self.auxiliary.as_deref() {
            Some(model) => probability_gradient(x, Some(model), &self.params, model.lengthscale())?,
            None => DMatrix::zeros(n, d),
        };

        let q = &terms.quantiles;
        let gradient = DMatrix::from_fn(n, d, |r, c| {
            let d_ei = prediction.d_std[(r, c)] * q.pdf[r] - q.cdf[r] * prediction.d_mean[(r, c)];
            d_ei * p[r] + terms.ei[r] * d_p[(r, c)]
        });

        trace_debug!(
            n_points = n,
            max_gradient = gradient.amax(),
            "evaluated fusion acquisition gradient"
        );

        Ok((terms.ei.component_mul(&p), gradient))
    }

    /// Splits the acquisition into its exploitation and exploration parts.
    ///
    /// Returns `(s·u·Φ(u)·P, s·φ(u)·P)` per row; the two parts sum to the
    /// value of [`evaluate`](Self::evaluate).
    ///
    /// # Errors
    ///
    /// Same as [`evaluate`](Self::evaluate).
    pub fn decompose(&self, x: &DMatrix<f64>) -> Result<(DVector<f64>, DVector<f64>)> {
        self.validate(x)?;
        let (mean, std) = self.primary.predict(x)?;
        let terms = EiTerms::new(self.jitter, self.primary.best_observed(), &mean, std);
        let p = probability(x, self.auxiliary.as_deref(), &self.params)?.probability;

        let q = &terms.quantiles;
        let n = x.nrows();
        let s = |i: usize| terms.std[i].max(STD_FLOOR);
        let exploitation = DVector::from_fn(n, |i, _| s(i) * q.u[i] * q.cdf[i] * p[i]);
        let exploration = DVector::from_fn(n, |i, _| s(i) * q.pdf[i] * p[i]);

        trace_debug!(
            exploitation = exploitation.mean(),
            exploration = exploration.mean(),
            "acquisition decomposition"
        );

        Ok((exploitation, exploration))
    }

    /// Evaluates the feasibility probability on the default ternary grid and
    /// passes the summary to `observer`.
    ///
    /// Returns `Ok(false)` without calling the observer when there is no
    /// auxiliary model, the model does not have exactly three inputs, or the
    /// target variable has no known meaning.
    ///
    /// # Errors
    ///
    /// Propagates auxiliary model errors.
    pub fn report(&self, observer: &mut dyn FeasibilityObserver) -> Result<bool> {
        self.report_on_grid(DEFAULT_GRID_INTERVAL, observer)
    }

    /// Like [`report`](Self::report) with a custom grid step.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidGridInterval` for a step outside `(0, 1]` and
    /// propagates auxiliary model errors.
    pub fn report_on_grid(
        &self,
        interval: f64,
        observer: &mut dyn FeasibilityObserver,
    ) -> Result<bool> {
        let Some(model) = self.auxiliary.as_deref() else {
            trace_debug!("no auxiliary model; skipping feasibility report");
            return Ok(false);
        };
        if model.input_dim() != 3 {
            trace_info!(
                input_dim = model.input_dim(),
                "feasibility report needs three input variables; skipping"
            );
            return Ok(false);
        }
        let kind = self
            .target_variable
            .as_deref()
            .map_or(FeasibilityKind::Other, FeasibilityKind::from_target);
        if kind == FeasibilityKind::Other {
            trace_info!(
                target_variable = self.target_variable.as_deref(),
                "unknown auxiliary target; skipping feasibility report"
            );
            return Ok(false);
        }

        let points = ternary_grid(interval)?;
        if points.nrows() == 0 {
            return Ok(false);
        }
        let feasibility = probability(&points, Some(model), &self.params)?;
        let summary = FeasibilitySummary::new(kind, &points, &feasibility.probability);
        trace_info!(
            kind = %kind,
            n_points = points.nrows(),
            min = summary.min,
            max = summary.max,
            "feasibility report"
        );
        observer.observe(&summary);
        Ok(true)
    }

    /// Rejects batches with the wrong width or non-finite coordinates.
    fn validate(&self, x: &DMatrix<f64>) -> Result<()> {
        let expected = self.primary.input_dim();
        if x.ncols() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                got: x.ncols(),
            });
        }
        for row in 0..x.nrows() {
            for column in 0..x.ncols() {
                let value = x[(row, column)];
                if !value.is_finite() {
                    trace_info!(row, column, "non-finite candidate coordinate");
                    return Err(Error::NonFiniteCandidate { row, column, value });
                }
            }
        }
        Ok(())
    }
}

/// Builder for [`FusionExpectedImprovement`].
///
/// See the [module docs](crate::acquisition) for defaults.
pub struct FusionExpectedImprovementBuilder<P> {
    primary: P,
    jitter: f64,
    beta: f64,
    midpoint: f64,
    hyperparameters: HyperparameterConfig,
    dataset: Option<AuxiliaryDataset>,
    target_variable: Option<String>,
    input_variables: Vec<String>,
    model: Option<Arc<dyn MeanSurrogate>>,
}

impl<P: PrimarySurrogate> FusionExpectedImprovementBuilder<P> {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new(primary: P) -> Self {
        Self {
            primary,
            jitter: DEFAULT_JITTER,
            beta: DEFAULT_BETA,
            midpoint: DEFAULT_MIDPOINT,
            hyperparameters: HyperparameterConfig::default(),
            dataset: None,
            target_variable: None,
            input_variables: Vec::new(),
            model: None,
        }
    }

    /// Sets the exploration jitter.
    ///
    /// Default: 0.01.
    #[must_use]
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Sets the sigmoid scale. Smaller values give a sharper transition.
    ///
    /// Default: 0.025.
    #[must_use]
    pub fn beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Sets the auxiliary mean that maps to probability 0.5.
    ///
    /// Default: 0.
    #[must_use]
    pub fn midpoint(mut self, midpoint: f64) -> Self {
        self.midpoint = midpoint;
        self
    }

    /// Sets the auxiliary GP hyperparameters.
    #[must_use]
    pub fn hyperparameters(mut self, config: HyperparameterConfig) -> Self {
        self.hyperparameters = config;
        self
    }

    /// Sets the auxiliary dataset.
    #[must_use]
    pub fn dataset(mut self, dataset: AuxiliaryDataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Sets the auxiliary target column.
    #[must_use]
    pub fn target_variable(mut self, name: impl Into<String>) -> Self {
        self.target_variable = Some(name.into());
        self
    }

    /// Sets the auxiliary input columns, in candidate coordinate order.
    #[must_use]
    pub fn input_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_variables = names.into_iter().map(Into::into).collect();
        self
    }

    /// Uses a pre-fitted auxiliary model instead of fitting one.
    #[must_use]
    pub fn model(mut self, model: Arc<dyn MeanSurrogate>) -> Self {
        self.model = Some(model);
        self
    }

    /// Validates the configuration and fits the auxiliary model.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidJitter` for a negative or non-finite jitter.
    /// - `Error::InvalidBeta` / `Error::InvalidMidpoint` for bad transform
    ///   parameters.
    /// - `Error::InvalidHyperparameter` / `Error::TooFewRestarts` from the
    ///   hyperparameter config.
    /// - `Error::MissingTargetVariable` for a non-empty dataset without a
    ///   target column.
    /// - `Error::DimensionMismatch` when the auxiliary model and the
    ///   primary model disagree on the input dimensionality.
    /// - Dataset and fitting errors from
    ///   [`build_auxiliary_model`](crate::build_auxiliary_model).
    pub fn build(self) -> Result<FusionExpectedImprovement<P>> {
        if !(self.jitter.is_finite() && self.jitter >= 0.0) {
            return Err(Error::InvalidJitter(self.jitter));
        }
        let params = ProbabilityParams::new(self.midpoint, self.beta)?;
        self.hyperparameters.validate()?;

        let auxiliary = match (self.model, &self.dataset) {
            (Some(model), _) => Some(model),
            (None, Some(dataset)) if !dataset.is_empty() => {
                let target = self
                    .target_variable
                    .as_deref()
                    .ok_or(Error::MissingTargetVariable)?;
                build_auxiliary_model(
                    Some(dataset),
                    target,
                    &self.input_variables,
                    &self.hyperparameters,
                )?
                .map(|gp| Arc::new(gp) as Arc<dyn MeanSurrogate>)
            }
            (None, _) => None,
        };

        if let Some(model) = &auxiliary
            && model.input_dim() != self.primary.input_dim()
        {
            return Err(Error::DimensionMismatch {
                expected: self.primary.input_dim(),
                got: model.input_dim(),
            });
        }

        trace_info!(
            jitter = self.jitter,
            beta = params.beta(),
            midpoint = params.midpoint(),
            auxiliary = auxiliary.is_some(),
            "built fusion acquisition"
        );

        Ok(FusionExpectedImprovement {
            primary: self.primary,
            jitter: self.jitter,
            params,
            auxiliary,
            target_variable: self.target_variable,
        })
    }
}
