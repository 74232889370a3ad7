#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Expected Improvement with a data-fusion feasibility probability.
//!
//! A Bayesian optimization step scores candidate points with Expected
//! Improvement (EI) computed from a surrogate of the objective. This crate
//! multiplies EI by a probability learned from an independent, auxiliary
//! dataset (for example simulated mixing enthalpies of a composition), so
//! that the search prefers regions the auxiliary knowledge marks as
//! favorable:
//!
//! `α(x) = EI(x) · P(x)`,  `P(x) = 1 / (1 + exp((m(x) - midpoint) / beta))`
//!
//! where `m(x)` is the posterior mean of a Gaussian Process fitted to the
//! auxiliary data. Lower auxiliary values are better. Without auxiliary data
//! `P ≡ 1` and `α` is plain EI.
//!
//! # Getting Started
//!
//! ```
//! use fusion_ei::prelude::*;
//! use nalgebra::{DMatrix, DVector};
//!
//! let x = DMatrix::from_row_slice(3, 2, &[0.1, 0.9, 0.5, 0.5, 0.9, 0.1]);
//! let y = DVector::from_vec(vec![0.3, 0.1, 0.6]);
//! let primary = GpRegression::fit_fixed(&x, &y, Matern52::new(0.4, 1.0)?, 1e-4)?;
//!
//! let dataset = AuxiliaryDataset::new()
//!     .with_column("a", vec![0.0, 0.5, 1.0])?
//!     .with_column("b", vec![1.0, 0.5, 0.0])?
//!     .with_column("energy", vec![-0.05, 0.02, 0.04])?;
//!
//! let acquisition = FusionExpectedImprovement::builder(&primary)
//!     .dataset(dataset)
//!     .target_variable("energy")
//!     .input_variables(["a", "b"])
//!     .hyperparameters(HyperparameterConfig::builder().auto_lengthscale().seed(1).build()?)
//!     .build()?;
//!
//! let scores = acquisition.evaluate(&DMatrix::from_row_slice(1, 2, &[0.2, 0.8]))?;
//! assert!(scores[0] >= 0.0);
//! # Ok::<(), Error>(())
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`FusionExpectedImprovement`] | `EI · P` and its gradient for a batch of candidates. |
//! | [`PrimarySurrogate`] | Capability interface of the objective's surrogate (borrowed). |
//! | [`MeanSurrogate`] | Capability interface of the auxiliary surrogate (posterior mean only). |
//! | [`AuxiliaryDataset`] | Named columns of auxiliary observations. |
//! | [`HyperparameterConfig`] | Initial hyperparameters and restarts of the auxiliary fit. |
//! | [`ProbabilityParams`] | Midpoint and scale of the mean → probability transform. |
//! | [`GpRegression`](gp::GpRegression) | Matérn 5/2 GP implementing both surrogate interfaces. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on configuration and data types | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) when fitting and scoring | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod acquisition;
pub mod auxiliary;
pub mod dataset;
mod error;
pub mod gp;
pub mod gradient;
pub mod probability;
pub mod report;
mod rng_util;
pub mod surrogate;

pub use acquisition::{FusionConfig, FusionExpectedImprovement, PrimarySurrogate};
pub use auxiliary::{HyperparameterConfig, build_auxiliary_model};
pub use dataset::AuxiliaryDataset;
pub use error::{Error, Result};
pub use probability::ProbabilityParams;
pub use surrogate::MeanSurrogate;

/// Convenient wildcard import for the most common types.
///
/// ```
/// use fusion_ei::prelude::*;
/// ```
pub mod prelude {
    pub use crate::acquisition::{
        FusionConfig, FusionExpectedImprovement, FusionExpectedImprovementBuilder,
        PrimarySurrogate,
    };
    pub use crate::auxiliary::{HyperparameterConfig, build_auxiliary_model};
    pub use crate::dataset::AuxiliaryDataset;
    pub use crate::error::{Error, Result};
    pub use crate::gp::{GpRegression, Matern52};
    pub use crate::probability::ProbabilityParams;
    pub use crate::report::{FeasibilityKind, FeasibilityObserver, FeasibilitySummary};
    pub use crate::surrogate::MeanSurrogate;
}
