//! Reporting hook for the feasibility probability over a ternary grid.
//!
//! For three-component compositions the probability can be summarized on a
//! regular grid of the simplex. Rendering is left to the caller: an
//! [`FeasibilityObserver`] receives the grid points, the probability at each
//! of them and its range, and may plot, log or store them.

use core::fmt;

use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};

/// Default grid step of [`ternary_grid`] when reporting.
pub const DEFAULT_GRID_INTERVAL: f64 = 0.005;

/// Physical meaning of the auxiliary target, derived from its column name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FeasibilityKind {
    /// Mixing enthalpy (`dGmix`): probability of a stable phase.
    PhaseStability,
    /// Yellowness: probability that the film stays dark.
    Darkness,
    /// Film uniformity.
    Uniformity,
    /// Degradation (`Ic`): probability of a stable film.
    Stability,
    /// Any other target.
    Other,
}

impl FeasibilityKind {
    /// Classifies a target column name.
    ///
    /// ```
    /// use fusion_ei::report::FeasibilityKind;
    ///
    /// assert_eq!(FeasibilityKind::from_target("dGmix (ev/f.u.)"), FeasibilityKind::PhaseStability);
    /// assert_eq!(FeasibilityKind::from_target("Yellowness"), FeasibilityKind::Darkness);
    /// assert_eq!(FeasibilityKind::from_target("bandgap"), FeasibilityKind::Other);
    /// ```
    #[must_use]
    pub fn from_target(name: &str) -> Self {
        let name = name.trim();
        if name.starts_with("dGmix") {
            Self::PhaseStability
        } else if name.eq_ignore_ascii_case("yellowness") {
            Self::Darkness
        } else if name.eq_ignore_ascii_case("uniformity") {
            Self::Uniformity
        } else if name.starts_with("Ic") {
            Self::Stability
        } else {
            Self::Other
        }
    }

    /// Short label for the probability, e.g. for a color bar.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PhaseStability => "P_phasestable",
            Self::Darkness => "P_dark",
            Self::Uniformity => "P_uniform",
            Self::Stability => "P_Ic",
            Self::Other => "P",
        }
    }
}

impl fmt::Display for FeasibilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Feasibility probability evaluated over a grid.
#[derive(Clone, Debug)]
pub struct FeasibilitySummary<'a> {
    /// What the probability means.
    pub kind: FeasibilityKind,
    /// Grid points, one row per point.
    pub points: &'a DMatrix<f64>,
    /// Probability at each grid point.
    pub probability: &'a DVector<f64>,
    /// Smallest probability on the grid.
    pub min: f64,
    /// Largest probability on the grid.
    pub max: f64,
}

impl<'a> FeasibilitySummary<'a> {
    pub(crate) fn new(
        kind: FeasibilityKind,
        points: &'a DMatrix<f64>,
        probability: &'a DVector<f64>,
    ) -> Self {
        Self {
            kind,
            points,
            probability,
            min: probability.min(),
            max: probability.max(),
        }
    }
}

/// Receives feasibility summaries produced by
/// [`FusionExpectedImprovement::report`](crate::FusionExpectedImprovement::report).
pub trait FeasibilityObserver {
    /// Called once per report.
    fn observe(&mut self, summary: &FeasibilitySummary<'_>);
}

impl<F> FeasibilityObserver for F
where
    F: FnMut(&FeasibilitySummary<'_>),
{
    fn observe(&mut self, summary: &FeasibilitySummary<'_>) {
        self(summary);
    }
}

/// Regular grid over the 2-simplex.
///
/// Each coordinate takes the values `0, interval, 2·interval, …` below 1;
/// a point is kept when its coordinates sum to 1 within `interval`.
///
/// # Errors
///
/// Returns `Error::InvalidGridInterval` unless `0 < interval <= 1`.
///
/// # Examples
///
/// ```
/// use fusion_ei::report::ternary_grid;
///
/// let grid = ternary_grid(0.25)?;
/// assert_eq!(grid.ncols(), 3);
/// for row in grid.row_iter() {
///     assert!((row.sum() - 1.0).abs() < 0.25);
/// }
/// # Ok::<(), fusion_ei::Error>(())
/// ```
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn ternary_grid(interval: f64) -> Result<DMatrix<f64>> {
    if !(interval.is_finite() && interval > 0.0 && interval <= 1.0) {
        return Err(Error::InvalidGridInterval(interval));
    }
    let n = (1.0 / interval).ceil() as usize;
    let values: Vec<f64> = (0..n)
        .map(|i| i as f64 * interval)
        .filter(|&v| v < 1.0)
        .collect();
    let n = values.len();

    let mut data = Vec::new();
    for (i, &a) in values.iter().enumerate() {
        for (j, &b) in values.iter().enumerate() {
            // Only indices next to n - i - j can land within one step of 1.
            let center = n as i64 - i as i64 - j as i64;
            for k in (center - 1)..=(center + 1) {
                if k < 0 || k >= n as i64 {
                    continue;
                }
                let c = values[k as usize];
                if (a + b + c - 1.0).abs() < interval {
                    data.extend_from_slice(&[a, b, c]);
                }
            }
        }
    }

    Ok(DMatrix::from_row_slice(data.len() / 3, 3, &data))
}
