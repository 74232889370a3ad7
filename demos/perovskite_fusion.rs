//! Data-fusion Bayesian optimization over perovskite compositions.
//!
//! Minimizes a synthetic degradation measure over CsPbI/MAPbI/FAPbI
//! fractions while weighting Expected Improvement with the probability that
//! a composition is phase-stable according to simulated mixing enthalpies.
//!
//! Run with: `cargo run --example perovskite_fusion`

use fusion_ei::gp::{FitOptions, HyperparameterBounds, Hyperparameters};
use fusion_ei::prelude::*;
use fusion_ei::report::ternary_grid;
use nalgebra::{DMatrix, DVector};

/// Synthetic "measured" degradation: lower is better.
fn degradation(cs: f64, ma: f64, fa: f64) -> f64 {
    (cs - 0.25).powi(2) + 2.0 * (ma - 0.15).powi(2) + 0.3 * fa * ma
}

/// Synthetic mixing enthalpy: negative means stable.
fn mixing_enthalpy(cs: f64, ma: f64, fa: f64) -> f64 {
    0.12 * cs * cs - 0.05 * ma * fa - 0.02
}

fn main() -> Result<()> {
    // Auxiliary (simulated) data on a coarse ternary grid.
    let sim = ternary_grid(0.125)?;
    let enthalpy: Vec<f64> = sim
        .row_iter()
        .map(|r| mixing_enthalpy(r[0], r[1], r[2]))
        .collect();
    let dataset = AuxiliaryDataset::new()
        .with_column("CsPbI", sim.column(0).iter().copied().collect())?
        .with_column("MAPbI", sim.column(1).iter().copied().collect())?
        .with_column("FAPbI", sim.column(2).iter().copied().collect())?
        .with_column("dGmix (ev/f.u.)", enthalpy)?;

    // Initial experiments.
    let mut x = DMatrix::from_row_slice(
        4,
        3,
        &[0.1, 0.1, 0.8, 0.6, 0.2, 0.2, 0.2, 0.6, 0.2, 0.34, 0.33, 0.33],
    );
    let mut y = DVector::from_iterator(4, x.row_iter().map(|r| degradation(r[0], r[1], r[2])));

    let candidates = ternary_grid(0.02)?;
    let hyperparameters = HyperparameterConfig::builder().seed(7).build()?;

    for round in 0..8 {
        let primary = GpRegression::optimize(
            &x,
            &y,
            Hyperparameters {
                lengthscale: 0.3,
                variance: 1.0,
                noise_variance: 1e-4,
            },
            &HyperparameterBounds::default(),
            &FitOptions {
                seed: Some(round),
                ..FitOptions::default()
            },
        )?;

        let acquisition = FusionExpectedImprovement::builder(&primary)
            .jitter(0.01)
            .dataset(dataset.clone())
            .target_variable("dGmix (ev/f.u.)")
            .input_variables(["CsPbI", "MAPbI", "FAPbI"])
            .hyperparameters(hyperparameters.clone())
            .build()?;

        if round == 0 {
            acquisition.report(&mut |s: &FeasibilitySummary<'_>| {
                println!(
                    "{} over {} grid points: min {:.3}, max {:.3}",
                    s.kind,
                    s.points.nrows(),
                    s.min,
                    s.max
                );
            })?;
        }

        let scores = acquisition.evaluate(&candidates)?;
        let best = scores.imax();
        let next = candidates.row(best).clone_owned();
        let value = degradation(next[0], next[1], next[2]);
        println!(
            "round {round}: next = ({:.2}, {:.2}, {:.2}), acquisition = {:.4}, measured = {value:.4}",
            next[0], next[1], next[2], scores[best]
        );

        let last = x.nrows();
        x = x.insert_row(last, 0.0);
        x.set_row(last, &next);
        y = y.push(value);
    }

    let best = y.imin();
    println!(
        "best composition: ({:.2}, {:.2}, {:.2}) with degradation {:.4}",
        x[(best, 0)],
        x[(best, 1)],
        x[(best, 2)],
        y[best]
    );
    Ok(())
}
