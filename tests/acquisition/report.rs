use std::sync::Arc;

use fusion_ei::report::{FeasibilityKind, FeasibilitySummary};
use fusion_ei::{FusionExpectedImprovement, HyperparameterConfig, build_auxiliary_model};

use crate::{INPUTS, TARGET, perovskite_dataset, primary_3d};

fn seeded() -> HyperparameterConfig {
    HyperparameterConfig::builder().seed(3).build().unwrap()
}

#[test]
fn phase_stability_is_reported_on_ternary_grid() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(INPUTS)
        .hyperparameters(seeded())
        .build()
        .unwrap();

    let mut seen = Vec::new();
    let reported = acq
        .report_on_grid(0.05, &mut |s: &FeasibilitySummary<'_>| {
            assert_eq!(s.points.ncols(), 3);
            assert_eq!(s.points.nrows(), s.probability.len());
            for row in s.points.row_iter() {
                assert!((row.sum() - 1.0).abs() < 0.05);
            }
            seen.push((s.kind, s.min, s.max));
        })
        .unwrap();

    assert!(reported);
    assert_eq!(seen.len(), 1);
    let (kind, min, max) = seen[0];
    assert_eq!(kind, FeasibilityKind::PhaseStability);
    assert!(0.0 <= min && min <= max && max <= 1.0);
}

#[test]
fn default_grid_report() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable("Yellowness")
        .input_variables(INPUTS)
        .hyperparameters(seeded())
        .build();
    // The dataset has no Yellowness column.
    assert!(acq.is_err());

    let model = build_auxiliary_model(Some(&perovskite_dataset()), TARGET, &INPUTS, &seeded())
        .unwrap()
        .unwrap();
    let acq = FusionExpectedImprovement::builder(&primary)
        .model(Arc::new(model))
        .target_variable("Yellowness")
        .build()
        .unwrap();

    let mut n_points = 0;
    let mut kind = None;
    let reported = acq
        .report(&mut |s: &FeasibilitySummary<'_>| {
            n_points = s.points.nrows();
            kind = Some(s.kind);
        })
        .unwrap();
    assert!(reported);
    assert_eq!(kind, Some(FeasibilityKind::Darkness));
    assert!(n_points > 10_000);
}

#[test]
fn report_is_skipped_without_model_or_known_target() {
    let primary = primary_3d();
    let mut calls = 0;

    let plain = FusionExpectedImprovement::builder(&primary).build().unwrap();
    assert!(!plain.report(&mut |_: &FeasibilitySummary<'_>| calls += 1).unwrap());

    let unnamed = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(INPUTS)
        .hyperparameters(seeded())
        .build()
        .unwrap();
    assert!(unnamed.report(&mut |_: &FeasibilitySummary<'_>| calls += 1).unwrap());

    let model = build_auxiliary_model(Some(&perovskite_dataset()), TARGET, &INPUTS, &seeded())
        .unwrap()
        .unwrap();
    let unknown = FusionExpectedImprovement::builder(&primary)
        .model(Arc::new(model))
        .target_variable("bandgap")
        .build()
        .unwrap();
    assert!(!unknown.report(&mut |_: &FeasibilitySummary<'_>| calls += 1).unwrap());

    assert_eq!(calls, 1);
}
