use fusion_ei::acquisition::get_quantiles;
use fusion_ei::probability::probability;
use fusion_ei::{
    AuxiliaryDataset, Error, FusionExpectedImprovement, HyperparameterConfig, PrimarySurrogate,
    ProbabilityParams,
};
use nalgebra::{DMatrix, DVector};

use crate::{INPUTS, TARGET, candidates, perovskite_dataset, primary_3d};

fn seeded() -> HyperparameterConfig {
    HyperparameterConfig::builder().seed(42).build().unwrap()
}

fn plain_ei(primary: &impl PrimarySurrogate, x: &DMatrix<f64>, jitter: f64) -> DVector<f64> {
    let (mean, std) = primary.predict(x).unwrap();
    let q = get_quantiles(jitter, primary.best_observed(), &mean, &std);
    DVector::from_fn(x.nrows(), |i, _| std[i] * (q.u[i] * q.cdf[i] + q.pdf[i]))
}

#[test]
fn stable_training_compositions_are_likely_feasible() {
    let dataset = perovskite_dataset();
    let x_train = dataset.design_matrix(&INPUTS).unwrap();
    let primary = primary_3d();

    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(dataset)
        .target_variable(TARGET)
        .input_variables(INPUTS)
        .hyperparameters(seeded())
        .build()
        .unwrap();

    let model = acq.auxiliary_model().expect("auxiliary model is fitted");
    assert_eq!(model.input_dim(), 3);
    let feasibility = probability(&x_train, Some(model), acq.params()).unwrap();
    for (i, (&m, &p)) in feasibility
        .mean
        .iter()
        .zip(feasibility.probability.iter())
        .enumerate()
    {
        assert!(m < 0.0, "row {i}: mean {m} should stay negative");
        assert!(p > 0.5, "row {i}: probability {p} should exceed 0.5");
    }
}

#[test]
fn without_dataset_value_is_plain_ei() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .jitter(0.01)
        .build()
        .unwrap();
    assert!(acq.auxiliary_model().is_none());

    let x = candidates();
    let value = acq.evaluate(&x).unwrap();
    let expected = plain_ei(&primary, &x, 0.01);
    for i in 0..x.nrows() {
        assert!(
            (value[i] - expected[i]).abs() < 1e-14,
            "row {i}: {} vs {}",
            value[i],
            expected[i]
        );
    }
}

#[test]
fn empty_dataset_behaves_like_no_dataset() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(AuxiliaryDataset::new())
        .build()
        .unwrap();
    assert!(acq.auxiliary_model().is_none());

    let x = candidates();
    let value = acq.evaluate(&x).unwrap();
    let expected = plain_ei(&primary, &x, acq.jitter());
    assert!((value - expected).amax() < 1e-14);
}

#[test]
fn nan_candidate_is_rejected() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(INPUTS)
        .hyperparameters(seeded())
        .build()
        .unwrap();

    let mut x = candidates();
    x[(2, 0)] = f64::NAN;

    match acq.evaluate(&x) {
        Err(Error::NonFiniteCandidate { row, column, value }) => {
            assert_eq!((row, column), (2, 0));
            assert!(value.is_nan());
        }
        other => panic!("expected NonFiniteCandidate, got {other:?}"),
    }
    assert!(matches!(
        acq.evaluate_with_gradient(&x),
        Err(Error::NonFiniteCandidate { row: 2, column: 0, .. })
    ));
    assert!(matches!(
        acq.decompose(&x),
        Err(Error::NonFiniteCandidate { .. })
    ));

    x[(2, 0)] = f64::INFINITY;
    assert!(matches!(
        acq.evaluate(&x),
        Err(Error::NonFiniteCandidate { .. })
    ));
}

#[test]
fn vanishing_beta_drives_probability_to_zero_above_midpoint() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(INPUTS)
        .hyperparameters(seeded())
        .build()
        .unwrap();
    let model = acq.auxiliary_model().unwrap();
    let x = DMatrix::from_row_slice(1, 3, &[0.3, 0.3, 0.4]);
    let mean = model.predict_mean(&x).unwrap()[0];

    let midpoint = mean - 0.01;
    let mut previous = 1.0;
    for beta in [0.1, 0.01, 1e-3, 1e-4, 1e-5] {
        let params = ProbabilityParams::new(midpoint, beta).unwrap();
        let p = probability(&x, Some(model), &params).unwrap().probability[0];
        assert!(p < previous, "beta {beta}: {p} did not decrease from {previous}");
        previous = p;
    }
    assert!(previous < 1e-100);
}

#[test]
fn value_is_ei_times_probability() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(INPUTS)
        .beta(0.05)
        .midpoint(-0.1)
        .hyperparameters(seeded())
        .build()
        .unwrap();

    let x = candidates();
    let value = acq.evaluate(&x).unwrap();
    let ei = plain_ei(&primary, &x, acq.jitter());
    let p = probability(&x, acq.auxiliary_model(), acq.params())
        .unwrap()
        .probability;
    for i in 0..x.nrows() {
        assert!((value[i] - ei[i] * p[i]).abs() < 1e-14);
        assert!(value[i] <= ei[i]);
    }
}

#[test]
fn missing_column_is_reported() {
    let primary = primary_3d();
    let result = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(["CsPbI", "MAPbI", "CsPbBr"])
        .build();
    assert!(matches!(result, Err(Error::MissingColumn(name)) if name == "CsPbBr"));
}

#[test]
fn auxiliary_dimension_must_match_primary() {
    let primary = primary_3d();
    let result = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(["CsPbI", "MAPbI"])
        .hyperparameters(seeded())
        .build();
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            expected: 3,
            got: 2
        })
    ));
}
