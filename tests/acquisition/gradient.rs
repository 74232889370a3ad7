use std::sync::Arc;

use fusion_ei::gradient::probability_gradient;
use fusion_ei::probability::probability;
use fusion_ei::{
    FusionExpectedImprovement, HyperparameterConfig, MeanSurrogate, ProbabilityParams,
    build_auxiliary_model,
};
use nalgebra::DMatrix;

use crate::{INPUTS, TARGET, candidates, mixed_sign_dataset, primary_3d};

fn fitted_model() -> fusion_ei::gp::GpRegression {
    let config = HyperparameterConfig::builder().seed(11).build().unwrap();
    build_auxiliary_model(Some(&mixed_sign_dataset()), TARGET, &INPUTS, &config)
        .unwrap()
        .unwrap()
}

/// Central difference of `f` along every column with step `h`.
fn numeric_gradient(
    x: &DMatrix<f64>,
    h: f64,
    f: impl Fn(&DMatrix<f64>) -> nalgebra::DVector<f64>,
) -> DMatrix<f64> {
    let mut out = DMatrix::zeros(x.nrows(), x.ncols());
    for c in 0..x.ncols() {
        let mut up = x.clone();
        let mut down = x.clone();
        up.column_mut(c).add_scalar_mut(h);
        down.column_mut(c).add_scalar_mut(-h);
        out.set_column(c, &((f(&up) - f(&down)) / (2.0 * h)));
    }
    out
}

#[test]
fn probability_gradient_covers_every_dimension() {
    let model = fitted_model();
    let params = ProbabilityParams::new(0.0, 0.5).unwrap();
    let x = candidates();
    let g = probability_gradient(&x, Some(&model), &params, model.lengthscale()).unwrap();

    let reference = numeric_gradient(&x, 1e-7, |p| {
        probability(p, Some(&model), &params).unwrap().probability
    });
    for r in 0..x.nrows() {
        for c in 0..x.ncols() {
            let (got, want) = (g[(r, c)], reference[(r, c)]);
            assert!(
                (got - want).abs() < 1e-4 * (1.0 + want.abs()),
                "row {r} dim {c}: {got} vs {want}"
            );
        }
    }
    // The target varies with CsPbI, so the first dimension is not flat.
    assert!(g.column(0).iter().any(|v| v.abs() > 1e-6));
}

#[test]
fn combined_gradient_matches_numeric_derivative() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .model(Arc::new(fitted_model()))
        .target_variable(TARGET)
        .beta(0.5)
        .build()
        .unwrap();

    let x = candidates();
    let (value, gradient) = acq.evaluate_with_gradient(&x).unwrap();
    let plain = acq.evaluate(&x).unwrap();
    assert!((value - plain).amax() < 1e-14);

    let reference = numeric_gradient(&x, 1e-6, |p| acq.evaluate(p).unwrap());
    for r in 0..x.nrows() {
        for c in 0..x.ncols() {
            let (got, want) = (gradient[(r, c)], reference[(r, c)]);
            assert!(
                (got - want).abs() < 1e-3 * (1.0 + want.abs()),
                "row {r} dim {c}: {got} vs {want}"
            );
        }
    }
}

#[test]
fn gradient_without_auxiliary_is_ei_gradient() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary).build().unwrap();
    let x = candidates();
    let (_, gradient) = acq.evaluate_with_gradient(&x).unwrap();
    let reference = numeric_gradient(&x, 1e-6, |p| acq.evaluate(p).unwrap());
    for (got, want) in gradient.iter().zip(reference.iter()) {
        assert!((got - want).abs() < 1e-4 * (1.0 + want.abs()), "{got} vs {want}");
    }
}

#[test]
fn analytical_gradient_flag() {
    assert!(FusionExpectedImprovement::<&fusion_ei::gp::GpRegression>::ANALYTICAL_GRADIENT);
}
