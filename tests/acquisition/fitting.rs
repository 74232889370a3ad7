use fusion_ei::{AuxiliaryDataset, Error, HyperparameterConfig, build_auxiliary_model};

use crate::{INPUTS, TARGET, mixed_sign_dataset, perovskite_dataset};

#[test]
fn refit_with_same_seed_is_reproducible() {
    let dataset = mixed_sign_dataset();
    let config = HyperparameterConfig::builder()
        .n_restarts(6)
        .seed(2024)
        .build()
        .unwrap();

    let a = build_auxiliary_model(Some(&dataset), TARGET, &INPUTS, &config)
        .unwrap()
        .unwrap()
        .hyperparameters();
    let b = build_auxiliary_model(Some(&dataset), TARGET, &INPUTS, &config)
        .unwrap()
        .unwrap()
        .hyperparameters();

    assert!((a.lengthscale - b.lengthscale).abs() <= 1e-9 * a.lengthscale);
    assert!((a.variance - b.variance).abs() <= 1e-9 * a.variance);
    assert!((a.noise_variance - b.noise_variance).abs() <= 1e-9 * a.noise_variance);
}

#[test]
fn fitted_variances_respect_bounds() {
    let dataset = perovskite_dataset();
    let y = dataset.target(TARGET).unwrap();
    let y_max_sq = y.max().powi(2);
    let config = HyperparameterConfig::builder()
        .variance(2.0)
        .noise_variance(1e-4)
        .seed(5)
        .build()
        .unwrap();

    let model = build_auxiliary_model(Some(&dataset), TARGET, &INPUTS, &config)
        .unwrap()
        .unwrap();
    let h = model.hyperparameters();

    let eps = 1e-9;
    assert!(h.noise_variance >= 1e-12 * (1.0 - eps));
    assert!(h.noise_variance <= (1e-4 + y_max_sq) * (1.0 + eps));
    assert!(h.variance >= 2.0e-12 * (1.0 - eps));
    assert!(h.variance <= (2.0 + y_max_sq) * (1.0 + eps));
    assert!(h.lengthscale > 0.0 && h.lengthscale.is_finite());
    assert!(model.log_likelihood().is_finite());
}

#[test]
fn fit_improves_on_initial_guess() {
    let dataset = mixed_sign_dataset();
    let x = dataset.design_matrix(&INPUTS).unwrap();
    let y = dataset.target(TARGET).unwrap();
    let config = HyperparameterConfig::builder().seed(9).build().unwrap();

    let (init, _) = config.resolve(&x, &y).unwrap();
    let initial = fusion_ei::gp::GpRegression::fit_fixed(
        &x,
        &y,
        fusion_ei::gp::Matern52::new(init.lengthscale, init.variance).unwrap(),
        init.noise_variance,
    )
    .unwrap();
    let fitted = build_auxiliary_model(Some(&dataset), TARGET, &INPUTS, &config)
        .unwrap()
        .unwrap();

    assert!(fitted.log_likelihood() >= initial.log_likelihood() - 1e-9);
}

#[test]
fn constant_target_still_fits() {
    let dataset = AuxiliaryDataset::from_rows(
        &["a", "b", "y"],
        &[
            vec![0.0, 1.0, 0.0],
            vec![0.5, 0.5, 0.0],
            vec![1.0, 0.0, 0.0],
        ],
    )
    .unwrap();
    let config = HyperparameterConfig::builder()
        .auto_lengthscale()
        .auto_variance()
        .seed(1)
        .build()
        .unwrap();
    let model = build_auxiliary_model(Some(&dataset), "y", &["a", "b"], &config)
        .unwrap()
        .unwrap();
    let h = model.hyperparameters();
    assert!(h.noise_variance > 0.0);
    assert!(h.variance > 0.0);
    let mean = model.predict_mean(&dataset.design_matrix(&["a", "b"]).unwrap()).unwrap();
    assert!(mean.iter().all(|m| m.abs() < 1e-6));
}

#[test]
fn too_few_restarts_rejected() {
    assert!(matches!(
        HyperparameterConfig::builder().n_restarts(2).build(),
        Err(Error::TooFewRestarts { got: 2, min: 5 })
    ));
}

#[test]
fn non_finite_auxiliary_data_rejected() {
    let dataset = AuxiliaryDataset::from_rows(
        &["a", "y"],
        &[vec![0.0, -0.1], vec![f64::NAN, 0.2]],
    )
    .unwrap();
    let result = build_auxiliary_model(
        Some(&dataset),
        "y",
        &["a"],
        &HyperparameterConfig::default(),
    );
    assert!(matches!(result, Err(Error::NonFiniteData { row: 1, .. })));
}
