use fusion_ei::{FusionExpectedImprovement, HyperparameterConfig};
use fusion_ei::gp::GpRegression;
use fusion_ei::report::ternary_grid;

use crate::{INPUTS, TARGET, perovskite_dataset, primary_3d};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn acquisition_is_send_and_sync() {
    assert_send_sync::<FusionExpectedImprovement<&GpRegression>>();
    assert_send_sync::<FusionExpectedImprovement<GpRegression>>();
}

#[test]
fn parallel_batches_match_serial_scores() {
    let primary = primary_3d();
    let acq = FusionExpectedImprovement::builder(&primary)
        .dataset(perovskite_dataset())
        .target_variable(TARGET)
        .input_variables(INPUTS)
        .hyperparameters(HyperparameterConfig::builder().seed(5).build().unwrap())
        .build()
        .unwrap();

    let grid = ternary_grid(0.05).unwrap();
    let half = grid.nrows() / 2;
    let first = grid.rows(0, half).clone_owned();
    let second = grid.rows(half, grid.nrows() - half).clone_owned();

    let serial = (
        acq.evaluate_with_gradient(&first).unwrap(),
        acq.evaluate_with_gradient(&second).unwrap(),
    );
    let parallel = std::thread::scope(|s| {
        let a = s.spawn(|| acq.evaluate_with_gradient(&first).unwrap());
        let b = s.spawn(|| acq.evaluate_with_gradient(&second).unwrap());
        (a.join().unwrap(), b.join().unwrap())
    });

    assert_eq!(parallel.0, serial.0);
    assert_eq!(parallel.1, serial.1);
}
