mod concurrency;
mod fitting;
mod gradient;
mod report;
mod scenarios;

use fusion_ei::AuxiliaryDataset;
use fusion_ei::gp::{GpRegression, Matern52};
use nalgebra::{DMatrix, DVector};

pub(crate) const INPUTS: [&str; 3] = ["CsPbI", "MAPbI", "FAPbI"];
pub(crate) const TARGET: &str = "dGmix (ev/f.u.)";

/// Mixing enthalpies over CsPbI/MAPbI/FAPbI compositions, all stable.
pub(crate) fn perovskite_dataset() -> AuxiliaryDataset {
    AuxiliaryDataset::from_rows(
        &["CsPbI", "MAPbI", "FAPbI", TARGET],
        &[
            vec![1.0, 0.0, 0.0, -0.08],
            vec![0.0, 1.0, 0.0, -0.06],
            vec![0.0, 0.0, 1.0, -0.05],
            vec![0.5, 0.5, 0.0, -0.11],
            vec![0.5, 0.0, 0.5, -0.09],
            vec![0.0, 0.5, 0.5, -0.12],
            vec![0.33, 0.33, 0.34, -0.15],
            vec![0.2, 0.6, 0.2, -0.10],
            vec![0.6, 0.2, 0.2, -0.13],
        ],
    )
    .unwrap()
}

/// Same compositions with a target that turns positive around Cs-rich mixes.
pub(crate) fn mixed_sign_dataset() -> AuxiliaryDataset {
    let mut rows = Vec::new();
    for i in 0..=4 {
        for j in 0..=(4 - i) {
            let cs = f64::from(i) * 0.25;
            let ma = f64::from(j) * 0.25;
            let fa = 1.0 - cs - ma;
            rows.push(vec![cs, ma, fa, 0.1 * cs - 0.04 - 0.05 * ma * fa]);
        }
    }
    AuxiliaryDataset::from_rows(&["CsPbI", "MAPbI", "FAPbI", TARGET], &rows).unwrap()
}

/// Primary objective surrogate over three composition fractions.
pub(crate) fn primary_3d() -> GpRegression {
    let x = DMatrix::<f64>::from_row_slice(
        6,
        3,
        &[
            0.1, 0.1, 0.8, //
            0.7, 0.2, 0.1, //
            0.3, 0.4, 0.3, //
            0.5, 0.1, 0.4, //
            0.2, 0.7, 0.1, //
            0.0, 0.3, 0.7,
        ],
    );
    let y = DVector::from_iterator(
        6,
        x.row_iter()
            .map(|r| (r[0] - 0.3).powi(2) + (r[1] - 0.4).powi(2) + 0.5 * r[2]),
    );
    GpRegression::fit_fixed(&x, &y, Matern52::new(0.4, 0.5).unwrap(), 1e-6).unwrap()
}

/// Candidate compositions away from all training points.
pub(crate) fn candidates() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        3,
        &[
            0.15, 0.25, 0.6, //
            0.4, 0.3, 0.3, //
            0.25, 0.55, 0.2, //
            0.45, 0.15, 0.4,
        ],
    )
}
