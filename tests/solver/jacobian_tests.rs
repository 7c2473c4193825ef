//! Analytic Jacobian of the spectral model against finite differences.

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use ndarray::{Array1, Array2};
use spectrafit_rs::constraints::{
    compile, ConstraintSet, ConstraintSpec, KeyedLine, LineAttribute, WavelengthWindow,
};
use spectrafit_rs::index::ParameterIndex;
use spectrafit_rs::model::{JacobianMode, LineTable, SpectralModel};
use spectrafit_rs::utils::jacobian_central;
use spectrafit_rs::{Problem, Scales};

use crate::test_helpers::{argon_catalog, axis, clean_spectrum};

fn keyed(entries: &[(&str, &str, f64)]) -> ConstraintSpec {
    let table: BTreeMap<String, KeyedLine> = entries
        .iter()
        .map(|&(line, key, coefficient)| {
            (
                line.to_string(),
                KeyedLine {
                    key: key.to_string(),
                    coefficient,
                },
            )
        })
        .collect();
    ConstraintSpec::Keyed(table)
}

fn scales() -> Scales {
    let span = 0.06 / 3.94;
    Scales::new(5.0, 110.0, (span / 20.0f64).powi(2), span / 50.0)
}

fn assert_columns_close(analytic: &Array2<f64>, numeric: &Array2<f64>) {
    assert_eq!(analytic.dim(), numeric.dim());
    for (a, n) in analytic.columns().into_iter().zip(numeric.columns()) {
        let scale = n.iter().fold(1e-12f64, |m, v| m.max(v.abs()));
        for (x, y) in a.iter().zip(n.iter()) {
            assert!(
                (x - y).abs() <= 1e-5 * scale,
                "analytic {} vs numeric {} (column scale {})",
                x,
                y,
                scale
            );
        }
    }
}

#[test]
fn test_jacobian_with_coefficients_and_doublet() {
    let set = ConstraintSet::new()
        .with_amplitude(keyed(&[("w", "he", 1.0), ("x", "he", 0.4)]))
        .with_width(ConstraintSpec::ByAttribute(LineAttribute::Ion))
        .with_shift(keyed(&[("w", "v", 1.0), ("z", "v", 1.3)]))
        .with_doubling(true);
    let compiled = compile(&argon_catalog(), WavelengthWindow::all(), &set).unwrap();
    let index = ParameterIndex::from_compiled(&compiled).unwrap();
    let table = LineTable::from_compiled(&compiled);
    let axis = axis();
    let data = clean_spectrum([100.0, 40.0, 30.0], [0.0; 3]);

    let model = SpectralModel::new(&index, &table, &axis, data.view(), scales()).unwrap();
    // [bck, amp he, amp z, width ArXVI, width ArXVII, shift v, shift x, dshift, dratio]
    assert_eq!(index.size(), 9);
    let x = Array1::from(vec![1.0, 0.8, 0.3, 0.35, 0.4, 0.2, -0.1, 0.9, 0.6]);

    let analytic = model.analytic_jacobian(&x).unwrap();
    let numeric = jacobian_central(&model, &x, None).unwrap();
    assert_columns_close(&analytic, &numeric);
    assert!(model.has_custom_jacobian());
}

#[test]
fn test_jacobian_modes_agree() {
    let set = ConstraintSet::new().with_width(ConstraintSpec::ByAttribute(LineAttribute::Ion));
    let compiled = compile(&argon_catalog(), WavelengthWindow::all(), &set).unwrap();
    let index = ParameterIndex::from_compiled(&compiled).unwrap();
    let table = LineTable::from_compiled(&compiled);
    let axis = axis();
    let data = clean_spectrum([100.0, 60.0, 30.0], [1e-4, -5e-5, 0.0]);
    let x = Array1::from(vec![1.0, 0.9, 0.5, 0.3, 0.4, 0.3, 0.1, 0.0, -0.2]);

    let analytic = SpectralModel::new(&index, &table, &axis, data.view(), scales())
        .unwrap()
        .jacobian(&x)
        .unwrap();
    let central = SpectralModel::new(&index, &table, &axis, data.view(), scales())
        .unwrap()
        .with_jacobian_mode(JacobianMode::CentralDifference)
        .jacobian(&x)
        .unwrap();
    assert_columns_close(&analytic, &central);

    let residuals = SpectralModel::new(&index, &table, &axis, data.view(), scales())
        .unwrap()
        .eval(&x)
        .unwrap();
    assert_eq!(residuals.len(), axis.len());
    assert_relative_eq!(analytic.column(0)[0], 5.0);
}
