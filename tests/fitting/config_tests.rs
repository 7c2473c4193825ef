//! Fits driven entirely from JSON documents.

use approx::assert_relative_eq;
use spectrafit_rs::catalog::LineCatalog;
use spectrafit_rs::constraints::ConstraintSet;
use spectrafit_rs::fit::{fit, FitConfig};
use spectrafit_rs::model::JacobianMode;
use spectrafit_rs::spectra::Spectra;

use crate::test_helpers::{argon_catalog, axis, clean_spectrum};

const CONSTRAINTS: &str = r#"{
    "width": {"type": "by_attribute", "value": "ion"},
    "shift": {"type": "explicit", "value": {"argon": ["w", "x", "z"]}}
}"#;

const CONFIG: &str = r#"{
    "parallel": false,
    "jacobian": "central_difference",
    "solver": {"max_iterations": 100, "ftol": 1e-10},
    "bounds": {"amplitude": {"min": 0.0, "max": 1.5}},
    "amplitude_seeds": {"z": 0.8},
    "store_model": false
}"#;

#[test]
fn test_fit_from_json_documents() {
    let catalog = LineCatalog::from_json_str(&argon_catalog().to_json_string().unwrap()).unwrap();
    let constraints: ConstraintSet = serde_json::from_str(CONSTRAINTS).unwrap();
    let config = FitConfig::from_json_str(CONFIG).unwrap();
    assert_eq!(config.jacobian, JacobianMode::CentralDifference);
    assert_eq!(config.solver.max_iterations, 100);
    assert_eq!(config.solver.xtol, 1e-12);

    let spectra = Spectra::single(axis(), clean_spectrum([100.0, 60.0, 30.0], [0.0; 3])).unwrap();
    let result = fit(&catalog, &spectra, None, &constraints, config).unwrap();

    let sample = result.sample(0).unwrap();
    assert!(sample.is_converged(), "{}", sample.diagnostics.message);
    assert!(sample.model.is_none());
    assert_relative_eq!(sample.quantities.amplitude[2], 30.0, max_relative = 1e-5);
    assert_eq!(result.shift_groups(), &["argon".to_string()]);
}

#[test]
fn test_config_serializes_back_to_itself() {
    let config = FitConfig::from_json_str(CONFIG).unwrap();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(FitConfig::from_json_str(&json).unwrap(), config);
}
