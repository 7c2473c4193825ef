//! Parameter recovery on synthetic spectra.

use approx::assert_relative_eq;
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use spectrafit_rs::catalog::{LineCatalog, LineEntry};
use spectrafit_rs::constraints::{ConstraintSet, ConstraintSpec, LineAttribute};
use spectrafit_rs::fit::{fit, FitConfig, ELEMENTARY_CHARGE, SPEED_OF_LIGHT};
use spectrafit_rs::initial::GuessConfig;
use spectrafit_rs::model::JacobianMode;
use spectrafit_rs::spectra::Spectra;
use spectrafit_rs::synthetic::{add_noise, spectrum, SyntheticLine};
use spectrafit_rs::SpectraFitError;

use crate::test_helpers::{
    argon_catalog, axis, clean_spectrum, ARGON_MASS, BACKGROUND, LINES, WIDTH2,
};

const AMPLITUDES: [f64; 3] = [100.0, 60.0, 30.0];
const SHIFTS: [f64; 3] = [1e-4, -5e-5, 0.0];

fn single(data: Array1<f64>) -> Spectra {
    Spectra::single(axis(), data).unwrap()
}

#[test]
fn test_recovers_independent_lines() {
    let spectra = single(clean_spectrum(AMPLITUDES, SHIFTS));
    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        FitConfig::default(),
    )
    .unwrap();

    let sample = result.sample(0).unwrap();
    assert!(sample.is_converged(), "{}", sample.diagnostics.message);
    assert_eq!(sample.diagnostics.attempts, 1);

    let q = &sample.quantities;
    assert_relative_eq!(q.background, BACKGROUND, max_relative = 1e-6);
    for (line, &(_, lambda0)) in LINES.iter().enumerate() {
        assert_relative_eq!(q.amplitude[line], AMPLITUDES[line], max_relative = 1e-6);
        assert_relative_eq!(q.width2[line], WIDTH2, max_relative = 1e-6);
        assert_relative_eq!(q.shift[line] / lambda0, SHIFTS[line], epsilon = 1e-9);
    }

    // no shared variable, no derived temperature or velocity
    assert!(q.temperature.is_none());
    assert!(q.velocity.is_none());
    assert!(result.temperature().is_none());

    let fitted = sample.model.as_ref().unwrap();
    let data = spectra.sample(0);
    let max_error = fitted
        .iter()
        .zip(data.iter())
        .fold(0.0f64, |m, (f, d)| m.max((f - d).abs()));
    assert!(max_error < 1e-4, "max error {}", max_error);
}

#[test]
fn test_shared_width_yields_one_temperature_per_ion() {
    let spectra = single(clean_spectrum(AMPLITUDES, [0.0; 3]));
    let constraints = ConstraintSet::new()
        .with_width(ConstraintSpec::ByAttribute(LineAttribute::Ion))
        .with_shift(ConstraintSpec::explicit(&[("argon", &["w", "x", "z"][..])]));
    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &constraints,
        FitConfig::default(),
    )
    .unwrap();
    assert!(result.converged()[0]);

    // groups sorted by name: ArXVI, ArXVII
    assert_eq!(result.width_groups(), &["ArXVI".to_string(), "ArXVII".to_string()]);
    let temperature = result.temperature().unwrap();
    assert_eq!(temperature.dim(), (1, 2));
    let expected = WIDTH2 * ARGON_MASS * SPEED_OF_LIGHT * SPEED_OF_LIGHT / ELEMENTARY_CHARGE;
    assert_relative_eq!(temperature[[0, 0]], expected, max_relative = 1e-5);
    assert_relative_eq!(temperature[[0, 1]], expected, max_relative = 1e-5);

    let velocity = result.velocity().unwrap();
    assert_eq!(velocity.dim(), (1, 1));
    assert!(velocity[[0, 0]].abs() < 100.0, "velocity {}", velocity[[0, 0]]);

    // the shared width shows up identically on both ArXVII lines
    let width2 = result.width2();
    assert_eq!(width2[[0, 0]], width2[[0, 1]]);
}

#[test]
fn test_line_ratio_of_two_lines() {
    let catalog = LineCatalog::new()
        .with_line("w", LineEntry::new(3.95e-10, "ArXVII"))
        .unwrap()
        .with_line("z", LineEntry::new(3.99e-10, "ArXVII"))
        .unwrap();
    let data = spectrum(
        &axis(),
        &[
            SyntheticLine::new(3.95e-10, 100.0, WIDTH2, 0.0),
            SyntheticLine::new(3.99e-10, 50.0, WIDTH2, 0.0),
        ],
        BACKGROUND,
    );
    let result = fit(
        &catalog,
        &single(data),
        None,
        &ConstraintSet::default(),
        FitConfig::default(),
    )
    .unwrap();

    let ratios = result.line_ratios(&[("w", "z"), ("w", "missing")]);
    assert_eq!(ratios.len(), 2);
    let w_over_z = ratios[0].as_ref().unwrap();
    assert_eq!(w_over_z.label, "w/z");
    let ratio = w_over_z.values[0];
    // integrated intensities carry the rest wavelength
    assert_relative_eq!(ratio, 2.0 * 3.95 / 3.99, max_relative = 1e-5);
    assert!((ratio - 2.0).abs() < 0.025);

    // an unknown identifier fails only its own pair
    assert!(matches!(ratios[1], Err(SpectraFitError::LineNotFound(ref id)) if id == "missing"));
    assert!(result.line_ratio("missing", "z").is_err());
}

#[test]
fn test_doublet_recovery() {
    const RATIO: f64 = 0.7;
    const OFFSET: f64 = 1.5e-3;
    let lines: Vec<SyntheticLine> = LINES
        .iter()
        .zip(AMPLITUDES)
        .flat_map(|(&(_, lambda0), amplitude)| {
            [
                SyntheticLine::new(lambda0, amplitude, WIDTH2, 0.0),
                SyntheticLine::new(lambda0, RATIO * amplitude, WIDTH2, OFFSET),
            ]
        })
        .collect();
    let spectra = single(spectrum(&axis(), &lines, BACKGROUND));

    // start the doublet offset near 1.5e-3 in units of the shift scale
    let config = FitConfig::default().with_guess(GuessConfig {
        doublet_shift: 4.5,
        ..GuessConfig::default()
    });
    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::new().with_doubling(true),
        config,
    )
    .unwrap();

    let sample = result.sample(0).unwrap();
    assert!(sample.is_converged(), "{}", sample.diagnostics.message);
    assert_relative_eq!(result.doublet_ratio().unwrap()[0], RATIO, max_relative = 1e-5);
    let offsets = result.doublet_shift().unwrap();
    for (line, &(_, lambda0)) in LINES.iter().enumerate() {
        assert_relative_eq!(offsets[[0, line]], OFFSET * lambda0, max_relative = 1e-5);
        assert_relative_eq!(
            sample.quantities.amplitude[line],
            AMPLITUDES[line],
            max_relative = 1e-5
        );
    }
}

#[test]
fn test_finite_difference_jacobian_fit() {
    let spectra = single(clean_spectrum(AMPLITUDES, SHIFTS));
    let config = FitConfig::default().with_jacobian(JacobianMode::ForwardDifference);
    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        config,
    )
    .unwrap();

    assert!(result.converged()[0]);
    let amplitude = result.amplitude();
    for line in 0..3 {
        assert_relative_eq!(amplitude[[0, line]], AMPLITUDES[line], max_relative = 1e-4);
    }
}

#[test]
fn test_noisy_fit_stays_close() {
    let clean = clean_spectrum(AMPLITUDES, SHIFTS);
    let noisy = add_noise(&clean, 0.5, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
    let result = fit(
        &argon_catalog(),
        &single(noisy),
        None,
        &ConstraintSet::default(),
        FitConfig::default(),
    )
    .unwrap();

    let sample = result.sample(0).unwrap();
    assert!(sample.is_converged(), "{}", sample.diagnostics.message);
    let q = &sample.quantities;
    for line in 0..3 {
        assert_relative_eq!(q.amplitude[line], AMPLITUDES[line], max_relative = 0.05);
        assert_relative_eq!(q.width2[line], WIDTH2, max_relative = 0.1);
    }
    assert_relative_eq!(q.background, BACKGROUND, max_relative = 0.02);
    assert!(sample.diagnostics.cost > 0.0);
}
