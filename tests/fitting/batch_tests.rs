//! Batch behavior: failure isolation, chaining, bounds, retry and outputs.

use approx::assert_relative_eq;
use ndarray::Array1;
use spectrafit_rs::bounds::{Bounds, BoundsConfig};
use spectrafit_rs::constraints::{ConstraintSet, WavelengthWindow};
use spectrafit_rs::fit::{fit, FitConfig, SampleStatus, SpectralFitter};
use spectrafit_rs::lm::LmConfig;
use spectrafit_rs::spectra::Spectra;
use spectrafit_rs::synthetic::batch;
use spectrafit_rs::{Scales, SpectraFitError};

use crate::test_helpers::{argon_catalog, axis, clean_spectrum};

const AMPLITUDES: [f64; 3] = [100.0, 60.0, 30.0];

fn scaled(factor: f64) -> Array1<f64> {
    clean_spectrum(AMPLITUDES.map(|a| a * factor), [0.0; 3])
}

fn spectra(factors: &[f64]) -> Spectra {
    let samples: Vec<Array1<f64>> = factors.iter().map(|&f| scaled(f)).collect();
    batch(&axis(), &samples).unwrap()
}

#[test]
fn test_failed_sample_is_isolated() {
    let mut samples: Vec<Array1<f64>> = (0..10).map(|i| scaled(1.0 - 0.03 * i as f64)).collect();
    samples[5].fill(f64::NAN);
    let spectra = batch(&axis(), &samples).unwrap();

    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        FitConfig::default(),
    )
    .unwrap();

    assert_eq!(result.len(), 10);
    let summary = result.summary();
    assert_eq!(summary.failed, vec![5]);
    assert_eq!(summary.converged, 9);

    for (i, sample) in result.samples().iter().enumerate() {
        if i == 5 {
            assert_eq!(sample.status, SampleStatus::Failed);
            assert_eq!(sample.diagnostics.attempts, 2);
            assert!(sample.solution.iter().all(|v| v.is_nan()));
            assert!(sample.model.is_none());
            assert!(matches!(
                sample.check(),
                Err(SpectraFitError::ConvergenceFailure(_))
            ));
        } else {
            assert!(sample.check().is_ok(), "sample {}: {}", i, sample.diagnostics.message);
            assert_relative_eq!(
                sample.quantities.amplitude[0],
                100.0 * (1.0 - 0.03 * i as f64),
                max_relative = 1e-6
            );
        }
    }

    let amplitude = result.amplitude();
    assert!(amplitude.row(5).iter().all(|v| v.is_nan()));
    assert!(result.background()[5].is_nan());
    let ratio = result.line_ratio("w", "z").unwrap();
    assert!(ratio.values[5].is_nan());
    assert!(ratio.values[4].is_finite());
}

#[test]
fn test_chained_fit_is_deterministic_and_matches_independent() {
    let spectra = spectra(&[1.0, 0.95, 0.9, 0.92]);
    let chained = || {
        fit(
            &argon_catalog(),
            &spectra,
            None,
            &ConstraintSet::default(),
            FitConfig::default().with_chain(true),
        )
        .unwrap()
    };
    let first = chained();
    let second = chained();
    assert_eq!(first.amplitude(), second.amplitude());
    assert_eq!(first.width2(), second.width2());
    assert_eq!(first.cost(), second.cost());

    // chained samples share the scales of the first sample
    let scales: Vec<Scales> = first.samples().iter().map(|s| s.scales).collect();
    assert!(scales.iter().all(|s| *s == scales[0]));

    let independent = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        FitConfig::default().with_parallel(false),
    )
    .unwrap();
    assert!(first.converged().iter().all(|&c| c));
    assert!(independent.converged().iter().all(|&c| c));
    for (a, b) in first.amplitude().iter().zip(independent.amplitude().iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-6);
    }
    for (a, b) in first.width2().iter().zip(independent.width2().iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-6);
    }
}

#[test]
fn test_retry_recovers_from_a_bad_warm_start() {
    let spectra = spectra(&[1.0]);
    let fitter = SpectralFitter::new(
        &argon_catalog(),
        WavelengthWindow::all(),
        &ConstraintSet::default(),
        FitConfig::default(),
    )
    .unwrap();
    let scales = Scales::from_sample(spectra.wavelength(), spectra.sample(0));
    let warm = Array1::from_elem(fitter.index().size(), f64::NAN);

    let sample = fitter
        .fit_sample(0, spectra.wavelength(), spectra.sample(0), scales, Some(warm))
        .unwrap();
    assert_eq!(sample.status, SampleStatus::Converged);
    assert_eq!(sample.diagnostics.attempts, 2);
    for (fitted, expected) in sample.quantities.amplitude.iter().zip(AMPLITUDES) {
        assert_relative_eq!(*fitted, expected, max_relative = 1e-6);
    }
}

#[test]
fn test_chained_fit_skips_failed_sample_as_seed() {
    let factors = [1.0, 0.95, 0.9, 0.85, 0.8];
    let mut samples: Vec<Array1<f64>> = factors.iter().map(|&f| scaled(f)).collect();
    samples[2].fill(f64::NAN);
    let spectra = batch(&axis(), &samples).unwrap();

    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        FitConfig::default().with_chain(true),
    )
    .unwrap();

    assert_eq!(result.summary().failed, vec![2]);
    for (i, sample) in result.samples().iter().enumerate() {
        if i == 2 {
            assert_eq!(sample.status, SampleStatus::Failed);
            continue;
        }
        assert!(sample.is_converged(), "sample {}: {}", i, sample.diagnostics.message);
        // warm starts come from the last converged sample, never the failed one
        assert_eq!(sample.diagnostics.attempts, 1, "sample {}", i);
        assert_relative_eq!(
            sample.quantities.amplitude[0],
            100.0 * factors[i],
            max_relative = 1e-6
        );
    }
}

#[test]
fn test_chained_scales_skip_an_invalid_first_sample() {
    let factors = [1.0, 1.0, 0.95, 0.9, 0.85];
    let mut samples: Vec<Array1<f64>> = factors.iter().map(|&f| scaled(f)).collect();
    samples[0].fill(f64::NAN);
    let spectra = batch(&axis(), &samples).unwrap();

    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        FitConfig::default().with_chain(true),
    )
    .unwrap();

    assert_eq!(result.summary().failed, vec![0]);
    let shared = Scales::from_sample(spectra.wavelength(), spectra.sample(1));
    for (i, sample) in result.samples().iter().enumerate().skip(1) {
        assert_eq!(sample.scales, shared);
        assert!(sample.is_converged(), "sample {}: {}", i, sample.diagnostics.message);
        assert_eq!(sample.diagnostics.attempts, 1, "sample {}", i);
        assert_relative_eq!(
            sample.quantities.amplitude[0],
            100.0 * factors[i],
            max_relative = 1e-6
        );
    }
}

#[test]
fn test_parallel_and_sequential_agree() {
    let spectra = spectra(&[1.0, 0.8, 0.6]);
    let run = |parallel: bool| {
        fit(
            &argon_catalog(),
            &spectra,
            None,
            &ConstraintSet::default(),
            FitConfig::default().with_parallel(parallel),
        )
        .unwrap()
    };
    assert_eq!(run(true).amplitude(), run(false).amplitude());
}

#[test]
fn test_solution_respects_bounds() {
    // the true shift of `w` lies outside the narrowed box
    let data = clean_spectrum(AMPLITUDES, [1e-4, 0.0, 0.0]);
    let spectra = Spectra::single(axis(), data).unwrap();
    let bounds = BoundsConfig {
        shift: Bounds::new(-0.1, 0.1).unwrap(),
        ..BoundsConfig::default()
    };
    let fitter = SpectralFitter::new(
        &argon_catalog(),
        WavelengthWindow::all(),
        &ConstraintSet::default(),
        FitConfig::default().with_bounds(bounds),
    )
    .unwrap();
    let result = fitter.fit(&spectra).unwrap();

    let sample = result.sample(0).unwrap();
    assert!(sample.is_converged(), "{}", sample.diagnostics.message);
    for (value, bound) in sample.solution.iter().zip(fitter.bounds()) {
        assert!(bound.is_within_bounds(*value), "{} outside {:?}", value, bound);
    }
    // shift of `w` pinned at the upper bound
    let shift_slot = fitter.index().segment(spectrafit_rs::QuantityKind::Shift).offset();
    assert_relative_eq!(sample.solution[shift_slot], 0.1, epsilon = 1e-9);
}

#[test]
fn test_exhausted_budget_fails_after_retry() {
    let spectra = spectra(&[1.0]);
    let config = FitConfig::default().with_solver(LmConfig {
        max_iterations: 1,
        ..LmConfig::default()
    });
    let result = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        config,
    )
    .unwrap();

    let sample = result.sample(0).unwrap();
    assert_eq!(sample.status, SampleStatus::Failed);
    assert_eq!(sample.diagnostics.attempts, 2);
    assert_eq!(sample.diagnostics.termination, 0);
    // the retry ran with twice the iteration budget
    assert_eq!(sample.diagnostics.iterations, 2);
}

#[test]
fn test_stored_outputs_and_fixed_scales() {
    let spectra = spectra(&[1.0]);
    let fixed = Scales::from_sample(spectra.wavelength(), spectra.sample(0));
    let config = FitConfig::default()
        .with_scales(fixed)
        .with_store_detail(true);
    let result = fit(
        &argon_catalog(),
        &spectra,
        Some(WavelengthWindow::new(3.94e-10, 4.0e-10)),
        &ConstraintSet::default(),
        config,
    )
    .unwrap();

    let sample = result.sample(0).unwrap();
    assert_eq!(sample.scales, fixed);
    let detail = sample.detail.as_ref().unwrap();
    assert_eq!(detail.dim(), (400, 4));
    let model = sample.model.as_ref().unwrap();
    let summed = detail.sum_axis(ndarray::Axis(1));
    for (a, b) in model.iter().zip(summed.iter()) {
        assert_relative_eq!(*a, *b, max_relative = 1e-12);
    }

    let lean = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        FitConfig::default().with_store_model(false),
    )
    .unwrap();
    assert!(lean.sample(0).unwrap().model.is_none());
    assert!(lean.sample(0).unwrap().detail.is_none());
}

#[test]
fn test_configuration_errors_abort_the_batch() {
    let spectra = spectra(&[1.0]);
    let seeded = FitConfig::default().with_amplitude_seed("lya", 2.0);
    let err = fit(
        &argon_catalog(),
        &spectra,
        None,
        &ConstraintSet::default(),
        seeded,
    )
    .unwrap_err();
    assert!(matches!(err, SpectraFitError::Configuration(_)));

    let empty_window = fit(
        &argon_catalog(),
        &spectra,
        Some(WavelengthWindow::new(1e-10, 2e-10)),
        &ConstraintSet::default(),
        FitConfig::default(),
    );
    assert!(matches!(empty_window, Err(SpectraFitError::Configuration(_))));
}
