//! Synthetic multi-Gaussian spectra for tests and benchmarks.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{Result, SpectraFitError};
use crate::spectra::Spectra;

/// One line of a synthetic spectrum, in physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticLine {
    pub wavelength: f64,
    pub amplitude: f64,
    /// Dimensionless squared width
    pub width2: f64,
    /// Dimensionless relative shift
    pub shift: f64,
}

impl SyntheticLine {
    pub fn new(wavelength: f64, amplitude: f64, width2: f64, shift: f64) -> Self {
        Self {
            wavelength,
            amplitude,
            width2,
            shift,
        }
    }

    /// Profile of this line on `axis`.
    pub fn profile(&self, axis: &Array1<f64>) -> Array1<f64> {
        axis.mapv(|lambda| {
            let dev = lambda / self.wavelength - (1.0 + self.shift);
            self.amplitude * (-dev * dev / (2.0 * self.width2)).exp()
        })
    }
}

/// Sum of `lines` plus a constant `background`.
pub fn spectrum(axis: &Array1<f64>, lines: &[SyntheticLine], background: f64) -> Array1<f64> {
    lines
        .iter()
        .fold(Array1::from_elem(axis.len(), background), |acc, line| acc + line.profile(axis))
}

/// Add zero-mean Gaussian noise of standard deviation `sigma`.
///
/// `sigma` must be finite and non-negative.
pub fn add_noise<R: Rng + ?Sized>(
    spectrum: &Array1<f64>,
    sigma: f64,
    rng: &mut R,
) -> Result<Array1<f64>> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(SpectraFitError::InvalidInput(format!(
            "noise level must be finite and non-negative, got {}",
            sigma
        )));
    }
    let normal = Normal::new(0.0, sigma).map_err(|e| {
        SpectraFitError::InvalidInput(format!("invalid noise level {}: {}", sigma, e))
    })?;
    Ok(spectrum.mapv(|v| v + normal.sample(rng)))
}

/// Stack one spectrum per sample into a [`Spectra`] batch.
pub fn batch(axis: &Array1<f64>, samples: &[Array1<f64>]) -> Result<Spectra> {
    let n_bins = axis.len();
    if let Some(bad) = samples.iter().position(|s| s.len() != n_bins) {
        return Err(SpectraFitError::DimensionMismatch(format!(
            "sample {} has {} bins, expected {}",
            bad,
            samples[bad].len(),
            n_bins
        )));
    }
    let data = Array2::from_shape_fn((samples.len(), n_bins), |(i, j)| samples[i][j]);
    Spectra::new(axis.clone(), data)
}
