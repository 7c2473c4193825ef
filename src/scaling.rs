//! Per-sample normalization scales.
//!
//! Each free variable is divided by a scale of its kind so the optimizer
//! sees order-unity values whatever the units of the spectra.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraFitError};
use crate::index::{ParamRole, ParameterIndex};
use crate::spectra::Spectra;

/// Scale of each quantity, in physical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scales {
    pub background: f64,
    pub amplitude: f64,
    /// Scale of the dimensionless squared width
    pub width: f64,
    /// Scale of the dimensionless relative shift
    pub shift: f64,
}

impl Scales {
    pub fn new(background: f64, amplitude: f64, width: f64, shift: f64) -> Self {
        Self {
            background,
            amplitude,
            width,
            shift,
        }
    }

    /// Scales derived from one spectrum.
    ///
    /// Background ≈ minimum intensity, amplitude ≈ maximum intensity,
    /// width = (Δλ / 20λmin)² and shift = Δλ / 50λmin. NaN bins are ignored;
    /// an all-NaN spectrum yields NaN scales that [`validate`](Self::validate) rejects.
    pub fn from_sample(wavelength: &Array1<f64>, sample: ArrayView1<'_, f64>) -> Self {
        let (min, max) = sample
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::NAN, f64::NAN), |(lo, hi), &v| (v.min(lo), v.max(hi)));

        let lambda_min = wavelength.iter().copied().fold(f64::INFINITY, f64::min);
        let lambda_max = wavelength.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let span = (lambda_max - lambda_min) / lambda_min;

        // A non-positive minimum would collapse the background column
        let background = if min > 0.0 {
            min
        } else {
            min.abs().max(1e-3 * max.abs())
        };

        Self {
            background,
            amplitude: max,
            width: (span / 20.0).powi(2),
            shift: span / 50.0,
        }
    }

    /// One set of scales per sample.
    ///
    /// In chained mode every sample shares the scales of the first sample
    /// whose scales validate. If none does, the first sample's are used.
    pub fn for_batch(spectra: &Spectra, chained: bool) -> Vec<Scales> {
        let wavelength = spectra.wavelength();
        if chained {
            let per_sample: Vec<Scales> = (0..spectra.n_samples())
                .map(|i| Self::from_sample(wavelength, spectra.sample(i)))
                .collect();
            let anchor = per_sample
                .iter()
                .find(|scales| scales.validate().is_ok())
                .or_else(|| per_sample.first())
                .copied();
            match anchor {
                Some(shared) => vec![shared; per_sample.len()],
                None => Vec::new(),
            }
        } else {
            (0..spectra.n_samples())
                .map(|i| Self::from_sample(wavelength, spectra.sample(i)))
                .collect()
        }
    }

    /// All four scales must be finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        let values = [
            ("background", self.background),
            ("amplitude", self.amplitude),
            ("width", self.width),
            ("shift", self.shift),
        ];
        for (name, value) in values {
            if !(value.is_finite() && value > 0.0) {
                return Err(SpectraFitError::NumericalError(format!(
                    "{} scale must be finite and positive, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Scale of a flat-vector slot. Doublet ratios are already dimensionless.
    pub fn for_role(&self, role: ParamRole) -> f64 {
        match role {
            ParamRole::Background => self.background,
            ParamRole::Amplitude => self.amplitude,
            ParamRole::Width => self.width,
            ParamRole::Shift | ParamRole::DoubletShift => self.shift,
            ParamRole::DoubletRatio => 1.0,
        }
    }

    /// Express a normalized vector computed under `self` in units of `target`.
    pub fn rescale(&self, x: &Array1<f64>, target: &Scales, index: &ParameterIndex) -> Array1<f64> {
        let roles = index.roles();
        Array1::from_iter(
            x.iter()
                .zip(roles)
                .map(|(&value, role)| value * self.for_role(role) / target.for_role(role)),
        )
    }
}
