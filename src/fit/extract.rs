//! Conversion of a normalized solution into physical quantities.

use std::f64::consts::PI;

use ndarray::Array1;

use crate::constraints::QuantityKind;
use crate::index::ParameterIndex;
use crate::model::LineTable;
use crate::scaling::Scales;

/// Speed of light in vacuum (m/s).
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Physical quantities of one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalQuantities {
    pub background: f64,
    /// Per-line peak amplitude
    pub amplitude: Array1<f64>,
    /// Per-line dimensionless squared width
    pub width2: Array1<f64>,
    /// Per-line shift as an absolute wavelength offset (m)
    pub shift: Array1<f64>,
    /// Per-line integrated intensity `amplitude · λ₀ · √(2π · width²)`
    pub intensity: Array1<f64>,
    pub doublet_ratio: Option<f64>,
    /// Per-line doublet offset relative to the primary component (m)
    pub doublet_shift: Option<Array1<f64>>,
    /// kT per width group, present only when widths are shared
    pub temperature: Option<Array1<f64>>,
    /// Drift velocity (m/s) per shift group, present only when shifts are shared
    pub velocity: Option<Array1<f64>>,
}

/// Converts solutions of one fit configuration.
#[derive(Debug, Clone)]
pub struct Extractor<'a> {
    index: &'a ParameterIndex,
    lines: &'a LineTable,
    masses: &'a [f64],
    temperature_factor: f64,
}

impl<'a> Extractor<'a> {
    pub fn new(
        index: &'a ParameterIndex,
        lines: &'a LineTable,
        masses: &'a [f64],
        temperature_factor: f64,
    ) -> Self {
        Self {
            index,
            lines,
            masses,
            temperature_factor,
        }
    }

    /// Temperatures are reported only when the width groups reduce the line count.
    pub fn has_temperature(&self) -> bool {
        self.index.segment(QuantityKind::Width).len() < self.index.line_count()
    }

    pub fn has_velocity(&self) -> bool {
        self.index.segment(QuantityKind::Shift).len() < self.index.line_count()
    }

    fn per_line(&self, x: &Array1<f64>, kind: QuantityKind, scale: f64) -> Array1<f64> {
        let slots = self.index.segment(kind).line_to_param();
        let coefs = self.lines.coefficients(kind);
        (0..self.index.line_count())
            .map(|line| x[slots[line]] * scale * coefs[line])
            .collect()
    }

    /// Value of `per_line` at the first member of each width group.
    fn per_width_group(&self, values: &Array1<f64>) -> Array1<f64> {
        self.index
            .segment(QuantityKind::Width)
            .members()
            .iter()
            .map(|members| members.first().map_or(f64::NAN, |&line| values[line]))
            .collect()
    }

    pub fn extract(&self, x: &Array1<f64>, scales: &Scales) -> PhysicalQuantities {
        let lambda0 = Array1::from(self.lines.wavelengths().to_vec());
        let amplitude = self.per_line(x, QuantityKind::Amplitude, scales.amplitude);
        let width2 = self.per_line(x, QuantityKind::Width, scales.width);
        let shift = self.per_line(x, QuantityKind::Shift, scales.shift) * &lambda0;

        let intensity = Array1::from_iter(
            amplitude
                .iter()
                .zip(&width2)
                .zip(&lambda0)
                .map(|((&a, &w), &l)| a * l * (2.0 * PI * w).sqrt()),
        );

        let (doublet_ratio, doublet_shift) = match self.index.doublet() {
            Some(slots) => {
                let coefs = self.lines.coefficients(QuantityKind::Shift);
                let offset = Array1::from_iter(
                    lambda0
                        .iter()
                        .zip(coefs)
                        .map(|(&l, &c)| x[slots.shift] * scales.shift * c * l),
                );
                (Some(x[slots.ratio]), Some(offset))
            }
            None => (None, None),
        };

        let temperature = self.has_temperature().then(|| {
            let masses = Array1::from(self.masses.to_vec());
            let kt = &width2 * &masses * (self.temperature_factor * SPEED_OF_LIGHT * SPEED_OF_LIGHT);
            self.per_width_group(&kt)
        });
        let velocity = self.has_velocity().then(|| {
            let offset = self.index.segment(QuantityKind::Shift).offset();
            Array1::from_shape_fn(self.index.segment(QuantityKind::Shift).len(), |g| {
                x[offset + g] * scales.shift * SPEED_OF_LIGHT
            })
        });

        PhysicalQuantities {
            background: x[ParameterIndex::BACKGROUND] * scales.background,
            amplitude,
            width2,
            shift,
            intensity,
            doublet_ratio,
            doublet_shift,
            temperature,
            velocity,
        }
    }

    /// NaN-filled quantities with the same shapes as [`extract`](Self::extract).
    pub fn failed(&self) -> PhysicalQuantities {
        let n = self.index.line_count();
        let nan = || Array1::from_elem(n, f64::NAN);
        let doubled = self.index.is_doubled();
        PhysicalQuantities {
            background: f64::NAN,
            amplitude: nan(),
            width2: nan(),
            shift: nan(),
            intensity: nan(),
            doublet_ratio: doubled.then_some(f64::NAN),
            doublet_shift: doubled.then(nan),
            temperature: self.has_temperature().then(|| {
                Array1::from_elem(self.index.segment(QuantityKind::Width).len(), f64::NAN)
            }),
            velocity: self.has_velocity().then(|| {
                Array1::from_elem(self.index.segment(QuantityKind::Shift).len(), f64::NAN)
            }),
        }
    }
}
