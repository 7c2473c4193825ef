//! Multi-Gaussian spectral model, residuals and Jacobian.
//!
//! Every active line contributes
//!
//! ```text
//! amplitude · exp(−(λ/λ₀ − (1 + shift))² / (2 · width²))
//! ```
//!
//! where `width²` and `shift` are dimensionless (relative to λ₀). The physical
//! value of a quantity is `x[slot] · scale · coefficient`, with `slot` the
//! free variable feeding the line. With doubling enabled every line gets a
//! second component of amplitude `amplitude · ratio` centred at
//! `(x_shift + x_doublet_shift) · shift_scale · coefficient`.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::constraints::{CompiledLines, QuantityKind};
use crate::error::{Result, SpectraFitError};
use crate::index::ParameterIndex;
use crate::problem::Problem;
use crate::scaling::Scales;
use crate::utils::finite_difference;

/// Floor applied to the dimensionless squared width.
const MIN_WIDTH: f64 = 1e-30;

/// How the solver obtains the Jacobian.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JacobianMode {
    #[default]
    Analytic,
    ForwardDifference,
    CentralDifference,
}

/// Rest wavelengths and per-kind coefficients of the active lines.
#[derive(Debug, Clone, PartialEq)]
pub struct LineTable {
    wavelength: Vec<f64>,
    amplitude: Vec<f64>,
    width: Vec<f64>,
    shift: Vec<f64>,
}

impl LineTable {
    pub fn from_compiled(compiled: &CompiledLines) -> Self {
        Self {
            wavelength: compiled.wavelengths(),
            amplitude: compiled
                .descriptor(QuantityKind::Amplitude)
                .coefficients()
                .to_vec(),
            width: compiled.descriptor(QuantityKind::Width).coefficients().to_vec(),
            shift: compiled.descriptor(QuantityKind::Shift).coefficients().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    pub fn wavelengths(&self) -> &[f64] {
        &self.wavelength
    }

    pub fn coefficients(&self, kind: QuantityKind) -> &[f64] {
        match kind {
            QuantityKind::Amplitude => &self.amplitude,
            QuantityKind::Width => &self.width,
            QuantityKind::Shift => &self.shift,
        }
    }
}

/// Physical parameters of one line at a given point.
#[derive(Debug, Clone, Copy)]
struct LineState {
    amplitude: f64,
    width: f64,
    shift: f64,
    doublet: Option<(f64, f64)>,
}

/// Residual problem for one spectrum.
#[derive(Debug, Clone)]
pub struct SpectralModel<'a> {
    index: &'a ParameterIndex,
    lines: &'a LineTable,
    wavelength: &'a Array1<f64>,
    data: ArrayView1<'a, f64>,
    scales: Scales,
    mode: JacobianMode,
}

impl<'a> SpectralModel<'a> {
    pub fn new(
        index: &'a ParameterIndex,
        lines: &'a LineTable,
        wavelength: &'a Array1<f64>,
        data: ArrayView1<'a, f64>,
        scales: Scales,
    ) -> Result<Self> {
        if data.len() != wavelength.len() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "spectrum has {} bins, wavelength axis has {}",
                data.len(),
                wavelength.len()
            )));
        }
        if lines.len() != index.line_count() {
            return Err(SpectraFitError::Consistency(format!(
                "line table has {} lines, index expects {}",
                lines.len(),
                index.line_count()
            )));
        }
        Ok(Self {
            index,
            lines,
            wavelength,
            data,
            scales,
            mode: JacobianMode::Analytic,
        })
    }

    pub fn with_jacobian_mode(mut self, mode: JacobianMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn scales(&self) -> &Scales {
        &self.scales
    }

    fn check_len(&self, x: &Array1<f64>) -> Result<()> {
        if x.len() != self.index.size() {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "expected {} free variables, got {}",
                self.index.size(),
                x.len()
            )));
        }
        Ok(())
    }

    fn line_state(&self, x: &Array1<f64>, line: usize) -> LineState {
        let value = |kind: QuantityKind| {
            x[self.index.segment(kind).line_to_param()[line]] * self.lines.coefficients(kind)[line]
        };
        let amplitude = value(QuantityKind::Amplitude) * self.scales.amplitude;
        let width = (value(QuantityKind::Width) * self.scales.width).max(MIN_WIDTH);
        let shift = value(QuantityKind::Shift) * self.scales.shift;
        let doublet = self.index.doublet().map(|slots| {
            let coef = self.lines.coefficients(QuantityKind::Shift)[line];
            let x_shift = x[self.index.segment(QuantityKind::Shift).line_to_param()[line]];
            (
                amplitude * x[slots.ratio],
                self.scales.shift * (x_shift + x[slots.shift]) * coef,
            )
        });
        LineState {
            amplitude,
            width,
            shift,
            doublet,
        }
    }

    /// Background column followed by one column per line (L × (1 + lines)).
    ///
    /// A doubled line's column holds the sum of both components.
    pub fn detail(&self, x: &Array1<f64>) -> Result<Array2<f64>> {
        self.check_len(x)?;
        let n_lines = self.lines.len();
        let mut detail = Array2::zeros((self.wavelength.len(), 1 + n_lines));
        detail
            .column_mut(0)
            .fill(x[ParameterIndex::BACKGROUND] * self.scales.background);

        for line in 0..n_lines {
            let state = self.line_state(x, line);
            let lambda0 = self.lines.wavelengths()[line];
            let mut column = detail.column_mut(1 + line);
            for (value, &lambda) in column.iter_mut().zip(self.wavelength) {
                let rel = lambda / lambda0;
                let dev = rel - (1.0 + state.shift);
                *value = state.amplitude * (-dev * dev / (2.0 * state.width)).exp();
                if let Some((amplitude_d, shift_d)) = state.doublet {
                    let dev_d = rel - (1.0 + shift_d);
                    *value += amplitude_d * (-dev_d * dev_d / (2.0 * state.width)).exp();
                }
            }
        }
        Ok(detail)
    }

    /// Summed model spectrum (background plus every line).
    pub fn evaluate(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.detail(x)?.sum_axis(Axis(1)))
    }

    /// Closed-form Jacobian of the summed model.
    ///
    /// Per-line partials are accumulated first, then summed into each
    /// group's column through the member lists of the index.
    pub fn analytic_jacobian(&self, x: &Array1<f64>) -> Result<Array2<f64>> {
        self.check_len(x)?;
        let n_bins = self.wavelength.len();
        let n_lines = self.lines.len();
        let s = &self.scales;
        let c_amp = self.lines.coefficients(QuantityKind::Amplitude);
        let c_width = self.lines.coefficients(QuantityKind::Width);
        let c_shift = self.lines.coefficients(QuantityKind::Shift);
        let ratio = self.index.doublet().map(|slots| x[slots.ratio]);

        let mut d_amp = Array2::<f64>::zeros((n_bins, n_lines));
        let mut d_width = Array2::<f64>::zeros((n_bins, n_lines));
        let mut d_shift = Array2::<f64>::zeros((n_bins, n_lines));
        let mut d_ratio = Array1::<f64>::zeros(n_bins);
        let mut d_doublet_shift = Array1::<f64>::zeros(n_bins);

        for line in 0..n_lines {
            let state = self.line_state(x, line);
            let lambda0 = self.lines.wavelengths()[line];
            let amp_factor = s.amplitude * c_amp[line];
            let width_factor = s.width * c_width[line] / (2.0 * state.width * state.width);
            let shift_factor = s.shift * c_shift[line] / state.width;

            for (k, &lambda) in self.wavelength.iter().enumerate() {
                let rel = lambda / lambda0;
                let dev = rel - (1.0 + state.shift);
                let e = (-dev * dev / (2.0 * state.width)).exp();
                d_amp[[k, line]] = amp_factor * e;
                d_width[[k, line]] = state.amplitude * dev * dev * width_factor * e;
                d_shift[[k, line]] = state.amplitude * dev * shift_factor * e;

                if let (Some((amplitude_d, shift_d)), Some(ratio)) = (state.doublet, ratio) {
                    let dev_d = rel - (1.0 + shift_d);
                    let e_d = (-dev_d * dev_d / (2.0 * state.width)).exp();
                    let shift_term = amplitude_d * dev_d * shift_factor * e_d;
                    d_amp[[k, line]] += amp_factor * ratio * e_d;
                    d_width[[k, line]] += amplitude_d * dev_d * dev_d * width_factor * e_d;
                    d_shift[[k, line]] += shift_term;
                    d_ratio[k] += state.amplitude * e_d;
                    d_doublet_shift[k] += shift_term;
                }
            }
        }

        let mut jac = Array2::zeros((n_bins, self.index.size()));
        jac.column_mut(ParameterIndex::BACKGROUND).fill(s.background);
        for (segment, partials) in self.index.segments().into_iter().zip([&d_amp, &d_width, &d_shift]) {
            for (group, members) in segment.members().iter().enumerate() {
                let mut column = jac.column_mut(segment.offset() + group);
                for &line in members {
                    column += &partials.column(line);
                }
            }
        }
        if let Some(slots) = self.index.doublet() {
            jac.column_mut(slots.ratio).assign(&d_ratio);
            jac.column_mut(slots.shift).assign(&d_doublet_shift);
        }
        Ok(jac)
    }
}

impl Problem for SpectralModel<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        Ok(self.evaluate(params)? - &self.data)
    }

    fn parameter_count(&self) -> usize {
        self.index.size()
    }

    fn residual_count(&self) -> usize {
        self.wavelength.len()
    }

    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>> {
        match self.mode {
            JacobianMode::Analytic => self.analytic_jacobian(params),
            JacobianMode::ForwardDifference => finite_difference::jacobian(self, params, None),
            JacobianMode::CentralDifference => {
                finite_difference::jacobian_central(self, params, None)
            }
        }
    }

    fn has_custom_jacobian(&self) -> bool {
        self.mode == JacobianMode::Analytic
    }
}
