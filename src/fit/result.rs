//! Per-sample and per-batch fit results.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::constraints::ActiveLine;
use crate::error::{Result, SpectraFitError};
use crate::fit::extract::PhysicalQuantities;
use crate::scaling::Scales;

/// Terminal state of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleStatus {
    Converged,
    Failed,
}

/// Solver diagnostics of the last attempt on a sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    /// Half the sum of squared residuals, NaN if no solve completed
    pub cost: f64,
    pub iterations: usize,
    pub func_evals: usize,
    pub jac_evals: usize,
    /// 1, 2, 3 on convergence, 0 on budget exhaustion, −1 on numerical failure
    pub termination: i32,
    pub message: String,
    /// 1, or 2 when the retry ran
    pub attempts: usize,
}

/// Fit result of one time sample.
#[derive(Debug, Clone)]
pub struct SampleFit {
    pub status: SampleStatus,
    /// Scales the solution is expressed in
    pub scales: Scales,
    /// Normalized solution, NaN when failed
    pub solution: Array1<f64>,
    pub quantities: PhysicalQuantities,
    pub diagnostics: Diagnostics,
    /// Fitted spectrum, when requested
    pub model: Option<Array1<f64>>,
    /// Background and per-line columns (L × (1 + lines)), when requested
    pub detail: Option<Array2<f64>>,
}

impl SampleFit {
    pub fn is_converged(&self) -> bool {
        self.status == SampleStatus::Converged
    }

    /// `Ok` for a converged sample, `ConvergenceFailure` otherwise.
    pub fn check(&self) -> Result<()> {
        match self.status {
            SampleStatus::Converged => Ok(()),
            SampleStatus::Failed => Err(SpectraFitError::ConvergenceFailure(format!(
                "{} after {} attempts",
                self.diagnostics.message, self.diagnostics.attempts
            ))),
        }
    }
}

/// Count and indices of failed samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub samples: usize,
    pub converged: usize,
    pub failed: Vec<usize>,
}

/// Labelled intensity ratio series.
#[derive(Debug, Clone, PartialEq)]
pub struct LineRatio {
    /// `"upper/lower"` using line symbols
    pub label: String,
    /// One value per sample
    pub values: Array1<f64>,
}

/// Results of a batch, indexed by time sample.
#[derive(Debug, Clone)]
pub struct BatchResult {
    lines: Vec<ActiveLine>,
    width_groups: Vec<String>,
    shift_groups: Vec<String>,
    samples: Vec<SampleFit>,
}

impl BatchResult {
    pub(crate) fn new(
        lines: Vec<ActiveLine>,
        width_groups: Vec<String>,
        shift_groups: Vec<String>,
        samples: Vec<SampleFit>,
    ) -> Self {
        Self {
            lines,
            width_groups,
            shift_groups,
            samples,
        }
    }

    /// Active lines, in column order of the per-line matrices.
    pub fn lines(&self) -> &[ActiveLine] {
        &self.lines
    }

    /// Width group names, in column order of [`temperature`](Self::temperature).
    pub fn width_groups(&self) -> &[String] {
        &self.width_groups
    }

    /// Shift group names, in column order of [`velocity`](Self::velocity).
    pub fn shift_groups(&self) -> &[String] {
        &self.shift_groups
    }

    pub fn samples(&self) -> &[SampleFit] {
        &self.samples
    }

    pub fn sample(&self, index: usize) -> Option<&SampleFit> {
        self.samples.get(index)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn stack(&self, f: impl Fn(&PhysicalQuantities) -> &Array1<f64>) -> Array2<f64> {
        let cols = self.samples.first().map_or(0, |s| f(&s.quantities).len());
        Array2::from_shape_fn((self.samples.len(), cols), |(i, j)| {
            f(&self.samples[i].quantities)[j]
        })
    }

    fn stack_optional(
        &self,
        f: impl Fn(&PhysicalQuantities) -> Option<&Array1<f64>>,
    ) -> Option<Array2<f64>> {
        let cols = f(&self.samples.first()?.quantities)?.len();
        let mut out = Array2::from_elem((self.samples.len(), cols), f64::NAN);
        for (i, sample) in self.samples.iter().enumerate() {
            if let Some(values) = f(&sample.quantities) {
                out.row_mut(i).assign(values);
            }
        }
        Some(out)
    }

    pub fn background(&self) -> Array1<f64> {
        self.samples.iter().map(|s| s.quantities.background).collect()
    }

    /// Samples × lines.
    pub fn amplitude(&self) -> Array2<f64> {
        self.stack(|q| &q.amplitude)
    }

    pub fn width2(&self) -> Array2<f64> {
        self.stack(|q| &q.width2)
    }

    pub fn shift(&self) -> Array2<f64> {
        self.stack(|q| &q.shift)
    }

    pub fn intensity(&self) -> Array2<f64> {
        self.stack(|q| &q.intensity)
    }

    pub fn doublet_ratio(&self) -> Option<Array1<f64>> {
        self.samples
            .iter()
            .map(|s| s.quantities.doublet_ratio)
            .collect::<Option<Vec<f64>>>()
            .map(Array1::from)
    }

    pub fn doublet_shift(&self) -> Option<Array2<f64>> {
        self.stack_optional(|q| q.doublet_shift.as_ref())
    }

    /// Samples × width groups.
    pub fn temperature(&self) -> Option<Array2<f64>> {
        self.stack_optional(|q| q.temperature.as_ref())
    }

    /// Samples × shift groups.
    pub fn velocity(&self) -> Option<Array2<f64>> {
        self.stack_optional(|q| q.velocity.as_ref())
    }

    pub fn cost(&self) -> Array1<f64> {
        self.samples.iter().map(|s| s.diagnostics.cost).collect()
    }

    pub fn converged(&self) -> Vec<bool> {
        self.samples.iter().map(SampleFit::is_converged).collect()
    }

    /// Ratio of integrated intensities of line `up` over line `low`.
    ///
    /// # Errors
    ///
    /// * `LineNotFound` if an identifier is not an active line
    pub fn line_ratio(&self, up: &str, low: &str) -> Result<LineRatio> {
        let i_up = self.position(up)?;
        let i_low = self.position(low)?;
        let intensity = self.intensity();
        Ok(LineRatio {
            label: format!("{}/{}", self.lines[i_up].symbol, self.lines[i_low].symbol),
            values: &intensity.column(i_up) / &intensity.column(i_low),
        })
    }

    /// [`line_ratio`](Self::line_ratio) for each `(upper, lower)` pair.
    ///
    /// An unknown identifier fails only its own pair.
    pub fn line_ratios(&self, pairs: &[(&str, &str)]) -> Vec<Result<LineRatio>> {
        pairs
            .iter()
            .map(|&(up, low)| self.line_ratio(up, low))
            .collect()
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.lines
            .iter()
            .position(|line| line.id == id)
            .ok_or_else(|| SpectraFitError::LineNotFound(id.to_string()))
    }

    pub fn summary(&self) -> BatchSummary {
        let failed: Vec<usize> = self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_converged())
            .map(|(i, _)| i)
            .collect();
        BatchSummary {
            samples: self.samples.len(),
            converged: self.samples.len() - failed.len(),
            failed,
        }
    }
}
