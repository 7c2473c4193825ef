//! Initial guess in normalized units.

use std::collections::BTreeMap;

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::constraints::CompiledLines;
use crate::error::{Result, SpectraFitError};
use crate::index::ParameterIndex;
use crate::scaling::Scales;

/// Starting values of the normalized free variables.
///
/// Amplitudes are not configured here: they are read from the data at each
/// group's reference line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuessConfig {
    pub background: f64,
    /// Fraction of the width scale
    pub width: f64,
    pub shift: f64,
    /// Shift seed used instead of `shift` when doubling is enabled
    pub doubled_shift: f64,
    pub doublet_ratio: f64,
    pub doublet_shift: f64,
}

impl Default for GuessConfig {
    fn default() -> Self {
        Self {
            background: 1.0,
            width: 0.4,
            shift: 0.0,
            doubled_shift: 0.0,
            doublet_ratio: 0.7,
            doublet_shift: 0.7,
        }
    }
}

/// Per-amplitude-group multipliers built from a line → factor map.
///
/// A factor applies to the group whose reference line it names; groups
/// without one get 1.
pub fn amplitude_seed_factors(
    compiled: &CompiledLines,
    index: &ParameterIndex,
    seeds: &BTreeMap<String, f64>,
) -> Result<Vec<f64>> {
    for (id, factor) in seeds {
        compiled
            .position(id)
            .map_err(|_| SpectraFitError::Configuration(format!("amplitude seed for inactive line `{}`", id)))?;
        if !factor.is_finite() {
            return Err(SpectraFitError::Configuration(format!(
                "amplitude seed for `{}` is not finite",
                id
            )));
        }
    }
    Ok(index
        .amplitude_reference()
        .iter()
        .map(|&line| {
            seeds
                .get(&compiled.lines()[line].id)
                .copied()
                .unwrap_or(1.0)
        })
        .collect())
}

/// First bin at or above `target`, clamped to the last bin.
fn search_sorted(axis: &Array1<f64>, target: f64) -> usize {
    let n = axis.len();
    (0..n).find(|&i| axis[i] >= target).unwrap_or(n.saturating_sub(1))
}

/// Value of the finite bin closest to `bin`, lower bin first on ties.
///
/// NaN if the sample has no finite bin.
fn nearest_finite(sample: ArrayView1<'_, f64>, bin: usize) -> f64 {
    let n = sample.len();
    (0..n)
        .flat_map(|d| [bin.checked_sub(d), bin.checked_add(d).filter(|&i| d > 0 && i < n)])
        .flatten()
        .filter(|&i| i < n)
        .map(|i| sample[i])
        .find(|v| v.is_finite())
        .unwrap_or(f64::NAN)
}

/// Build the normalized starting point for one sample.
///
/// Nothing is clipped here; the caller clips into the bounds.
pub fn initial_guess(
    index: &ParameterIndex,
    line_wavelengths: &[f64],
    axis: &Array1<f64>,
    sample: ArrayView1<'_, f64>,
    scales: &Scales,
    config: &GuessConfig,
    amplitude_factors: &[f64],
) -> Array1<f64> {
    let mut x = Array1::zeros(index.size());
    x[ParameterIndex::BACKGROUND] = config.background;

    let amplitude = index.segment(crate::constraints::QuantityKind::Amplitude);
    for ((position, &line), &factor) in amplitude
        .positions()
        .zip(index.amplitude_reference())
        .zip(amplitude_factors)
    {
        let bin = search_sorted(axis, line_wavelengths[line]);
        x[position] = nearest_finite(sample, bin) / scales.amplitude * factor;
    }

    for position in index.segment(crate::constraints::QuantityKind::Width).positions() {
        x[position] = config.width;
    }

    let shift_seed = if index.is_doubled() {
        config.doubled_shift
    } else {
        config.shift
    };
    for position in index.segment(crate::constraints::QuantityKind::Shift).positions() {
        x[position] = shift_seed;
    }

    if let Some(slots) = index.doublet() {
        x[slots.ratio] = config.doublet_ratio;
        x[slots.shift] = config.doublet_shift;
    }
    x
}
