//! Box bounds on normalized parameters.
//!
//! Bounds are expressed in the dimensionless units seen by the optimizer,
//! i.e. as multiples of the per-sample scales.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraFitError};
use crate::index::{ParamRole, ParameterIndex};

/// Closed interval `[min, max]` for one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }
}

impl Bounds {
    /// Create new bounds, requiring `min <= max`.
    ///
    /// # Examples
    ///
    /// ```
    /// use spectrafit_rs::bounds::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 2.0).unwrap();
    /// assert!(bounds.is_within_bounds(1.0));
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(SpectraFitError::Configuration(format!(
                "invalid bounds: min ({}) must not exceed max ({})",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Check if a value is within the bounds (inclusive)
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp a value to be within the bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    fn checked(self, name: &str) -> Result<Self> {
        Self::new(self.min, self.max).map_err(|_| {
            SpectraFitError::Configuration(format!(
                "invalid {} bounds [{}, {}]",
                name, self.min, self.max
            ))
        })
    }
}

/// Normalized bounds per quantity kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundsConfig {
    pub background: Bounds,
    pub amplitude: Bounds,
    pub width: Bounds,
    pub shift: Bounds,
    pub doublet_ratio: Bounds,
    pub doublet_shift: Bounds,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            background: Bounds { min: 0.0, max: 2.0 },
            amplitude: Bounds { min: 0.0, max: 1.0 },
            width: Bounds { min: 0.01, max: 1.0 },
            shift: Bounds {
                min: -1.0,
                max: 1.0,
            },
            doublet_ratio: Bounds { min: 0.4, max: 1.6 },
            doublet_shift: Bounds {
                min: -10.0,
                max: 10.0,
            },
        }
    }
}

impl BoundsConfig {
    pub fn for_role(&self, role: ParamRole) -> Bounds {
        match role {
            ParamRole::Background => self.background,
            ParamRole::Amplitude => self.amplitude,
            ParamRole::Width => self.width,
            ParamRole::Shift => self.shift,
            ParamRole::DoubletRatio => self.doublet_ratio,
            ParamRole::DoubletShift => self.doublet_shift,
        }
    }

    /// Bounds of every slot of the flat vector.
    ///
    /// The width lower bound must stay strictly positive.
    pub fn build(&self, index: &ParameterIndex) -> Result<Vec<Bounds>> {
        self.background.checked("background")?;
        self.amplitude.checked("amplitude")?;
        self.shift.checked("shift")?;
        self.doublet_ratio.checked("doublet ratio")?;
        self.doublet_shift.checked("doublet shift")?;
        let width = self.width.checked("width")?;
        if width.min <= 0.0 {
            return Err(SpectraFitError::Configuration(format!(
                "width lower bound must be positive, got {}",
                width.min
            )));
        }
        Ok(index.roles().into_iter().map(|role| self.for_role(role)).collect())
    }
}

/// Clip every component of `x` into its bounds.
pub fn clip_to_bounds(x: &mut ndarray::Array1<f64>, bounds: &[Bounds]) {
    for (value, b) in x.iter_mut().zip(bounds) {
        *value = b.clamp(*value);
    }
}
