//! Fit configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bounds::BoundsConfig;
use crate::error::{Result, SpectraFitError};
use crate::initial::GuessConfig;
use crate::lm::LmConfig;
use crate::model::JacobianMode;
use crate::scaling::Scales;

/// Elementary charge, used to express kT in eV.
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19;

/// Configuration of a batch fit.
///
/// Every field has a default, so a JSON document only needs the fields it
/// changes:
///
/// ```rust
/// use spectrafit_rs::fit::FitConfig;
///
/// let config = FitConfig::from_json_str(r#"{"chain": true, "solver": {"max_iterations": 50}}"#).unwrap();
/// assert!(config.chain);
/// assert_eq!(config.solver.max_iterations, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Warm-start each sample from the previous converged one
    pub chain: bool,

    /// Solve independent samples on the rayon pool
    pub parallel: bool,

    pub jacobian: JacobianMode,

    pub solver: LmConfig,

    pub bounds: BoundsConfig,

    pub guess: GuessConfig,

    /// Fixed scales overriding the per-sample ones
    pub scales: Option<Scales>,

    /// Multipliers of the initial amplitude, keyed by line identifier
    pub amplitude_seeds: BTreeMap<String, f64>,

    /// Budget multiplier for the retry of a failed sample
    pub retry_iteration_factor: usize,

    /// κ in kT = κ · width² · m · c²; 1/e gives eV
    pub temperature_factor: f64,

    /// Keep the fitted spectrum of each sample
    pub store_model: bool,

    /// Keep the per-line detail matrix of each sample
    pub store_detail: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            chain: false,
            parallel: true,
            jacobian: JacobianMode::Analytic,
            solver: LmConfig::default(),
            bounds: BoundsConfig::default(),
            guess: GuessConfig::default(),
            scales: None,
            amplitude_seeds: BTreeMap::new(),
            retry_iteration_factor: 2,
            temperature_factor: 1.0 / ELEMENTARY_CHARGE,
            store_model: true,
            store_detail: false,
        }
    }
}

impl FitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_chain(mut self, chain: bool) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_jacobian(mut self, mode: JacobianMode) -> Self {
        self.jacobian = mode;
        self
    }

    pub fn with_solver(mut self, solver: LmConfig) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_bounds(mut self, bounds: BoundsConfig) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_guess(mut self, guess: GuessConfig) -> Self {
        self.guess = guess;
        self
    }

    pub fn with_scales(mut self, scales: Scales) -> Self {
        self.scales = Some(scales);
        self
    }

    pub fn with_amplitude_seed(mut self, line: &str, factor: f64) -> Self {
        self.amplitude_seeds.insert(line.to_string(), factor);
        self
    }

    pub fn with_store_detail(mut self, store: bool) -> Self {
        self.store_detail = store;
        self
    }

    pub fn with_store_model(mut self, store: bool) -> Self {
        self.store_model = store;
        self
    }

    /// Checks that do not depend on the line set.
    pub fn validate(&self) -> Result<()> {
        self.solver.validate()?;
        if self.retry_iteration_factor == 0 {
            return Err(SpectraFitError::Configuration(
                "retry_iteration_factor must be at least 1".to_string(),
            ));
        }
        if !(self.temperature_factor.is_finite() && self.temperature_factor > 0.0) {
            return Err(SpectraFitError::Configuration(format!(
                "temperature_factor must be finite and positive, got {}",
                self.temperature_factor
            )));
        }
        if let Some(scales) = &self.scales {
            scales
                .validate()
                .map_err(|e| SpectraFitError::Configuration(format!("fixed scales: {}", e)))?;
        }
        Ok(())
    }
}
