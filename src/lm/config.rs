//! Configuration options for the bounded Levenberg-Marquardt solver.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectraFitError};

/// Configuration options for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Maximum number of iterations (Jacobian evaluations). Default: 200
    pub max_iterations: usize,

    /// Maximum number of residual evaluations; `None` means 100 × parameter count
    pub max_evaluations: Option<usize>,

    /// Tolerance for relative change in cost. Default: 1e-12
    pub ftol: f64,

    /// Tolerance for change in parameter values. Default: 1e-12
    pub xtol: f64,

    /// Tolerance for the projected gradient ∞-norm. Default: 1e-12
    pub gtol: f64,

    /// Initial value for the damping parameter. Default: 1e-3
    pub initial_lambda: f64,

    /// Factor by which to increase lambda. Default: 10.0
    pub lambda_up_factor: f64,

    /// Factor by which to decrease lambda. Default: 0.1
    pub lambda_down_factor: f64,

    /// Minimum value for lambda. Default: 1e-12
    pub min_lambda: f64,

    /// Maximum value for lambda. Default: 1e12
    pub max_lambda: f64,

    /// Minimum gain ratio required to accept a step. Default: 1e-4
    pub min_gain_ratio: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            max_evaluations: None,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            initial_lambda: 1e-3,
            lambda_up_factor: 10.0,
            lambda_down_factor: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
            min_gain_ratio: 1e-4,
        }
    }
}

impl LmConfig {
    /// Evaluation budget for a problem of `n_params` parameters.
    pub fn evaluation_budget(&self, n_params: usize) -> usize {
        self.max_evaluations.unwrap_or(100 * n_params.max(1))
    }

    /// Same configuration with both budgets multiplied by `factor`.
    pub fn scaled_budget(&self, factor: usize, n_params: usize) -> Self {
        Self {
            max_iterations: self.max_iterations * factor,
            max_evaluations: Some(self.evaluation_budget(n_params) * factor),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let tolerances = [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)];
        for (name, value) in tolerances {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SpectraFitError::Configuration(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.max_iterations == 0 || self.max_evaluations == Some(0) {
            return Err(SpectraFitError::Configuration(
                "iteration and evaluation budgets must be positive".to_string(),
            ));
        }
        if !(self.lambda_up_factor > 1.0 && self.lambda_down_factor > 0.0 && self.lambda_down_factor < 1.0) {
            return Err(SpectraFitError::Configuration(format!(
                "lambda factors must satisfy up > 1 and 0 < down < 1, got {} and {}",
                self.lambda_up_factor, self.lambda_down_factor
            )));
        }
        if !(self.min_lambda > 0.0 && self.min_lambda <= self.initial_lambda && self.initial_lambda <= self.max_lambda) {
            return Err(SpectraFitError::Configuration(format!(
                "lambda range [{}, {}] must be positive and contain {}",
                self.min_lambda, self.max_lambda, self.initial_lambda
            )));
        }
        Ok(())
    }
}
