//! Damping control for the Levenberg-Marquardt algorithm.
//!
//! Adapts the damping parameter from the agreement between the predicted and
//! actual reduction in cost.

use super::config::LmConfig;

/// Gain ratio above which the damping is relaxed.
const GOOD_GAIN_RATIO: f64 = 0.75;

/// Gain ratio below which an accepted step still increases the damping.
const POOR_GAIN_RATIO: f64 = 0.25;

/// Trust region state for the Levenberg-Marquardt algorithm.
#[derive(Debug, Clone)]
pub struct TrustRegion {
    /// Current value of the damping parameter
    pub lambda: f64,

    /// Minimum allowed value for the damping parameter
    pub lambda_min: f64,

    /// Maximum allowed value for the damping parameter
    pub lambda_max: f64,

    /// Factor to increase lambda by when a step is rejected
    pub lambda_increase_factor: f64,

    /// Factor to decrease lambda by after a good step
    pub lambda_decrease_factor: f64,

    /// Minimum gain ratio required to accept a step
    pub min_gain_ratio: f64,
}

impl TrustRegion {
    pub fn from_config(config: &LmConfig) -> Self {
        Self {
            lambda: config.initial_lambda,
            lambda_min: config.min_lambda,
            lambda_max: config.max_lambda,
            lambda_increase_factor: config.lambda_up_factor,
            lambda_decrease_factor: config.lambda_down_factor,
            min_gain_ratio: config.min_gain_ratio,
        }
    }

    /// Updates the damping parameter based on the gain ratio.
    ///
    /// Returns whether the step is accepted.
    pub fn update_lambda(&mut self, gain_ratio: f64) -> bool {
        if gain_ratio > GOOD_GAIN_RATIO {
            self.decrease();
        } else if gain_ratio < POOR_GAIN_RATIO {
            self.increase();
        }
        gain_ratio > self.min_gain_ratio
    }

    pub fn increase(&mut self) {
        self.lambda = (self.lambda * self.lambda_increase_factor).min(self.lambda_max);
    }

    pub fn decrease(&mut self) {
        self.lambda = (self.lambda * self.lambda_decrease_factor).max(self.lambda_min);
    }

    pub fn is_saturated(&self) -> bool {
        self.lambda >= self.lambda_max
    }

    /// Ratio of actual to predicted cost reduction.
    ///
    /// A non-positive prediction yields −1 so the step is rejected.
    pub fn gain_ratio(current_cost: f64, new_cost: f64, predicted_reduction: f64) -> f64 {
        let actual_reduction = current_cost - new_cost;
        if predicted_reduction > 0.0 {
            actual_reduction / predicted_reduction
        } else {
            -1.0
        }
    }
}
