//! Termination criteria for the bounded solver.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceStatus {
    /// The projected gradient is below `gtol`.
    GradientConvergence,

    /// The relative cost reduction is below `ftol`, or the cost is zero.
    FunctionValueConvergence,

    /// The step is below `xtol`.
    ParameterConvergence,

    /// The iteration budget ran out.
    MaxIterationsReached,

    /// The residual evaluation budget ran out.
    MaxEvaluationsReached,

    /// The damped system could not be solved or the Jacobian is not finite.
    NumericalError,
}

impl ConvergenceStatus {
    /// Numeric termination code: 1 gradient, 2 cost, 3 step, 0 budget, −1 numerical.
    pub fn code(&self) -> i32 {
        match self {
            ConvergenceStatus::GradientConvergence => 1,
            ConvergenceStatus::FunctionValueConvergence => 2,
            ConvergenceStatus::ParameterConvergence => 3,
            ConvergenceStatus::MaxIterationsReached | ConvergenceStatus::MaxEvaluationsReached => 0,
            ConvergenceStatus::NumericalError => -1,
        }
    }

    pub fn is_converged(&self) -> bool {
        self.code() > 0
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::GradientConvergence => "Converged: small projected gradient",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small cost change",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
            ConvergenceStatus::MaxEvaluationsReached => {
                "Terminated: maximum function evaluations reached"
            }
            ConvergenceStatus::NumericalError => "Terminated: numerical error",
        }
    }
}

/// Variables sitting on a bound with the descent direction pointing out of the box.
pub fn active_set(x: &Array1<f64>, gradient: &Array1<f64>, bounds: &[Bounds]) -> Vec<bool> {
    x.iter()
        .zip(gradient)
        .zip(bounds)
        .map(|((&xi, &gi), b)| (xi <= b.min && gi > 0.0) || (xi >= b.max && gi < 0.0))
        .collect()
}

/// ∞-norm of the gradient restricted to the variables free to move.
pub fn projected_gradient_norm(x: &Array1<f64>, gradient: &Array1<f64>, bounds: &[Bounds]) -> f64 {
    active_set(x, gradient, bounds)
        .into_iter()
        .zip(gradient)
        .filter(|(active, _)| !active)
        .fold(0.0, |norm, (_, g)| norm.max(g.abs()))
}

/// Cost and step tests applied after every trial step.
///
/// * `reduction` - actual cost reduction of the trial
/// * `cost` - cost before the trial
/// * `ratio` - gain ratio of the trial
pub fn check_termination(
    reduction: f64,
    cost: f64,
    step_norm: f64,
    x_norm: f64,
    ratio: f64,
    ftol: f64,
    xtol: f64,
) -> Option<ConvergenceStatus> {
    if reduction < ftol * cost && ratio > 0.25 {
        Some(ConvergenceStatus::FunctionValueConvergence)
    } else if step_norm < xtol * (xtol + x_norm) {
        Some(ConvergenceStatus::ParameterConvergence)
    } else {
        None
    }
}
