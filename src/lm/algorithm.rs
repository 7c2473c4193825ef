//! Bounded Levenberg-Marquardt iteration.
//!
//! Box constraints are handled the dogbox way: variables resting on a bound
//! whose descent direction points out of the box are frozen for the
//! iteration, the damped normal equations are solved for the remaining ones,
//! and the trial point is projected back into the box.

use ndarray::{Array1, Array2};
use std::fmt;

use crate::bounds::{clip_to_bounds, Bounds};
use crate::error::{Result, SpectraFitError};
use crate::problem::Problem;
use crate::utils::matrix_convert::{nalgebra_vec_to_ndarray, ndarray_to_nalgebra, ndarray_vec_to_nalgebra};

use super::config::LmConfig;
use super::convergence::{active_set, check_termination, projected_gradient_norm, ConvergenceStatus};
use super::trust_region::TrustRegion;

/// Result of the Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Optimized parameter values
    pub params: Array1<f64>,

    /// Residuals at the solution
    pub residuals: Array1<f64>,

    /// Half the sum of squared residuals
    pub cost: f64,

    /// Number of iterations performed
    pub iterations: usize,

    /// Number of residual evaluations
    pub func_evals: usize,

    /// Number of Jacobian evaluations
    pub jac_evals: usize,

    /// Why the iteration stopped
    pub status: ConvergenceStatus,

    /// Whether the optimization converged
    pub success: bool,

    /// A message describing the result
    pub message: String,
}

impl fmt::Display for LmResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Optimization Result:")?;
        writeln!(f, "  Success: {}", self.success)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Cost: {:.6e}", self.cost)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        writeln!(f, "  Function evaluations: {}", self.func_evals)?;
        writeln!(f, "  Parameters: {:?}", self.params)?;
        Ok(())
    }
}

fn half_squared_norm(residuals: &Array1<f64>) -> f64 {
    0.5 * residuals.dot(residuals)
}

fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// The bounded Levenberg-Marquardt optimizer.
#[derive(Debug, Clone, Default)]
pub struct BoundedLevenbergMarquardt {
    config: LmConfig,
}

impl BoundedLevenbergMarquardt {
    /// Create a new optimizer with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new optimizer with the given configuration.
    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Set the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the tolerance for relative cost change.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    /// Set the tolerance for change in parameter values.
    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    /// Set the tolerance for the projected gradient.
    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.config.gtol = gtol;
        self
    }

    /// Minimize `½‖r(x)‖²` subject to `bounds`.
    ///
    /// The initial point is clipped into the bounds first. Running out of
    /// budget is reported through [`LmResult::status`], not as an error.
    ///
    /// # Errors
    ///
    /// * `DimensionMismatch` if `initial_params` or `bounds` do not match the problem
    /// * `NumericalError` if the initial point or its residuals are not finite
    /// * any error raised by the problem itself
    pub fn minimize<P: Problem + ?Sized>(
        &self,
        problem: &P,
        initial_params: Array1<f64>,
        bounds: &[Bounds],
    ) -> Result<LmResult> {
        let n_params = problem.parameter_count();
        if initial_params.len() != n_params || bounds.len() != n_params {
            return Err(SpectraFitError::DimensionMismatch(format!(
                "Expected {} parameters and bounds, got {} and {}",
                n_params,
                initial_params.len(),
                bounds.len()
            )));
        }
        if initial_params.iter().any(|v| !v.is_finite()) {
            return Err(SpectraFitError::NumericalError(
                "initial parameters are not finite".to_string(),
            ));
        }

        let config = &self.config;
        let max_evaluations = config.evaluation_budget(n_params);

        let mut params = initial_params;
        clip_to_bounds(&mut params, bounds);
        let mut residuals = problem.eval(&params)?;
        if residuals.iter().any(|r| !r.is_finite()) {
            return Err(SpectraFitError::NumericalError(
                "residuals at the initial point are not finite".to_string(),
            ));
        }
        let mut cost = half_squared_norm(&residuals);
        let mut func_evals = 1;
        let mut jac_evals = 0;
        let mut iterations = 0;
        let mut trust_region = TrustRegion::from_config(config);

        let status = 'outer: loop {
            if cost == 0.0 {
                break ConvergenceStatus::FunctionValueConvergence;
            }
            if iterations >= config.max_iterations {
                break ConvergenceStatus::MaxIterationsReached;
            }

            let jacobian = problem.jacobian(&params)?;
            jac_evals += 1;
            if jacobian.iter().any(|v| !v.is_finite()) {
                break ConvergenceStatus::NumericalError;
            }
            let gradient = jacobian.t().dot(&residuals);
            if projected_gradient_norm(&params, &gradient, bounds) <= config.gtol {
                break ConvergenceStatus::GradientConvergence;
            }
            let active = active_set(&params, &gradient, bounds);
            let free: Vec<usize> = (0..n_params).filter(|&i| !active[i]).collect();
            let jtj = jacobian.t().dot(&jacobian);
            iterations += 1;

            // Inner loop: shrink the step until one is accepted or a criterion fires
            loop {
                if func_evals >= max_evaluations {
                    break 'outer ConvergenceStatus::MaxEvaluationsReached;
                }
                let step = match damped_step(&jtj, &gradient, &free, trust_region.lambda) {
                    Ok(step) => step,
                    Err(err) => {
                        if trust_region.is_saturated() {
                            tracing::debug!(error = %err, "damping saturated");
                            break 'outer ConvergenceStatus::NumericalError;
                        }
                        trust_region.increase();
                        continue;
                    }
                };

                let mut trial = &params + &step;
                clip_to_bounds(&mut trial, bounds);
                let step = &trial - &params;
                let step_norm = norm(&step);
                let predicted = -(gradient.dot(&step) + 0.5 * step.dot(&jtj.dot(&step)));

                let trial_residuals = problem.eval(&trial)?;
                func_evals += 1;
                let (trial_cost, ratio) = if trial_residuals.iter().all(|r| r.is_finite()) {
                    let trial_cost = half_squared_norm(&trial_residuals);
                    (trial_cost, TrustRegion::gain_ratio(cost, trial_cost, predicted))
                } else {
                    (f64::INFINITY, -1.0)
                };
                let reduction = if trial_cost.is_finite() { cost - trial_cost } else { 0.0 };

                let termination = check_termination(
                    reduction,
                    cost,
                    step_norm,
                    norm(&params),
                    ratio,
                    config.ftol,
                    config.xtol,
                );
                let accepted = trust_region.update_lambda(ratio);
                tracing::trace!(
                    iteration = iterations,
                    cost,
                    trial_cost,
                    ratio,
                    lambda = trust_region.lambda,
                    accepted,
                    "lm trial step"
                );
                if accepted {
                    params = trial;
                    residuals = trial_residuals;
                    cost = trial_cost;
                }
                if let Some(status) = termination {
                    break 'outer status;
                }
                if accepted {
                    break;
                }
            }
        };

        let success = status.is_converged();
        tracing::debug!(
            status = status.code(),
            iterations,
            func_evals,
            jac_evals,
            cost,
            "lm finished"
        );

        Ok(LmResult {
            params,
            residuals,
            cost,
            iterations,
            func_evals,
            jac_evals,
            status,
            success,
            message: status.description().to_string(),
        })
    }
}

/// Solve `(A_ff + λ·D_ff) s_f = −g_f` for the free variables.
///
/// `D` is the diagonal of `A = JᵀJ` floored at a tiny fraction of its
/// largest entry.
fn damped_step(
    jtj: &Array2<f64>,
    gradient: &Array1<f64>,
    free: &[usize],
    lambda: f64,
) -> Result<Array1<f64>> {
    let m = free.len();
    let max_diag = free.iter().map(|&i| jtj[[i, i]]).fold(0.0, f64::max);
    let floor = f64::EPSILON * max_diag.max(f64::MIN_POSITIVE);

    let system = Array2::from_shape_fn((m, m), |(a, b)| {
        let value = jtj[[free[a], free[b]]];
        if a == b {
            value + lambda * value.max(floor)
        } else {
            value
        }
    });
    let rhs: Array1<f64> = free.iter().map(|&i| -gradient[i]).collect();

    let cholesky = ndarray_to_nalgebra(&system).cholesky().ok_or_else(|| {
        SpectraFitError::LinearAlgebra(format!(
            "damped normal matrix is not positive definite (lambda = {:e})",
            lambda
        ))
    })?;
    let solution = nalgebra_vec_to_ndarray(&cholesky.solve(&ndarray_vec_to_nalgebra(&rhs)));
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(SpectraFitError::LinearAlgebra(
            "damped step is not finite".to_string(),
        ));
    }

    let mut step = Array1::zeros(gradient.len());
    for (k, &i) in free.iter().enumerate() {
        step[i] = solution[k];
    }
    Ok(step)
}
