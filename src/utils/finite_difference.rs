//! Finite difference methods for numerical differentiation.
//!
//! This module provides forward and central difference approximations of the
//! Jacobian of a [`Problem`].

use crate::error::{Result, SpectraFitError};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step for forward differences (≈ √ε).
const FORWARD_EPSILON: f64 = 1.4901161193847656e-8;

/// Default relative step for central differences (≈ ∛ε).
const CENTRAL_EPSILON: f64 = 6.055454452393343e-6;

fn step_size(value: f64, eps: f64) -> f64 {
    eps * value.abs().max(1.0)
}

fn check_residuals(problem: &(impl Problem + ?Sized), residuals: &Array1<f64>) -> Result<()> {
    if residuals.len() != problem.residual_count() {
        return Err(SpectraFitError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            problem.residual_count(),
            residuals.len()
        )));
    }
    Ok(())
}

/// Compute the Jacobian matrix using forward finite differences.
///
/// J[i,j] = ∂residual[i]/∂param[j], with a step scaled by `max(|param|, 1)`.
///
/// # Arguments
///
/// * `problem` - The problem to evaluate
/// * `params` - The parameter values at which to evaluate the Jacobian
/// * `epsilon` - The relative step size (optional)
pub fn jacobian<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(FORWARD_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    check_residuals(problem, &residuals)?;

    let mut jac = Array2::zeros((n_residuals, n_params));
    let mut perturbed = params.clone();
    for j in 0..n_params {
        let h = step_size(params[j], eps);
        perturbed[j] = params[j] + h;
        let residuals_perturbed = problem.eval(&perturbed)?;
        perturbed[j] = params[j];

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / h;
        }
    }

    Ok(jac)
}

/// Compute the Jacobian matrix using central finite differences.
///
/// Twice as many evaluations as [`jacobian`], second-order accurate.
pub fn jacobian_central<P: Problem + ?Sized>(
    problem: &P,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(CENTRAL_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let mut jac = Array2::zeros((n_residuals, n_params));
    let mut perturbed = params.clone();
    for j in 0..n_params {
        let h = step_size(params[j], eps);

        perturbed[j] = params[j] + h;
        let forward = problem.eval(&perturbed)?;
        check_residuals(problem, &forward)?;
        perturbed[j] = params[j] - h;
        let backward = problem.eval(&perturbed)?;
        perturbed[j] = params[j];

        for i in 0..n_residuals {
            jac[[i, j]] = (forward[i] - backward[i]) / (2.0 * h);
        }
    }

    Ok(jac)
}
