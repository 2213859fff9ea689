//! # Levenberg–Marquardt optimizer
//!
//! Minimises `½‖R(p)‖²` for a [`ResidualModel`] whose Jacobian is computed by finite
//! differences. Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = −Jᵀr
//! ```
//!
//! by Cholesky factorisation. A step is accepted when it lowers the cost, after which `λ` is
//! divided by ten; otherwise `λ` is multiplied by ten and the step is retried. Every
//! candidate goes through the [`ParameterValidator`] before it is evaluated.
//!
//! Stopping criteria:
//!
//! * relative parameter change of an accepted step ≤ `parameter_relative_tolerance`,
//! * relative cost reduction of an accepted step ≤ `cost_relative_tolerance`,
//! * zero cost,
//! * damping saturated at `lambda_max` (no descent direction left),
//! * evaluation or iteration budget exhausted (reported as not converged).

use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::{
    fit::{jacobian::FiniteDifferenceJacobian, residuals::ResidualModel, validator::ParameterValidator},
    tlefit_errors::TleFitError,
};

/// Floor of the diagonal scaling, for parameters the residuals do not depend on
const DIAG_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LmSettings {
    pub max_evaluations: usize,
    pub max_iterations: usize,
    pub parameter_relative_tolerance: f64,
    pub cost_relative_tolerance: f64,
    pub lambda_init: f64,
    pub lambda_decrease: f64,
    pub lambda_increase: f64,
    pub lambda_min: f64,
    pub lambda_max: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        LmSettings {
            max_evaluations: 1000,
            max_iterations: 1000,
            parameter_relative_tolerance: 1e-10,
            cost_relative_tolerance: 1e-10,
            lambda_init: 1e-3,
            lambda_decrease: 10.0,
            lambda_increase: 10.0,
            lambda_min: 1e-12,
            lambda_max: 1e16,
        }
    }
}

impl LmSettings {
    pub fn with_budget(mut self, evaluations: usize, iterations: usize) -> Self {
        self.max_evaluations = evaluations;
        self.max_iterations = iterations;
        self
    }

    pub fn with_parameter_tolerance(mut self, tol: f64) -> Self {
        self.parameter_relative_tolerance = tol;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmOutcome {
    pub point: DVector<f64>,
    pub residuals: DVector<f64>,
    /// `sqrt(‖r‖² / observations)`
    pub rms: f64,
    pub evaluations: usize,
    pub iterations: usize,
    pub converged: bool,
    /// `(JᵀJ)⁻¹·σ²` at the solution, when `JᵀJ` is invertible and the problem is
    /// over-determined
    pub covariance: Option<DMatrix<f64>>,
}

fn rms(cost: f64, observations: usize) -> f64 {
    if observations == 0 {
        0.0
    } else {
        (cost / observations as f64).sqrt()
    }
}

fn covariance(jac: &DMatrix<f64>, cost: f64) -> Option<DMatrix<f64>> {
    let (m, k) = jac.shape();
    if m <= k {
        return None;
    }
    let sigma2 = cost / (m - k) as f64;
    (jac.transpose() * jac).try_inverse().map(|inv| inv * sigma2)
}

/// Run the optimizer.
///
/// Arguments
/// ---------
/// * `model`: residual function.
/// * `steps`, `relative`: finite-difference steps (see [`FiniteDifferenceJacobian`]).
/// * `start`: initial parameters, validated before the first evaluation.
/// * `validator`: parameter constraints.
/// * `settings`: budgets, tolerances and damping schedule.
///
/// Return
/// ------
/// * The best point found, whether or not a convergence criterion fired, or
///   `Err(TleFitError::DimensionMismatch)` if the step vectors do not match `start`.
pub fn optimize(
    model: &dyn ResidualModel,
    steps: Vec<f64>,
    relative: Vec<bool>,
    start: &DVector<f64>,
    validator: &ParameterValidator,
    settings: &LmSettings,
) -> Result<LmOutcome, TleFitError> {
    let fdj = FiniteDifferenceJacobian::new(model, steps, relative)?;
    let n_obs = model.observation_count();

    let mut point = validator.validate(start);
    let (mut residuals, mut jac) = fdj.value_and_jacobian(&point)?;
    let mut cost = residuals.norm_squared();
    let mut evaluations = 1;
    let mut iterations = 0;
    let mut converged = false;
    let mut lambda = settings.lambda_init;

    'outer: while iterations < settings.max_iterations {
        iterations += 1;
        if cost == 0.0 {
            converged = true;
            break;
        }

        let jt = jac.transpose();
        let normal = &jt * &jac;
        let gradient = &jt * &residuals;
        let scaling = DMatrix::from_diagonal(&normal.diagonal().map(|d| d.max(DIAG_FLOOR)));

        loop {
            if evaluations >= settings.max_evaluations {
                break 'outer;
            }

            let Some(chol) = (&normal + &scaling * lambda).cholesky() else {
                lambda *= settings.lambda_increase;
                if lambda > settings.lambda_max {
                    converged = true;
                    break 'outer;
                }
                continue;
            };

            let delta = chol.solve(&(-&gradient));
            let candidate = validator.validate(&(&point + &delta));
            let trial = model.residuals(&candidate);
            evaluations += 1;
            let trial_cost = trial.norm_squared();

            if trial_cost.is_finite() && trial_cost < cost {
                let step_norm = (&candidate - &point).norm();
                let rel_param = step_norm / point.norm().max(f64::MIN_POSITIVE);
                let rel_cost = (cost - trial_cost) / cost;
                debug!(
                    "LM iteration {iterations}: rms {:.6e} -> {:.6e}, lambda {lambda:.1e}",
                    rms(cost, n_obs),
                    rms(trial_cost, n_obs)
                );

                point = candidate;
                residuals = trial;
                cost = trial_cost;
                lambda = (lambda / settings.lambda_decrease).max(settings.lambda_min);
                jac = fdj.jacobian_at(&point, &residuals)?;

                if rel_param <= settings.parameter_relative_tolerance
                    || rel_cost <= settings.cost_relative_tolerance
                {
                    converged = true;
                    break 'outer;
                }
                break;
            }

            lambda *= settings.lambda_increase;
            if lambda > settings.lambda_max {
                converged = true;
                break 'outer;
            }
        }
    }

    Ok(LmOutcome {
        rms: rms(cost, n_obs),
        covariance: covariance(&jac, cost),
        point,
        residuals,
        evaluations,
        iterations,
        converged,
    })
}
