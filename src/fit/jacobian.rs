//! # Finite-difference Jacobian
//!
//! Numerical derivatives of a [`ResidualModel`] with respect to each parameter:
//!
//! * `pᵢ ≠ 0`: 4th-order central stencil
//!   `(R(p−2h) − 8R(p−h) + 8R(p+h) − R(p+2h)) / 12h`,
//! * `pᵢ = 0`: 2nd-order forward stencil `(−3R(p) + 4R(p+h) − R(p+2h)) / 2h`.
//!
//! The step of parameter `i` is `hᵢ` when absolute, `hᵢ·|pᵢ|` when relative (the raw `hᵢ`
//! is kept for a zero parameter).

use nalgebra::{DMatrix, DVector};

use crate::{fit::residuals::ResidualModel, tlefit_errors::TleFitError};

pub struct FiniteDifferenceJacobian<'a> {
    model: &'a dyn ResidualModel,
    steps: Vec<f64>,
    relative: Vec<bool>,
}

impl<'a> FiniteDifferenceJacobian<'a> {
    /// Arguments
    /// ---------
    /// * `model`: residual function.
    /// * `steps`: one step per parameter.
    /// * `relative`: per parameter, whether the step scales with the parameter magnitude.
    ///
    /// Return
    /// ------
    /// * `Err(TleFitError::DimensionMismatch)` if `steps` and `relative` differ in length.
    pub fn new(
        model: &'a dyn ResidualModel,
        steps: Vec<f64>,
        relative: Vec<bool>,
    ) -> Result<Self, TleFitError> {
        if steps.len() != relative.len() {
            return Err(TleFitError::DimensionMismatch(format!(
                "{} steps for {} relative flags",
                steps.len(),
                relative.len()
            )));
        }
        Ok(FiniteDifferenceJacobian {
            model,
            steps,
            relative,
        })
    }

    pub fn dimension(&self) -> usize {
        self.steps.len()
    }

    fn effective_step(&self, i: usize, p: f64) -> f64 {
        if self.relative[i] && p != 0.0 {
            self.steps[i] * p.abs()
        } else {
            self.steps[i]
        }
    }

    fn check(&self, params: &DVector<f64>) -> Result<(), TleFitError> {
        if params.len() != self.dimension() {
            return Err(TleFitError::DimensionMismatch(format!(
                "{} parameters for {} steps",
                params.len(),
                self.dimension()
            )));
        }
        Ok(())
    }

    fn shifted(&self, params: &DVector<f64>, i: usize, delta: f64) -> DVector<f64> {
        let mut p = params.clone();
        p[i] += delta;
        self.model.residuals(&p)
    }

    /// Jacobian at `params`, given the residuals `r0 = R(params)`.
    pub fn jacobian_at(
        &self,
        params: &DVector<f64>,
        r0: &DVector<f64>,
    ) -> Result<DMatrix<f64>, TleFitError> {
        self.check(params)?;
        let mut jac = DMatrix::zeros(r0.len(), params.len());

        for i in 0..params.len() {
            let p = params[i];
            let h = self.effective_step(i, p);

            let column = if p != 0.0 {
                let m2 = self.shifted(params, i, -2.0 * h);
                let m1 = self.shifted(params, i, -h);
                let p1 = self.shifted(params, i, h);
                let p2 = self.shifted(params, i, 2.0 * h);
                (m2 - m1 * 8.0 + p1 * 8.0 - p2) / (12.0 * h)
            } else {
                let p1 = self.shifted(params, i, h);
                let p2 = self.shifted(params, i, 2.0 * h);
                (r0 * -3.0 + p1 * 4.0 - p2) / (2.0 * h)
            };
            jac.set_column(i, &column);
        }
        Ok(jac)
    }

    /// Residuals and Jacobian in one call.
    pub fn value_and_jacobian(
        &self,
        params: &DVector<f64>,
    ) -> Result<(DVector<f64>, DMatrix<f64>), TleFitError> {
        self.check(params)?;
        let r0 = self.model.residuals(params);
        let jac = self.jacobian_at(params, &r0)?;
        Ok((r0, jac))
    }
}
