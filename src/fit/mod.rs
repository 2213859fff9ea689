//! # Element-set fitting
//!
//! Least-squares fit of an [`ElementSet`] to observations, in two stages:
//!
//! 1. the six equinoctal parameters alone, drag and radiation terms held at their initial
//!    values (well-conditioned),
//! 2. if any term is to be fitted, every parameter together, starting from stage 1.
//!
//! With `two_stage` off, a single run fits the requested parameters directly.
//!
//! If the initial set's epoch differs from the requested fit epoch, the set is first moved
//! to that epoch (propagate and re-derive elements, terms preserved).
//!
//! ## Submodules
//!
//! * [`jacobian`] – finite-difference derivatives of a residual model,
//! * [`levenberg_marquardt`] – the damped least-squares optimizer,
//! * [`residuals`] – position and look-angle residual models, parameter layout,
//! * [`validator`] – clamping of candidate parameters.
//!
//! ## Example
//!
//! ```rust, no_run
//! use tlefit::element_set::ElementSet;
//! use tlefit::fit::{fit_element_set, residuals::FittedTerms, FitSettings};
//! use tlefit::od_env::OdEnv;
//!
//! # let observations: Vec<tlefit::orbit_type::cartesian_state::CartesianState> = vec![];
//! # let initial: ElementSet = todo!();
//! let env = OdEnv::new();
//! let settings = FitSettings::for_element_type(initial.element_type());
//! let terms = FittedTerms { bstar: true, agom: false };
//! let outcome = fit_element_set(&env, &observations, initial.epoch(), &initial, terms, &settings)?;
//! println!("{}\nRMS {:.3} km", outcome.set, outcome.rms);
//! # Ok::<(), tlefit::tlefit_errors::TleFitError>(())
//! ```

pub mod jacobian;
pub mod levenberg_marquardt;
pub mod residuals;
pub mod validator;

use hifitime::Epoch;
use log::{info, warn};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{
    element_set::{ElementSet, ElementType},
    fit::{
        levenberg_marquardt::{optimize, LmSettings},
        residuals::{
            ElementSetParameters, FittedTerms, LookAngleResiduals, PositionResiduals,
            ResidualModel,
        },
        validator::ParameterValidator,
    },
    initial_orbit_determination::cart_to_elements::shift_epoch,
    look_angles::{differences::DifferenceKind, LookAngleState},
    od_env::OdEnv,
    orbit_type::{cartesian_state::CartesianState, OrbitState},
    tlefit_errors::TleFitError,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitSettings {
    pub two_stage: bool,
    /// Terms fixed
    pub stage1: LmSettings,
    /// Terms free
    pub stage2: LmSettings,
    pub validator: ParameterValidator,
}

impl Default for FitSettings {
    fn default() -> Self {
        FitSettings::for_element_type(ElementType::Standard)
    }
}

impl FitSettings {
    /// Stage 1 gets 4000 evaluations for standard sets and 1000 for extended ones; stage 2
    /// gets 1000.
    pub fn for_element_type(element_type: ElementType) -> Self {
        let stage1_budget = match element_type {
            ElementType::Standard => 4000,
            ElementType::Extended => 1000,
        };
        FitSettings {
            two_stage: true,
            stage1: LmSettings::default()
                .with_budget(stage1_budget, stage1_budget)
                .with_parameter_tolerance(2e-9),
            stage2: LmSettings::default().with_budget(1000, 1000),
            validator: ParameterValidator::Default,
        }
    }

    pub fn two_stage(mut self, flag: bool) -> Self {
        self.two_stage = flag;
        self
    }

    pub fn validator(mut self, validator: ParameterValidator) -> Self {
        self.validator = validator;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub set: ElementSet,
    pub rms: f64,
    pub evaluations: usize,
    pub iterations: usize,
    /// Whether the last stage stopped on a convergence criterion rather than its budget
    pub converged: bool,
    pub covariance: Option<DMatrix<f64>>,
}

impl FitOutcome {
    pub fn into_orbit_state(self) -> OrbitState {
        OrbitState::from_element_set(self.set, self.rms, self.iterations)
            .with_covariance(self.covariance)
    }
}

fn run_stages<M, F>(
    base: ElementSet,
    terms: FittedTerms,
    settings: &FitSettings,
    build: F,
) -> Result<FitOutcome, TleFitError>
where
    M: ResidualModel,
    F: Fn(ElementSetParameters) -> M,
{
    let first_terms = if settings.two_stage {
        FittedTerms::NONE
    } else {
        terms
    };
    let mut stages = vec![(first_terms, &settings.stage1)];
    if settings.two_stage && terms.any() {
        stages.push((terms, &settings.stage2));
    }

    let mut set = base;
    let mut outcome = None;
    let (mut evaluations, mut iterations) = (0, 0);

    for (stage_terms, lm) in stages {
        let layout = ElementSetParameters::new(set, stage_terms);
        let (steps, relative) = layout.steps();
        let model = build(layout.clone());

        let out = optimize(
            &model,
            steps,
            relative,
            &layout.initial(),
            &settings.validator,
            lm,
        )?;
        if model.failures() > 0 {
            warn!(
                "{} propagation failures while fitting {}",
                model.failures(),
                layout.base().object_id()
            );
        }
        info!(
            "RMS: {:.6e} evaluations: {} iterations: {}",
            out.rms, out.evaluations, out.iterations
        );

        evaluations += out.evaluations;
        iterations += out.iterations;
        set = layout.to_element_set(&out.point);
        outcome = Some(out);
    }

    let out = outcome.ok_or_else(|| TleFitError::InvalidFitParameter("no fit stage".into()))?;
    Ok(FitOutcome {
        set,
        rms: out.rms,
        evaluations,
        iterations,
        converged: out.converged,
        covariance: out.covariance,
    })
}

fn at_epoch(initial: &ElementSet, epoch: Epoch, env: &OdEnv) -> Result<ElementSet, TleFitError> {
    if initial.epoch() == epoch {
        Ok(initial.clone())
    } else {
        shift_epoch(initial, epoch, env)
    }
}

/// Fit an element set to Cartesian observations.
///
/// Arguments
/// ---------
/// * `env`: propagator and frame services.
/// * `observations`: TEME states; only positions are used.
/// * `epoch`: epoch of the fitted set.
/// * `initial`: starting guess, re-epoched if needed.
/// * `terms`: drag / radiation terms to fit.
/// * `settings`: staging, budgets and parameter constraints.
///
/// Return
/// ------
/// * The fitted set with the RMS of the position differences (km), or
///   `Err(TleFitError::NotEnoughObservations)` for an empty track.
pub fn fit_element_set(
    env: &OdEnv,
    observations: &[CartesianState],
    epoch: Epoch,
    initial: &ElementSet,
    terms: FittedTerms,
    settings: &FitSettings,
) -> Result<FitOutcome, TleFitError> {
    if observations.is_empty() {
        return Err(TleFitError::NotEnoughObservations { needed: 1, got: 0 });
    }
    let base = at_epoch(initial, epoch, env)?;
    run_stages(base, terms, settings, |layout| {
        PositionResiduals::new(env, observations, layout)
    })
}

/// RMS of the position differences (km) of `set` against `observations`, without fitting.
pub fn position_rms(env: &OdEnv, observations: &[CartesianState], set: &ElementSet) -> f64 {
    let layout = ElementSetParameters::new(set.clone(), FittedTerms::NONE);
    let model = PositionResiduals::new(env, observations, layout.clone());
    let cost = model.residuals(&layout.initial()).norm_squared();
    if observations.is_empty() {
        0.0
    } else {
        (cost / observations.len() as f64).sqrt()
    }
}

/// Fit an element set to look-angle observations from one or more sites.
///
/// The RMS is expressed in the unit of the difference function (degrees, km or km/s).
pub fn fit_look_angles(
    env: &OdEnv,
    observations: &[LookAngleState],
    kind: DifferenceKind,
    epoch: Epoch,
    initial: &ElementSet,
    terms: FittedTerms,
    settings: &FitSettings,
) -> Result<FitOutcome, TleFitError> {
    if observations.is_empty() {
        return Err(TleFitError::NotEnoughObservations { needed: 1, got: 0 });
    }
    let base = at_epoch(initial, epoch, env)?;
    run_stages(base, terms, settings, |layout| {
        LookAngleResiduals::new(env, observations, kind, layout)
    })
}

#[cfg(test)]
mod test_fit {
    use super::*;
    use crate::time::add_seconds;

    #[test]
    fn test_settings_budgets() {
        let s = FitSettings::for_element_type(ElementType::Standard);
        assert_eq!(s.stage1.max_evaluations, 4000);
        assert_eq!(s.stage1.parameter_relative_tolerance, 2e-9);
        assert_eq!(s.stage2.max_evaluations, 1000);

        let s = FitSettings::for_element_type(ElementType::Extended);
        assert_eq!(s.stage1.max_evaluations, 1000);
    }

    #[test]
    fn test_position_rms_at_truth() {
        let env = OdEnv::new();
        let set = ElementSet::parse(
            "1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990",
            "2 41085 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040",
        )
        .unwrap();
        let obs: Vec<_> = (0..4)
            .map(|k| env.propagate(&set, add_seconds(&set.epoch(), 300.0 * k as f64)).unwrap())
            .collect();
        assert!(position_rms(&env, &obs, &set) < 1e-9);
        let moved = set.to_draft().mean_anomaly(set.mean_anomaly() + 0.01).build();
        assert!(position_rms(&env, &obs, &moved) > 0.5);
    }

    #[test]
    fn test_empty_track() {
        let env = OdEnv::new();
        let set = ElementSet::parse(
            "1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990",
            "2 41085 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040",
        )
        .unwrap();
        let err = fit_element_set(
            &env,
            &[],
            add_seconds(&set.epoch(), 60.0),
            &set,
            FittedTerms::NONE,
            &FitSettings::default(),
        )
        .unwrap_err();
        assert_eq!(err, TleFitError::NotEnoughObservations { needed: 1, got: 0 });
    }
}
