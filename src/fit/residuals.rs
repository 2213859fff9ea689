//! # Residual models
//!
//! A [`ResidualModel`] maps a parameter vector to the residual vector the optimizer drives
//! to zero. Element-set models share the same parameter layout ([`ElementSetParameters`]):
//!
//! | index | parameter |
//! |---|---|
//! | 0..6 | equinoctal `(ke, he, L, pe, qe, n)` |
//! | 6 | drag term, when fitted |
//! | 6 or 7 | radiation term, when fitted (after the drag term if both are) |
//!
//! Two models are provided:
//!
//! * [`PositionResiduals`] – the Cartesian position difference at each observation epoch
//!   (three components per observation),
//! * [`LookAngleResiduals`] – one [`DifferenceKind`] value per look-angle observation.

use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::{
    constants::PROPAGATION_PENALTY,
    element_set::{ElementSet, ElementType},
    ephemeris::PropagatedSource,
    look_angles::{
        differences::{differences, DifferenceKind},
        group_by_location, LookAngleState,
    },
    od_env::OdEnv,
    orbit_type::{cartesian_state::CartesianState, equinoctial_element::EquinoctialElements},
};

pub trait ResidualModel: Sync {
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64>;

    /// Number of observations behind the residual vector, the RMS denominator.
    fn observation_count(&self) -> usize;

    /// Observations the model could not evaluate, over every evaluation so far.
    fn failures(&self) -> usize {
        0
    }
}

/// Which scalar terms are free parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FittedTerms {
    pub bstar: bool,
    pub agom: bool,
}

impl FittedTerms {
    pub const NONE: FittedTerms = FittedTerms {
        bstar: false,
        agom: false,
    };

    pub fn any(&self) -> bool {
        self.bstar || self.agom
    }

    pub fn count(&self) -> usize {
        self.bstar as usize + self.agom as usize
    }
}

/// Parameter layout around a base element set.
///
/// Fields that are not parameters (identifiers, epoch, derivatives, unfitted terms) are
/// taken from the base set.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSetParameters {
    base: ElementSet,
    terms: FittedTerms,
}

impl ElementSetParameters {
    pub fn new(base: ElementSet, terms: FittedTerms) -> Self {
        ElementSetParameters { base, terms }
    }

    pub fn base(&self) -> &ElementSet {
        &self.base
    }

    pub fn terms(&self) -> FittedTerms {
        self.terms
    }

    pub fn dimension(&self) -> usize {
        6 + self.terms.count()
    }

    pub fn initial(&self) -> DVector<f64> {
        let mut p: Vec<f64> = self.base.equinoctial().to_vector().iter().copied().collect();
        if self.terms.bstar {
            p.push(self.base.bstar());
        }
        if self.terms.agom {
            p.push(self.base.nddot());
        }
        DVector::from_vec(p)
    }

    /// Finite-difference steps and their relative flags.
    pub fn steps(&self) -> (Vec<f64>, Vec<bool>) {
        let h = match self.base.element_type() {
            ElementType::Standard => 1e-4,
            ElementType::Extended => 1e-5,
        };
        let mut steps = vec![h; 6];
        let mut relative = vec![false; 6];
        for _ in 0..self.terms.count() {
            steps.push(0.01);
            relative.push(true);
        }
        (steps, relative)
    }

    pub fn to_element_set(&self, params: &DVector<f64>) -> ElementSet {
        let Some(eq) = EquinoctialElements::from_slice(params.as_slice()) else {
            return self.base.clone();
        };

        let mut draft = self.base.to_draft().classical(&eq.to_classical());
        let mut next = 6;
        if self.terms.bstar {
            if let Some(v) = params.get(next) {
                draft = draft.bstar(*v);
            }
            next += 1;
        }
        if self.terms.agom {
            if let Some(v) = params.get(next) {
                draft = draft.agom(*v);
            }
        }
        draft.build()
    }
}

/// Position differences against Cartesian observations (TEME).
pub struct PositionResiduals<'a> {
    env: &'a OdEnv,
    observations: &'a [CartesianState],
    layout: ElementSetParameters,
    failures: AtomicUsize,
}

impl<'a> PositionResiduals<'a> {
    pub fn new(
        env: &'a OdEnv,
        observations: &'a [CartesianState],
        layout: ElementSetParameters,
    ) -> Self {
        PositionResiduals {
            env,
            observations,
            layout,
            failures: AtomicUsize::new(0),
        }
    }

    pub fn layout(&self) -> &ElementSetParameters {
        &self.layout
    }
}

impl ResidualModel for PositionResiduals<'_> {
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let set = self.layout.to_element_set(params);
        let mut out = DVector::zeros(3 * self.observations.len());

        for (i, obs) in self.observations.iter().enumerate() {
            match self.env.propagate(&set, obs.epoch) {
                Ok(state) => {
                    let d = state.position - obs.position;
                    out.fixed_rows_mut::<3>(3 * i).copy_from(&d);
                }
                Err(e) => {
                    debug!("propagation failed at {}: {e}", obs.epoch);
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    out.fixed_rows_mut::<3>(3 * i).fill(PROPAGATION_PENALTY);
                }
            }
        }
        out
    }

    fn observation_count(&self) -> usize {
        self.observations.len()
    }

    fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Look-angle differences, observations grouped by site.
pub struct LookAngleResiduals<'a> {
    env: &'a OdEnv,
    groups: Vec<Vec<LookAngleState>>,
    kind: DifferenceKind,
    layout: ElementSetParameters,
}

impl<'a> LookAngleResiduals<'a> {
    pub fn new(
        env: &'a OdEnv,
        observations: &[LookAngleState],
        kind: DifferenceKind,
        layout: ElementSetParameters,
    ) -> Self {
        LookAngleResiduals {
            env,
            groups: group_by_location(observations),
            kind,
            layout,
        }
    }

    pub fn layout(&self) -> &ElementSetParameters {
        &self.layout
    }
}

impl ResidualModel for LookAngleResiduals<'_> {
    fn residuals(&self, params: &DVector<f64>) -> DVector<f64> {
        let set = self.layout.to_element_set(params);
        let source = PropagatedSource::new(&set, self.env);
        let diffs: Vec<f64> = self
            .groups
            .iter()
            .flat_map(|g| differences(g, &source, self.kind, self.env.frames()))
            .collect();
        DVector::from_vec(diffs)
    }

    fn observation_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod test_residuals {
    use super::*;
    use approx::assert_relative_eq;

    const L1: &str = "1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990";
    const L2: &str = "2 41085 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040";

    #[test]
    fn test_layout_round_trip() {
        let set = ElementSet::parse(L1, L2).unwrap();
        let layout = ElementSetParameters::new(
            set.clone(),
            FittedTerms {
                bstar: true,
                agom: false,
            },
        );
        let p = layout.initial();
        assert_eq!(p.len(), 7);
        assert_relative_eq!(p[6], set.bstar());

        let back = layout.to_element_set(&p);
        assert_relative_eq!(back.inclination(), set.inclination(), epsilon = 1e-9);
        assert_relative_eq!(back.raan(), set.raan(), epsilon = 1e-9);
        assert_relative_eq!(back.eccentricity(), set.eccentricity(), epsilon = 1e-12);
        assert_relative_eq!(back.arg_perigee(), set.arg_perigee(), epsilon = 1e-8);
        assert_relative_eq!(back.mean_anomaly(), set.mean_anomaly(), epsilon = 1e-8);
        assert_relative_eq!(back.mean_motion(), set.mean_motion(), epsilon = 1e-12);

        let (steps, relative) = layout.steps();
        assert_eq!(steps, vec![1e-4, 1e-4, 1e-4, 1e-4, 1e-4, 1e-4, 0.01]);
        assert_eq!(relative.iter().filter(|r| **r).count(), 1);
    }

    #[test]
    fn test_position_residuals_zero_at_truth() {
        let env = OdEnv::new();
        let set = ElementSet::parse(L1, L2).unwrap();
        let obs: Vec<_> = (0..5)
            .map(|k| {
                let t = crate::time::add_seconds(&set.epoch(), 600.0 * k as f64);
                env.propagate(&set, t).unwrap()
            })
            .collect();

        let model = PositionResiduals::new(
            &env,
            &obs,
            ElementSetParameters::new(set.clone(), FittedTerms::NONE),
        );
        let r = model.residuals(&model.layout().initial());
        assert_eq!(r.len(), 15);
        assert!(r.amax() < 1e-6);
        assert_eq!(model.observation_count(), 5);
        assert_eq!(model.failures(), 0);
    }
}
