use hifitime::Epoch;
use log::debug;

use crate::{
    constants::{Degree, RevPerDay},
    element_set::{draft::ElementSetDraft, ElementSet, ElementType},
    od_env::OdEnv,
    orbit_type::{cartesian_state::CartesianState, keplerian_state::KeplerianState},
    tlefit_errors::TleFitError,
};

/// Iteration cap and relative mean-motion tolerance of the direct iteration.
fn iteration_policy(element_type: ElementType) -> (usize, f64) {
    match element_type {
        ElementType::Standard => (30, 1e-12),
        ElementType::Extended => (200, 1e-9),
    }
}

/// The six corrected quantities, in element-set units.
#[derive(Debug, Clone, Copy)]
struct MeanElements {
    mean_motion: RevPerDay,
    inclination: Degree,
    arg_perigee: Degree,
    raan: Degree,
    eccentricity: f64,
    mean_anomaly: Degree,
}

impl From<&KeplerianState> for MeanElements {
    fn from(kep: &KeplerianState) -> Self {
        let (inclination, raan, arg_perigee, mean_anomaly) = kep.element_angles();
        MeanElements {
            mean_motion: kep.mean_motion,
            inclination,
            arg_perigee,
            raan,
            eccentricity: kep.eccentricity,
            mean_anomaly,
        }
    }
}

/// Difference of two angles in degrees, in [-180, 180).
fn angle_diff(a: Degree, b: Degree) -> Degree {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

impl MeanElements {
    /// Move `self` by `target - recovered`.
    fn correct(&mut self, target: &MeanElements, recovered: &MeanElements) {
        self.mean_motion += target.mean_motion - recovered.mean_motion;
        self.inclination += target.inclination - recovered.inclination;
        self.arg_perigee += angle_diff(target.arg_perigee, recovered.arg_perigee);
        self.raan += angle_diff(target.raan, recovered.raan);
        self.eccentricity += target.eccentricity - recovered.eccentricity;
        self.mean_anomaly += angle_diff(target.mean_anomaly, recovered.mean_anomaly);
    }

    fn apply(&self, draft: ElementSetDraft) -> ElementSetDraft {
        draft
            .mean_motion(self.mean_motion)
            .inclination(self.inclination)
            .arg_perigee(self.arg_perigee)
            .raan(self.raan)
            .eccentricity(self.eccentricity)
            .mean_anomaly(self.mean_anomaly)
    }
}

/// Element set whose propagated state at its own epoch matches `state`.
///
/// The osculating Keplerian elements of `state` are the target. Starting from them, each
/// pass builds a set, propagates it to `state.epoch`, and moves the mean elements by the
/// difference between the target and the recovered osculating elements. Iteration stops
/// once the relative mean-motion error falls below 1e-12 (30 passes at most) for standard
/// sets, 1e-9 (200 passes) for extended ones. The last set built is returned even if the
/// tolerance was not reached.
///
/// Arguments
/// ---------
/// * `state`: TEME state; its epoch becomes the set's epoch.
/// * `object_id`: identifier written into the set.
/// * `element_type`: propagator model of the set.
/// * `env`: propagator and gravitational parameter.
///
/// Return
/// ------
/// * The element set with zero derivative and drag/radiation terms, or an error if the
///   state has no Keplerian elements or the candidate cannot be propagated.
pub fn cart_to_element_set(
    state: &CartesianState,
    object_id: &str,
    element_type: ElementType,
    env: &OdEnv,
) -> Result<ElementSet, TleFitError> {
    let target = MeanElements::from(&KeplerianState::from_cartesian(state, env.mu)?);
    let (max_iter, tol) = iteration_policy(element_type);

    let mut current = target;
    let mut set = current
        .apply(ElementSetDraft::new(object_id, state.epoch).element_type(element_type))
        .build();

    for i in 0..max_iter {
        let cart = env.propagate(&set, state.epoch)?;
        let recovered = MeanElements::from(&KeplerianState::from_cartesian(&cart, env.mu)?);

        let delta = ((target.mean_motion - recovered.mean_motion) / target.mean_motion).abs();
        if delta < tol {
            debug!("cart_to_element_set converged after {i} corrections");
            break;
        }

        current.correct(&target, &recovered);
        set = current.apply(set.to_draft()).build();
    }

    Ok(set)
}

/// Move an element set to another epoch.
///
/// The set is propagated to `epoch` and converted back with [`cart_to_element_set`]; the
/// international id, first and second derivatives and drag term of `set` are carried over.
pub fn shift_epoch(set: &ElementSet, epoch: Epoch, env: &OdEnv) -> Result<ElementSet, TleFitError> {
    let cart = env.propagate(set, epoch)?;
    let shifted = cart_to_element_set(&cart, set.object_id(), set.element_type(), env)?;

    Ok(shifted
        .to_draft()
        .intl_id(set.intl_id())
        .ndot(set.ndot())
        .nddot(set.nddot())
        .bstar(set.bstar())
        .build())
}

#[cfg(test)]
mod test_cart_to_elements {
    use super::*;
    use crate::time::add_seconds;
    use approx::assert_relative_eq;

    const L1: &str = "1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990";
    const L2: &str = "2 41085 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040";

    #[test]
    fn test_reproduces_state() {
        let env = OdEnv::new();
        let set = ElementSet::parse(L1, L2).unwrap();
        let cart = env.propagate(&set, set.epoch()).unwrap();

        let back = cart_to_element_set(&cart, "99999", ElementType::Standard, &env).unwrap();
        assert_eq!(back.object_id(), "99999");
        assert_eq!(back.epoch(), set.epoch());
        assert_relative_eq!(back.mean_motion(), set.mean_motion(), max_relative = 1e-10);
        assert_relative_eq!(back.inclination(), set.inclination(), epsilon = 1e-8);
        assert_relative_eq!(back.eccentricity(), set.eccentricity(), epsilon = 1e-10);

        let again = env.propagate(&back, set.epoch()).unwrap();
        assert!(again.distance(&cart) < 1e-6);
    }

    #[test]
    fn test_shift_epoch_keeps_terms() {
        let env = OdEnv::new();
        let set = ElementSet::parse(L1, L2).unwrap();
        let later = add_seconds(&set.epoch(), 3.0 * 3600.0);

        let shifted = shift_epoch(&set, later, &env).unwrap();
        assert_eq!(shifted.epoch(), later);
        assert_eq!(shifted.object_id(), "41085");
        assert_eq!(shifted.intl_id(), set.intl_id());
        assert_relative_eq!(shifted.bstar(), set.bstar());
        assert_relative_eq!(shifted.ndot(), set.ndot());

        let expected = env.propagate(&set, later).unwrap();
        let got = env.propagate(&shifted, later).unwrap();
        assert!(got.distance(&expected) < 1e-6);
    }
}
