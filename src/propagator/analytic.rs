//! # Secular J2 propagator
//!
//! Closed-form stand-in for the operational element-set propagators. The mean elements of
//! the set are taken as osculating two-body elements at epoch, then advanced with:
//!
//! * the secular J2 drift of the node and of the argument of perigee,
//! * the mean motion, plus the quadratic along-track term of the first mean-motion
//!   derivative (`ΔM = 2π·ṅ/2·Δt²`, Δt in days),
//! * a drag proxy, quadratic in time and linear in the drag term
//!   (`ΔM = B*·n·K_drag·Δt²`, n in rad/min, Δt in minutes),
//! * for extended sets, a radiation proxy drifting the node linearly with `agom`.
//!
//! It is accurate enough to generate and fit synthetic tracks; it is **not** SGP4.

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::{
    constants::{DPI, EARTH_RADIUS_KM, GM_EARTH, J2, MINUTES_PER_DAY, SECONDS_PER_DAY},
    element_set::ElementSet,
    orbit_type::keplerian_state::{sma_from_mean_motion, KeplerianState},
    propagator::Propagator,
    time::seconds_between,
    tlefit_errors::PropagationError,
};

/// Scale of the drag proxy (per rad/min of mean motion, per min²)
const DRAG_DECAY: f64 = 1e-4;

/// Nodal drift per unit of radiation term, rad/s per m²/kg
const AGOM_NODAL_RATE: f64 = 1e-8;

#[derive(Debug, Clone, Copy)]
pub struct SecularJ2Propagator {
    pub mu: f64,
}

impl Default for SecularJ2Propagator {
    fn default() -> Self {
        SecularJ2Propagator { mu: GM_EARTH }
    }
}

impl Propagator for SecularJ2Propagator {
    fn propagate(
        &self,
        set: &ElementSet,
        at: Epoch,
    ) -> Result<(Vector3<f64>, Vector3<f64>), PropagationError> {
        let ecc = set.eccentricity();
        if !(0.0..1.0).contains(&ecc) {
            return Err(PropagationError::EccentricityOutOfRange(ecc));
        }
        let n_rev_day = set.mean_motion();
        if !(n_rev_day > 0.0) {
            return Err(PropagationError::NonPositiveMeanMotion(n_rev_day));
        }

        let sma = sma_from_mean_motion(n_rev_day, self.mu);
        let perigee = sma * (1.0 - ecc);
        if perigee < EARTH_RADIUS_KM {
            return Err(PropagationError::Decayed(perigee));
        }

        let dt = seconds_between(&set.epoch(), &at);
        let dt_days = dt / SECONDS_PER_DAY;
        let dt_min = dt_days * MINUTES_PER_DAY;

        let n = n_rev_day * DPI / SECONDS_PER_DAY;
        let p = sma * (1.0 - ecc * ecc);
        let inc = set.inclination().to_radians();

        let j2op2 = 1.5 * n * EARTH_RADIUS_KM * EARTH_RADIUS_KM * J2 / (p * p);
        let mut d_raan = -j2op2 * inc.cos() * dt;
        let d_argp = j2op2 * (2.0 - 2.5 * inc.sin().powi(2)) * dt;

        let n_rad_min = n * 60.0;
        let d_ma = n * dt
            + DPI * set.ndot() * dt_days * dt_days
            + set.bstar() * n_rad_min * DRAG_DECAY * dt_min * dt_min;

        if let Some(agom) = set.agom() {
            d_raan += agom * AGOM_NODAL_RATE * dt;
        }

        let kep = KeplerianState::from_mean_elements(
            at,
            n_rev_day,
            ecc,
            set.inclination(),
            set.raan() + d_raan.to_degrees(),
            set.arg_perigee() + d_argp.to_degrees(),
            set.mean_anomaly() + d_ma.to_degrees(),
            self.mu,
        );
        let cart = kep.to_cartesian(self.mu);
        Ok((cart.position, cart.velocity))
    }
}

#[cfg(test)]
mod test_secular_j2 {
    use super::*;
    use crate::element_set::{draft::ElementSetDraft, ElementType};
    use crate::time::add_seconds;
    use approx::assert_relative_eq;

    fn leo() -> ElementSet {
        ElementSetDraft::new("99999", Epoch::from_gregorian_utc_at_midnight(2021, 3, 1))
            .inclination(51.6)
            .raan(40.0)
            .eccentricity(0.001)
            .arg_perigee(90.0)
            .mean_anomaly(10.0)
            .mean_motion(15.5)
            .build()
    }

    #[test]
    fn test_radius_and_energy() {
        let set = leo();
        let prop = SecularJ2Propagator::default();
        let a = sma_from_mean_motion(15.5, GM_EARTH);
        for k in 0..10 {
            let (r, v) = prop
                .propagate(&set, add_seconds(&set.epoch(), k as f64 * 600.0))
                .unwrap();
            let energy = v.norm_squared() / 2.0 - GM_EARTH / r.norm();
            assert_relative_eq!(energy, -GM_EARTH / (2.0 * a), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_node_regresses_prograde() {
        let set = leo();
        let prop = SecularJ2Propagator::default();
        let later = add_seconds(&set.epoch(), SECONDS_PER_DAY);
        let (r, v) = prop.propagate(&set, later).unwrap();
        let h = r.cross(&v);
        let raan = (h.x).atan2(-h.y).to_degrees();
        // about -5 degrees per day for the ISS orbit
        assert!(raan < 40.0 && raan > 30.0, "raan = {raan}");
    }

    #[test]
    fn test_drag_advances_mean_anomaly() {
        let set = leo();
        let dragged = set.to_draft().bstar(1e-3).build();
        let prop = SecularJ2Propagator::default();
        let later = add_seconds(&set.epoch(), SECONDS_PER_DAY);
        let a = prop.propagate_state(&set, later).unwrap();
        let b = prop.propagate_state(&dragged, later).unwrap();
        assert!(a.distance(&b) > 1.0);
    }

    #[test]
    fn test_errors() {
        let prop = SecularJ2Propagator::default();
        let set = leo();
        let dead = set.to_draft().mean_motion(0.0).build();
        assert_eq!(
            prop.propagate(&dead, set.epoch()),
            Err(PropagationError::NonPositiveMeanMotion(0.0))
        );
        let low = set.to_draft().eccentricity(0.5).build();
        assert!(matches!(
            prop.propagate(&low, set.epoch()),
            Err(PropagationError::Decayed(_))
        ));
        let xp = set.to_draft().element_type(ElementType::Extended).build();
        assert!(prop.propagate(&xp, set.epoch()).is_ok());
    }
}
