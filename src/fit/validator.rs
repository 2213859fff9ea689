//! # Parameter validation
//!
//! Applied to every candidate parameter vector `(ke, he, L, pe, qe, n, terms…)` before it is
//! evaluated:
//!
//! * mean motion capped at 16.5 rev/day,
//! * drag and radiation terms (entries past the sixth) clamped into [0, 1000],
//! * with [`ParameterValidator::Constrained`], inclination, RAAN, eccentricity and mean
//!   motion are additionally held inside caller supplied ranges.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, RevPerDay, MAX_FIT_MEAN_MOTION};

/// Largest drag or radiation term accepted by the fit
pub const MAX_TERM: f64 = 1e3;

/// Ranges, inclusive; `None` leaves the element free.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ElementConstraints {
    pub inclination: Option<(Degree, Degree)>,
    pub raan: Option<(Degree, Degree)>,
    pub eccentricity: Option<(f64, f64)>,
    pub mean_motion: Option<(RevPerDay, RevPerDay)>,
}

impl ElementConstraints {
    pub fn inclination(mut self, min: Degree, max: Degree) -> Self {
        self.inclination = Some((min, max));
        self
    }

    pub fn raan(mut self, min: Degree, max: Degree) -> Self {
        self.raan = Some((min, max));
        self
    }

    pub fn eccentricity(mut self, min: f64, max: f64) -> Self {
        self.eccentricity = Some((min, max));
        self
    }

    pub fn mean_motion(mut self, min: RevPerDay, max: RevPerDay) -> Self {
        self.mean_motion = Some((min, max));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ParameterValidator {
    #[default]
    Default,
    Constrained(ElementConstraints),
}

fn clamp_range(val: f64, range: Option<(f64, f64)>) -> f64 {
    match range {
        Some((min, _)) if val < min => min,
        Some((_, max)) if val > max => max,
        _ => val,
    }
}

impl ParameterValidator {
    pub fn validate(&self, params: &DVector<f64>) -> DVector<f64> {
        let mut out = params.clone();
        if out.len() < 6 {
            return out;
        }

        out[5] = out[5].min(MAX_FIT_MEAN_MOTION);
        for i in 6..out.len() {
            out[i] = out[i].clamp(0.0, MAX_TERM);
        }

        if let ParameterValidator::Constrained(c) = self {
            out[5] = clamp_range(out[5], c.mean_motion);

            if c.inclination.is_some() || c.raan.is_some() {
                let (pe, qe) = (out[3], out[4]);
                let raan = pe.atan2(qe).to_degrees().rem_euclid(360.0);
                let inc = (2.0 * pe.hypot(qe).atan()).to_degrees();

                let raan = clamp_range(raan, c.raan).to_radians();
                let half_tan = (0.5 * clamp_range(inc, c.inclination).to_radians()).tan();
                out[3] = half_tan * raan.sin();
                out[4] = half_tan * raan.cos();
            }

            if let Some(range) = c.eccentricity {
                let (ke, he) = (out[0], out[1]);
                let ang = he.atan2(ke);
                let ecc = clamp_range(ke.hypot(he), Some(range));
                out[0] = ecc * ang.cos();
                out[1] = ecc * ang.sin();
            }
        }
        out
    }
}

#[cfg(test)]
mod test_validator {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_clamps() {
        let p = DVector::from_vec(vec![0.001, 0.0, 1.0, 0.1, 0.2, 17.2, -3.0, 2e3]);
        let v = ParameterValidator::Default.validate(&p);
        assert_eq!(v[5], 16.5);
        assert_eq!(v[6], 0.0);
        assert_eq!(v[7], 1e3);
        assert_eq!(v[0], 0.001);
    }

    #[test]
    fn test_constrained() {
        let inc: f64 = 51.0;
        let raan: f64 = 40.0;
        let half = (0.5 * inc.to_radians()).tan();
        let p = DVector::from_vec(vec![
            0.02,
            0.0,
            1.0,
            half * raan.to_radians().sin(),
            half * raan.to_radians().cos(),
            15.2,
        ]);

        let c = ElementConstraints::default()
            .inclination(97.0, 98.0)
            .eccentricity(0.0, 0.01)
            .mean_motion(14.0, 14.5);
        let v = ParameterValidator::Constrained(c).validate(&p);

        assert_eq!(v[5], 14.5);
        assert_relative_eq!(v[0].hypot(v[1]), 0.01, epsilon = 1e-15);
        assert_relative_eq!(
            (2.0 * v[3].hypot(v[4]).atan()).to_degrees(),
            97.0,
            epsilon = 1e-10
        );
        assert_relative_eq!(v[3].atan2(v[4]).to_degrees(), 40.0, epsilon = 1e-10);
    }
}
