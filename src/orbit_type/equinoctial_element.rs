//! # Equinoctal parameters
//!
//! Singularity-free parametrization used as the optimizer state:
//!
//! * `ke = e·cos(Ω+ω)`, `he = e·sin(Ω+ω)`
//! * `L = M + ω + Ω` (radians)
//! * `pe = tan(i/2)·sin Ω`, `qe = tan(i/2)·cos Ω`
//! * `n`, mean motion in revolutions per day
//!
//! None of these has a coordinate singularity at `e = 0` or `i = 0`; only `i = 180°` is
//! excluded.

use nalgebra::DVector;

use crate::{
    constants::{Degree, RevPerDay},
    kepler::principal_angle,
};

/// Classical mean elements as consumed by element sets (angles in degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassicalElements {
    pub inclination: Degree,
    pub raan: Degree,
    pub eccentricity: f64,
    pub arg_perigee: Degree,
    pub mean_anomaly: Degree,
    pub mean_motion: RevPerDay,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquinoctialElements {
    pub ke: f64,
    pub he: f64,
    pub mean_longitude: f64,
    pub pe: f64,
    pub qe: f64,
    pub mean_motion: RevPerDay,
}

impl EquinoctialElements {
    pub fn from_classical(el: &ClassicalElements) -> Self {
        let raan = el.raan.to_radians();
        let argp = el.arg_perigee.to_radians();
        let lon_per = raan + argp;
        let half_tan = (0.5 * el.inclination.to_radians()).tan();

        EquinoctialElements {
            ke: el.eccentricity * lon_per.cos(),
            he: el.eccentricity * lon_per.sin(),
            mean_longitude: el.mean_anomaly.to_radians() + lon_per,
            pe: half_tan * raan.sin(),
            qe: half_tan * raan.cos(),
            mean_motion: el.mean_motion,
        }
    }

    /// Inverse mapping; inclination in [0, 180), the other angles wrapped into [0, 360).
    pub fn to_classical(&self) -> ClassicalElements {
        let ecc = self.he.hypot(self.ke);
        let inc = 2.0 * self.pe.hypot(self.qe).atan();
        let raan = self.pe.atan2(self.qe);
        let argp = self.he.atan2(self.ke) - raan;
        let ma = self.mean_longitude - raan - argp;

        ClassicalElements {
            inclination: inc.to_degrees(),
            raan: principal_angle(raan).to_degrees(),
            eccentricity: ecc,
            arg_perigee: principal_angle(argp).to_degrees(),
            mean_anomaly: principal_angle(ma).to_degrees(),
            mean_motion: self.mean_motion,
        }
    }

    pub fn to_vector(&self) -> DVector<f64> {
        DVector::from_column_slice(&[
            self.ke,
            self.he,
            self.mean_longitude,
            self.pe,
            self.qe,
            self.mean_motion,
        ])
    }

    /// Read the first six entries of a parameter vector.
    ///
    /// Return
    /// ------
    /// * `None` if the vector holds fewer than six entries.
    pub fn from_slice(p: &[f64]) -> Option<Self> {
        match p {
            [ke, he, l, pe, qe, n, ..] => Some(EquinoctialElements {
                ke: *ke,
                he: *he,
                mean_longitude: *l,
                pe: *pe,
                qe: *qe,
                mean_motion: *n,
            }),
            _ => None,
        }
    }
}
