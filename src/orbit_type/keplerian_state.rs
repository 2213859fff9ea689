//! # Keplerian states
//!
//! Classical orbital elements with every derived angle of the osculating orbit. Angles are
//! stored in **degrees** (the unit of the element-set text format), distances in km and the
//! mean motion in revolutions per day.
//!
//! ## Degeneracies
//!
//! Which angles exist depends on the orbit class (see [`OrbitClass`]):
//!
//! | class | undefined | carried instead |
//! |---|---|---|
//! | circular equatorial | Ω, ω, ν, u | true longitude |
//! | circular inclined | ω, ν | argument of latitude |
//! | elliptical equatorial | Ω, ω | longitude of perigee |
//! | elliptical inclined | | |
//!
//! Undefined angles are `None`; the conversion never produces a NaN for them. For circular
//! orbits the mean-anomaly slot holds the argument of latitude (inclined) or the true
//! longitude (equatorial).

use std::f64::consts::{FRAC_PI_2, PI};

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::{
    constants::{Degree, Kilometer, RevPerDay, DPI, SECONDS_PER_DAY, SMALL},
    kepler::{eccentric_to_mean, mean_to_true, principal_angle, true_to_eccentric},
    orbit_type::cartesian_state::CartesianState,
    ref_system::{rot1, rot3},
    tlefit_errors::TleFitError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrbitClass {
    CircularEquatorial,
    CircularInclined,
    EllipticalEquatorial,
    EllipticalInclined,
}

impl OrbitClass {
    pub fn classify(ecc: f64, inc_rad: f64) -> Self {
        let equatorial = inc_rad < SMALL || (inc_rad - PI).abs() < SMALL;
        match (ecc < SMALL, equatorial) {
            (true, true) => OrbitClass::CircularEquatorial,
            (true, false) => OrbitClass::CircularInclined,
            (false, true) => OrbitClass::EllipticalEquatorial,
            (false, false) => OrbitClass::EllipticalInclined,
        }
    }

    fn is_elliptical(self) -> bool {
        matches!(
            self,
            OrbitClass::EllipticalEquatorial | OrbitClass::EllipticalInclined
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeplerianState {
    pub epoch: Epoch,
    pub semi_major_axis: Kilometer,
    pub semi_latus_rectum: Kilometer,
    pub eccentricity: f64,
    pub inclination: Degree,
    pub raan: Option<Degree>,
    pub arg_perigee: Option<Degree>,
    pub true_anomaly: Option<Degree>,
    pub eccentric_anomaly: Option<Degree>,
    pub mean_anomaly: Degree,
    pub arg_latitude: Option<Degree>,
    pub true_longitude: Option<Degree>,
    pub lon_perigee: Option<Degree>,
    pub mean_motion: RevPerDay,
    /// Orbital period in seconds
    pub period: f64,
}

fn wrap_deg(rad: f64) -> Degree {
    principal_angle(rad).to_degrees()
}

/// Angle between two vectors, clamped to avoid `acos` domain errors.
fn vec_angle(a: &Vector3<f64>, b: &Vector3<f64>) -> f64 {
    let c = a.dot(b) / (a.norm() * b.norm());
    c.clamp(-1.0, 1.0).acos()
}

/// Mean motion (rev/day) of a semi-major axis (km).
pub fn mean_motion_from_sma(sma: Kilometer, mu: f64) -> RevPerDay {
    (mu / sma.abs().powi(3)).sqrt() * SECONDS_PER_DAY / DPI
}

/// Semi-major axis (km) of a mean motion (rev/day).
pub fn sma_from_mean_motion(n: RevPerDay, mu: f64) -> Kilometer {
    let n_rad_s = n * DPI / SECONDS_PER_DAY;
    (mu / (n_rad_s * n_rad_s)).cbrt()
}

impl KeplerianState {
    pub fn orbit_class(&self) -> OrbitClass {
        OrbitClass::classify(self.eccentricity, self.inclination.to_radians())
    }

    /// Build a fully defined elliptical state from mean elements.
    ///
    /// Arguments
    /// ---------
    /// * `epoch`: epoch of the elements.
    /// * `mean_motion`: revolutions per day.
    /// * `ecc`: eccentricity in [0, 1).
    /// * `inc`, `raan`, `argp`, `ma`: degrees.
    /// * `mu`: gravitational parameter (km³/s²).
    ///
    /// Return
    /// ------
    /// * A state whose orbit-class specific angles (argument of latitude, true longitude,
    ///   longitude of perigee) are all populated, so that [`Self::to_cartesian`] works for
    ///   every class.
    #[allow(clippy::too_many_arguments)]
    pub fn from_mean_elements(
        epoch: Epoch,
        mean_motion: RevPerDay,
        ecc: f64,
        inc: Degree,
        raan: Degree,
        argp: Degree,
        ma: Degree,
        mu: f64,
    ) -> Self {
        let sma = sma_from_mean_motion(mean_motion, mu);
        let ma_rad = ma.to_radians();
        let nu = mean_to_true(ecc, ma_rad);
        let ea = true_to_eccentric(ecc, nu);
        let argp_rad = argp.to_radians();
        let raan_rad = raan.to_radians();

        KeplerianState {
            epoch,
            semi_major_axis: sma,
            semi_latus_rectum: sma * (1.0 - ecc * ecc),
            eccentricity: ecc,
            inclination: inc,
            raan: Some(wrap_deg(raan_rad)),
            arg_perigee: Some(wrap_deg(argp_rad)),
            true_anomaly: Some(nu.to_degrees()),
            eccentric_anomaly: Some(ea.to_degrees()),
            mean_anomaly: wrap_deg(ma_rad),
            arg_latitude: Some(wrap_deg(nu + argp_rad)),
            true_longitude: Some(wrap_deg(nu + argp_rad + raan_rad)),
            lon_perigee: Some(wrap_deg(argp_rad + raan_rad)),
            mean_motion,
            period: SECONDS_PER_DAY / mean_motion,
        }
    }

    /// Classical elements of a Cartesian state (osculating two-body orbit).
    ///
    /// Arguments
    /// ---------
    /// * `cart`: position (km) and velocity (km/s).
    /// * `mu`: gravitational parameter (km³/s²).
    ///
    /// Return
    /// ------
    /// * `Err(TleFitError::DegenerateGeometry)` when the angular momentum vanishes
    ///   (rectilinear motion).
    pub fn from_cartesian(cart: &CartesianState, mu: f64) -> Result<Self, TleFitError> {
        let r = cart.position;
        let v = cart.velocity;
        let magr = r.norm();
        let magv = v.norm();

        let hbar = r.cross(&v);
        let magh = hbar.norm();
        if magh <= SMALL || magr <= SMALL {
            return Err(TleFitError::DegenerateGeometry(
                "angular momentum vanishes".into(),
            ));
        }

        let nbar = Vector3::new(-hbar.y, hbar.x, 0.0);
        let magn = nbar.norm();
        let c1 = magv * magv - mu / magr;
        let rdotv = r.dot(&v);
        let ebar = (c1 * r - rdotv * v) / mu;
        let ecc = ebar.norm();

        let sme = magv * magv * 0.5 - mu / magr;
        let sma = if sme.abs() > SMALL {
            -mu / (2.0 * sme)
        } else {
            f64::INFINITY
        };
        let p = magh * magh / mu;

        let incl = (hbar.z / magh).clamp(-1.0, 1.0).acos();
        let class = OrbitClass::classify(ecc, incl);

        let raan = (magn > SMALL).then(|| {
            let omega = (nbar.x / magn).clamp(-1.0, 1.0).acos();
            if nbar.y < 0.0 {
                DPI - omega
            } else {
                omega
            }
        });

        let argp = (class == OrbitClass::EllipticalInclined).then(|| {
            let argp = vec_angle(&nbar, &ebar);
            if ebar.z < 0.0 {
                DPI - argp
            } else {
                argp
            }
        });

        let nu = class.is_elliptical().then(|| {
            let nu = vec_angle(&ebar, &r);
            if rdotv < 0.0 {
                DPI - nu
            } else {
                nu
            }
        });

        let arglat = (class == OrbitClass::CircularInclined).then(|| {
            let u = vec_angle(&nbar, &r);
            if r.z < 0.0 {
                DPI - u
            } else {
                u
            }
        });

        let lonper = (class == OrbitClass::EllipticalEquatorial).then(|| {
            let mut lp = (ebar.x / ecc).clamp(-1.0, 1.0).acos();
            if ebar.y < 0.0 {
                lp = DPI - lp;
            }
            if incl > FRAC_PI_2 {
                lp = DPI - lp;
            }
            lp
        });

        let truelon = (class == OrbitClass::CircularEquatorial).then(|| {
            let mut tl = (r.x / magr).clamp(-1.0, 1.0).acos();
            if r.y < 0.0 {
                tl = DPI - tl;
            }
            if incl > FRAC_PI_2 {
                tl = DPI - tl;
            }
            tl
        });

        let (ea, ma) = match nu {
            Some(nu) if ecc < 1.0 => {
                let ea = true_to_eccentric(ecc, nu);
                (Some(ea), eccentric_to_mean(ecc, ea))
            }
            Some(nu) => {
                // hyperbolic anomaly
                let f = 2.0 * (((ecc - 1.0) / (ecc + 1.0)).sqrt() * (0.5 * nu).tan()).atanh();
                (Some(f), ecc * f.sinh() - f)
            }
            None => (None, arglat.or(truelon).unwrap_or(0.0)),
        };

        let mean_motion = mean_motion_from_sma(sma, mu);

        Ok(KeplerianState {
            epoch: cart.epoch,
            semi_major_axis: sma,
            semi_latus_rectum: p,
            eccentricity: ecc,
            inclination: incl.to_degrees(),
            raan: raan.map(f64::to_degrees),
            arg_perigee: argp.map(f64::to_degrees),
            true_anomaly: nu.map(f64::to_degrees),
            eccentric_anomaly: ea.map(f64::to_degrees),
            mean_anomaly: if ecc < 1.0 {
                wrap_deg(ma)
            } else {
                ma.to_degrees()
            },
            arg_latitude: arglat.map(f64::to_degrees),
            true_longitude: truelon.map(f64::to_degrees),
            lon_perigee: lonper.map(f64::to_degrees),
            mean_motion,
            period: SECONDS_PER_DAY / mean_motion,
        })
    }

    /// Cartesian state of these elements (perifocal construction, then
    /// `R3(-Ω)·R1(-i)·R3(-ω)`).
    ///
    /// Circular and equatorial orbits use the class specific angle in place of the
    /// undefined ones.
    pub fn to_cartesian(&self, mu: f64) -> CartesianState {
        let incl = self.inclination.to_radians();
        let mut argp = self.arg_perigee.unwrap_or(0.0).to_radians();
        let mut omega = self.raan.unwrap_or(0.0).to_radians();
        let mut nu = self.true_anomaly.unwrap_or(0.0).to_radians();

        match self.orbit_class() {
            OrbitClass::CircularEquatorial => {
                argp = 0.0;
                omega = 0.0;
                nu = self
                    .true_longitude
                    .unwrap_or(self.mean_anomaly)
                    .to_radians();
            }
            OrbitClass::CircularInclined => {
                argp = 0.0;
                nu = self.arg_latitude.unwrap_or(self.mean_anomaly).to_radians();
            }
            OrbitClass::EllipticalEquatorial => {
                argp = self
                    .lon_perigee
                    .map(f64::to_radians)
                    .unwrap_or(argp + omega);
                omega = 0.0;
            }
            OrbitClass::EllipticalInclined => {}
        }

        let p = self.semi_latus_rectum.max(SMALL);
        let ecc = self.eccentricity;
        let (sinnu, cosnu) = nu.sin_cos();
        let temp = p / (1.0 + ecc * cosnu);
        let rpqw = Vector3::new(temp * cosnu, temp * sinnu, 0.0);
        let vpqw = Vector3::new(-sinnu, ecc + cosnu, 0.0) * (mu / p).sqrt();

        let rot = rot3(-omega) * rot1(-incl) * rot3(-argp);
        CartesianState::new(self.epoch, rot * rpqw, rot * vpqw)
    }

    /// Inclination, RAAN, argument of perigee and mean anomaly in the form consumed by
    /// element sets: undefined angles are zero, circular orbits carry their phase in the
    /// mean anomaly and equatorial ellipses their longitude of perigee in ω.
    pub fn element_angles(&self) -> (Degree, Degree, Degree, Degree) {
        let argp = match self.orbit_class() {
            OrbitClass::EllipticalEquatorial => self.lon_perigee.unwrap_or(0.0),
            _ => self.arg_perigee.unwrap_or(0.0),
        };
        (
            self.inclination,
            self.raan.unwrap_or(0.0),
            argp,
            self.mean_anomaly,
        )
    }
}

#[cfg(test)]
mod test_keplerian_state {
    use super::*;
    use crate::constants::GM_EARTH;
    use approx::assert_relative_eq;

    fn epoch() -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(2021, 6, 1)
    }

    #[test]
    fn test_circular_equatorial_has_no_nan() {
        let r = Vector3::new(7000.0, 0.0, 0.0);
        let v = Vector3::new(0.0, (GM_EARTH / 7000.0).sqrt(), 0.0);
        let kep = KeplerianState::from_cartesian(&CartesianState::new(epoch(), r, v), GM_EARTH)
            .unwrap();
        assert_eq!(kep.orbit_class(), OrbitClass::CircularEquatorial);
        assert!(kep.raan.is_none());
        assert!(kep.arg_perigee.is_none());
        assert!(kep.true_anomaly.is_none());
        assert!(kep.mean_anomaly.is_finite());
        assert_relative_eq!(kep.true_longitude.unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_circular_inclined() {
        let kep = KeplerianState::from_mean_elements(
            epoch(),
            15.0,
            0.0,
            51.6,
            120.0,
            0.0,
            33.0,
            GM_EARTH,
        );
        let cart = kep.to_cartesian(GM_EARTH);
        let back = KeplerianState::from_cartesian(&cart, GM_EARTH).unwrap();
        assert_eq!(back.orbit_class(), OrbitClass::CircularInclined);
        assert_relative_eq!(back.arg_latitude.unwrap(), 33.0, epsilon = 1e-6);
        assert_relative_eq!(back.raan.unwrap(), 120.0, epsilon = 1e-6);
    }

    #[test]
    fn test_eccentric_inclined_round_trip() {
        let gap = |a: Degree, b: Degree| {
            let d = (a - b).rem_euclid(360.0);
            d.min(360.0 - d)
        };

        for (n, ecc) in [(15.7, 0.001), (14.2, 0.1), (4.0, 0.5), (2.0, 0.9)] {
            for inc in [10.0, 63.4, 98.7, 135.0] {
                for (raan, argp, ma) in [
                    (25.0, 40.0, 10.0),
                    (200.0, 300.0, 250.0),
                    (95.0, 130.0, 110.0),
                ] {
                    let kep = KeplerianState::from_mean_elements(
                        epoch(),
                        n,
                        ecc,
                        inc,
                        raan,
                        argp,
                        ma,
                        GM_EARTH,
                    );
                    let cart = kep.to_cartesian(GM_EARTH);
                    let back = KeplerianState::from_cartesian(&cart, GM_EARTH).unwrap();
                    assert_eq!(back.orbit_class(), OrbitClass::EllipticalInclined);

                    assert_relative_eq!(back.mean_motion, n, max_relative = 1e-10);
                    assert_relative_eq!(back.eccentricity, ecc, max_relative = 1e-9);
                    assert_relative_eq!(back.inclination, inc, epsilon = 1e-9);
                    assert!(gap(back.raan.unwrap(), raan) < 1e-8);
                    assert!(gap(back.arg_perigee.unwrap(), argp) < 1e-8);
                    assert!(gap(back.mean_anomaly, ma) < 1e-8);

                    let again = back.to_cartesian(GM_EARTH);
                    let dr = (again.position - cart.position).norm() / cart.position.norm();
                    let dv = (again.velocity - cart.velocity).norm() / cart.velocity.norm();
                    assert!(dr < 1e-10, "dr = {dr}");
                    assert!(dv < 1e-10, "dv = {dv}");
                }
            }
        }
    }

    #[test]
    fn test_degenerate() {
        let r = Vector3::new(7000.0, 0.0, 0.0);
        let v = Vector3::new(1.0, 0.0, 0.0);
        assert!(KeplerianState::from_cartesian(&CartesianState::new(epoch(), r, v), GM_EARTH)
            .is_err());
    }

    #[test]
    fn test_mean_motion_sma() {
        let a = sma_from_mean_motion(15.5, GM_EARTH);
        assert_relative_eq!(mean_motion_from_sma(a, GM_EARTH), 15.5, epsilon = 1e-12);
    }
}
