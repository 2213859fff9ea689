//! # Reference frames and rotations
//!
//! Three frames are known to the crate ([`Frame`]): the Earth-fixed frame, the TEME frame in
//! which element sets propagate, and the J2000 (EME2000) inertial frame. Conversions go
//! through the [`FrameTransform`] port; [`EarthRotationFrames`] is the built-in service.
//!
//! Rotation helpers follow two conventions:
//! * [`rotmt`] rotates a **vector** about a fixed axis (active rotation),
//! * [`rot1`], [`rot2`], [`rot3`] rotate the **axes** (passive rotation, astrodynamics
//!   convention), i.e. `rot3(a) == rotmt(-a, Axis::Z)`.
//!
//! [`geodetic_to_ecef`] and [`ecef_to_geodetic`] convert between Earth-fixed positions and
//! WGS-84 coordinates.

use std::{f64::consts::FRAC_PI_2, fmt, str::FromStr};

use hifitime::Epoch;
use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Degree, Kilometer, EARTH_RADIUS_KM, EARTH_ROTATION_RATE, RADEG, WGS84_FLATTENING},
    orbit_type::cartesian_state::CartesianState,
    time::gmst_at,
    tlefit_errors::TleFitError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Rotation matrix of angle `alpha` (radians) about `axis`, applied to the vector.
///
/// Arguments
/// ---------
/// * `alpha`: rotation angle in radians (counter-clockwise, right-hand rule).
/// * `axis`: rotation axis.
///
/// Return
/// ------
/// * An orthonormal matrix `R` such that the rotated vector is `x' = R · x`.
///
/// See also
/// --------
/// * [`rot1`], [`rot2`], [`rot3`] – the change-of-basis counterparts.
pub fn rotmt(alpha: f64, axis: Axis) -> Matrix3<f64> {
    let axis = match axis {
        Axis::X => Vector3::x_axis(),
        Axis::Y => Vector3::y_axis(),
        Axis::Z => Vector3::z_axis(),
    };

    Rotation3::from_axis_angle(&axis, alpha).into()
}

/// Passive rotation of the axes about X.
pub fn rot1(angle: f64) -> Matrix3<f64> {
    rotmt(-angle, Axis::X)
}

/// Passive rotation of the axes about Y.
pub fn rot2(angle: f64) -> Matrix3<f64> {
    rotmt(-angle, Axis::Y)
}

/// Passive rotation of the axes about Z.
pub fn rot3(angle: f64) -> Matrix3<f64> {
    rotmt(-angle, Axis::Z)
}

/// IAU-76 precession matrix from J2000 to the mean equator and equinox of date.
///
/// Arguments
/// ---------
/// * `epoch`: date of the target frame.
///
/// Return
/// ------
/// * `P` such that `x_date = P · x_J2000`, built as `R3(-z)·R2(θ)·R3(-ζ)`.
pub fn precession(epoch: &Epoch) -> Matrix3<f64> {
    let zed = 0.6406161 * RADEG;
    let zd = 0.6406161 * RADEG;
    let thd = 0.5567530 * RADEG;

    let zedd = 0.0000839 * RADEG;
    let zdd = 0.0003041 * RADEG;
    let thdd = -0.0001185 * RADEG;

    let zeddd = 0.0000050 * RADEG;
    let zddd = 0.0000051 * RADEG;
    let thddd = -0.0000116 * RADEG;

    let t = (epoch.to_mjd_tt_days() - 51544.5) / 36525.0;

    let zeta = ((zeddd * t + zedd) * t + zed) * t;
    let z = ((zddd * t + zdd) * t + zd) * t;
    let theta = ((thddd * t + thdd) * t + thd) * t;

    rot3(-z) * rot2(theta) * rot3(-zeta)
}

/// Reference frames understood by the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frame {
    /// Earth-centred Earth-fixed
    Ecef,
    /// True equator, mean equinox: output frame of element-set propagation
    Teme,
    /// Mean equator and equinox of J2000.0 (EME2000)
    J2000,
}

impl FromStr for Frame {
    type Err = TleFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ecef" | "itrf" => Ok(Frame::Ecef),
            "teme" => Ok(Frame::Teme),
            "j2000" | "eme2000" => Ok(Frame::J2000),
            _ => Err(TleFitError::UnknownFrame(s.to_string())),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Frame::Ecef => "ECEF",
            Frame::Teme => "TEME",
            Frame::J2000 => "J2000",
        };
        write!(f, "{name}")
    }
}

/// Frame-transform port.
///
/// Re-expresses a state, tagged with its source frame, in the target frame at the same epoch.
pub trait FrameTransform: Send + Sync {
    fn transform(&self, state: &CartesianState, from: Frame, to: Frame) -> CartesianState;
}

/// Built-in frame service.
///
/// * ECEF ↔ TEME: rotation by the IAU-82 sidereal time, with the `ω × r` transport term on
///   velocities; polar motion is neglected.
/// * TEME ↔ J2000: IAU-76 precession only; nutation and the equation of the equinoxes are
///   neglected (tens of arcseconds).
#[derive(Debug, Clone, Copy, Default)]
pub struct EarthRotationFrames;

impl EarthRotationFrames {
    fn earth_rate() -> Vector3<f64> {
        Vector3::new(0.0, 0.0, EARTH_ROTATION_RATE)
    }

    fn to_teme(state: &CartesianState, from: Frame) -> CartesianState {
        match from {
            Frame::Teme => *state,
            Frame::Ecef => {
                let r_inv = rot3(-gmst_at(&state.epoch));
                let v_inertial = state.velocity + Self::earth_rate().cross(&state.position);
                CartesianState::new(state.epoch, r_inv * state.position, r_inv * v_inertial)
            }
            Frame::J2000 => {
                let p = precession(&state.epoch);
                CartesianState::new(state.epoch, p * state.position, p * state.velocity)
            }
        }
    }

    fn from_teme(state: &CartesianState, to: Frame) -> CartesianState {
        match to {
            Frame::Teme => *state,
            Frame::Ecef => {
                let r = rot3(gmst_at(&state.epoch));
                let pos = r * state.position;
                let vel = r * state.velocity - Self::earth_rate().cross(&pos);
                CartesianState::new(state.epoch, pos, vel)
            }
            Frame::J2000 => {
                let pt = precession(&state.epoch).transpose();
                CartesianState::new(state.epoch, pt * state.position, pt * state.velocity)
            }
        }
    }
}

impl FrameTransform for EarthRotationFrames {
    fn transform(&self, state: &CartesianState, from: Frame, to: Frame) -> CartesianState {
        if from == to {
            return *state;
        }
        Self::from_teme(&Self::to_teme(state, from), to)
    }
}

/// Squared eccentricity of the WGS-84 ellipsoid.
fn wgs84_e2() -> f64 {
    WGS84_FLATTENING * (2.0 - WGS84_FLATTENING)
}

/// Iteration cap and convergence threshold (rad) of [`ecef_to_geodetic`]
const GEODETIC_MAX_ITER: usize = 10;
const GEODETIC_TOL: f64 = 1e-12;

/// Position on the WGS-84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    pub lat_deg: Degree,
    /// Geocentric latitude of the ellipsoid point below
    pub lat_gc_deg: Degree,
    /// Longitude in (-180, 180]
    pub lon_deg: Degree,
    pub alt_km: Kilometer,
}

/// WGS-84 geodetic coordinates → Earth-fixed position.
///
/// Arguments
/// ---------
/// * `lat_deg`, `lon_deg`: geodetic latitude and longitude in degrees.
/// * `alt_km`: height above the ellipsoid in kilometres.
pub fn geodetic_to_ecef(lat_deg: f64, lon_deg: f64, alt_km: Kilometer) -> Vector3<f64> {
    let e2 = wgs84_e2();
    let (slat, clat) = lat_deg.to_radians().sin_cos();
    let (slon, clon) = lon_deg.to_radians().sin_cos();
    let n = EARTH_RADIUS_KM / (1.0 - e2 * slat * slat).sqrt();

    Vector3::new(
        (n + alt_km) * clat * clon,
        (n + alt_km) * clat * slon,
        (n * (1.0 - e2) + alt_km) * slat,
    )
}

/// Geocentric latitude of a point on the ellipsoid at geodetic latitude `lat_deg`.
pub fn geocentric_latitude(lat_deg: Degree) -> Degree {
    let (s, c) = lat_deg.to_radians().sin_cos();
    ((1.0 - wgs84_e2()) * s).atan2(c).to_degrees()
}

/// Earth-fixed position → WGS-84 geodetic coordinates.
///
/// The geodetic latitude is found by fixed-point iteration from the geocentric declination,
/// stopping once two iterates differ by less than 1e-12 rad.
/// On the polar axis the longitude is 0.
///
/// Arguments
/// ---------
/// * `r`: Earth-fixed position in kilometres, away from the geocentre.
pub fn ecef_to_geodetic(r: &Vector3<f64>) -> Geodetic {
    let e2 = wgs84_e2();
    let rho = r.x.hypot(r.y);
    let prime_vertical = |lat: f64| EARTH_RADIUS_KM / (1.0 - e2 * lat.sin().powi(2)).sqrt();

    let mut lat = (r.z / r.norm()).clamp(-1.0, 1.0).asin();
    for _ in 0..GEODETIC_MAX_ITER {
        let next = (r.z + prime_vertical(lat) * e2 * lat.sin()).atan2(rho);
        let done = (next - lat).abs() < GEODETIC_TOL;
        lat = next;
        if done {
            break;
        }
    }

    let c = prime_vertical(lat);
    let alt_km = if FRAC_PI_2 - lat.abs() > RADEG {
        rho / lat.cos() - c
    } else {
        r.z / lat.sin() - c * (1.0 - e2)
    };

    let lat_deg = lat.to_degrees();
    Geodetic {
        lat_deg,
        lat_gc_deg: geocentric_latitude(lat_deg),
        lon_deg: r.y.atan2(r.x).to_degrees(),
        alt_km,
    }
}

#[cfg(test)]
mod test_ref_system {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_passive_rot3() {
        let v = rot3(std::f64::consts::FRAC_PI_2) * Vector3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(v, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-15);
    }

    #[test]
    fn test_frame_parse() {
        assert_eq!("EME2000".parse::<Frame>().unwrap(), Frame::J2000);
        assert_eq!(" itrf ".parse::<Frame>().unwrap(), Frame::Ecef);
        assert!("gcrf".parse::<Frame>().is_err());
    }

    #[test]
    fn test_round_trips() {
        let frames = EarthRotationFrames;
        let state = CartesianState::new(
            Epoch::from_gregorian_utc_at_noon(2022, 3, 4),
            Vector3::new(-2000.0, 6000.0, 1500.0),
            Vector3::new(-6.0, -1.5, 3.0),
        );
        for other in [Frame::Ecef, Frame::J2000] {
            let there = frames.transform(&state, Frame::Teme, other);
            let back = frames.transform(&there, other, Frame::Teme);
            assert_relative_eq!(back.position, state.position, epsilon = 1e-8);
            assert_relative_eq!(back.velocity, state.velocity, epsilon = 1e-11);
        }
    }

    #[test]
    fn test_geodetic_equator() {
        let p = geodetic_to_ecef(0.0, 90.0, 0.0);
        assert_relative_eq!(p, Vector3::new(0.0, EARTH_RADIUS_KM, 0.0), epsilon = 1e-9);
        let pole = geodetic_to_ecef(90.0, 0.0, 0.0);
        assert_relative_eq!(pole.z, 6356.752314, epsilon = 1e-5);
    }

    #[test]
    fn test_geodetic_round_trip() {
        for lat in [-90.0, -89.7, -45.0, -10.0, 0.0, 33.3, 60.0, 89.5, 90.0] {
            for lon in [-179.0, -45.0, 0.0, 12.5, 135.0, 180.0] {
                for alt in [-0.4, 0.0, 2.5, 550.0, 35_786.0] {
                    let geo = ecef_to_geodetic(&geodetic_to_ecef(lat, lon, alt));
                    assert_relative_eq!(geo.lat_deg, lat, epsilon = 1e-9);
                    assert_relative_eq!(geo.alt_km, alt, epsilon = 1e-6);
                    if lat.abs() < 90.0 {
                        assert_relative_eq!(geo.lon_deg, lon, epsilon = 1e-9);
                    }
                }
            }
        }
    }

    #[test]
    fn test_geocentric_latitude() {
        assert_eq!(geocentric_latitude(0.0), 0.0);
        assert_relative_eq!(geocentric_latitude(90.0), 90.0, epsilon = 1e-12);
        // largest difference, about 0.19° near 45°
        let d = 45.0 - geocentric_latitude(45.0);
        assert!(d > 0.19 && d < 0.2, "{d}");

        let geo = ecef_to_geodetic(&geodetic_to_ecef(45.0, 0.0, 0.0));
        assert_relative_eq!(geo.lat_gc_deg, geocentric_latitude(45.0), epsilon = 1e-9);
    }
}
