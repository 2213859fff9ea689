//! # Look angles
//!
//! Topocentric view of a satellite from a ground site:
//!
//! * azimuth (from north, clockwise) and elevation in the site's south-east-zenith frame,
//! * range and range-rate, the projection of the Earth-fixed relative velocity on the line
//!   of sight,
//! * right ascension and declination of the site-to-satellite vector in J2000.
//!
//! [`radec_to_azel`] and [`azel_to_radec`] convert a direction between the equatorial and
//! horizon systems of a site, given its local sidereal time; [`GroundSite`] offers the same
//! conversions at an epoch.
//!
//! Submodules:
//!
//! * [`differences`] – difference functions between observed and predicted look angles,
//!   used as residuals by the fit engine,
//! * [`transit`] – AOS / TCA / LOS pass detection.

use std::collections::HashMap;

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::{
    constants::{Degree, Kilometer, Radian, DPI, M_TO_KM},
    ephemeris::{states_between, CartesianSource},
    orbit_type::cartesian_state::CartesianState,
    ref_system::{geocentric_latitude, geodetic_to_ecef, rot2, rot3, Frame, FrameTransform},
    time::gmst_at,
};

pub mod differences;
pub mod transit;

/// Observer location on the WGS-84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GroundSite {
    pub lat_deg: Degree,
    pub lon_deg: Degree,
    /// Height above the ellipsoid in metres
    pub alt_m: f64,
}

impl GroundSite {
    pub fn new(lat_deg: Degree, lon_deg: Degree, alt_m: f64) -> Self {
        GroundSite {
            lat_deg,
            lon_deg,
            alt_m,
        }
    }

    /// Earth-fixed position in kilometres.
    pub fn ecef(&self) -> Vector3<f64> {
        geodetic_to_ecef(self.lat_deg, self.lon_deg, self.alt_m * M_TO_KM)
    }

    /// Local sidereal time in radians, in [0, 2π).
    pub fn local_sidereal_time(&self, epoch: &Epoch) -> Radian {
        (self.lon_deg.to_radians() + gmst_at(epoch)).rem_euclid(DPI)
    }

    /// Azimuth and elevation at `epoch` of the direction (`ra_deg`, `dec_deg`) of date.
    pub fn radec_to_azel(
        &self,
        epoch: &Epoch,
        ra_deg: Degree,
        dec_deg: Degree,
    ) -> (Degree, Degree) {
        radec_to_azel(
            ra_deg,
            dec_deg,
            geocentric_latitude(self.lat_deg),
            self.local_sidereal_time(epoch),
        )
    }

    /// Right ascension and declination of date seen at (`az_deg`, `el_deg`) at `epoch`.
    pub fn azel_to_radec(
        &self,
        epoch: &Epoch,
        az_deg: Degree,
        el_deg: Degree,
    ) -> (Degree, Degree) {
        azel_to_radec(
            az_deg,
            el_deg,
            geocentric_latitude(self.lat_deg),
            self.local_sidereal_time(epoch),
        )
    }

    fn key(&self) -> (u64, u64, u64) {
        (
            self.lat_deg.to_bits(),
            self.lon_deg.to_bits(),
            self.alt_m.to_bits(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAngleState {
    pub epoch: Epoch,
    pub az_deg: Degree,
    pub el_deg: Degree,
    /// Right ascension in [0, 360)
    pub ra_deg: Degree,
    pub dec_deg: Degree,
    pub range_km: Kilometer,
    pub range_rate_km_s: f64,
    pub site: GroundSite,
}

/// `sin²(t/2)`
fn haversine(t: f64) -> f64 {
    let s = (0.5 * t).sin();
    s * s
}

/// Great-circle separation in degrees between two (longitude-like, latitude-like) pairs.
pub fn angular_separation(lon1: Degree, lat1: Degree, lon2: Degree, lat2: Degree) -> Degree {
    let dlat = (lat1 - lat2).to_radians();
    let mut dlon = (lon1 - lon2).abs();
    if dlon > 180.0 {
        dlon = 360.0 - dlon;
    }
    let h = haversine(dlat)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * haversine(dlon.to_radians());
    (2.0 * h.sqrt().min(1.0).asin()).to_degrees()
}

impl LookAngleState {
    /// Observation holding only az/el, e.g. from an optical sensor.
    pub fn from_az_el(site: GroundSite, epoch: Epoch, az_deg: Degree, el_deg: Degree) -> Self {
        LookAngleState {
            epoch,
            az_deg,
            el_deg,
            ra_deg: 0.0,
            dec_deg: 0.0,
            range_km: 0.0,
            range_rate_km_s: 0.0,
            site,
        }
    }

    pub fn ra_hours(&self) -> f64 {
        self.ra_deg / 15.0
    }

    /// Set the right ascension, wrapped into [0, 360).
    pub fn set_ra_deg(&mut self, ra: Degree) {
        self.ra_deg = ra.rem_euclid(360.0);
    }

    pub fn set_ra_hours(&mut self, ra: f64) {
        self.set_ra_deg(ra * 15.0);
    }

    pub fn az_el_separation_deg(&self, other: &LookAngleState) -> Degree {
        angular_separation(self.az_deg, self.el_deg, other.az_deg, other.el_deg)
    }

    pub fn ra_dec_separation_deg(&self, other: &LookAngleState) -> Degree {
        angular_separation(self.ra_deg, self.dec_deg, other.ra_deg, other.dec_deg)
    }
}

/// Equatorial direction → horizon direction.
///
/// Arguments
/// ---------
/// * `ra_deg`, `dec_deg`: right ascension and declination.
/// * `lat_gc_deg`: geocentric latitude of the observer.
/// * `lst`: local sidereal time in radians.
///
/// Return
/// ------
/// * `(azimuth, elevation)` in degrees, azimuth from north through east in [0, 360).
pub fn radec_to_azel(
    ra_deg: Degree,
    dec_deg: Degree,
    lat_gc_deg: Degree,
    lst: Radian,
) -> (Degree, Degree) {
    let (sinlha, coslha) = (lst - ra_deg.to_radians()).sin_cos();
    let (sinlat, coslat) = lat_gc_deg.to_radians().sin_cos();
    let (sindec, cosdec) = dec_deg.to_radians().sin_cos();

    let sinel = (sinlat * sindec + coslat * cosdec * coslha).clamp(-1.0, 1.0);
    let az = (-sinlha * cosdec * coslat).atan2(sindec - sinel * sinlat);

    (az.to_degrees().rem_euclid(360.0), sinel.asin().to_degrees())
}

/// Horizon direction → equatorial direction, the inverse of [`radec_to_azel`].
///
/// Return
/// ------
/// * `(right ascension, declination)` in degrees, right ascension in [0, 360).
pub fn azel_to_radec(
    az_deg: Degree,
    el_deg: Degree,
    lat_gc_deg: Degree,
    lst: Radian,
) -> (Degree, Degree) {
    let (sinaz, cosaz) = az_deg.to_radians().sin_cos();
    let (sinel, cosel) = el_deg.to_radians().sin_cos();
    let (sinlat, coslat) = lat_gc_deg.to_radians().sin_cos();

    let sindec = (sinel * sinlat + cosel * coslat * cosaz).clamp(-1.0, 1.0);
    let lha = (-sinaz * cosel * coslat).atan2(sinel - sinlat * sindec);

    (
        (lst - lha).to_degrees().rem_euclid(360.0),
        sindec.asin().to_degrees(),
    )
}

/// Look angle of one state.
///
/// Arguments
/// ---------
/// * `site`: observer.
/// * `state`: satellite state, expressed in `frame`.
/// * `frame`: frame of `state`.
/// * `frames`: frame-transform service.
pub fn compute_look_angle(
    site: &GroundSite,
    state: &CartesianState,
    frame: Frame,
    frames: &dyn FrameTransform,
) -> LookAngleState {
    let site_ecef = site.ecef();
    let ecef = frames.transform(state, frame, Frame::Ecef);
    let rel = ecef.position - site_ecef;
    let range = rel.norm();

    let sez = rot2(90f64.to_radians() - site.lat_deg.to_radians())
        * rot3(site.lon_deg.to_radians())
        * rel;

    let el = (sez.z / range).clamp(-1.0, 1.0).asin();
    let az = sez.y.atan2(-sez.x);

    let site_state = CartesianState::new(state.epoch, site_ecef, Vector3::zeros());
    let site_j2000 = frames.transform(&site_state, Frame::Ecef, Frame::J2000);
    let sat_j2000 = frames.transform(state, frame, Frame::J2000);
    let los = sat_j2000.position - site_j2000.position;

    let mut angles = LookAngleState {
        epoch: state.epoch,
        az_deg: az.to_degrees().rem_euclid(360.0),
        el_deg: el.to_degrees(),
        ra_deg: 0.0,
        dec_deg: (los.z / los.norm()).clamp(-1.0, 1.0).asin().to_degrees(),
        range_km: range,
        range_rate_km_s: rel.dot(&ecef.velocity) / range,
        site: *site,
    };
    angles.set_ra_deg(los.y.atan2(los.x).to_degrees());
    angles
}

/// Look angles of a sequence of states, all expressed in `frame`.
pub fn compute_look_angles(
    site: &GroundSite,
    states: &[CartesianState],
    frame: Frame,
    frames: &dyn FrameTransform,
) -> Vec<LookAngleState> {
    states
        .iter()
        .map(|s| compute_look_angle(site, s, frame, frames))
        .collect()
}

/// Look angles of a source sampled from `t1` to `t2` (inclusive) every `step_s` seconds.
pub fn look_angles_from_source(
    site: &GroundSite,
    source: &dyn CartesianSource,
    t1: Epoch,
    t2: Epoch,
    step_s: f64,
    frames: &dyn FrameTransform,
) -> Vec<LookAngleState> {
    let states = states_between(source, t1, t2, step_s);
    compute_look_angles(site, &states, source.frame(), frames)
}

/// Split look angles by observer, keeping the order in which sites first appear.
pub fn group_by_location(angles: &[LookAngleState]) -> Vec<Vec<LookAngleState>> {
    let mut index: HashMap<(u64, u64, u64), usize> = HashMap::new();
    let mut groups: Vec<Vec<LookAngleState>> = Vec::new();

    for la in angles {
        let slot = *index.entry(la.site.key()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(*la);
    }
    groups
}
