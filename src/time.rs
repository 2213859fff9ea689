//! # Time helpers
//!
//! Instants are carried as [`hifitime::Epoch`] values in the UTC scale. This module gathers the
//! few conversions the rest of the crate needs:
//!
//! - sidereal time (IAU-82) for the Earth-fixed ↔ TEME rotation,
//! - the `YYDDD.dddddddd` epoch field of the element-set text format,
//! - Modified Julian Day + seconds-of-day stamps found in ephemeris files,
//! - signed time differences in seconds / minutes / days.

use hifitime::{Duration, Epoch, Unit};

use crate::constants::{DPI, MINUTES_PER_DAY, SECONDS_PER_DAY};
use crate::tlefit_errors::TleFitError;

/// MJD of the J2000.0 epoch
const T2000: f64 = 51544.5;

/// Compute the Greenwich Mean Sidereal Time (GMST) in radians
/// for a given Modified Julian Date (UT1 time scale).
///
/// This function implements the IAU 1982 polynomial formula
/// for the mean sidereal time at 0h UT1, plus the fractional-day
/// correction term due to Earth's rotation rate.
///
/// Arguments
/// ---------
/// * `tjm` - Modified Julian Date (MJD, UT1 time scale)
///
/// Return
/// ------
/// * GMST angle in radians, normalized to the interval [0, 2π).
pub fn gmst(tjm: f64) -> f64 {
    // Polynomial coefficients for GMST at 0h UT1 (in seconds)
    const C0: f64 = 24110.54841;
    const C1: f64 = 8640184.812866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;

    // Ratio of sidereal day to solar day
    const RAP: f64 = 1.00273790934;

    let itjm = tjm.floor();
    let t = (itjm - T2000) / 36525.0;

    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * DPI / SECONDS_PER_DAY;

    let h = tjm.fract() * DPI;
    (gmst0 + h * RAP).rem_euclid(DPI)
}

/// GMST at an epoch, UTC used in place of UT1.
pub fn gmst_at(epoch: &Epoch) -> f64 {
    gmst(epoch.to_mjd_utc_days())
}

/// Signed elapsed time `to - from` in seconds.
pub fn seconds_between(from: &Epoch, to: &Epoch) -> f64 {
    (*to - *from).to_seconds()
}

/// Signed elapsed time `to - from` in minutes.
pub fn minutes_between(from: &Epoch, to: &Epoch) -> f64 {
    seconds_between(from, to) * MINUTES_PER_DAY / SECONDS_PER_DAY
}

/// Shift an epoch by a (possibly negative, fractional) number of seconds.
pub fn add_seconds(epoch: &Epoch, seconds: f64) -> Epoch {
    *epoch + Duration::from_seconds(seconds)
}

/// Build a UTC epoch from a Modified Julian Day and a number of seconds within that day.
pub fn epoch_from_mjd_seconds(mjd: f64, seconds_of_day: f64) -> Epoch {
    add_seconds(&Epoch::from_mjd_utc(mjd), seconds_of_day)
}

fn start_of_year(year: i32) -> Epoch {
    Epoch::from_gregorian_utc_at_midnight(year, 1, 1)
}

/// Format an epoch as the 14-character `YYDDD.dddddddd` element-set field.
///
/// Years from 2000 on are printed as `year - 2000`, earlier ones as `year - 1900`.
/// The day of year is 1-based and its fraction carries eight digits.
pub fn format_element_epoch(epoch: &Epoch) -> String {
    let (year, ..) = epoch.to_gregorian_utc();
    let doy = (*epoch - start_of_year(year)).to_unit(Unit::Day) + 1.0;
    let yy = if year < 2000 { year - 1900 } else { year - 2000 };
    format!("{:02}{:012.8}", yy, doy)
}

/// Parse the `YYDDD.dddddddd` element-set epoch field.
///
/// Two-digit years below 57 belong to the 21st century.
pub fn parse_element_epoch(field: &str) -> Result<Epoch, TleFitError> {
    let field = field.trim();
    if field.len() < 3 || !field.is_char_boundary(2) {
        return Err(TleFitError::MalformedElementSet(format!(
            "epoch field too short: '{field}'"
        )));
    }
    let yy: i32 = field[..2]
        .trim()
        .parse()
        .map_err(|_| TleFitError::MalformedElementSet(format!("bad epoch year: '{field}'")))?;
    let day: f64 = field[2..]
        .trim()
        .parse()
        .map_err(|_| TleFitError::MalformedElementSet(format!("bad epoch day: '{field}'")))?;
    let year = if yy < 57 { 2000 + yy } else { 1900 + yy };
    Ok(start_of_year(year) + Unit::Day * (day - 1.0))
}

#[cfg(test)]
mod time_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gmst() {
        let tut = 57028.478514610404;
        assert_relative_eq!(gmst(tut), 4.851925725092499, epsilon = 1e-12);

        assert_relative_eq!(gmst(T2000), 4.894961212789145, epsilon = 1e-12);
    }

    #[test]
    fn test_element_epoch_round_trip() {
        let epoch = Epoch::from_gregorian_utc(2019, 1, 1, 12, 4, 32, 281_000_000);
        let text = format_element_epoch(&epoch);
        assert_eq!(text.len(), 14);
        assert!(text.starts_with("19001.50315"));

        let back = parse_element_epoch(&text).unwrap();
        assert!(seconds_between(&epoch, &back).abs() < 1e-3);
    }

    #[test]
    fn test_element_epoch_century() {
        let old = parse_element_epoch("98032.25000000").unwrap();
        assert_eq!(old.to_gregorian_utc().0, 1998);
        assert_eq!(format_element_epoch(&old), "98032.25000000");

        let new = parse_element_epoch("24366.00000000").unwrap();
        assert_eq!(new.to_gregorian_utc().0, 2024);
    }

    #[test]
    fn test_bad_epoch() {
        assert!(parse_element_epoch("x").is_err());
        assert!(parse_element_epoch("19abc").is_err());
    }

    #[test]
    fn test_mjd_seconds() {
        let e = epoch_from_mjd_seconds(59215.0, 43200.0);
        assert_relative_eq!(e.to_mjd_utc_days(), 59215.5, epsilon = 1e-9);
        assert_relative_eq!(minutes_between(&Epoch::from_mjd_utc(59215.0), &e), 720.0);
    }
}
