//! # Constants and type definitions for tlefit
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! aliases** used throughout the `tlefit` library.
//!
//! ## Overview
//!
//! - Geophysical constants (Earth gravitational parameter, radius, J2, rotation rate, WGS-84 shape)
//! - Unit conversions (degrees ↔ radians, days ↔ seconds ↔ minutes, metres ↔ kilometres)
//! - Core type aliases used across the crate
//!
//! These definitions are shared by the element conversions, the propagator, the fit engine and
//! the look-angle engine.

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Degrees → radians
pub const RADEG: f64 = std::f64::consts::PI / 180.0;

/// Number of seconds in a day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Number of minutes in a day
pub const MINUTES_PER_DAY: f64 = 1_440.0;

/// Earth gravitational parameter in km³/s²
pub const GM_EARTH: f64 = 398_600.4415;

/// Earth equatorial radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6_378.137;

/// Second zonal harmonic of the Earth gravity field
pub const J2: f64 = 0.00108263;

/// Earth rotation rate in rad/s (IAU-82 sidereal rate)
pub const EARTH_ROTATION_RATE: f64 = 7.292115146706979e-5;

/// WGS-84 flattening
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257223563;

/// Metres → kilometres
pub const M_TO_KM: f64 = 1e-3;

/// Numerical epsilon used for floating-point comparisons on angles and eccentricities
pub const SMALL: f64 = 1e-8;

/// Upper bound on mean motion accepted by the fit, in revolutions per day
pub const MAX_FIT_MEAN_MOTION: f64 = 16.5;

/// Relative RMS tolerance used to prefer a zero drag/radiation term
pub const RMS_EPS: f64 = 1e-5;

/// Residual substituted for each component the propagator could not evaluate
pub const PROPAGATION_PENALTY: f64 = 1e4;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;

/// Angle in radians
pub type Radian = f64;

/// Distance in kilometres
pub type Kilometer = f64;

/// Mean motion in revolutions per day
pub type RevPerDay = f64;
