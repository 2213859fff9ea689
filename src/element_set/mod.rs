//! # Element sets
//!
//! An [`ElementSet`] is the compact orbit description fitted by this crate: the content of a
//! NORAD two-line element set. It is **immutable**; every change goes through an
//! [`ElementSetDraft`](crate::element_set::draft::ElementSetDraft), whose `build()` validates
//! nothing but clamps every field on entry and formats the two text lines once.
//!
//! Values are kept at full precision: the text lines are a lossy rendering of the set, not
//! its source of truth. A set parsed from text of course only carries the text precision.
//!
//! ## Element types
//!
//! The element-type digit selects the propagator model ([`ElementType`]):
//! * [`ElementType::Standard`] – drag term `bstar`, second mean-motion derivative `nddot`.
//! * [`ElementType::Extended`] – ballistic term in the `bstar` slot and the radiation term
//!   (`agom`) in the `nddot` slot.

use std::fmt;

use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{Degree, RevPerDay},
    element_set::draft::ElementSetDraft,
    orbit_type::equinoctial_element::{ClassicalElements, EquinoctialElements},
    tlefit_errors::TleFitError,
};

/// Mutable counterpart of [`ElementSet`].
pub mod draft;

/// Fixed-width text format.
pub mod tle_format;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ElementType {
    /// Digit 0 (and every digit other than 4)
    #[default]
    Standard,
    /// Digit 4
    Extended,
}

impl ElementType {
    pub fn from_digit(digit: u32) -> Self {
        if digit == 4 {
            ElementType::Extended
        } else {
            ElementType::Standard
        }
    }

    pub fn digit(&self) -> u32 {
        match self {
            ElementType::Standard => 0,
            ElementType::Extended => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSet {
    pub(crate) object_id: String,
    pub(crate) intl_id: String,
    pub(crate) epoch: Epoch,
    pub(crate) ndot: f64,
    pub(crate) nddot: f64,
    pub(crate) bstar: f64,
    pub(crate) element_type: ElementType,
    pub(crate) element_number: u32,
    pub(crate) inclination: Degree,
    pub(crate) raan: Degree,
    pub(crate) eccentricity: f64,
    pub(crate) arg_perigee: Degree,
    pub(crate) mean_anomaly: Degree,
    pub(crate) mean_motion: RevPerDay,
    pub(crate) rev_number: u32,
    pub(crate) line1: String,
    pub(crate) line2: String,
}

impl ElementSet {
    /// Parse a pair of element-set lines.
    ///
    /// Arguments
    /// ---------
    /// * `line1`, `line2`: the two fixed-width lines (trailing characters are ignored).
    ///
    /// Return
    /// ------
    /// * `Err(TleFitError::MalformedElementSet)` if a mandatory column cannot be read.
    pub fn parse(line1: &str, line2: &str) -> Result<Self, TleFitError> {
        Ok(tle_format::parse_lines(line1, line2)?.build())
    }

    /// Start a draft carrying every field of this set.
    pub fn to_draft(&self) -> ElementSetDraft {
        ElementSetDraft::from(self)
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn intl_id(&self) -> &str {
        &self.intl_id
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// First derivative of the mean motion / 2 (rev/day²)
    pub fn ndot(&self) -> f64 {
        self.ndot
    }

    /// Second derivative slot: `nddot` for standard sets, `agom` for extended ones.
    pub fn nddot(&self) -> f64 {
        self.nddot
    }

    pub fn bstar(&self) -> f64 {
        self.bstar
    }

    /// Radiation term, only meaningful for [`ElementType::Extended`] sets.
    pub fn agom(&self) -> Option<f64> {
        (self.element_type == ElementType::Extended).then_some(self.nddot)
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn element_number(&self) -> u32 {
        self.element_number
    }

    pub fn inclination(&self) -> Degree {
        self.inclination
    }

    pub fn raan(&self) -> Degree {
        self.raan
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    pub fn arg_perigee(&self) -> Degree {
        self.arg_perigee
    }

    pub fn mean_anomaly(&self) -> Degree {
        self.mean_anomaly
    }

    pub fn mean_motion(&self) -> RevPerDay {
        self.mean_motion
    }

    pub fn rev_number(&self) -> u32 {
        self.rev_number
    }

    pub fn line1(&self) -> &str {
        &self.line1
    }

    pub fn line2(&self) -> &str {
        &self.line2
    }

    pub fn classical(&self) -> ClassicalElements {
        ClassicalElements {
            inclination: self.inclination,
            raan: self.raan,
            eccentricity: self.eccentricity,
            arg_perigee: self.arg_perigee,
            mean_anomaly: self.mean_anomaly,
            mean_motion: self.mean_motion,
        }
    }

    pub fn equinoctial(&self) -> EquinoctialElements {
        EquinoctialElements::from_classical(&self.classical())
    }
}

impl fmt::Display for ElementSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.line1)?;
        write!(f, "{}", self.line2)
    }
}
