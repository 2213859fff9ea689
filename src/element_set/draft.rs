//! # Element-set drafts
//!
//! [`ElementSetDraft`] is the freely mutable side of the two-phase element-set value. Setters
//! follow the builder style (`draft.inclination(98.7).eccentricity(1e-3)`) and bring each
//! value into the range the text format can hold:
//!
//! | field | rule |
//! |---|---|
//! | inclination | wrapped into [0, 180) |
//! | RAAN, argument of perigee, mean anomaly | wrapped into [0, 360) |
//! | eccentricity | negative → 0, ≥ 1 → 0.99 |
//! | mean motion | clamped into [0, 17] rev/day |
//! | first derivative | at or below −1 → −0.1, at or above 1 → 0.1, non-finite → 0 |
//! | element number / revolution number | wrapped into [0, 9999] / [0, 99999] |
//! | object id / international id | trimmed, truncated to 5 / 8 characters |
//!
//! [`ElementSetDraft::build`] renders the text lines and returns the immutable
//! [`ElementSet`].

use hifitime::Epoch;

use crate::{
    constants::{Degree, RevPerDay},
    element_set::{tle_format, ElementSet, ElementType},
    orbit_type::equinoctial_element::ClassicalElements,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSetDraft {
    object_id: String,
    intl_id: String,
    epoch: Epoch,
    ndot: f64,
    nddot: f64,
    bstar: f64,
    element_type: ElementType,
    element_number: u32,
    inclination: Degree,
    raan: Degree,
    eccentricity: f64,
    arg_perigee: Degree,
    mean_anomaly: Degree,
    mean_motion: RevPerDay,
    rev_number: u32,
}

fn in_range(val: f64, max: f64) -> f64 {
    if !val.is_finite() {
        return 0.0;
    }
    val.rem_euclid(max)
}

fn truncate(id: &str, len: usize) -> String {
    id.trim().chars().take(len).collect()
}

impl ElementSetDraft {
    /// Empty draft for an object: every element zero, standard type.
    pub fn new(object_id: &str, epoch: Epoch) -> Self {
        ElementSetDraft {
            object_id: truncate(object_id, 5),
            intl_id: String::new(),
            epoch,
            ndot: 0.0,
            nddot: 0.0,
            bstar: 0.0,
            element_type: ElementType::Standard,
            element_number: 0,
            inclination: 0.0,
            raan: 0.0,
            eccentricity: 0.0,
            arg_perigee: 0.0,
            mean_anomaly: 0.0,
            mean_motion: 0.0,
            rev_number: 0,
        }
    }

    pub fn object_id(mut self, id: &str) -> Self {
        self.object_id = truncate(id, 5);
        self
    }

    pub fn intl_id(mut self, id: &str) -> Self {
        self.intl_id = truncate(id, 8);
        self
    }

    pub fn epoch(mut self, epoch: Epoch) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn ndot(mut self, v: f64) -> Self {
        self.ndot = if !v.is_finite() {
            0.0
        } else if v <= -1.0 {
            -0.1
        } else if v >= 1.0 {
            0.1
        } else {
            v
        };
        self
    }

    pub fn nddot(mut self, v: f64) -> Self {
        self.nddot = v;
        self
    }

    pub fn bstar(mut self, v: f64) -> Self {
        self.bstar = v;
        self
    }

    /// Radiation term; stored in the second-derivative slot.
    pub fn agom(self, v: f64) -> Self {
        self.nddot(v)
    }

    pub fn element_type(mut self, t: ElementType) -> Self {
        self.element_type = t;
        self
    }

    pub fn element_number(mut self, n: u32) -> Self {
        self.element_number = n % 10_000;
        self
    }

    pub fn inclination(mut self, v: Degree) -> Self {
        self.inclination = in_range(v, 180.0);
        self
    }

    pub fn raan(mut self, v: Degree) -> Self {
        self.raan = in_range(v, 360.0);
        self
    }

    pub fn eccentricity(mut self, v: f64) -> Self {
        self.eccentricity = if v < 0.0 || v.is_nan() {
            0.0
        } else if v >= 1.0 {
            0.99
        } else {
            v
        };
        self
    }

    pub fn arg_perigee(mut self, v: Degree) -> Self {
        self.arg_perigee = in_range(v, 360.0);
        self
    }

    pub fn mean_anomaly(mut self, v: Degree) -> Self {
        self.mean_anomaly = in_range(v, 360.0);
        self
    }

    pub fn mean_motion(mut self, v: RevPerDay) -> Self {
        self.mean_motion = if v.is_nan() { 0.0 } else { v.clamp(0.0, 17.0) };
        self
    }

    pub fn rev_number(mut self, n: u32) -> Self {
        self.rev_number = n % 100_000;
        self
    }

    /// Set the six classical mean elements at once.
    pub fn classical(self, el: &ClassicalElements) -> Self {
        self.inclination(el.inclination)
            .raan(el.raan)
            .eccentricity(el.eccentricity)
            .arg_perigee(el.arg_perigee)
            .mean_anomaly(el.mean_anomaly)
            .mean_motion(el.mean_motion)
    }

    /// Element type the draft will build with.
    pub fn element_type_value(&self) -> ElementType {
        self.element_type
    }

    /// Render the text lines and freeze the draft.
    pub fn build(self) -> ElementSet {
        let mut set = ElementSet {
            object_id: self.object_id,
            intl_id: self.intl_id,
            epoch: self.epoch,
            ndot: self.ndot,
            nddot: self.nddot,
            bstar: self.bstar,
            element_type: self.element_type,
            element_number: self.element_number,
            inclination: self.inclination,
            raan: self.raan,
            eccentricity: self.eccentricity,
            arg_perigee: self.arg_perigee,
            mean_anomaly: self.mean_anomaly,
            mean_motion: self.mean_motion,
            rev_number: self.rev_number,
            line1: String::new(),
            line2: String::new(),
        };
        set.line1 = tle_format::format_line1(&set);
        set.line2 = tle_format::format_line2(&set);
        set
    }
}

impl From<&ElementSet> for ElementSetDraft {
    fn from(set: &ElementSet) -> Self {
        ElementSetDraft {
            object_id: set.object_id.clone(),
            intl_id: set.intl_id.clone(),
            epoch: set.epoch,
            ndot: set.ndot,
            nddot: set.nddot,
            bstar: set.bstar,
            element_type: set.element_type,
            element_number: set.element_number,
            inclination: set.inclination,
            raan: set.raan,
            eccentricity: set.eccentricity,
            arg_perigee: set.arg_perigee,
            mean_anomaly: set.mean_anomaly,
            mean_motion: set.mean_motion,
            rev_number: set.rev_number,
        }
    }
}

#[cfg(test)]
mod test_draft {
    use super::*;

    fn draft() -> ElementSetDraft {
        ElementSetDraft::new("25544", Epoch::from_gregorian_utc_at_midnight(2020, 2, 1))
    }

    #[test]
    fn test_clamps() {
        let set = draft()
            .eccentricity(1.2)
            .mean_motion(25.0)
            .ndot(3.0)
            .inclination(-10.0)
            .raan(725.0)
            .element_number(12345)
            .build();
        assert_eq!(set.eccentricity(), 0.99);
        assert_eq!(set.mean_motion(), 17.0);
        assert_eq!(set.ndot(), 0.1);
        assert_eq!(set.inclination(), 170.0);
        assert_eq!(set.raan(), 5.0);
        assert_eq!(set.element_number(), 2345);

        let set = draft().eccentricity(-0.1).ndot(-2.0).build();
        assert_eq!(set.eccentricity(), 0.0);
        assert_eq!(set.ndot(), -0.1);
    }

    #[test]
    fn test_lines_keep_width_at_grid_extremes() {
        use crate::term_search::WIDE_DRAG_TERMS;

        for bstar in WIDE_DRAG_TERMS.iter().flat_map(|&b| [b, -b]) {
            for ndot in [-1.0, -0.999999999, 0.0, 0.999999999, 1.0, f64::NAN] {
                let set = draft()
                    .bstar(bstar)
                    .ndot(ndot)
                    .agom(bstar)
                    .mean_motion(17.0)
                    .rev_number(99_999)
                    .build();
                assert_eq!(set.line1().len(), 69, "{}", set.line1());
                assert_eq!(set.line2().len(), 69, "{}", set.line2());
                assert_eq!(set.bstar(), bstar);
                assert!(ElementSet::parse(set.line1(), set.line2()).is_ok());
            }
        }

        let set = draft().bstar(3.16e9).ndot(1.0).build();
        assert_eq!(set.ndot(), 0.1);
        assert_eq!(set.line1().get(33..61), Some("+.10000000 +00000-0 +99999+9"));
    }

    #[test]
    fn test_element_type_value() {
        let d = draft();
        assert_eq!(d.element_type_value(), ElementType::Standard);
        let d = d.element_type(ElementType::Extended).agom(0.02);
        assert_eq!(d.element_type_value(), ElementType::Extended);
        assert_eq!(d.build().agom(), Some(0.02));
    }

    #[test]
    fn test_ids_truncated() {
        let set = draft()
            .object_id(" 1234567 ")
            .intl_id("98067A-LONG")
            .build();
        assert_eq!(set.object_id(), "12345");
        assert_eq!(set.intl_id(), "98067A-L");
        assert_eq!(set.line1().len(), 69);
        assert_eq!(set.line2().len(), 69);
    }
}
