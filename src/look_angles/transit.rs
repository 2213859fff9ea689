//! # Transits
//!
//! A transit is one pass of a satellite above a minimum elevation, described by three
//! look angles: acquisition of signal (AOS), time of closest approach (TCA) and loss of
//! signal (LOS).
//!
//! Detection scans a time-ordered list of look angles for sign changes of
//! `elevation − min_elevation` (AOS/LOS) and of the range-rate (TCA). Each bracket is
//! refined on an interpolated ephemeris: the bracket is resampled every second (every
//! twentieth of its width once it is a second or less) and the first sign change found is
//! refined again, until the bracket is at most 50 ms wide.

use hifitime::Epoch;
use itertools::Itertools;
use log::debug;

use crate::{
    constants::Degree,
    element_set::ElementSet,
    ephemeris::{states_between, CartesianSource, Ephemerides, PropagatedSource},
    look_angles::{compute_look_angles, look_angles_from_source, GroundSite, LookAngleState},
    od_env::OdEnv,
    orbit_type::cartesian_state::CartesianState,
    ref_system::{Frame, FrameTransform},
    time::seconds_between,
};

/// Brackets at most this wide (seconds) are not refined further
const ROOT_TOLERANCE_S: f64 = 0.05;

/// Sampling step (seconds) used before scanning a propagated element set
const ELEMENT_SET_STEP_S: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transit {
    aos: LookAngleState,
    tca: LookAngleState,
    los: LookAngleState,
}

impl Transit {
    pub fn new(aos: LookAngleState, tca: LookAngleState, los: LookAngleState) -> Self {
        Transit { aos, tca, los }
    }

    pub fn aos(&self) -> &LookAngleState {
        &self.aos
    }

    pub fn tca(&self) -> &LookAngleState {
        &self.tca
    }

    pub fn los(&self) -> &LookAngleState {
        &self.los
    }

    pub fn start(&self) -> Epoch {
        self.aos.epoch
    }

    pub fn stop(&self) -> Epoch {
        self.los.epoch
    }

    pub fn tca_epoch(&self) -> Epoch {
        self.tca.epoch
    }

    pub fn duration_s(&self) -> f64 {
        seconds_between(&self.aos.epoch, &self.los.epoch)
    }
}

/// Transit whose LOS has not been seen yet.
struct OpenTransit {
    aos: LookAngleState,
    tca: Option<LookAngleState>,
}

/// Closest-range endpoint, used when no range-rate root lies inside the pass.
fn closest_endpoint(aos: &LookAngleState, los: &LookAngleState) -> LookAngleState {
    if los.range_km < aos.range_km {
        *los
    } else {
        *aos
    }
}

struct RootFinder<'a> {
    site: &'a GroundSite,
    eph: &'a Ephemerides,
    frames: &'a dyn FrameTransform,
}

impl RootFinder<'_> {
    /// Refine a sign change of `f` within `[t1, t2]`.
    ///
    /// Return
    /// ------
    /// * The look angle closing the smallest bracket found, `None` if the resampled bracket
    ///   shows no sign change.
    fn refine<F>(&self, t1: Epoch, t2: Epoch, f: &F) -> Option<LookAngleState>
    where
        F: Fn(&LookAngleState) -> f64,
    {
        let width = seconds_between(&t1, &t2);
        let step = if width > 1.0 { 1.0 } else { width / 20.0 };
        let dig_deeper = width > ROOT_TOLERANCE_S;

        let samples = look_angles_from_source(self.site, self.eph, t1, t2, step, self.frames);
        let (a, b) = samples
            .iter()
            .tuple_windows()
            .find(|(a, b)| f(a) * f(b) <= 0.0)?;

        if dig_deeper {
            self.refine(a.epoch, b.epoch, f).or(Some(*b))
        } else {
            Some(*b)
        }
    }
}

/// Passes of a set of states over a site.
///
/// Arguments
/// ---------
/// * `site`: observer.
/// * `states`: satellite states in `frame`, any order; they are interpolated for the
///   refinement, so consecutive samples should be close (tens of seconds).
/// * `frame`: frame of `states`.
/// * `min_el_deg`: elevation threshold.
/// * `frames`: frame-transform service.
///
/// Return
/// ------
/// * The transits in time order. A pass already in progress at the first state starts
///   there; a pass still in progress at the last state ends there.
pub fn compute_transits(
    site: &GroundSite,
    states: &[CartesianState],
    frame: Frame,
    min_el_deg: Degree,
    frames: &dyn FrameTransform,
) -> Vec<Transit> {
    let Some(eph) = Ephemerides::new(states.to_vec(), frame) else {
        return Vec::new();
    };

    let mut sorted = states.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let angles = compute_look_angles(site, &sorted, frame, frames);

    let finder = RootFinder {
        site,
        eph: &eph,
        frames,
    };
    let above = |la: &LookAngleState| la.el_deg - min_el_deg;
    let range_rate = |la: &LookAngleState| la.range_rate_km_s;

    let mut transits = Vec::new();
    let mut open = angles
        .first()
        .filter(|la| above(la) >= 0.0)
        .map(|la| OpenTransit { aos: *la, tca: None });

    for (la1, la2) in angles.iter().tuple_windows() {
        if above(la1) * above(la2) <= 0.0 {
            let event = finder.refine(la1.epoch, la2.epoch, &above).unwrap_or(*la2);

            match open.take() {
                None => {
                    open = Some(OpenTransit {
                        aos: event,
                        tca: None,
                    })
                }
                Some(pass) => {
                    let tca = pass
                        .tca
                        .or_else(|| finder.refine(pass.aos.epoch, event.epoch, &range_rate))
                        .unwrap_or_else(|| closest_endpoint(&pass.aos, &event));
                    transits.push(Transit::new(pass.aos, tca, event));
                }
            }
        } else if let Some(pass) = open.as_mut() {
            if range_rate(la1) * range_rate(la2) <= 0.0 {
                pass.tca = finder.refine(la1.epoch, la2.epoch, &range_rate).or(pass.tca);
            }
        }
    }

    if let (Some(pass), Some(last)) = (open, angles.last()) {
        let tca = pass
            .tca
            .unwrap_or_else(|| closest_endpoint(&pass.aos, last));
        transits.push(Transit::new(pass.aos, tca, *last));
    }

    debug!(
        "{} transits over ({}, {})",
        transits.len(),
        site.lat_deg,
        site.lon_deg
    );
    transits
}

/// Passes of an element set between `t1` and `t2`, sampled every 30 s before the scan.
pub fn compute_transits_for_elements(
    site: &GroundSite,
    set: &ElementSet,
    t1: Epoch,
    t2: Epoch,
    min_el_deg: Degree,
    env: &OdEnv,
) -> Vec<Transit> {
    let source = PropagatedSource::new(set, env);
    let states = states_between(&source, t1, t2, ELEMENT_SET_STEP_S);
    compute_transits(site, &states, source.frame(), min_el_deg, env.frames())
}
