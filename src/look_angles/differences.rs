//! # Look-angle differences
//!
//! A [`DifferenceKind`] turns an observed and a predicted look angle into one signed or
//! unsigned scalar. Predicted angles come from any [`CartesianSource`] evaluated at the
//! observation epochs, seen from the observation's own site.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    constants::PROPAGATION_PENALTY,
    ephemeris::CartesianSource,
    look_angles::{compute_look_angle, LookAngleState},
    ref_system::FrameTransform,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DifferenceKind {
    /// Great-circle separation in az/el, degrees
    AzEl,
    /// Great-circle separation in ra/dec, degrees
    RaDec,
    /// Observed minus predicted range, km
    Range,
    /// Observed minus predicted range-rate, km/s, scaled when the signs disagree
    RangeRate { wrong_sign_weight: f64 },
    /// Observed minus predicted range-rate, scaled by 1.1 when either side is below the horizon
    RangeRateAboveHorizon,
}

impl DifferenceKind {
    pub fn diff(&self, observed: &LookAngleState, predicted: &LookAngleState) -> f64 {
        match *self {
            DifferenceKind::AzEl => observed.az_el_separation_deg(predicted),
            DifferenceKind::RaDec => observed.ra_dec_separation_deg(predicted),
            DifferenceKind::Range => observed.range_km - predicted.range_km,
            DifferenceKind::RangeRate { wrong_sign_weight } => {
                let d = observed.range_rate_km_s - predicted.range_rate_km_s;
                if observed.range_rate_km_s * predicted.range_rate_km_s < 0.0 {
                    d * wrong_sign_weight
                } else {
                    d
                }
            }
            DifferenceKind::RangeRateAboveHorizon => {
                let d = observed.range_rate_km_s - predicted.range_rate_km_s;
                if observed.el_deg < 0.0 || predicted.el_deg < 0.0 {
                    d * 1.1
                } else {
                    d
                }
            }
        }
    }
}

/// One difference per observation.
///
/// Observations the source cannot evaluate contribute a fixed large penalty.
pub fn differences(
    observed: &[LookAngleState],
    source: &dyn CartesianSource,
    kind: DifferenceKind,
    frames: &dyn FrameTransform,
) -> Vec<f64> {
    observed
        .iter()
        .map(|obs| match source.state_at(obs.epoch) {
            Some(state) => {
                let predicted = compute_look_angle(&obs.site, &state, source.frame(), frames);
                kind.diff(obs, &predicted)
            }
            None => {
                debug!("no predicted state at {}", obs.epoch);
                PROPAGATION_PENALTY
            }
        })
        .collect()
}

pub fn rmse(
    observed: &[LookAngleState],
    source: &dyn CartesianSource,
    kind: DifferenceKind,
    frames: &dyn FrameTransform,
) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let d = differences(observed, source, kind, frames);
    (d.iter().map(|x| x * x).sum::<f64>() / d.len() as f64).sqrt()
}

/// RMS over several sites, each site weighted by its number of observations.
pub fn rmse_multi_location(
    groups: &[Vec<LookAngleState>],
    source: &dyn CartesianSource,
    kind: DifferenceKind,
    frames: &dyn FrameTransform,
) -> f64 {
    let (sum, total) = groups.iter().fold((0.0, 0.0), |(sum, total), group| {
        let w = group.len() as f64;
        let r = rmse(group, source, kind, frames);
        (sum + w * r * r, total + w)
    });
    if total == 0.0 {
        0.0
    } else {
        (sum / total).sqrt()
    }
}

#[cfg(test)]
mod test_differences {
    use super::*;
    use crate::{
        look_angles::GroundSite, orbit_type::cartesian_state::CartesianState,
        ref_system::{EarthRotationFrames, Frame},
    };
    use approx::assert_relative_eq;
    use hifitime::Epoch;
    use nalgebra::Vector3;

    fn angle(rr: f64, el: f64) -> LookAngleState {
        let mut la = LookAngleState::from_az_el(
            GroundSite::new(0.0, 0.0, 0.0),
            Epoch::from_gregorian_utc_at_midnight(2023, 1, 1),
            10.0,
            el,
        );
        la.range_rate_km_s = rr;
        la
    }

    #[test]
    fn test_range_rate_weights() {
        let k = DifferenceKind::RangeRate {
            wrong_sign_weight: 3.0,
        };
        assert_relative_eq!(k.diff(&angle(1.0, 10.0), &angle(0.5, 10.0)), 0.5);
        assert_relative_eq!(k.diff(&angle(1.0, 10.0), &angle(-1.0, 10.0)), 6.0);

        let k = DifferenceKind::RangeRateAboveHorizon;
        assert_relative_eq!(k.diff(&angle(1.0, 10.0), &angle(0.0, 10.0)), 1.0);
        assert_relative_eq!(k.diff(&angle(1.0, -1.0), &angle(0.0, 10.0)), 1.1);
    }

    struct Fixed(CartesianState);

    impl CartesianSource for Fixed {
        fn state_at(&self, epoch: Epoch) -> Option<CartesianState> {
            Some(CartesianState::new(epoch, self.0.position, self.0.velocity))
        }

        fn frame(&self) -> Frame {
            Frame::Ecef
        }
    }

    #[test]
    fn test_self_consistent_rmse() {
        let frames = EarthRotationFrames;
        let site = GroundSite::new(0.0, 0.0, 0.0);
        let t = Epoch::from_gregorian_utc_at_midnight(2023, 1, 1);
        let state = CartesianState::new(
            t,
            Vector3::new(7000.0, 300.0, 100.0),
            Vector3::new(0.0, 7.0, 1.0),
        );
        let source = Fixed(state);
        let obs = vec![compute_look_angle(&site, &state, Frame::Ecef, &frames)];

        for kind in [
            DifferenceKind::AzEl,
            DifferenceKind::RaDec,
            DifferenceKind::Range,
            DifferenceKind::RangeRateAboveHorizon,
        ] {
            assert_relative_eq!(rmse(&obs, &source, kind, &frames), 0.0, epsilon = 1e-9);
        }
        assert_eq!(rmse_multi_location(&[], &source, DifferenceKind::AzEl, &frames), 0.0);
    }
}
