//! # Observation sets
//!
//! An [`ObservationSet`] is a time-ordered track of Cartesian states tagged with the frame
//! they are expressed in. The fit engine works in TEME; [`ObservationSet::teme_states`]
//! returns the normalised view.

use hifitime::Epoch;

use crate::{
    orbit_type::cartesian_state::CartesianState,
    ref_system::{Frame, FrameTransform},
    time::seconds_between,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    frame: Frame,
    states: Vec<CartesianState>,
}

impl ObservationSet {
    /// Build a set; states are sorted by epoch (ties by radius).
    pub fn new(frame: Frame, mut states: Vec<CartesianState>) -> Self {
        states.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        ObservationSet { frame, states }
    }

    pub fn frame(&self) -> Frame {
        self.frame
    }

    pub fn states(&self) -> &[CartesianState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn first(&self) -> Option<&CartesianState> {
        self.states.first()
    }

    pub fn last(&self) -> Option<&CartesianState> {
        self.states.last()
    }

    /// Epochs of the first and last states.
    pub fn time_range(&self) -> Option<(Epoch, Epoch)> {
        Some((self.first()?.epoch, self.last()?.epoch))
    }

    /// Time covered by the track, in seconds (zero for fewer than two states).
    pub fn span_seconds(&self) -> f64 {
        self.time_range()
            .map(|(a, b)| seconds_between(&a, &b))
            .unwrap_or(0.0)
    }

    /// The states re-expressed in TEME.
    pub fn teme_states(&self, frames: &dyn FrameTransform) -> Vec<CartesianState> {
        if self.frame == Frame::Teme {
            return self.states.clone();
        }
        self.states
            .iter()
            .map(|s| frames.transform(s, self.frame, Frame::Teme))
            .collect()
    }
}
