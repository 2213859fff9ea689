//! # OdEnv: shared services for orbit determination
//!
//! [`OdEnv`] gathers the collaborators every pipeline stage needs:
//!
//! 1. a [`Propagator`] (by default the [`ElementTypeDispatch`] over the built-in analytic
//!    model),
//! 2. a [`FrameTransform`] service (by default [`EarthRotationFrames`]),
//! 3. the gravitational parameter used for Cartesian ↔ Keplerian conversions.
//!
//! The environment is built **once**, eagerly, and is immutable afterwards. It is passed
//! by reference (`&OdEnv`) through the fit engine and shared as `Arc<OdEnv>` with the task
//! runner's workers.
//!
//! ```rust, no_run
//! use std::sync::Arc;
//! use tlefit::od_env::OdEnv;
//! use tlefit::propagator::analytic::SecularJ2Propagator;
//! use tlefit::ref_system::EarthRotationFrames;
//!
//! let env = OdEnv::new();
//! let custom = OdEnv::with_services(
//!     Arc::new(SecularJ2Propagator::default()),
//!     Arc::new(EarthRotationFrames),
//! );
//! ```

use std::{fmt, sync::Arc};

use hifitime::Epoch;

use crate::{
    constants::GM_EARTH,
    element_set::ElementSet,
    observations::ObservationSet,
    orbit_type::cartesian_state::CartesianState,
    propagator::{ElementTypeDispatch, Propagator},
    ref_system::{EarthRotationFrames, Frame, FrameTransform},
    tlefit_errors::PropagationError,
};

#[derive(Clone)]
pub struct OdEnv {
    propagator: Arc<dyn Propagator>,
    frames: Arc<dyn FrameTransform>,
    pub mu: f64,
}

impl OdEnv {
    /// Environment with the built-in propagator and frame services.
    pub fn new() -> Self {
        OdEnv::with_services(
            Arc::new(ElementTypeDispatch::default()),
            Arc::new(EarthRotationFrames),
        )
    }

    pub fn with_services(
        propagator: Arc<dyn Propagator>,
        frames: Arc<dyn FrameTransform>,
    ) -> Self {
        OdEnv {
            propagator,
            frames,
            mu: GM_EARTH,
        }
    }

    pub fn propagator(&self) -> &dyn Propagator {
        self.propagator.as_ref()
    }

    pub fn frames(&self) -> &dyn FrameTransform {
        self.frames.as_ref()
    }

    /// TEME state of an element set at an instant.
    pub fn propagate(
        &self,
        set: &ElementSet,
        at: Epoch,
    ) -> Result<CartesianState, PropagationError> {
        self.propagator.propagate_state(set, at)
    }

    pub fn transform(&self, state: &CartesianState, from: Frame, to: Frame) -> CartesianState {
        self.frames.transform(state, from, to)
    }

    /// TEME view of an observation set.
    pub fn teme_states(&self, observations: &ObservationSet) -> Vec<CartesianState> {
        observations.teme_states(self.frames())
    }
}

impl Default for OdEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OdEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdEnv").field("mu", &self.mu).finish()
    }
}
