//! # Propagator port
//!
//! The fit and visibility engines never propagate orbits themselves: they call a
//! [`Propagator`], which maps an [`ElementSet`] and an instant to a TEME position (km) and
//! velocity (km/s), or to a [`PropagationError`].
//!
//! [`ElementTypeDispatch`] picks the implementation matching the set's
//! [`ElementType`](crate::element_set::ElementType), so callers treat both models uniformly.
//! [`analytic::SecularJ2Propagator`] is the built-in model used when no external propagator
//! is plugged in.

use std::sync::Arc;

use hifitime::Epoch;
use nalgebra::Vector3;

use crate::{
    element_set::{ElementSet, ElementType},
    orbit_type::cartesian_state::CartesianState,
    tlefit_errors::PropagationError,
};

/// Built-in closed-form propagator.
pub mod analytic;

pub trait Propagator: Send + Sync {
    /// Position and velocity of `set` at `at`, in TEME.
    fn propagate(
        &self,
        set: &ElementSet,
        at: Epoch,
    ) -> Result<(Vector3<f64>, Vector3<f64>), PropagationError>;

    /// Same as [`Propagator::propagate`], packed into a [`CartesianState`].
    fn propagate_state(
        &self,
        set: &ElementSet,
        at: Epoch,
    ) -> Result<CartesianState, PropagationError> {
        let (position, velocity) = self.propagate(set, at)?;
        Ok(CartesianState::new(at, position, velocity))
    }
}

/// Routes each element set to the propagator of its element type.
#[derive(Clone)]
pub struct ElementTypeDispatch {
    pub standard: Arc<dyn Propagator>,
    pub extended: Arc<dyn Propagator>,
}

impl ElementTypeDispatch {
    pub fn new(standard: Arc<dyn Propagator>, extended: Arc<dyn Propagator>) -> Self {
        ElementTypeDispatch { standard, extended }
    }
}

impl Default for ElementTypeDispatch {
    fn default() -> Self {
        let analytic = Arc::new(analytic::SecularJ2Propagator::default());
        ElementTypeDispatch::new(analytic.clone(), analytic)
    }
}

impl Propagator for ElementTypeDispatch {
    fn propagate(
        &self,
        set: &ElementSet,
        at: Epoch,
    ) -> Result<(Vector3<f64>, Vector3<f64>), PropagationError> {
        match set.element_type() {
            ElementType::Standard => self.standard.propagate(set, at),
            ElementType::Extended => self.extended.propagate(set, at),
        }
    }
}
