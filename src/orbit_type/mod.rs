//! # Orbit state representations
//!
//! - [`cartesian_state`](crate::orbit_type::cartesian_state): position/velocity at an epoch.
//! - [`keplerian_state`](crate::orbit_type::keplerian_state): classical elements with the
//!   orbit-class dependent angles.
//! - [`equinoctial_element`](crate::orbit_type::equinoctial_element): the singularity-free
//!   parameters the fit engine iterates on.
//!
//! The [`OrbitState`] enum wraps the representations an orbit determination can return.

use hifitime::Epoch;
use nalgebra::DMatrix;

use crate::{
    element_set::ElementSet,
    orbit_type::{cartesian_state::CartesianState, keplerian_state::KeplerianState},
};

/// Position/velocity state vectors.
pub mod cartesian_state;

/// Equinoctal parameters and classical mean elements.
pub mod equinoctial_element;

/// Classical Keplerian states and the Cartesian conversions.
pub mod keplerian_state;

/// Representation carried by an [`OrbitState`].
#[derive(Debug, Clone, PartialEq)]
pub enum OrbitRepresentation {
    ElementSet(ElementSet),
    Cartesian(CartesianState),
    Keplerian(KeplerianState),
}

/// Result of an orbit determination.
///
/// Built once by the task that produced it and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitState {
    pub representation: OrbitRepresentation,
    pub epoch: Epoch,
    /// Covariance of the fitted parameters, when it could be estimated.
    pub covariance: Option<DMatrix<f64>>,
    pub rms: f64,
    pub iterations: usize,
}

impl OrbitState {
    pub fn from_element_set(set: ElementSet, rms: f64, iterations: usize) -> Self {
        OrbitState {
            epoch: set.epoch,
            representation: OrbitRepresentation::ElementSet(set),
            covariance: None,
            rms,
            iterations,
        }
    }

    pub fn with_covariance(mut self, covariance: Option<DMatrix<f64>>) -> Self {
        self.covariance = covariance;
        self
    }

    pub fn element_set(&self) -> Option<&ElementSet> {
        match &self.representation {
            OrbitRepresentation::ElementSet(set) => Some(set),
            _ => None,
        }
    }
}
