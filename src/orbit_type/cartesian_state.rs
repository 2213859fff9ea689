//! # Cartesian state vectors
//!
//! A [`CartesianState`] pairs an epoch with a position (km) and a velocity (km/s). The frame
//! is implicit; collections such as
//! [`ObservationSet`](crate::observations::ObservationSet) carry the frame tag.

use std::cmp::Ordering;

use hifitime::Epoch;
use nalgebra::{Matrix3, Vector3};

use crate::constants::{Kilometer, Radian};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartesianState {
    pub epoch: Epoch,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

impl CartesianState {
    pub fn new(epoch: Epoch, position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self {
            epoch,
            position,
            velocity,
        }
    }

    /// Distance to the origin of the frame.
    pub fn radius(&self) -> Kilometer {
        self.position.norm()
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    /// Euclidean distance between the positions of two states.
    pub fn distance(&self, other: &CartesianState) -> Kilometer {
        (self.position - other.position).norm()
    }

    /// Angle between the two position vectors.
    pub fn angle_between(&self, other: &CartesianState) -> Radian {
        self.position.angle(&other.position)
    }

    /// Radial / in-track / cross-track triad of this state.
    ///
    /// Rows of the returned matrix are the unit R, I and C axes expressed in the frame of the
    /// state, so `ric_matrix() * dx` projects a frame vector onto the triad.
    ///
    /// Return
    /// ------
    /// * `None` if the position or the angular momentum vanishes.
    pub fn ric_matrix(&self) -> Option<Matrix3<f64>> {
        let r = self.position.try_normalize(0.0)?;
        let c = self.position.cross(&self.velocity).try_normalize(0.0)?;
        let i = c.cross(&r);
        Some(Matrix3::from_rows(&[r.transpose(), i.transpose(), c.transpose()]))
    }

    /// Position of `other` relative to this state, in this state's RIC triad.
    pub fn to_ric(&self, other: &CartesianState) -> Option<Vector3<f64>> {
        Some(self.ric_matrix()? * (other.position - self.position))
    }
}

impl PartialOrd for CartesianState {
    /// Orders by epoch, ties broken by the position magnitude.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.epoch.partial_cmp(&other.epoch)? {
            Ordering::Equal => self.radius().partial_cmp(&other.radius()),
            ord => Some(ord),
        }
    }
}

#[cfg(test)]
mod test_cartesian_state {
    use super::*;
    use approx::assert_relative_eq;

    fn state(x: f64, y: f64) -> CartesianState {
        CartesianState::new(
            Epoch::from_mjd_utc(60000.0),
            Vector3::new(x, y, 0.0),
            Vector3::new(0.0, 7.5, 0.0),
        )
    }

    #[test]
    fn test_distance_and_angle() {
        let a = state(7000.0, 0.0);
        let b = state(0.0, 7000.0);
        assert_relative_eq!(a.distance(&b), 7000.0 * 2f64.sqrt(), epsilon = 1e-9);
        assert_relative_eq!(a.angle_between(&b), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_ric() {
        let a = state(7000.0, 0.0);
        let mut b = a;
        b.position += Vector3::new(1.0, 2.0, 3.0);
        let ric = a.to_ric(&b).unwrap();
        assert_relative_eq!(ric, Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-12);
    }

    #[test]
    fn test_ordering() {
        let a = state(7000.0, 0.0);
        let b = state(7001.0, 0.0);
        assert!(a < b);

        let mut later = state(6000.0, 0.0);
        later.epoch = Epoch::from_mjd_utc(60001.0);
        assert!(b < later);
    }
}
