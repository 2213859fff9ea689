//! # Initial orbit determination
//!
//! Seeds the element-set fit from Cartesian observations alone.
//!
//! ## Pipeline overview
//!
//! 1. **Sample selection**
//!    [`estimate_best_step`](crate::initial_orbit_determination::gibbs::estimate_best_step)
//!    chooses a stride so the three samples `first`, `first + step`, `first + 2·step` are
//!    separated by at least a given number of minutes (15 by default in an OD task).
//!
//! 2. **Gibbs velocity**
//!    [`gibbs`](crate::initial_orbit_determination::gibbs::gibbs) recovers the velocity at the
//!    middle sample from the three positions.
//!
//! 3. **Element set**
//!    [`cart_to_element_set`](crate::initial_orbit_determination::cart_to_elements::cart_to_element_set)
//!    iterates on the mean elements until the propagated state reproduces the Gibbs state at
//!    its own epoch.
//!
//! [`shift_epoch`](crate::initial_orbit_determination::cart_to_elements::shift_epoch) re-uses
//! step 3 to move an existing set to another epoch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tlefit::element_set::ElementType;
//! use tlefit::initial_orbit_determination::{cart_to_elements::cart_to_element_set, gibbs};
//! use tlefit::od_env::OdEnv;
//!
//! # let track: Vec<tlefit::orbit_type::cartesian_state::CartesianState> = vec![];
//! let env = OdEnv::new();
//! let step = gibbs::estimate_best_step(&track, 15.0).unwrap_or(1);
//! let seed = gibbs::gibbs(&track[0], &track[step], &track[2 * step], env.mu)?;
//! let set = cart_to_element_set(&seed, "99999", ElementType::Standard, &env)?;
//! # Ok::<(), tlefit::tlefit_errors::TleFitError>(())
//! ```

/// Cartesian state to element set by direct iteration.
pub mod cart_to_elements;

/// Gibbs method and sample stride selection.
pub mod gibbs;
