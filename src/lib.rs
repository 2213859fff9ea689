pub mod constants;
pub mod downsample;
pub mod element_set;
pub mod ephemeris;
pub mod fit;
pub mod initial_orbit_determination;
pub mod kepler;
pub mod look_angles;
pub mod observations;
pub mod od_env;
pub mod od_task;
pub mod orbit_type;
pub mod propagator;
pub mod readers;
pub mod ref_system;
pub mod term_search;
pub mod time;
pub mod tlefit_errors;
