#![allow(dead_code)]

use hifitime::Epoch;
use tlefit::element_set::ElementSet;
use tlefit::od_env::OdEnv;
use tlefit::orbit_type::cartesian_state::CartesianState;
use tlefit::time::add_seconds;

/// Sun-synchronous LEO with a small drag term
pub const LEO_L1: &str = "1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990";
pub const LEO_L2: &str = "2 41085 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040";

/// ISS-like orbit
pub const ISS_L1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
pub const ISS_L2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";

pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

pub fn leo_set() -> ElementSet {
    ElementSet::parse(LEO_L1, LEO_L2).unwrap()
}

pub fn iss_set() -> ElementSet {
    ElementSet::parse(ISS_L1, ISS_L2).unwrap()
}

/// `count` TEME states of `set`, `step_s` seconds apart from `start`.
pub fn track(env: &OdEnv, set: &ElementSet, start: Epoch, step_s: f64, count: usize) -> Vec<CartesianState> {
    (0..count)
        .map(|k| env.propagate(set, add_seconds(&start, step_s * k as f64)).unwrap())
        .collect()
}

/// Largest position difference between `set` and `states`.
pub fn max_position_error(env: &OdEnv, set: &ElementSet, states: &[CartesianState]) -> f64 {
    states
        .iter()
        .map(|s| env.propagate(set, s.epoch).unwrap().distance(s))
        .fold(0.0, f64::max)
}
