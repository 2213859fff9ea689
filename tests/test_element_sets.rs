mod common;

use approx::assert_relative_eq;
use tlefit::constants::GM_EARTH;
use tlefit::downsample::downsample;
use tlefit::element_set::{ElementSet, ElementType};
use tlefit::od_env::OdEnv;
use tlefit::orbit_type::keplerian_state::KeplerianState;
use tlefit::time::add_seconds;

use crate::common::{iss_set, track, ISS_L1};

#[test]
fn test_iss_lines_round_trip() {
    let set = iss_set();
    assert_eq!(set.object_id(), "25544");
    assert_eq!(set.element_type(), ElementType::Standard);
    assert_relative_eq!(set.ndot(), -2.182e-5, epsilon = 1e-15);
    assert_eq!(set.nddot(), 0.0);
    assert_eq!(set.element_number(), 292);

    // zero-padded angles, signed implied decimals, checksum '0'
    assert!(set.line1().starts_with("1 25544U 98067A   08264.51782528 -.00002182 +00000-0 -11606-4 0  292"));
    assert_eq!(
        set.line2(),
        "2 25544 051.6416 247.4627 0006703 130.5360 325.0288 15.72125391563530"
    );
    assert_ne!(set.line1(), ISS_L1);
    assert_eq!(format!("{set}"), format!("{}\n{}", set.line1(), set.line2()));

    let again = ElementSet::parse(set.line1(), set.line2()).unwrap();
    assert_eq!(again.line1(), set.line1());
    assert_eq!(again.line2(), set.line2());
    assert_eq!(again.epoch(), set.epoch());
}

#[test]
fn test_propagated_state_matches_elements() {
    let env = OdEnv::new();
    let set = iss_set();
    let cart = env.propagate(&set, set.epoch()).unwrap();
    let kep = KeplerianState::from_cartesian(&cart, GM_EARTH).unwrap();

    assert_relative_eq!(kep.mean_motion, set.mean_motion(), max_relative = 1e-10);
    assert_relative_eq!(kep.eccentricity, set.eccentricity(), epsilon = 1e-10);
    assert_relative_eq!(kep.inclination, set.inclination(), epsilon = 1e-9);

    let back = kep.to_cartesian(GM_EARTH);
    assert!(back.distance(&cart) < 1e-6);
}

#[test]
fn test_downsampled_track_keeps_ends() {
    let env = OdEnv::new();
    let set = iss_set();
    let states = track(&env, &set, set.epoch(), 10.0, 1500);

    let small = downsample(&states, 100);
    assert_eq!(small.len(), 33 * 3 + 6 * 3);
    assert!(small.iter().any(|s| s.epoch == states[0].epoch));
    assert_eq!(
        small.iter().filter(|s| s.epoch == states[1499].epoch).count(),
        1 + 2 * 6
    );
    assert!(small
        .iter()
        .all(|s| s.epoch <= add_seconds(&set.epoch(), 14_990.0)));
}
