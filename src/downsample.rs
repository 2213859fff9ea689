//! # Downsampling of long tracks
//!
//! Builds a bounded subset of a track that keeps its time coverage: samples are interleaved
//! from the start, the middle and the end of the track, then the first and last
//! observations are repeated. The repetition stands in for observation weights, which the
//! fit engine does not have; the track ends are what constrains drag and radiation terms.

use crate::orbit_type::cartesian_state::CartesianState;

/// Reduce `states` to about `max` entries.
///
/// With `step = max / 3` and `mid = (len - step) / 2`, the output holds, for
/// `i < step`, the triplet `states[i]`, `states[mid + i]`, `states[len - 1 - i]`, followed by
/// `step / 5` triplets `states[i]`, `states[len - 1]`, `states[len - 1]`.
///
/// Return
/// ------
/// * a copy of `states` when `len <= max`.
pub fn downsample(states: &[CartesianState], max: usize) -> Vec<CartesianState> {
    let size = states.len();
    if size <= max {
        return states.to_vec();
    }

    let step = max / 3;
    let mid = (size - step) / 2;
    let mut out = Vec::with_capacity(step * 3 + (step / 5) * 3);

    for i in 0..step {
        out.push(states[i]);
        out.push(states[mid + i]);
        out.push(states[size - 1 - i]);
    }

    for i in 0..step / 5 {
        out.push(states[i]);
        out.push(states[size - 1]);
        out.push(states[size - 1]);
    }

    out
}

#[cfg(test)]
mod test_downsample {
    use super::*;
    use crate::time::add_seconds;
    use hifitime::Epoch;
    use nalgebra::Vector3;

    fn track(n: usize) -> Vec<CartesianState> {
        let t0 = Epoch::from_mjd_utc(59000.0);
        (0..n)
            .map(|i| {
                CartesianState::new(
                    add_seconds(&t0, i as f64 * 10.0),
                    Vector3::new(7000.0 + i as f64, 0.0, 0.0),
                    Vector3::zeros(),
                )
            })
            .collect()
    }

    #[test]
    fn test_small_track_unchanged() {
        let t = track(40);
        assert_eq!(downsample(&t, 100), t);
    }

    #[test]
    fn test_layout() {
        let t = track(1000);
        let d = downsample(&t, 100);
        // 33 triplets + 6 end-weight triplets
        assert_eq!(d.len(), 33 * 3 + 6 * 3);
        assert_eq!(d[0], t[0]);
        assert_eq!(d[1], t[(1000 - 33) / 2]);
        assert_eq!(d[2], t[999]);
        assert_eq!(d[5], t[998]);
        assert_eq!(d[33 * 3], t[0]);
        assert_eq!(d[33 * 3 + 1], t[999]);
        assert_eq!(d[d.len() - 1], t[999]);
    }
}
