use crate::{
    orbit_type::cartesian_state::CartesianState, time::minutes_between,
    tlefit_errors::TleFitError,
};

/// Smallest `|D|`, `|N|` accepted (km², km³).
const DEGENERATE_EPS: f64 = 1e-9;

/// Velocity at the middle of three position samples (Gibbs method).
///
/// With `Z₁₂ = r₁×r₂`, `Z₂₃ = r₂×r₃`, `Z₃₁ = r₃×r₁`:
///
/// ```text
/// D = Z₁₂ + Z₂₃ + Z₃₁
/// N = |r₁|·Z₂₃ + |r₂|·Z₃₁ + |r₃|·Z₁₂
/// S = (|r₂| − |r₃|)·r₁ + (|r₃| − |r₁|)·r₂ + (|r₁| − |r₂|)·r₃
/// v₂ = sqrt(μ / (|N|·|D|)) · (D×r₂ / |r₂| + S)
/// ```
///
/// Arguments
/// ---------
/// * `s1`, `s2`, `s3`: samples in time order; only positions are read.
/// * `mu`: gravitational parameter (km³/s²).
///
/// Return
/// ------
/// * The state at `s2`'s epoch with `s2`'s position and the Gibbs velocity, or
///   `Err(TleFitError::DegenerateGeometry)` when the positions are collinear or the
///   construction collapses.
///
/// The method assumes the samples are coplanar and well separated; it does not check the
/// coplanarity itself.
pub fn gibbs(
    s1: &CartesianState,
    s2: &CartesianState,
    s3: &CartesianState,
    mu: f64,
) -> Result<CartesianState, TleFitError> {
    let (r1, r2, r3) = (s1.position, s2.position, s3.position);
    let (r1mag, r2mag, r3mag) = (r1.norm(), r2.norm(), r3.norm());

    let z12 = r1.cross(&r2);
    let z23 = r2.cross(&r3);
    let z31 = r3.cross(&r1);

    let d = z12 + z23 + z31;
    let n = z23 * r1mag + z31 * r2mag + z12 * r3mag;
    let s = r1 * (r2mag - r3mag) + r2 * (r3mag - r1mag) + r3 * (r1mag - r2mag);

    let (dmag, nmag) = (d.norm(), n.norm());
    if !(dmag > DEGENERATE_EPS && nmag > DEGENERATE_EPS) || r2mag == 0.0 {
        return Err(TleFitError::DegenerateGeometry(format!(
            "Gibbs: |D| = {dmag:.3e}, |N| = {nmag:.3e}"
        )));
    }

    let c = (mu / (nmag * dmag)).sqrt();
    let velocity = d.cross(&r2) * (c / r2mag) + s * c;

    Ok(CartesianState::new(s2.epoch, r2, velocity))
}

/// Sample stride for the Gibbs triplet `states[0]`, `states[step]`, `states[2·step]`.
///
/// Return
/// ------
/// * `None` for fewer than three states,
/// * `Some(1)` for fewer than six,
/// * otherwise the smallest stride whose first interval spans at least `minutes`, capped so
///   that `2·step < len`.
pub fn estimate_best_step(states: &[CartesianState], minutes: f64) -> Option<usize> {
    let size = states.len();
    if size < 3 {
        return None;
    }
    if size < 6 {
        return Some(1);
    }

    let t1 = states[0].epoch;
    let mut step = 1;
    let mut dt = minutes_between(&t1, &states[step].epoch);
    while dt < minutes && step < size / 2 {
        step += 1;
        dt = minutes_between(&t1, &states[step].epoch);
    }

    if 2 * step >= size {
        step = size / 2 - 1;
    }
    Some(step)
}

#[cfg(test)]
mod test_gibbs {
    use super::*;
    use crate::{constants::GM_EARTH, time::add_seconds};
    use approx::assert_relative_eq;
    use hifitime::Epoch;
    use nalgebra::Vector3;

    /// Circular orbit of radius `r` in a plane inclined by 30° about x.
    fn circular(r: f64, t: f64) -> CartesianState {
        let w = (GM_EARTH / r.powi(3)).sqrt();
        let (s, c) = (w * t).sin_cos();
        let (si, ci) = 30f64.to_radians().sin_cos();
        let v = r * w;
        CartesianState::new(
            add_seconds(&Epoch::from_mjd_utc(59000.0), t),
            Vector3::new(r * c, r * s * ci, r * s * si),
            Vector3::new(-v * s, v * c * ci, v * c * si),
        )
    }

    #[test]
    fn test_circular_velocity() {
        let (s1, s2, s3) = (
            circular(7000.0, 0.0),
            circular(7000.0, 600.0),
            circular(7000.0, 1200.0),
        );
        let out = gibbs(&s1, &s2, &s3, GM_EARTH).unwrap();
        assert_eq!(out.epoch, s2.epoch);
        assert_relative_eq!(out.velocity, s2.velocity, epsilon = 1e-9);
    }

    #[test]
    fn test_collinear() {
        let t = Epoch::from_mjd_utc(59000.0);
        let s = |x: f64| CartesianState::new(t, Vector3::new(x, 0.0, 0.0), Vector3::zeros());
        let err = gibbs(&s(7000.0), &s(7100.0), &s(7200.0), GM_EARTH).unwrap_err();
        assert!(matches!(err, TleFitError::DegenerateGeometry(_)));
    }

    #[test]
    fn test_best_step() {
        let track: Vec<_> = (0..40).map(|i| circular(7000.0, i as f64 * 60.0)).collect();
        assert_eq!(estimate_best_step(&track[..2], 15.0), None);
        assert_eq!(estimate_best_step(&track[..5], 15.0), Some(1));
        assert_eq!(estimate_best_step(&track, 15.0), Some(15));
        // 10 one-minute samples cannot give 15 minutes: capped at len/2 - 1
        assert_eq!(estimate_best_step(&track[..10], 15.0), Some(4));
    }
}
