//! # Cartesian sources
//!
//! A [`CartesianSource`] yields a state at any requested instant of its validity span.
//! Two sources are provided:
//!
//! * [`Ephemerides`] – a table of states interpolated with a 6-point Hermite scheme
//!   (positions from positions and velocities, velocities by Lagrange interpolation of the
//!   tabulated velocities),
//! * [`PropagatedSource`] – an element set run through the environment's propagator.
//!
//! Both are used by the look-angle engine to refine pass events at arbitrary instants.
//!
//! Track helpers: [`filter_states`] keeps a time window, [`closest_to_epoch`] picks the
//! state nearest an instant, and [`previous_revolutions`] samples the revolutions leading
//! up to an element-set epoch, the usual input of a refit.

use hifitime::Epoch;
use log::debug;
use nalgebra::Vector3;

use crate::{
    constants::SECONDS_PER_DAY,
    element_set::ElementSet,
    od_env::OdEnv,
    orbit_type::cartesian_state::CartesianState,
    ref_system::Frame,
    time::{add_seconds, seconds_between},
};

/// Number of table entries used by one interpolation
const HERMITE_POINTS: usize = 6;

/// Mean-motion scale of [`previous_revolutions`]; the sampled span is 1/0.95 periods per rev.
const REVOLUTION_MARGIN: f64 = 0.95;

pub trait CartesianSource {
    /// State at `epoch`, `None` outside the span of the source.
    fn state_at(&self, epoch: Epoch) -> Option<CartesianState>;

    fn frame(&self) -> Frame;
}

/// Sample a source from `t1` to `t2` every `step_s` seconds, both ends included.
///
/// Instants where the source has no state are skipped.
pub fn states_between(
    source: &dyn CartesianSource,
    t1: Epoch,
    t2: Epoch,
    step_s: f64,
) -> Vec<CartesianState> {
    let span = seconds_between(&t1, &t2);
    if step_s <= 0.0 || span < 0.0 {
        return source.state_at(t1).into_iter().collect();
    }

    let n = (span / step_s).floor() as usize;
    let mut out: Vec<CartesianState> = (0..=n)
        .filter_map(|k| source.state_at(add_seconds(&t1, k as f64 * step_s)))
        .collect();

    if (n as f64) * step_s < span {
        out.extend(source.state_at(t2));
    }
    out
}

/// States whose epoch lies in `[start, end]`, in input order.
pub fn filter_states(states: &[CartesianState], start: Epoch, end: Epoch) -> Vec<CartesianState> {
    states
        .iter()
        .filter(|s| start <= s.epoch && s.epoch <= end)
        .copied()
        .collect()
}

/// State nearest in time to `epoch`, the earliest in input order on ties.
pub fn closest_to_epoch(states: &[CartesianState], epoch: Epoch) -> Option<&CartesianState> {
    states
        .iter()
        .min_by(|a, b| {
            let da = seconds_between(&epoch, &a.epoch).abs();
            let db = seconds_between(&epoch, &b.epoch).abs();
            da.total_cmp(&db)
        })
}

/// TEME states covering `n_revs` revolutions before the epoch of `set`.
///
/// Arguments
/// ---------
/// * `set`: element set; its epoch closes the track.
/// * `env`: environment whose propagator evaluates the set.
/// * `step_s`: sampling step in seconds.
/// * `n_revs`: number of revolutions; the period is taken from 95 % of the mean motion, so
///   the track is slightly longer than `n_revs` periods.
///
/// Return
/// ------
/// * Samples every `step_s` from the start of the span, the epoch itself always last.
///   Empty when the set has no mean motion.
pub fn previous_revolutions(
    set: &ElementSet,
    env: &OdEnv,
    step_s: f64,
    n_revs: f64,
) -> Vec<CartesianState> {
    let n = set.mean_motion() * REVOLUTION_MARGIN;
    if n <= 0.0 || n_revs <= 0.0 {
        return Vec::new();
    }
    let end = set.epoch();
    let start = add_seconds(&end, -SECONDS_PER_DAY / n * n_revs);
    states_between(&PropagatedSource::new(set, env), start, end, step_s)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ephemerides {
    frame: Frame,
    t0: Epoch,
    times: Vec<f64>,
    positions: Vec<Vector3<f64>>,
    velocities: Vec<Vector3<f64>>,
}

impl Ephemerides {
    /// Build an interpolation table; the states are sorted by epoch first.
    ///
    /// Return
    /// ------
    /// * `None` for an empty list of states.
    pub fn new(mut states: Vec<CartesianState>, frame: Frame) -> Option<Self> {
        states.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        states.dedup_by(|a, b| a.epoch == b.epoch);
        let t0 = states.first()?.epoch;

        Some(Ephemerides {
            frame,
            t0,
            times: states
                .iter()
                .map(|s| seconds_between(&t0, &s.epoch))
                .collect(),
            positions: states.iter().map(|s| s.position).collect(),
            velocities: states.iter().map(|s| s.velocity).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first_epoch(&self) -> Epoch {
        self.t0
    }

    pub fn last_epoch(&self) -> Epoch {
        add_seconds(&self.t0, self.times.last().copied().unwrap_or(0.0))
    }

    /// Hermite interpolation at `t` seconds after the first entry.
    fn interpolate(&self, t: f64) -> (Vector3<f64>, Vector3<f64>) {
        let nmax = self.times.len();
        let npts = HERMITE_POINTS.min(nmax);

        let idx = self.times.partition_point(|&x| x < t);
        let i0 = idx
            .saturating_sub(npts / 2)
            .min(nmax.saturating_sub(npts));
        let window = i0..i0 + npts;

        let mut pos = Vector3::zeros();
        let mut vel = Vector3::zeros();

        for i in window.clone() {
            let xi = self.times[i];
            let mut sk = 0.0;
            let mut lag = 1.0;
            for k in window.clone() {
                if k != i {
                    let xk = self.times[k];
                    sk += 1.0 / (xi - xk);
                    lag *= (t - xk) / (xi - xk);
                }
            }
            let ui = t - xi;
            let vi = 1.0 - 2.0 * ui * sk;

            vel += self.velocities[i] * lag;
            pos += (self.positions[i] * vi + self.velocities[i] * ui) * lag * lag;
        }

        (pos, vel)
    }
}

impl CartesianSource for Ephemerides {
    fn state_at(&self, epoch: Epoch) -> Option<CartesianState> {
        let t = seconds_between(&self.t0, &epoch);
        let last = *self.times.last()?;
        if t < 0.0 || t > last {
            return None;
        }
        let (position, velocity) = self.interpolate(t);
        Some(CartesianState::new(epoch, position, velocity))
    }

    fn frame(&self) -> Frame {
        self.frame
    }
}

/// Element set evaluated by the environment's propagator, TEME output.
pub struct PropagatedSource<'a> {
    pub set: &'a ElementSet,
    pub env: &'a OdEnv,
}

impl<'a> PropagatedSource<'a> {
    pub fn new(set: &'a ElementSet, env: &'a OdEnv) -> Self {
        PropagatedSource { set, env }
    }
}

impl CartesianSource for PropagatedSource<'_> {
    fn state_at(&self, epoch: Epoch) -> Option<CartesianState> {
        match self.env.propagate(self.set, epoch) {
            Ok(state) => Some(state),
            Err(e) => {
                debug!("no state for {} at {epoch}: {e}", self.set.object_id());
                None
            }
        }
    }

    fn frame(&self) -> Frame {
        Frame::Teme
    }
}

#[cfg(test)]
mod test_ephemeris {
    use super::*;
    use crate::constants::GM_EARTH;
    use approx::assert_relative_eq;

    fn circular(t0: Epoch, dt: f64) -> CartesianState {
        let r: f64 = 7000.0;
        let w = (GM_EARTH / r.powi(3)).sqrt();
        let (s, c) = (w * dt).sin_cos();
        CartesianState::new(
            add_seconds(&t0, dt),
            Vector3::new(r * c, r * s, 0.0),
            Vector3::new(-r * w * s, r * w * c, 0.0),
        )
    }

    #[test]
    fn test_hermite_reproduces_orbit() {
        let t0 = Epoch::from_mjd_utc(59500.0);
        let table: Vec<_> = (0..30).map(|k| circular(t0, k as f64 * 60.0)).collect();
        let eph = Ephemerides::new(table, Frame::Teme).unwrap();

        for dt in [0.0, 45.5, 600.0, 1000.3, 1739.0, 1740.0] {
            let got = eph.state_at(add_seconds(&t0, dt)).unwrap();
            let truth = circular(t0, dt);
            assert_relative_eq!(got.position, truth.position, epsilon = 1e-6);
            assert_relative_eq!(got.velocity, truth.velocity, epsilon = 1e-6);
        }
        assert!(eph.state_at(add_seconds(&t0, -1.0)).is_none());
        assert!(eph.state_at(add_seconds(&t0, 1741.0)).is_none());
    }

    #[test]
    fn test_states_between_inclusive() {
        let t0 = Epoch::from_mjd_utc(59500.0);
        let table: Vec<_> = (0..30).map(|k| circular(t0, k as f64 * 60.0)).collect();
        let eph = Ephemerides::new(table, Frame::Teme).unwrap();
        let samples = states_between(&eph, t0, add_seconds(&t0, 250.0), 100.0);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[3].epoch, add_seconds(&t0, 250.0));
    }

    #[test]
    fn test_filter_and_closest() {
        let t0 = Epoch::from_mjd_utc(59500.0);
        let track: Vec<_> = (0..10).map(|k| circular(t0, k as f64 * 60.0)).collect();

        let window = filter_states(&track, add_seconds(&t0, 60.0), add_seconds(&t0, 180.0));
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].epoch, add_seconds(&t0, 60.0));
        assert_eq!(window[2].epoch, add_seconds(&t0, 180.0));
        assert!(filter_states(&track, add_seconds(&t0, 1.0), add_seconds(&t0, 59.0)).is_empty());

        let near = closest_to_epoch(&track, add_seconds(&t0, 100.0)).unwrap();
        assert_eq!(near.epoch, add_seconds(&t0, 120.0));
        // halfway between two samples: the earlier one wins
        let tie = closest_to_epoch(&track, add_seconds(&t0, 90.0)).unwrap();
        assert_eq!(tie.epoch, add_seconds(&t0, 60.0));
        assert_eq!(closest_to_epoch(&track, add_seconds(&t0, -1e4)).unwrap().epoch, t0);
        assert!(closest_to_epoch(&[], t0).is_none());
    }

    #[test]
    fn test_previous_revolutions() {
        let env = OdEnv::new();
        let set = ElementSet::parse(
            "1 41085U XYXYX    19001.50315140 +.00000134 +00000-0 +89211-4 0  9990",
            "2 41085 098.8407 084.9556 0023046 143.2800 216.9959 14.16488812160040",
        )
        .unwrap();
        let track = previous_revolutions(&set, &env, 60.0, 1.0);

        let span = SECONDS_PER_DAY / (set.mean_motion() * REVOLUTION_MARGIN);
        let last = track.last().unwrap();
        assert_eq!(last.epoch, set.epoch());
        assert_relative_eq!(
            seconds_between(&track[0].epoch, &set.epoch()),
            span,
            epsilon = 1e-3
        );
        assert_eq!(track.len(), (span / 60.0).floor() as usize + 2);
        assert!(track.windows(2).all(|w| w[0].epoch < w[1].epoch));

        let still = set.to_draft().mean_motion(0.0).build();
        assert!(previous_revolutions(&still, &env, 60.0, 1.0).is_empty());
    }
}
