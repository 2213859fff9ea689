//! # Term search
//!
//! Grid search over a drag or radiation term, the parameters the local optimizer handles
//! poorly (they enter the residuals nonlinearly and the Jacobian is nearly flat around
//! zero).
//!
//! For every candidate value the term is fixed, the six equinoctal parameters are re-fitted
//! and the RMS is recorded; the best candidate wins. When the grid contains an exact zero
//! whose RMS is within [`RMS_EPS`] (relative) of the best one, zero is preferred so noise
//! is not fitted as drag.
//!
//! A search round is followed by a narrower grid centred on the winner
//! ([`new_terms`]); [`terms_are_valid`] detects grids that have collapsed.
//!
//! ## Example
//!
//! ```rust, no_run
//! use tlefit::od_env::OdEnv;
//! use tlefit::term_search::{min_rms_for_terms, Term, TermSearchSettings, WIDE_DRAG_TERMS};
//!
//! # let set: tlefit::element_set::ElementSet = todo!();
//! # let track: Vec<tlefit::orbit_type::cartesian_state::CartesianState> = vec![];
//! let env = OdEnv::new();
//! let settings = TermSearchSettings::default();
//! let best = min_rms_for_terms(&env, &track, &set, Term::Drag, &WIDE_DRAG_TERMS, &settings)?;
//! println!("bstar {} rms {}", best.term, best.rms);
//! # Ok::<(), tlefit::tlefit_errors::TleFitError>(())
//! ```

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    constants::RMS_EPS,
    element_set::ElementSet,
    fit::{fit_element_set, residuals::FittedTerms, FitOutcome, FitSettings},
    od_env::OdEnv,
    orbit_type::cartesian_state::CartesianState,
    tlefit_errors::TleFitError,
};

/// Coarse grid, descending, ending at zero.
pub const WIDE_RANGE: [f64; 15] = [
    1.0, 0.5, 0.2, 0.1, 0.05, 0.02, 0.01, 0.005, 0.002, 0.001, 0.0005, 0.0002, 0.0001, 0.00001,
    0.0,
];

/// Narrower grid, descending, ending at zero.
pub const SMALLER_RANGE: [f64; 9] = [
    0.01, 0.005, 0.002, 0.001, 0.0005, 0.0002, 0.0001, 0.00001, 0.0,
];

/// Drag grid for standard sets: zero, then 1, 1.78, 3.16, 5.62 per decade from 1e-9 to 3.16e9.
pub const WIDE_DRAG_TERMS: [f64; 76] = [
    0.0, 1.00E-09, 1.78E-09, 3.16E-09, 5.62E-09, 1.00E-08, 1.78E-08, 3.16E-08, 5.62E-08, 1.00E-07,
    1.78E-07, 3.16E-07, 5.62E-07, 1.00E-06, 1.78E-06, 3.16E-06, 5.62E-06, 1.00E-05, 1.78E-05,
    3.16E-05, 5.62E-05, 1.00E-04, 1.78E-04, 3.16E-04, 5.62E-04, 1.00E-03, 1.78E-03, 3.16E-03,
    5.62E-03, 1.00E-02, 1.78E-02, 3.16E-02, 5.62E-02, 1.00E-01, 1.78E-01, 3.16E-01, 5.62E-01,
    1.00E+00, 1.78E+00, 3.16E+00, 5.62E+00, 1.00E+01, 1.78E+01, 3.16E+01, 5.62E+01, 1.00E+02,
    1.78E+02, 3.16E+02, 5.62E+02, 1.00E+03, 1.78E+03, 3.16E+03, 5.62E+03, 1.00E+04, 1.78E+04,
    3.16E+04, 5.62E+04, 1.00E+05, 1.78E+05, 3.16E+05, 5.62E+05, 1.00E+06, 1.78E+06, 3.16E+06,
    5.62E+06, 1.00E+07, 1.78E+07, 3.16E+07, 5.62E+07, 1.00E+08, 1.78E+08, 3.16E+08, 5.62E+08,
    1.00E+09, 1.78E+09, 3.16E+09,
];

/// Stand-in for a zero endpoint in log space
const LOG_ZERO: f64 = -10.0;

/// A scan stops once a value past the fourth one is this many times worse than the first.
const EARLY_STOP_FACTOR: f64 = 3.0;

/// Which scalar term is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    /// `bstar`
    Drag,
    /// `agom`, carried in the second-derivative slot
    Radiation,
}

impl Term {
    pub fn value(&self, set: &ElementSet) -> f64 {
        match self {
            Term::Drag => set.bstar(),
            Term::Radiation => set.nddot(),
        }
    }

    pub fn with_value(&self, set: &ElementSet, value: f64) -> ElementSet {
        let draft = set.to_draft();
        match self {
            Term::Drag => draft.bstar(value),
            Term::Radiation => draft.agom(value),
        }
        .build()
    }

    pub fn fitted(&self) -> FittedTerms {
        FittedTerms {
            bstar: *self == Term::Drag,
            agom: *self == Term::Radiation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermSearchSettings {
    /// Fit every grid value in parallel (no early stop).
    pub parallel: bool,
    /// Settings of the per-value fit; terms are never free there.
    pub fit: FitSettings,
}

impl Default for TermSearchSettings {
    fn default() -> Self {
        TermSearchSettings {
            parallel: false,
            fit: FitSettings::default().two_stage(false),
        }
    }
}

/// Outcome of one grid scan.
#[derive(Debug, Clone, PartialEq)]
pub struct TermSearchResult {
    pub set: ElementSet,
    pub term: f64,
    pub rms: f64,
    /// `(term, rms)` per grid value, in grid order. Values skipped by the early stop carry
    /// the RMS that triggered it.
    pub samples: Vec<(f64, f64)>,
}

/// `nt` values spaced logarithmically from `val·fact` down to `val/fact`.
pub fn simple_new_terms(val: f64, nt: usize, fact: f64) -> Vec<f64> {
    if nt < 2 {
        return vec![val; nt];
    }
    let max = (val * fact).log10();
    let min = (val / fact).log10();
    let inc = (max - min) / (nt - 1) as f64;
    (0..nt).map(|i| 10f64.powf(max - inc * i as f64)).collect()
}

/// Narrower grid of `nt` values around `val`.
///
/// The new grid runs from `grid[k − 2]` to `grid[k + 2]` (clamped to the grid), `k` being
/// the index of the grid value closest to `val`. Spacing is logarithmic when `log` is set,
/// with a zero endpoint standing at 1e-10, and linear otherwise. Both endpoints are the
/// exact grid values.
pub fn new_terms(val: f64, grid: &[f64], nt: usize, log: bool) -> Vec<f64> {
    let Some((ind, _)) = grid
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (val - **a).abs().total_cmp(&(val - **b).abs()))
    else {
        return Vec::new();
    };
    if nt < 2 {
        return vec![grid[ind]; nt];
    }

    let val1 = grid[ind.saturating_sub(2)];
    let val2 = grid[(ind + 2).min(grid.len() - 1)];

    let to_log = |v: f64| if v == 0.0 { LOG_ZERO } else { v.log10() };
    let (start, stop) = if log {
        (to_log(val1), to_log(val2))
    } else {
        (val1, val2)
    };
    let diff = (stop - start) / (nt - 1) as f64;

    let mut out: Vec<f64> = (0..nt)
        .map(|i| {
            let v = start + diff * i as f64;
            if log {
                10f64.powf(v)
            } else {
                v
            }
        })
        .collect();
    out[0] = val1;
    out[nt - 1] = val2;
    info!("new terms range between {val1:e} and {val2:e}");
    out
}

/// `false` for a grid that has collapsed: equal endpoints, NaN or infinite values.
pub fn terms_are_valid(terms: &[f64]) -> bool {
    match (terms.first(), terms.last()) {
        (Some(first), Some(last)) if first != last => terms.iter().all(|t| t.is_finite()),
        _ => false,
    }
}

/// Relative spread `|first − last| / first` of a grid.
pub fn grid_spread(terms: &[f64]) -> f64 {
    match (terms.first(), terms.last()) {
        (Some(first), Some(last)) => (first - last).abs() / first,
        _ => f64::NAN,
    }
}

/// Index of the winning sample: the lowest RMS, unless a zero term is within [`RMS_EPS`]
/// of it.
pub fn select_best(samples: &[(f64, f64)]) -> Option<usize> {
    let (best, &(_, min_rms)) = samples
        .iter()
        .enumerate()
        .filter(|(_, (_, rms))| !rms.is_nan())
        .min_by(|(_, a), (_, b)| a.1.total_cmp(&b.1))?;

    let zero = samples.iter().position(|(term, _)| *term == 0.0);
    if let Some(z) = zero {
        let zero_rms = samples[z].1;
        let delta = if min_rms == 0.0 {
            if zero_rms == 0.0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            (min_rms - zero_rms).abs() / min_rms
        };
        if z != best && delta < RMS_EPS {
            info!("resetting term to 0: {min_rms:e} vs {zero_rms:e} ({delta:e})");
            return Some(z);
        }
    }
    Some(best)
}

fn fit_with_term(
    env: &OdEnv,
    states: &[CartesianState],
    base: &ElementSet,
    term: Term,
    value: f64,
    settings: &TermSearchSettings,
) -> Result<FitOutcome, TleFitError> {
    let candidate = term.with_value(base, value);
    fit_element_set(
        env,
        states,
        candidate.epoch(),
        &candidate,
        FittedTerms::NONE,
        &settings.fit,
    )
}

/// Fit the elements at every value of `grid` and keep the best.
///
/// Arguments
/// ---------
/// * `env`: propagator and frame services.
/// * `states`: TEME observations.
/// * `base`: starting set; its epoch is the fit epoch.
/// * `term`: the term being scanned.
/// * `grid`: candidate values.
/// * `settings`: per-value fit and scan mode.
///
/// Return
/// ------
/// * The winning set, or `Err(TleFitError::InvalidFitParameter)` for an empty grid.
///
/// The sequential scan stops early once past the fourth value the RMS exceeds three times
/// the RMS of the first value. The parallel scan fits every value.
pub fn min_rms_for_terms(
    env: &OdEnv,
    states: &[CartesianState],
    base: &ElementSet,
    term: Term,
    grid: &[f64],
    settings: &TermSearchSettings,
) -> Result<TermSearchResult, TleFitError> {
    if grid.is_empty() {
        return Err(TleFitError::InvalidFitParameter("empty term grid".into()));
    }

    let fits: Vec<FitOutcome> = if settings.parallel {
        grid.par_iter()
            .map(|v| fit_with_term(env, states, base, term, *v, settings))
            .collect::<Result<_, _>>()?
    } else {
        let mut fits: Vec<FitOutcome> = Vec::with_capacity(grid.len());
        for (i, v) in grid.iter().enumerate() {
            let out = fit_with_term(env, states, base, term, *v, settings)?;
            let first_rms = fits.first().map_or(out.rms, |f| f.rms);
            let stop = i > 3 && out.rms > EARLY_STOP_FACTOR * first_rms;
            fits.push(out);
            if stop {
                debug!("term scan stopped at {v:e}");
                break;
            }
        }
        fits
    };

    let last_rms = fits.last().map_or(f64::NAN, |f| f.rms);
    let samples: Vec<(f64, f64)> = grid
        .iter()
        .enumerate()
        .map(|(i, t)| (*t, fits.get(i).map_or(last_rms, |f| f.rms)))
        .collect();

    for (t, rms) in &samples {
        debug!("{t:e}\t{rms:e}");
    }

    let best = select_best(&samples[..fits.len()])
        .ok_or_else(|| TleFitError::InvalidFitParameter("no finite RMS in term scan".into()))?;
    let winner = &fits[best];
    info!("min RMS {:e} at {:?} = {:e}", winner.rms, term, samples[best].0);

    Ok(TermSearchResult {
        set: winner.set.clone(),
        term: samples[best].0,
        rms: winner.rms,
        samples,
    })
}

#[cfg(test)]
mod test_term_search {
    use super::*;
    use approx::assert_relative_eq;
    use itertools::Itertools;

    #[test]
    fn test_simple_new_terms() {
        let t = simple_new_terms(1e-4, 21, 10.0);
        assert_eq!(t.len(), 21);
        assert_relative_eq!(t[0], 1e-3, max_relative = 1e-12);
        assert_relative_eq!(t[10], 1e-4, max_relative = 1e-12);
        assert_relative_eq!(t[20], 1e-5, max_relative = 1e-12);
        assert!(t.iter().tuple_windows().all(|(a, b)| a > b));
    }

    #[test]
    fn test_new_terms_log() {
        let t = new_terms(0.001, &WIDE_RANGE, 9, true);
        // closest is index 9: range is WIDE_RANGE[7] ..= WIDE_RANGE[11]
        assert_eq!(t[0], 0.005);
        assert_eq!(t[8], 0.0002);
        assert_relative_eq!(t[4], 0.001, max_relative = 1e-12);
    }

    #[test]
    fn test_new_terms_zero_endpoint() {
        let t = new_terms(0.0, &WIDE_RANGE, 9, true);
        assert_eq!(t[0], 0.0001);
        assert_eq!(t[8], 0.0);
        assert!(t[1..8].iter().all(|v| *v > 0.0 && *v < 0.0001));
        assert!(terms_are_valid(&t));

        let t = new_terms(0.0, &WIDE_DRAG_TERMS, 9, true);
        assert_eq!(t[0], 0.0);
        assert_eq!(t[8], 1.78e-9);
        assert!(terms_are_valid(&t));
    }

    #[test]
    fn test_new_terms_linear() {
        let t = new_terms(0.3, &[1.0, 0.5, 0.4, 0.3, 0.2, 0.1], 5, false);
        let expected = [0.5, 0.4, 0.3, 0.2, 0.1];
        assert_eq!(t.len(), 5);
        for (got, want) in t.iter().zip(expected) {
            assert_relative_eq!(*got, want, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_validity() {
        assert!(terms_are_valid(&[1.0, 0.5]));
        assert!(!terms_are_valid(&[0.5, 0.5]));
        assert!(!terms_are_valid(&[1.0, f64::NAN, 0.5]));
        assert!(!terms_are_valid(&[f64::INFINITY, 0.5]));
        assert!(!terms_are_valid(&[]));
    }

    #[test]
    fn test_zero_preference() {
        let samples = [(1e-3, 2.0), (1e-4, 1.0), (0.0, 1.0 + 5e-6)];
        assert_eq!(select_best(&samples), Some(2));

        let samples = [(1e-3, 2.0), (1e-4, 1.0), (0.0, 1.1)];
        assert_eq!(select_best(&samples), Some(1));

        let samples = [(1e-4, 0.0), (0.0, 0.0)];
        assert_eq!(select_best(&samples), Some(1));
    }

    #[test]
    fn test_spread() {
        assert_relative_eq!(grid_spread(&[2.0, 1.5, 1.0]), 0.5);
        assert!(grid_spread(&[0.0, 1.0]).is_infinite());
    }
}
