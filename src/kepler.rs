//! # Kepler equation and anomaly conversions
//!
//! Solves `M = E - e·sin(E)` for elliptical orbits and converts between mean, eccentric and
//! true anomalies. All angles are in radians.

use std::f64::consts::PI;

use log::warn;

use super::constants::DPI;

/// Maximum number of iterations of [`solve_kepler_equation`]
const KEPLER_MAX_ITER: usize = 200;

/// Convergence threshold of [`solve_kepler_equation`]
const KEPLER_TOL: f64 = 1e-14;

/// Principal value of an angle in [0, 2π).
pub fn principal_angle(a: f64) -> f64 {
    a.rem_euclid(DPI)
}

/// Principal difference between two angles in [-π, π].
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let mut diff = principal_angle(a) - principal_angle(b);

    if diff > PI {
        diff -= DPI;
    } else if diff < -PI {
        diff += DPI;
    }

    diff
}

/// Solve Kepler's equation for the eccentric anomaly.
///
/// The iteration runs on the fixed point `E = M + e·sin(E)`; each pass applies the Newton
/// correction of that map, which keeps the same fixed point but converges at high
/// eccentricity. The iterate is wrapped into [0, 2π) at every step.
///
/// Arguments
/// ---------
/// * `ecc`: eccentricity, in [0, 1)
/// * `mean_anomaly`: mean anomaly in radians (any value)
///
/// Return
/// ------
/// * the eccentric anomaly in [0, 2π). If the tolerance is not reached after the iteration
///   cap, a warning is logged and the last iterate is returned.
pub fn solve_kepler_equation(ecc: f64, mean_anomaly: f64) -> f64 {
    let m = principal_angle(mean_anomaly);
    if ecc == 0.0 {
        return m;
    }

    let mut ea = if ecc >= 0.8 { PI } else { m };

    for _ in 0..KEPLER_MAX_ITER {
        let f = ea - ecc * ea.sin() - m;
        if f.abs() < KEPLER_TOL {
            return ea;
        }
        let df = 1.0 - ecc * ea.cos();
        let next = principal_angle(ea - f / df);

        if angle_diff(next, ea).abs() < KEPLER_TOL {
            return next;
        }
        ea = next;
    }

    warn!(
        "Kepler equation not converged after {KEPLER_MAX_ITER} iterations (e = {ecc}, M = {m})"
    );
    ea
}

/// Eccentric anomaly → true anomaly, in [0, 2π).
pub fn eccentric_to_true(ecc: f64, ea: f64) -> f64 {
    let beta = (1.0 - ecc * ecc).sqrt();
    let sin_nu = beta * ea.sin() / (1.0 - ecc * ea.cos());
    let cos_nu = (ea.cos() - ecc) / (1.0 - ecc * ea.cos());
    principal_angle(sin_nu.atan2(cos_nu))
}

/// True anomaly → eccentric anomaly, in [0, 2π).
pub fn true_to_eccentric(ecc: f64, nu: f64) -> f64 {
    let denom = 1.0 + ecc * nu.cos();
    let sin_e = (1.0 - ecc * ecc).sqrt() * nu.sin() / denom;
    let cos_e = (ecc + nu.cos()) / denom;
    principal_angle(sin_e.atan2(cos_e))
}

/// Eccentric anomaly → mean anomaly, in [0, 2π).
pub fn eccentric_to_mean(ecc: f64, ea: f64) -> f64 {
    principal_angle(ea - ecc * ea.sin())
}

/// Mean anomaly → true anomaly, in [0, 2π).
pub fn mean_to_true(ecc: f64, ma: f64) -> f64 {
    eccentric_to_true(ecc, solve_kepler_equation(ecc, ma))
}

/// True anomaly → mean anomaly, in [0, 2π).
pub fn true_to_mean(ecc: f64, nu: f64) -> f64 {
    eccentric_to_mean(ecc, true_to_eccentric(ecc, nu))
}

#[cfg(test)]
mod kepler_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_principal_angle() {
        assert_abs_diff_eq!(principal_angle(-PI / 2.0), 1.5 * PI, epsilon = 1e-15);
        assert_abs_diff_eq!(principal_angle(5.0 * PI), PI, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_diff() {
        assert_abs_diff_eq!(angle_diff(0.1, DPI - 0.1), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(angle_diff(DPI - 0.1, 0.1), -0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_circular() {
        assert_abs_diff_eq!(solve_kepler_equation(0.0, 1.234), 1.234, epsilon = 1e-15);
    }

    #[test]
    fn test_kepler_residual() {
        for ecc in [0.0, 0.5, 0.9, 0.99] {
            for k in 0..64 {
                let m = k as f64 * DPI / 64.0;
                let ea = solve_kepler_equation(ecc, m);
                assert_abs_diff_eq!(angle_diff(ea - ecc * ea.sin(), m), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_anomaly_round_trip() {
        for ecc in [0.0, 0.1, 0.7, 0.95] {
            for k in 0..12 {
                let ma = k as f64 * DPI / 12.0 + 0.01;
                let nu = mean_to_true(ecc, ma);
                assert_abs_diff_eq!(
                    angle_diff(true_to_mean(ecc, nu), ma),
                    0.0,
                    epsilon = 1e-10
                );
            }
        }
    }
}
