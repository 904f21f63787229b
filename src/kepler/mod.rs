//! Universal-variable two-body propagation.
//!
//! The two-body flow about the central body is written in the universal anomaly x
//! through the Stumpff/G functions, so one formulation serves the elliptic, parabolic
//! and hyperbolic regimes. The time equation is solved with a Newton iterate, falling
//! back to a fifth-order Laguerre iterate and then to bisection; if every family
//! fails (or the hyperbolic anomaly argument overflows), the step is split into four
//! recursive sub-steps up to a bounded depth.

use crate::constants::planetary_mu;
use crate::dimensions::{Vector3, Vector6};
use crate::errors::PropError;
use std::f64::consts::PI;

const NEWTON_TOL: f64 = 1e-8;
const NEWTON_MAX: usize = 10;
const LAGUERRE_TOL: f64 = 1e-9;
const LAGUERRE_MAX: usize = 20;
const BISECT_MAX: usize = 100;
const MAX_SPLIT_DEPTH: u32 = 30;
/// Largest |b x / 2| the Newton iterate accepts in the hyperbolic branch.
const NEWTON_ARG_GUARD: f64 = 200.0;
/// Largest |b x / 2| the Laguerre iterate accepts in the hyperbolic branch.
const LAGUERRE_ARG_GUARD: f64 = 50.0;

/// Advances one body by `dt` days along the two-body flow about `central`.
pub fn kepler_step(central: usize, dt: f64, state: &Vector6<f64>) -> Result<Vector6<f64>, PropError> {
    kepler_step_mu(planetary_mu(central), dt, state)
}

/// [`kepler_step`] with an explicit gravitational parameter in AU^3/day^2.
pub fn kepler_step_mu(mu: f64, dt: f64, state: &Vector6<f64>) -> Result<Vector6<f64>, PropError> {
    let r = Vector3::new(state[0], state[1], state[2]);
    let v = Vector3::new(state[3], state[4], state[5]);
    let (rn, vn) = propagate_recursive(mu, dt, r, v, 0)?;
    Ok(Vector6::new(rn[0], rn[1], rn[2], vn[0], vn[1], vn[2]))
}

/// Attempts the step whole; on failure splits it into four equal sub-steps and
/// recurses, re-deriving the orbit invariants from each intermediate state.
fn propagate_recursive(
    mu: f64,
    dt: f64,
    r: Vector3<f64>,
    v: Vector3<f64>,
    depth: u32,
) -> Result<(Vector3<f64>, Vector3<f64>), PropError> {
    match solve_universal(mu, dt, &r, &v) {
        Ok(out) => Ok(out),
        Err(e) => {
            if depth >= MAX_SPLIT_DEPTH {
                return Err(PropError::KeplerDepthExceeded(MAX_SPLIT_DEPTH));
            }
            debug!("kepler step of {} d split at depth {}: {}", dt, depth, e);
            let quarter = 0.25 * dt;
            let (mut rr, mut vv) = (r, v);
            for _ in 0..4 {
                let (nr, nv) = propagate_recursive(mu, quarter, rr, vv, depth + 1)?;
                rr = nr;
                vv = nv;
            }
            Ok((rr, vv))
        }
    }
}

/// The G functions and the half-argument circular/hyperbolic values they came from.
struct GVals {
    g1: f64,
    g2: f64,
    g3: f64,
    s_half: f64,
    c_half: f64,
}

/// Invariants of one universal-variable solve.
struct Universal {
    mu: f64,
    dt: f64,
    r0: f64,
    eta: f64,
    beta: f64,
    zeta: f64,
    b: f64,
}

impl Universal {
    fn gvals(&self, x: f64) -> GVals {
        if self.beta > 0.0 {
            let s = (0.5 * self.b * x).sin();
            let c = (0.5 * self.b * x).cos();
            let g1 = 2.0 * s * c / self.b;
            let g2 = 2.0 * s * s / self.beta;
            GVals {
                g1,
                g2,
                g3: (x - g1) / self.beta,
                s_half: s,
                c_half: c,
            }
        } else if self.beta < 0.0 {
            let s = (0.5 * self.b * x).sinh();
            let c = (0.5 * self.b * x).cosh();
            let g1 = 2.0 * s * c / self.b;
            let g2 = -2.0 * s * s / self.beta;
            GVals {
                g1,
                g2,
                g3: (x - g1) / self.beta,
                s_half: s,
                c_half: c,
            }
        } else {
            GVals {
                g1: x,
                g2: 0.5 * x * x,
                g3: x * x * x / 6.0,
                s_half: 0.0,
                c_half: 1.0,
            }
        }
    }

    /// The time equation r0*x + eta*G2 + zeta*G3 - dt.
    fn residual(&self, g: &GVals, x: f64) -> f64 {
        self.r0 * x + self.eta * g.g2 + self.zeta * g.g3 - self.dt
    }

    /// d/dx of the time equation, which is the radius at x.
    fn radius(&self, g: &GVals) -> f64 {
        self.r0 + self.eta * g.g1 + self.zeta * g.g2
    }

    /// d2/dx2 of the time equation.
    fn d_radius(&self, g: &GVals) -> f64 {
        let g0 = 1.0 - self.beta * g.g2;
        self.eta * g0 + self.zeta * g.g1
    }

    fn guard(&self, x: f64, guard: f64) -> Result<(), PropError> {
        if self.beta < 0.0 {
            let arg = 0.5 * self.b * x;
            if arg.abs() > guard {
                return Err(PropError::HyperbolicOverflow { arg, guard });
            }
        }
        Ok(())
    }

    /// dt/r0 corrected by one Newton step on the cubic predictor.
    fn elliptic_seed(&self) -> f64 {
        let s = self.dt / self.r0;
        let f = self.zeta * s.powi(3) + 3.0 * self.eta * s.powi(2) + 6.0 * self.r0 * s
            - 6.0 * self.dt;
        let fp = 3.0 * self.zeta * s.powi(2) + 6.0 * self.eta * s + 6.0 * self.r0;
        if fp != 0.0 {
            s - f / fp
        } else {
            s
        }
    }

    fn hyperbolic_seed(&self) -> f64 {
        if self.zeta != 0.0 {
            cubic_root(self.zeta, 3.0 * self.eta, 6.0 * self.r0, -6.0 * self.dt)
        } else if self.eta != 0.0 {
            cubic_root(0.0, 3.0 * self.eta, 6.0 * self.r0, -6.0 * self.dt)
        } else {
            self.dt / self.r0
        }
    }

    fn newton(&self, seed: f64) -> Result<f64, PropError> {
        let mut x = seed;
        for _ in 0..NEWTON_MAX {
            self.guard(x, NEWTON_ARG_GUARD)?;
            let g = self.gvals(x);
            let dx = self.residual(&g, x) / self.radius(&g);
            x -= dx;
            if dx.abs() <= NEWTON_TOL * x.abs() {
                return Ok(x);
            }
        }
        Err(PropError::KeplerNoConvergence)
    }

    fn laguerre(&self, seed: f64) -> Result<f64, PropError> {
        let mut x = seed;
        for _ in 0..LAGUERRE_MAX {
            self.guard(x, LAGUERRE_ARG_GUARD)?;
            let g = self.gvals(x);
            let f = self.residual(&g, x);
            let fp = self.radius(&g);
            let fpp = self.d_radius(&g);
            let root = (16.0 * fp * fp - 20.0 * f * fpp).abs().sqrt();
            let denom = fp + fp.signum() * root;
            if denom == 0.0 {
                return Err(PropError::KeplerNoConvergence);
            }
            let dx = -5.0 * f / denom;
            x += dx;
            if dx.abs() <= LAGUERRE_TOL * x.abs() {
                return Ok(x);
            }
        }
        Err(PropError::KeplerNoConvergence)
    }

    /// Brackets the root within whole multiples of the fundamental x-period.
    fn elliptic_bracket(&self) -> Result<(f64, f64), PropError> {
        let period = 2.0 * PI / self.b;
        if self.dt > 0.0 {
            let mut lo = 0.0;
            let mut hi = period;
            for _ in 0..64 {
                let g = self.gvals(hi);
                if self.residual(&g, hi) >= 0.0 {
                    return Ok((lo, hi));
                }
                lo = hi;
                hi += period;
            }
        } else {
            let mut hi = 0.0;
            let mut lo = -period;
            for _ in 0..64 {
                let g = self.gvals(lo);
                if self.residual(&g, lo) <= 0.0 {
                    return Ok((lo, hi));
                }
                hi = lo;
                lo -= period;
            }
        }
        Err(PropError::KeplerNoConvergence)
    }

    fn bisect(&self, seed: f64) -> Result<f64, PropError> {
        let (mut lo, mut hi) = if self.beta > 0.0 {
            self.elliptic_bracket()?
        } else {
            let (a, b) = (0.5 * seed, 10.0 * seed);
            (a.min(b), a.max(b))
        };
        let f_lo = {
            let g = self.gvals(lo);
            self.residual(&g, lo)
        };
        let f_hi = {
            let g = self.gvals(hi);
            self.residual(&g, hi)
        };
        if f_lo == 0.0 {
            return Ok(lo);
        }
        if f_hi == 0.0 {
            return Ok(hi);
        }
        if f_lo.signum() == f_hi.signum() {
            return Err(PropError::KeplerNoConvergence);
        }
        let mut sign_lo = f_lo.signum();
        let mut x = 0.5 * (lo + hi);
        for _ in 0..BISECT_MAX {
            x = 0.5 * (lo + hi);
            let g = self.gvals(x);
            let fx = self.residual(&g, x);
            if fx == 0.0 || (hi - lo).abs() <= 1e-9 * x.abs() {
                return Ok(x);
            }
            if fx.signum() == sign_lo {
                lo = x;
                sign_lo = fx.signum();
            } else {
                hi = x;
            }
        }
        Ok(x)
    }

    /// The Newton -> Laguerre -> bisection ladder. A hyperbolic overflow aborts
    /// the ladder outright: only the step splitter can recover from it.
    fn solve(&self, seed: f64) -> Result<f64, PropError> {
        match self.newton(seed) {
            Ok(x) => return Ok(x),
            Err(e @ PropError::HyperbolicOverflow { .. }) => return Err(e),
            Err(_) => {}
        }
        match self.laguerre(seed) {
            Ok(x) => return Ok(x),
            Err(e @ PropError::HyperbolicOverflow { .. }) => return Err(e),
            Err(_) => {}
        }
        // a Newton polish from the bisected root always has local convergence
        let x = self.bisect(seed)?;
        Ok(self.newton(x).unwrap_or(x))
    }
}

/// Solves one whole step of the two-body flow, or reports why it cannot.
fn solve_universal(
    mu: f64,
    dt: f64,
    r0v: &Vector3<f64>,
    v0v: &Vector3<f64>,
) -> Result<(Vector3<f64>, Vector3<f64>), PropError> {
    if dt == 0.0 {
        return Ok((*r0v, *v0v));
    }
    let r0 = r0v.norm();
    let v2 = v0v.norm_squared();
    let eta = r0v.dot(v0v);
    let beta = 2.0 * mu / r0 - v2;
    let zeta = mu - beta * r0;
    let b = beta.abs().sqrt();
    let uni = Universal {
        mu,
        dt,
        r0,
        eta,
        beta,
        zeta,
        b,
    };

    let x = if beta == 0.0 {
        // the parabolic time equation is exactly the cubic
        cubic_root(zeta, 3.0 * eta, 6.0 * r0, -6.0 * dt)
    } else if beta > 0.0 {
        uni.solve(uni.elliptic_seed())?
    } else {
        uni.solve(uni.hyperbolic_seed())?
    };

    let g = uni.gvals(x);
    let rmag = uni.radius(&g);
    let fhat = -mu * g.g2 / r0;
    let gfun = eta * g.g2 + r0 * g.g1;
    let gdothat = -mu * g.g2 / rmag;
    let bsa = if beta == 0.0 {
        mu * x / (rmag * r0)
    } else {
        let a = mu / beta.abs();
        (a / rmag) * (b / r0) * 2.0 * g.s_half * g.c_half
    };
    let r_new = r0v + r0v * fhat + v0v * gfun;
    let v_new = v0v - r0v * bsa + v0v * gdothat;
    if !(r_new[0].is_finite() && r_new[1].is_finite() && r_new[2].is_finite()
        && v_new[0].is_finite()
        && v_new[1].is_finite()
        && v_new[2].is_finite())
    {
        return Err(PropError::KeplerNoConvergence);
    }
    Ok((r_new, v_new))
}

/// A real root of a*x^3 + b*x^2 + c*x + d = 0 through the Cardano single-root branch.
///
/// In the three-real-roots regime the smallest positive root is returned (the
/// largest root if none is positive). Degenerate leading coefficients fall back to
/// the quadratic and linear cases.
fn cubic_root(a: f64, b: f64, c: f64, d: f64) -> f64 {
    if a == 0.0 {
        if b == 0.0 {
            if c == 0.0 {
                return 0.0;
            }
            return -d / c;
        }
        let disc = c * c - 4.0 * b * d;
        if disc < 0.0 {
            return -c / (2.0 * b);
        }
        let q = -0.5 * (c + c.signum() * disc.sqrt());
        if q == 0.0 {
            return 0.0;
        }
        return pick_root(&[q / b, d / q]);
    }
    let bn = b / a;
    let cn = c / a;
    let dn = d / a;
    let p = cn - bn * bn / 3.0;
    let q = 2.0 * bn.powi(3) / 27.0 - bn * cn / 3.0 + dn;
    let shift = -bn / 3.0;
    let disc = (0.5 * q).powi(2) + (p / 3.0).powi(3);
    if disc >= 0.0 {
        let sq = disc.sqrt();
        (-0.5 * q + sq).cbrt() + (-0.5 * q - sq).cbrt() + shift
    } else {
        let m = 2.0 * (-p / 3.0).sqrt();
        let arg = (3.0 * q / (p * m)).max(-1.0).min(1.0);
        let theta = arg.acos() / 3.0;
        pick_root(&[
            m * theta.cos() + shift,
            m * (theta - 2.0 * PI / 3.0).cos() + shift,
            m * (theta + 2.0 * PI / 3.0).cos() + shift,
        ])
    }
}

fn pick_root(roots: &[f64]) -> f64 {
    let smallest_positive = roots
        .iter()
        .cloned()
        .filter(|&r| r > 0.0)
        .fold(f64::INFINITY, f64::min);
    if smallest_positive.is_finite() {
        smallest_positive
    } else {
        roots.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cubic_root_selection() {
        // (x - 1)(x - 2)(x - 3): three real roots, the smallest positive one wins
        let x = cubic_root(1.0, -6.0, 11.0, -6.0);
        assert!((x - 1.0).abs() < 1e-12);
        // x^3 + x - 2: single real root at 1
        let x = cubic_root(1.0, 0.0, 1.0, -2.0);
        assert!((x - 1.0).abs() < 1e-12);
        // monotone cubic with a negative root
        let x = cubic_root(1.0, 0.0, 1.0, 2.0);
        assert!((x + 1.0).abs() < 1e-12);
        // degenerate: quadratic and linear fallbacks
        let x = cubic_root(0.0, 1.0, -3.0, 2.0);
        assert!((x - 1.0).abs() < 1e-12);
        let x = cubic_root(0.0, 0.0, 2.0, -4.0);
        assert!((x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_parabolic_g_functions() {
        let uni = Universal {
            mu: 1.0,
            dt: 1.0,
            r0: 1.0,
            eta: 0.0,
            beta: 0.0,
            zeta: 1.0,
            b: 0.0,
        };
        let g = uni.gvals(0.7);
        assert!((g.g1 - 0.7).abs() < 1e-16);
        assert!((g.g2 - 0.245).abs() < 1e-16);
        assert!((g.g3 - 0.7f64.powi(3) / 6.0).abs() < 1e-16);
    }

    #[test]
    fn test_circular_quarter_orbit() {
        use approx::assert_abs_diff_eq;
        // mu = 1, unit circular orbit: a quarter period rotates the state by 90 deg
        let s = Vector6::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0);
        let out = kepler_step_mu(1.0, 0.5 * PI, &s).unwrap();
        assert_abs_diff_eq!(out[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[3], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out[4], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_backward_step_inverts_forward() {
        let s = Vector6::new(0.8, 0.3, -0.1, -0.004, 0.018, 0.002);
        let mu = crate::constants::GM_SUN;
        let fwd = kepler_step_mu(mu, 40.0, &s).unwrap();
        let back = kepler_step_mu(mu, -40.0, &fwd).unwrap();
        for i in 0..6 {
            assert!(
                (back[i] - s[i]).abs() < 1e-12,
                "component {}: {} vs {}",
                i,
                back[i],
                s[i]
            );
        }
    }
}
