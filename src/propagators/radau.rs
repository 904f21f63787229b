use crate::dimensions::Vector6;
use crate::dynamics::encounters::EncounterLog;
use crate::dynamics::NBodyDynamics;
use crate::ephemeris::Ephemeris;
use crate::errors::PropError;

/// Everhart's Gauss-Radau spacings, eight nodes on [0, 1).
pub(crate) const H_NODES: [f64; 8] = [
    0.0,
    0.056_262_560_536_922_15,
    0.180_240_691_736_892_36,
    0.352_624_717_113_169_64,
    0.547_153_626_330_555_38,
    0.734_210_177_215_410_53,
    0.885_320_946_839_095_77,
    0.977_520_613_561_287_5,
];

/// System class handled by the Gauss-Radau integrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RadauClass {
    /// y' = f(y, t): the six-component states are integrated as a first-order system.
    FirstOrder,
    /// y'' = f(y, y', t): node velocities are predicted so velocity-dependent forces
    /// are honoured.
    SecondOrder,
    /// y'' = f(y, t): node accelerations are evaluated with the sequence-start
    /// velocity.
    PositionOnly,
}

/// Statistics of one Gauss-Radau integration.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct RadauOutcome {
    pub sequences: usize,
    pub shrinks: u32,
}

/// The inverse node differences 1/(h_k - h_j), the b-from-g coupling coefficients and
/// their inverse, all from the node recurrences.
fn radau_tables() -> ([f64; 28], [f64; 21], [f64; 21]) {
    let h = &H_NODES;
    let mut r = [0.0; 28];
    for k in 1..8 {
        let o = k * (k - 1) / 2;
        for j in 0..k {
            r[o + j] = 1.0 / (h[k] - h[j]);
        }
    }
    let mut c = [0.0; 21];
    let mut d = [0.0; 21];
    c[0] = -h[1];
    d[0] = h[1];
    for t in 2..7 {
        let sp = (t - 1) * (t - 2) / 2;
        let s = t * (t - 1) / 2;
        c[s] = -h[t] * c[sp];
        d[s] = h[1] * d[sp];
        for i in 1..t - 1 {
            c[s + i] = c[sp + i - 1] - h[t] * c[sp + i];
            d[s + i] = d[sp + i - 1] + h[i + 1] * d[sp + i];
        }
        c[s + t - 1] = c[sp + t - 2] - h[t];
        d[s + t - 1] = d[sp + t - 2] + h[t];
    }
    (r, c, d)
}

fn g_from_b(bk: &[f64; 7], d: &[f64; 21]) -> [f64; 7] {
    [
        bk[0] + d[0] * bk[1] + d[1] * bk[2] + d[3] * bk[3] + d[6] * bk[4] + d[10] * bk[5]
            + d[15] * bk[6],
        bk[1] + d[2] * bk[2] + d[4] * bk[3] + d[7] * bk[4] + d[11] * bk[5] + d[16] * bk[6],
        bk[2] + d[5] * bk[3] + d[8] * bk[4] + d[12] * bk[5] + d[17] * bk[6],
        bk[3] + d[9] * bk[4] + d[13] * bk[5] + d[18] * bk[6],
        bk[4] + d[14] * bk[5] + d[19] * bk[6],
        bk[5] + d[20] * bk[6],
        bk[6],
    ]
}

/// Scales the b-coefficients to a step of ratio `q` through the binomial series.
fn q_series(bk: &[f64; 7], q: f64) -> [f64; 7] {
    let q2 = q * q;
    let q3 = q2 * q;
    let q4 = q2 * q2;
    let q5 = q4 * q;
    let q6 = q3 * q3;
    let q7 = q6 * q;
    [
        q * (bk[0] + 2.0 * bk[1] + 3.0 * bk[2] + 4.0 * bk[3] + 5.0 * bk[4] + 6.0 * bk[5]
            + 7.0 * bk[6]),
        q2 * (bk[1] + 3.0 * bk[2] + 6.0 * bk[3] + 10.0 * bk[4] + 15.0 * bk[5] + 21.0 * bk[6]),
        q3 * (bk[2] + 4.0 * bk[3] + 10.0 * bk[4] + 20.0 * bk[5] + 35.0 * bk[6]),
        q4 * (bk[3] + 5.0 * bk[4] + 15.0 * bk[5] + 35.0 * bk[6]),
        q5 * (bk[4] + 6.0 * bk[5] + 21.0 * bk[6]),
        q6 * (bk[5] + 7.0 * bk[6]),
        q7 * bk[6],
    ]
}

/// Adapts the batch to the flat component view of the integrator.
struct System<'a, 'b, E: Ephemeris> {
    dynamics: &'a NBodyDynamics<'b, E>,
    masses: Option<&'a [f64]>,
    class: RadauClass,
    scratch: Vec<Vector6<f64>>,
}

impl<'a, 'b, E: Ephemeris> System<'a, 'b, E> {
    fn eval(
        &mut self,
        mjd: f64,
        x: &[f64],
        v: &[f64],
        f: &mut [f64],
        enc: &mut EncounterLog,
        step: f64,
    ) -> Result<(), PropError> {
        let n = self.scratch.len();
        match self.class {
            RadauClass::FirstOrder => {
                for i in 0..n {
                    for c in 0..6 {
                        self.scratch[i][c] = x[6 * i + c];
                    }
                }
                let deriv = self
                    .dynamics
                    .eom(mjd, &self.scratch, self.masses, Some(enc), step)?;
                for i in 0..n {
                    for c in 0..6 {
                        f[6 * i + c] = deriv[i][c];
                    }
                }
            }
            _ => {
                for i in 0..n {
                    for c in 0..3 {
                        self.scratch[i][c] = x[3 * i + c];
                        self.scratch[i][c + 3] = v[3 * i + c];
                    }
                }
                let deriv = self
                    .dynamics
                    .eom(mjd, &self.scratch, self.masses, Some(enc), step)?;
                for i in 0..n {
                    for c in 0..3 {
                        f[3 * i + c] = deriv[i][c + 3];
                    }
                }
            }
        }
        Ok(())
    }
}

/// Integrates the batch over the signed interval `tf` with the 15th-order implicit
/// Gauss-Radau scheme.
///
/// A non-negative `ll` drives the adaptive step control at ss = 10^(-ll); a negative
/// `ll` fixes the sequence size at `step_hint`. Six predictor-corrector iterations run
/// on the first sequence, two on every following one. The first sequence shrinks by
/// 0.8x the proposed step when the |b7| criterion rejects it, at most ten times; later
/// sequences grow by at most 1.4x and the last one lands exactly on the interval end.
#[allow(clippy::too_many_arguments)]
pub(crate) fn radau15<E: Ephemeris>(
    dynamics: &NBodyDynamics<'_, E>,
    mjd0: f64,
    tf: f64,
    ll: i32,
    class: RadauClass,
    step_hint: f64,
    states: &mut [Vector6<f64>],
    masses: Option<&[f64]>,
    enc: &mut EncounterLog,
) -> Result<RadauOutcome, PropError> {
    if states.is_empty() {
        return Err(PropError::EmptyBatch);
    }
    let mut outcome = RadauOutcome::default();
    if tf == 0.0 {
        return Ok(outcome);
    }

    let (rt, ct, dt) = radau_tables();
    let first_order = class == RadauClass::FirstOrder;
    let full_second = class == RadauClass::SecondOrder;
    let per_body = if first_order { 6 } else { 3 };
    let nv = per_body * states.len();

    let mut w = [0.0f64; 7];
    let mut u = [0.0f64; 7];
    for m in 0..7 {
        let nn = (m + 2) as f64;
        w[m] = if first_order { 1.0 / nn } else { 1.0 / (nn + nn * nn) };
        u[m] = 1.0 / nn;
    }
    let w1 = if first_order { 1.0 } else { 0.5 };

    let mut x = vec![0.0f64; nv];
    let mut v = vec![0.0f64; nv];
    for (i, s) in states.iter().enumerate() {
        if first_order {
            for c in 0..6 {
                x[6 * i + c] = s[c];
            }
        } else {
            for c in 0..3 {
                x[3 * i + c] = s[c];
                v[3 * i + c] = s[c + 3];
            }
        }
    }

    let dir = tf.signum();
    let adaptive = ll >= 0;
    let ss = 10f64.powf(-f64::from(ll));
    let mut t = if step_hint != 0.0 {
        step_hint.abs() * dir
    } else {
        0.1 * dir
    };
    let mut last = false;
    if dir * t >= dir * tf - 1e-8 {
        t = tf;
        last = true;
    }

    let mut b = vec![[0.0f64; 7]; nv];
    let mut e = vec![[0.0f64; 7]; nv];
    let mut bd = vec![[0.0f64; 7]; nv];
    let mut g = vec![[0.0f64; 7]; nv];
    let mut f1 = vec![0.0f64; nv];
    let mut fj = vec![0.0f64; nv];
    let mut xs = vec![0.0f64; nv];
    let mut vs = vec![0.0f64; nv];

    let mut system = System {
        dynamics,
        masses,
        class,
        scratch: vec![Vector6::zeros(); states.len()],
    };

    let mut tm = 0.0f64;
    let mut first_seq = true;

    loop {
        outcome.sequences += 1;
        system.eval(mjd0 + tm, &x, &v, &mut f1, enc, t.abs())?;
        let ni = if first_seq { 6 } else { 2 };

        'attempt: loop {
            for k in 0..nv {
                g[k] = g_from_b(&b[k], &dt);
            }
            for _ in 0..ni {
                for j in 1..8 {
                    let s = H_NODES[j];
                    let q = if first_order { 1.0 } else { s };
                    let t2 = if first_order { t } else { t * t };
                    for k in 0..nv {
                        let bk = &b[k];
                        let tail = w[2] * bk[2]
                            + s * (w[3] * bk[3]
                                + s * (w[4] * bk[4] + s * (w[5] * bk[5] + s * w[6] * bk[6])));
                        xs[k] = x[k]
                            + q * (t * v[k]
                                + t2 * s
                                    * (f1[k] * w1
                                        + s * (w[0] * bk[0] + s * (w[1] * bk[1] + s * tail))));
                        if full_second {
                            let tail = u[2] * bk[2]
                                + s * (u[3] * bk[3]
                                    + s * (u[4] * bk[4] + s * (u[5] * bk[5] + s * u[6] * bk[6])));
                            vs[k] = v[k]
                                + t * s
                                    * (f1[k]
                                        + s * (u[0] * bk[0] + s * (u[1] * bk[1] + s * tail)));
                        } else {
                            vs[k] = v[k];
                        }
                    }
                    system.eval(mjd0 + tm + s * t, &xs, &vs, &mut fj, enc, t.abs())?;
                    let o = j * (j - 1) / 2;
                    let m = j - 1;
                    for k in 0..nv {
                        let mut gk = (fj[k] - f1[k]) * rt[o];
                        for i in 1..j {
                            gk = (gk - g[k][i - 1]) * rt[o + i];
                        }
                        let dg = gk - g[k][m];
                        g[k][m] = gk;
                        if m == 0 {
                            b[k][0] += dg;
                        } else {
                            let sm = m * (m - 1) / 2;
                            for i in 0..m {
                                b[k][i] += ct[sm + i] * dg;
                            }
                            b[k][m] += dg;
                        }
                    }
                }
            }

            if adaptive && first_seq {
                let hv = b.iter().map(|bk| bk[6].abs()).fold(0.0, f64::max) * w[6]
                    / t.abs().powi(7);
                let tp = (ss / hv).powf(1.0 / 9.0) * dir;
                if tp / t <= 1.0 {
                    outcome.shrinks += 1;
                    if outcome.shrinks > 10 {
                        warn!(
                            "Gauss-Radau first sequence at MJD {} shrank more than 10 times",
                            mjd0 + tm
                        );
                        return Err(PropError::RadauStepCollapse(10));
                    }
                    let tnew = 0.8 * tp;
                    debug!(
                        "Gauss-Radau shrinking first sequence from {:.3e} to {:.3e} d",
                        t, tnew
                    );
                    let ratio = tnew / t;
                    for k in 0..nv {
                        b[k] = q_series(&b[k], ratio);
                        bd[k] = [0.0; 7];
                    }
                    t = tnew;
                    last = dir * (tm + t) >= dir * tf - 1e-8;
                    if last {
                        t = tf - tm;
                    }
                    continue 'attempt;
                }
            }
            break 'attempt;
        }

        let t2 = if first_order { t } else { t * t };
        for k in 0..nv {
            let bk = &b[k];
            x[k] += v[k] * t
                + t2 * (f1[k] * w1
                    + bk[0] * w[0]
                    + bk[1] * w[1]
                    + bk[2] * w[2]
                    + bk[3] * w[3]
                    + bk[4] * w[4]
                    + bk[5] * w[5]
                    + bk[6] * w[6]);
            if !first_order {
                v[k] += t
                    * (f1[k]
                        + bk[0] * u[0]
                        + bk[1] * u[1]
                        + bk[2] * u[2]
                        + bk[3] * u[3]
                        + bk[4] * u[4]
                        + bk[5] * u[5]
                        + bk[6] * u[6]);
            }
        }
        tm += t;
        if last {
            break;
        }

        let mut tp = if adaptive {
            let hv =
                b.iter().map(|bk| bk[6].abs()).fold(0.0, f64::max) * w[6] / t.abs().powi(7);
            dir * (ss / hv).powf(1.0 / 9.0)
        } else {
            step_hint.abs() * dir
        };
        if tp / t > 1.4 {
            tp = t * 1.4;
        }
        if dir * (tm + tp) >= dir * tf - 1e-8 {
            tp = tf - tm;
            last = true;
        }

        let ratio = tp / t;
        for k in 0..nv {
            if !first_seq {
                for m in 0..7 {
                    bd[k][m] = b[k][m] - e[k][m];
                }
            }
            e[k] = q_series(&b[k], ratio);
            for m in 0..7 {
                b[k][m] = e[k][m] + bd[k][m];
            }
        }
        first_seq = false;
        t = tp;
    }

    for (i, s) in states.iter_mut().enumerate() {
        if first_order {
            for c in 0..6 {
                s[c] = x[6 * i + c];
            }
        } else {
            for c in 0..3 {
                s[c] = x[3 * i + c];
                s[c + 3] = v[3 * i + c];
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupling_tables() {
        let (r, c, d) = radau_tables();
        let h = &H_NODES;
        // first inverse difference is 1/h1
        assert!((r[0] - 1.0 / h[1]).abs() < 1e-14);
        // last one spans the two outermost interior nodes
        assert!((r[27] - 1.0 / (h[7] - h[6])).abs() < 1e-14);
        // the c rows carry signed elementary symmetric polynomials of the nodes
        assert!((c[0] + h[1]).abs() < 1e-16);
        assert!((c[1] - h[1] * h[2]).abs() < 1e-16);
        assert!((c[2] + (h[1] + h[2])).abs() < 1e-16);
        assert!((c[3] + h[1] * h[2] * h[3]).abs() < 1e-16);
        // and each d row ends on the plain node sum
        assert!((d[2] - (h[1] + h[2])).abs() < 1e-16);
        assert!((d[5] - (h[1] + h[2] + h[3])).abs() < 1e-16);
        // c and d are inverse couplings: g(b(g)) must be the identity
        let g0 = [0.3, -1.2, 0.07, 2.4, -0.9, 0.51, -0.02];
        let mut b = [0.0f64; 7];
        for m in (0..7).rev() {
            // apply the b-update ladder with dg = g0[m] on a zeroed g
            let dg = g0[m];
            if m == 0 {
                b[0] += dg;
            } else {
                let sm = m * (m - 1) / 2;
                for i in 0..m {
                    b[i] += c[sm + i] * dg;
                }
                b[m] += dg;
            }
        }
        let back = g_from_b(&b, &d);
        for m in 0..7 {
            assert!(
                (back[m] - g0[m]).abs() < 1e-12,
                "g[{}]: {} vs {}",
                m,
                back[m],
                g0[m]
            );
        }
    }

    #[test]
    fn test_q_series_identity() {
        use approx::assert_abs_diff_eq;
        let bk = [1.0, -0.5, 0.25, -0.125, 0.0625, -0.03125, 0.015625];
        let e = q_series(&bk, 1.0);
        // at q = 1 the series sums plain binomials
        assert_abs_diff_eq!(e[6], bk[6], epsilon = 1e-16);
        assert_abs_diff_eq!(e[5], bk[5] + 7.0 * bk[6], epsilon = 1e-16);
        // at q = 0 the prediction vanishes
        let z = q_series(&bk, 0.0);
        assert!(z.iter().all(|&x| x == 0.0));
    }
}
