use super::encounters::{EncounterKind, EncounterLog};
use super::ForceSettings;
use crate::constants::{planetary_mu, GM_SUN, NBODIES, PLANETARY_RADII, SPEED_OF_LIGHT, SUN};
use crate::dimensions::{Matrix6, Vector3, Vector6, VectorN, U3, U6, U7};
use crate::ephemeris::Ephemeris;
use crate::errors::PropError;
use hyperdual::linalg::norm;
use hyperdual::{hyperspace_from_vector, Hyperdual};

type Dual = Hyperdual<f64, U7>;

/// One perturbing body at the evaluation epoch, rebased on the central body.
struct Perturber {
    /// Column in the encounter log; minor bodies are not logged.
    column: Option<usize>,
    pos: Vector3<f64>,
    gm: f64,
    radius: f64,
}

/// The N-body interaction function.
///
/// Evaluates the time derivative of each batch member's state: the first three
/// components are the velocity, the last three the acceleration under the central
/// body, the configured perturbers, and the optional relativistic and radial terms.
/// `eom_grad` additionally produces the 6x6 partials of the derivative with respect
/// to the member's own state, evaluated with hyperdual numbers so that the
/// velocity-dependent relativistic block comes out exact.
#[derive(Debug)]
pub struct NBodyDynamics<'a, E: Ephemeris> {
    eph: &'a E,
    cfg: ForceSettings,
}

impl<'a, E: Ephemeris> NBodyDynamics<'a, E> {
    /// Builds the force model, validating the frame of the relativistic correction.
    pub fn new(eph: &'a E, cfg: ForceSettings) -> Result<Self, PropError> {
        if cfg.relativity && cfg.central != SUN {
            return Err(PropError::RelativityFrame);
        }
        Ok(Self { eph, cfg })
    }

    pub fn settings(&self) -> &ForceSettings {
        &self.cfg
    }

    /// Gathers the active perturbers at `mjd`, positions relative to the central body.
    ///
    /// With a non-heliocentric central body the planetary states are rebased by
    /// subtracting the central body's heliocentric position, the central body itself
    /// drops out of the perturber set, and the Sun joins it unconditionally.
    fn perturbers(&self, mjd: f64) -> Result<Vec<Perturber>, PropError> {
        let cfg = &self.cfg;
        let mut list = Vec::new();
        let mut r_central = Vector3::zeros();
        let need_planets = cfg.planet_mask.iter().any(|&m| m) || cfg.central != SUN;
        if need_planets {
            let planets = self.eph.planetary_states(mjd)?;
            if cfg.central != SUN {
                r_central = planets[cfg.central].fixed_rows::<U3>(0).into_owned();
            }
            for (j, s) in planets.iter().enumerate() {
                if j == cfg.central || !cfg.planet_mask[j] {
                    continue;
                }
                list.push(Perturber {
                    column: Some(j),
                    pos: s.fixed_rows::<U3>(0).into_owned() - r_central,
                    gm: planetary_mu(j),
                    radius: PLANETARY_RADII[j],
                });
            }
            if cfg.central != SUN {
                list.push(Perturber {
                    column: Some(SUN),
                    pos: -r_central,
                    gm: GM_SUN,
                    radius: PLANETARY_RADII[SUN],
                });
            }
        }
        if cfg.asteroids > 0 {
            let positions = self.eph.asteroid_positions(mjd, cfg.asteroids)?;
            let masses = self.eph.asteroid_masses(cfg.asteroids)?;
            for (pos, mass) in positions.into_iter().zip(masses) {
                list.push(Perturber {
                    column: None,
                    pos: pos - r_central,
                    gm: GM_SUN * mass,
                    radius: 0.0,
                });
            }
        }
        Ok(list)
    }

    /// Index of the first additional perturber in the batch.
    fn first_massive(&self, n: usize, masses: Option<&[f64]>) -> usize {
        masses.map_or(n, |m| m.iter().position(|&x| x > 0.0).unwrap_or(n))
    }

    /// Evaluates the state derivatives of the whole batch at `mjd`.
    ///
    /// `step` tags the encounter records with the substep magnitude they were taken at.
    pub fn eom(
        &self,
        mjd: f64,
        states: &[Vector6<f64>],
        masses: Option<&[f64]>,
        mut enc: Option<&mut EncounterLog>,
        step: f64,
    ) -> Result<Vec<Vector6<f64>>, PropError> {
        let perts = self.perturbers(mjd)?;
        let mu_c = planetary_mu(self.cfg.central);
        let n = states.len();
        let first_massive = self.first_massive(n, masses);
        let mut derivs = Vec::with_capacity(n);

        for i in 0..n {
            let r = states[i].fixed_rows::<U3>(0).into_owned();
            let v = states[i].fixed_rows::<U3>(3).into_owned();
            let rm2 = r.norm_squared();
            let rm = rm2.sqrt();
            let rm3 = rm2 * rm;
            let mut a = r * (-mu_c / rm3);

            if let Some(log) = enc.as_deref_mut() {
                let kind = if rm < PLANETARY_RADII[self.cfg.central] {
                    EncounterKind::Impact
                } else {
                    EncounterKind::Approach
                };
                log.record(i, self.cfg.central, mjd, kind, rm, step.abs());
            }

            for p in &perts {
                let delta = p.pos - r;
                let dm2 = delta.norm_squared();
                let dm = dm2.sqrt();
                let dm3 = dm2 * dm;
                let pm = p.pos.norm();
                let pm3 = pm * pm * pm;
                a += (delta / dm3 - p.pos / pm3) * p.gm;
                if let (Some(col), Some(log)) = (p.column, enc.as_deref_mut()) {
                    let kind = if dm < p.radius {
                        EncounterKind::Impact
                    } else {
                        EncounterKind::Approach
                    };
                    log.record(i, col, mjd, kind, dm, step.abs());
                }
            }

            // Additional perturbers attract the massless particles only.
            if i < first_massive {
                if let Some(masses) = masses {
                    for k in first_massive..n {
                        let gm = GM_SUN * masses[k];
                        let rk = states[k].fixed_rows::<U3>(0).into_owned();
                        let delta = rk - r;
                        let dm2 = delta.norm_squared();
                        let dm = dm2.sqrt();
                        let dm3 = dm2 * dm;
                        let km = rk.norm();
                        let km3 = km * km * km;
                        a += (delta / dm3 - rk / km3) * gm;
                        if let Some(log) = enc.as_deref_mut() {
                            log.record(
                                i,
                                NBODIES + (k - first_massive),
                                mjd,
                                EncounterKind::Approach,
                                dm,
                                step.abs(),
                            );
                        }
                    }
                }
            }

            if self.cfg.relativity {
                let v2 = v.norm_squared();
                let rv = r.dot(&v);
                let c2 = SPEED_OF_LIGHT * SPEED_OF_LIGHT;
                let r4 = rm2 * rm2;
                a += (r * (4.0 * GM_SUN / r4 - v2 / rm3) + v * (4.0 * rv / rm3)) * (GM_SUN / c2);
            }

            if let Some(ra) = self.cfg.radial_accel {
                if i < first_massive {
                    a += r * (ra / rm);
                }
            }

            if !(a[0].is_finite() && a[1].is_finite() && a[2].is_finite()) {
                return Err(PropError::NonFinite(mjd));
            }
            derivs.push(Vector6::new(v[0], v[1], v[2], a[0], a[1], a[2]));
        }
        Ok(derivs)
    }

    /// Evaluates the state derivatives and their 6x6 partials for the whole batch.
    ///
    /// The top blocks of each partial matrix are (0 | I); the lower blocks hold
    /// da/dr and da/dv. Cross-particle sensitivities are not tracked: the partials
    /// are with respect to each member's own state.
    pub fn eom_grad(
        &self,
        mjd: f64,
        states: &[Vector6<f64>],
        masses: Option<&[f64]>,
        mut enc: Option<&mut EncounterLog>,
        step: f64,
    ) -> Result<(Vec<Vector6<f64>>, Vec<Matrix6<f64>>), PropError> {
        let perts = self.perturbers(mjd)?;
        let mu_c = planetary_mu(self.cfg.central);
        let n = states.len();
        let first_massive = self.first_massive(n, masses);
        let mut derivs = Vec::with_capacity(n);
        let mut grads = Vec::with_capacity(n);

        for i in 0..n {
            let hyperstate: VectorN<Dual, U6> = hyperspace_from_vector(&states[i]);
            let r = hyperstate.fixed_rows::<U3>(0).into_owned();
            let v = hyperstate.fixed_rows::<U3>(3).into_owned();
            let rm = norm(&r);
            let rm3 = rm * rm * rm;
            let mut a: Vector3<Dual> = r * (Dual::from_real(-mu_c) / rm3);

            if let Some(log) = enc.as_deref_mut() {
                let dist = rm[0];
                let kind = if dist < PLANETARY_RADII[self.cfg.central] {
                    EncounterKind::Impact
                } else {
                    EncounterKind::Approach
                };
                log.record(i, self.cfg.central, mjd, kind, dist, step.abs());
            }

            for p in &perts {
                let delta = lift(&p.pos) - &r;
                let dm = norm(&delta);
                let dm3 = dm * dm * dm;
                let pm = p.pos.norm();
                let indirect = p.pos * (p.gm / (pm * pm * pm));
                a += delta * (Dual::from_real(p.gm) / dm3) - lift(&indirect);
                if let (Some(col), Some(log)) = (p.column, enc.as_deref_mut()) {
                    let dist = dm[0];
                    let kind = if dist < p.radius {
                        EncounterKind::Impact
                    } else {
                        EncounterKind::Approach
                    };
                    log.record(i, col, mjd, kind, dist, step.abs());
                }
            }

            if i < first_massive {
                if let Some(masses) = masses {
                    for k in first_massive..n {
                        let gm = GM_SUN * masses[k];
                        let rk = states[k].fixed_rows::<U3>(0).into_owned();
                        let delta = lift(&rk) - &r;
                        let dm = norm(&delta);
                        let dm3 = dm * dm * dm;
                        let km = rk.norm();
                        let indirect = rk * (gm / (km * km * km));
                        a += delta * (Dual::from_real(gm) / dm3) - lift(&indirect);
                        if let Some(log) = enc.as_deref_mut() {
                            log.record(
                                i,
                                NBODIES + (k - first_massive),
                                mjd,
                                EncounterKind::Approach,
                                dm[0],
                                step.abs(),
                            );
                        }
                    }
                }
            }

            if self.cfg.relativity {
                let v2 = ddot(&v, &v);
                let rv = ddot(&r, &v);
                let gm = Dual::from_real(GM_SUN);
                let four = Dual::from_real(4.0);
                let c2 = Dual::from_real(SPEED_OF_LIGHT * SPEED_OF_LIGHT);
                let r4 = rm * rm * rm * rm;
                let rel = r * (four * gm / r4 - v2 / rm3) + v * (four * rv / rm3);
                a += rel * (gm / c2);
            }

            if let Some(ra) = self.cfg.radial_accel {
                if i < first_massive {
                    a += r * (Dual::from_real(ra) / rm);
                }
            }

            let mut fx = Vector6::zeros();
            let mut grad = Matrix6::zeros();
            for q in 0..3 {
                fx[q] = v[q][0];
                fx[q + 3] = a[q][0];
                for j in 0..6 {
                    grad[(q, j)] = v[q][j + 1];
                    grad[(q + 3, j)] = a[q][j + 1];
                }
            }
            if !(fx[3].is_finite() && fx[4].is_finite() && fx[5].is_finite()) {
                return Err(PropError::NonFinite(mjd));
            }
            derivs.push(fx);
            grads.push(grad);
        }
        Ok((derivs, grads))
    }
}

fn lift(v: &Vector3<f64>) -> Vector3<Dual> {
    Vector3::new(
        Dual::from_real(v[0]),
        Dual::from_real(v[1]),
        Dual::from_real(v[2]),
    )
}

fn ddot(a: &Vector3<Dual>, b: &Vector3<Dual>) -> Dual {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
