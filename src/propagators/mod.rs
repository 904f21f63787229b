//! The integrators and the top-level propagation driver.
//!
//! A propagation slices the requested interval into whole signed steps of the
//! configured size plus a trailing remainder, dispatches each slice to the selected
//! integrator (Bulirsch-Stoer extrapolation or Gauss-Radau 15), finishes a
//! numerically negligible remainder with a cheap fixed modified-midpoint call, and
//! merges the per-slice encounter logs.

use crate::dynamics::encounters::EncounterLog;
use crate::dynamics::NBodyDynamics;
use crate::ephemeris::Ephemeris;
use crate::errors::PropError;
use crate::state::ParticleBatch;
use hifitime::Epoch;

mod bulirsch;
mod extrapolation;
mod midpoint;
mod radau;

pub use self::extrapolation::BsExtrapolation;
pub use self::radau::RadauClass;

use self::bulirsch::bs_step;
use self::midpoint::midpoint_step;
use self::radau::radau15;

/// Remainders below this threshold are handed to the midpoint finisher instead of a
/// full integrator step.
const RSTEP_TOL: f64 = 10.0 * f64::EPSILON;

/// Integration method of a propagation.
#[derive(Clone, Copy, Debug)]
pub enum Method {
    /// Bulirsch-Stoer with the chosen extrapolation flavour.
    BulirschStoer(BsExtrapolation),
    /// Gauss-Radau 15. A non-negative `ll` selects the adaptive tolerance
    /// ss = 10^(-ll); a negative `ll` fixes the sequence size at the step size.
    GaussRadau15 { ll: i32, class: RadauClass },
}

/// Propagation options: the method and the whole-step size in days.
#[derive(Clone, Copy, Debug)]
pub struct PropOpts {
    pub method: Method,
    /// Magnitude of the whole-step slices; the sign is taken from the interval.
    pub step: f64,
}

impl PropOpts {
    /// Bulirsch-Stoer with polynomial extrapolation over whole steps of `step` days.
    pub fn bulirsch_stoer(step: f64) -> Self {
        Self {
            method: Method::BulirschStoer(BsExtrapolation::Polynomial),
            step,
        }
    }

    /// Gauss-Radau 15 over whole steps of `step` days.
    pub fn gauss_radau(step: f64, ll: i32, class: RadauClass) -> Self {
        Self {
            method: Method::GaussRadau15 { ll, class },
            step,
        }
    }
}

impl Default for PropOpts {
    fn default() -> Self {
        Self::bulirsch_stoer(5.0)
    }
}

/// Which finisher handled the trailing remainder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finisher {
    /// The interval sliced into whole steps exactly.
    None,
    /// One extra integrator step over the remainder.
    Integrator,
    /// A ten-substep modified-midpoint call over a negligible remainder.
    Midpoint,
}

/// Details of a completed propagation.
#[derive(Clone, Debug)]
pub struct PropReport {
    /// Closest approaches and impacts, merged over every slice.
    pub encounters: EncounterLog,
    /// Whole steps of `PropOpts::step` days that were dispatched.
    pub whole_steps: usize,
    /// The trailing remainder in days (signed).
    pub remainder: f64,
    pub finisher: Finisher,
    /// False when some particle exhausted the Bulirsch-Stoer substep sequence
    /// without converging; its state is then the last extrapolation column.
    pub converged: bool,
    /// Gauss-Radau sequences run across the whole propagation.
    pub radau_sequences: usize,
    /// Gauss-Radau first-sequence shrinks across the whole propagation.
    pub radau_shrinks: u32,
}

/// Drives a batch through the configured integrator between two epochs.
pub struct Propagator<'a, E: Ephemeris> {
    dynamics: NBodyDynamics<'a, E>,
    opts: PropOpts,
}

impl<'a, E: Ephemeris> Propagator<'a, E> {
    pub fn new(dynamics: NBodyDynamics<'a, E>, opts: PropOpts) -> Self {
        Self { dynamics, opts }
    }

    pub fn dynamics(&self) -> &NBodyDynamics<'a, E> {
        &self.dynamics
    }

    /// Propagates the batch between two epochs.
    pub fn propagate(
        &self,
        from: Epoch,
        to: Epoch,
        batch: &mut ParticleBatch,
    ) -> Result<PropReport, PropError> {
        self.propagate_mjd(from.as_mjd_tai_days(), to.as_mjd_tai_days(), batch)
    }

    /// Propagates the batch from MJD `t0` to MJD `t1`.
    ///
    /// The interval splits into `floor(|t1 - t0| / step)` whole signed steps plus a
    /// remainder no larger than the step (checked). Each whole step and a
    /// non-negligible remainder go to the configured integrator; a remainder below
    /// ten machine epsilons is finished with a single ten-substep midpoint call.
    pub fn propagate_mjd(
        &self,
        t0: f64,
        t1: f64,
        batch: &mut ParticleBatch,
    ) -> Result<PropReport, PropError> {
        if batch.is_empty() {
            return Err(PropError::EmptyBatch);
        }
        if matches!(self.opts.method, Method::GaussRadau15 { .. }) && batch.stms().is_some() {
            // STM propagation through Gauss-Radau is a future extension
            return Err(PropError::StmUnavailable);
        }

        let span = t1 - t0;
        let step = self.opts.step.abs();
        let dir = if span < 0.0 { -1.0 } else { 1.0 };
        let h = step * dir;
        let whole = if span == 0.0 {
            0
        } else {
            (span.abs() / step).floor() as usize
        };
        let rem = span - whole as f64 * h;
        if rem.abs() > step {
            return Err(PropError::RemainderExceedsStep { rem, step });
        }

        let mut report = PropReport {
            encounters: EncounterLog::new(batch.len(), batch.n_additional()),
            whole_steps: whole,
            remainder: rem,
            finisher: Finisher::None,
            converged: true,
            radau_sequences: 0,
            radau_shrinks: 0,
        };

        let mut t = t0;
        for _ in 0..whole {
            self.one_step(t, h, batch, &mut report)?;
            t += h;
        }

        if rem != 0.0 {
            if rem.abs() > RSTEP_TOL {
                self.one_step(t, rem, batch, &mut report)?;
                report.finisher = Finisher::Integrator;
            } else {
                let mut enc = EncounterLog::new(batch.len(), batch.n_additional());
                let (out, out_stm) = midpoint_step(
                    &self.dynamics,
                    t,
                    rem,
                    10,
                    batch.states(),
                    batch.stms(),
                    batch.masses(),
                    &mut enc,
                )?;
                batch.states_mut().copy_from_slice(&out);
                if let (Some(stms), Some(new)) = (batch.stms_mut(), out_stm) {
                    *stms = new;
                }
                report.encounters.merge_from(&enc);
                report.finisher = Finisher::Midpoint;
            }
        }
        Ok(report)
    }

    /// Like [`Propagator::propagate_mjd`], but merges the encounters into a
    /// caller-owned log after checking that it is wide enough for this batch.
    pub fn propagate_into(
        &self,
        t0: f64,
        t1: f64,
        batch: &mut ParticleBatch,
        enc: &mut EncounterLog,
    ) -> Result<PropReport, PropError> {
        enc.check_dims(batch.len(), batch.n_additional())?;
        let report = self.propagate_mjd(t0, t1, batch)?;
        enc.merge_from(&report.encounters);
        Ok(report)
    }

    fn one_step(
        &self,
        t: f64,
        h: f64,
        batch: &mut ParticleBatch,
        report: &mut PropReport,
    ) -> Result<(), PropError> {
        let mut enc = EncounterLog::new(batch.len(), batch.n_additional());
        let (states, stms, masses) = batch.parts_mut();
        match self.opts.method {
            Method::BulirschStoer(variant) => {
                let ok = bs_step(
                    &self.dynamics,
                    t,
                    h,
                    states,
                    stms,
                    masses,
                    variant,
                    &mut enc,
                )?;
                report.converged &= ok;
            }
            Method::GaussRadau15 { ll, class } => {
                let out = radau15(
                    &self.dynamics,
                    t,
                    h,
                    ll,
                    class,
                    self.opts.step,
                    states,
                    masses,
                    &mut enc,
                )?;
                report.radau_sequences += out.sequences;
                report.radau_shrinks += out.shrinks;
            }
        }
        report.encounters.merge_from(&enc);
        Ok(())
    }
}

#[test]
fn test_options() {
    let opts = PropOpts::bulirsch_stoer(2.5);
    assert_eq!(opts.step, 2.5);
    assert!(matches!(
        opts.method,
        Method::BulirschStoer(BsExtrapolation::Polynomial)
    ));

    let opts = PropOpts::gauss_radau(10.0, 12, RadauClass::SecondOrder);
    assert_eq!(opts.step, 10.0);
    assert!(matches!(
        opts.method,
        Method::GaussRadau15 {
            ll: 12,
            class: RadauClass::SecondOrder
        }
    ));

    let opts: PropOpts = Default::default();
    assert_eq!(opts.step, 5.0);
}
