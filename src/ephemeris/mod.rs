//! The ephemeris port.
//!
//! The force model consumes perturber positions through the [`Ephemeris`] trait and
//! nothing else: where those positions come from (a JPL development ephemeris, a
//! Chebyshev interpolation table, an analytic theory) is the caller's concern. States
//! are heliocentric equatorial, AU and AU/day, indexed 0 = Mercury ... 8 = Pluto,
//! 9 = Moon. Planetary masses, gravitational parameters and collision radii are
//! compile-time tables in the [`constants`](crate::constants) module.

use crate::constants::NPLANETS;
use crate::dimensions::{Vector3, Vector6};
use crate::errors::PropError;

/// Supplies perturber states to the force model.
pub trait Ephemeris {
    /// Heliocentric states of the nine planets and the Moon at the requested epoch.
    fn planetary_states(&self, mjd: f64) -> Result<[Vector6<f64>; NPLANETS], PropError>;

    /// Heliocentric positions of the first `count` minor-body perturbers at the
    /// requested epoch.
    fn asteroid_positions(&self, mjd: f64, count: usize) -> Result<Vec<Vector3<f64>>, PropError>;

    /// Masses (in solar masses) of the first `count` minor-body perturbers.
    fn asteroid_masses(&self, count: usize) -> Result<Vec<f64>, PropError>;
}

/// Provider for purely two-body or Kepler-only runs.
///
/// Every query fails: with all planetary perturbers masked off, no minor bodies and a
/// heliocentric frame, the force model never queries the ephemeris, so nothing is lost.
/// A propagation that does need perturbers surfaces the error immediately instead of
/// silently integrating against a missing solar system.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoEphemeris;

impl Ephemeris for NoEphemeris {
    fn planetary_states(&self, mjd: f64) -> Result<[Vector6<f64>; NPLANETS], PropError> {
        Err(PropError::Ephemeris(format!(
            "no ephemeris provider configured (lookup at MJD {})",
            mjd
        )))
    }

    fn asteroid_positions(&self, mjd: f64, _count: usize) -> Result<Vec<Vector3<f64>>, PropError> {
        Err(PropError::Ephemeris(format!(
            "no ephemeris provider configured (lookup at MJD {})",
            mjd
        )))
    }

    fn asteroid_masses(&self, _count: usize) -> Result<Vec<f64>, PropError> {
        Err(PropError::Ephemeris(
            "no ephemeris provider configured".to_string(),
        ))
    }
}

/// Fixed-state provider: every query returns the same states regardless of epoch.
///
/// Useful for validation runs with frozen perturbers (e.g. a close-approach scenario
/// against a body parked at a known position).
#[derive(Clone, Debug)]
pub struct StaticEphemeris {
    planets: [Vector6<f64>; NPLANETS],
    asteroids: Vec<(Vector3<f64>, f64)>,
}

impl StaticEphemeris {
    pub fn new(planets: [Vector6<f64>; NPLANETS]) -> Self {
        Self {
            planets,
            asteroids: Vec::new(),
        }
    }

    /// Adds frozen minor-body perturbers as (position, mass) pairs.
    pub fn with_asteroids(mut self, asteroids: Vec<(Vector3<f64>, f64)>) -> Self {
        self.asteroids = asteroids;
        self
    }
}

impl Ephemeris for StaticEphemeris {
    fn planetary_states(&self, _mjd: f64) -> Result<[Vector6<f64>; NPLANETS], PropError> {
        Ok(self.planets)
    }

    fn asteroid_positions(&self, _mjd: f64, count: usize) -> Result<Vec<Vector3<f64>>, PropError> {
        if count > self.asteroids.len() {
            return Err(PropError::Ephemeris(format!(
                "{} minor-body perturbers requested, {} available",
                count,
                self.asteroids.len()
            )));
        }
        Ok(self.asteroids[..count].iter().map(|(p, _)| *p).collect())
    }

    fn asteroid_masses(&self, count: usize) -> Result<Vec<f64>, PropError> {
        if count > self.asteroids.len() {
            return Err(PropError::Ephemeris(format!(
                "{} minor-body perturbers requested, {} available",
                count,
                self.asteroids.len()
            )));
        }
        Ok(self.asteroids[..count].iter().map(|(_, m)| *m).collect())
    }
}
