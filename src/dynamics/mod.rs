//! The interaction function and its configuration.
//!
//! All integrators of this crate evaluate the same right-hand side: a central-body
//! Keplerian term, the masked planetary perturbers (with their indirect terms), the
//! minor-body perturbers, the additional massive batch members, an optional first-order
//! relativistic correction and an optional radial acceleration. The force model also
//! computes the 6x6 partials of the state derivative on demand and writes a close
//! encounter record per perturbing body on every evaluation.

use crate::constants::{NPLANETS, SUN};

/// Close-encounter bookkeeping.
pub mod encounters;

/// The N-body interaction function.
pub mod nbody;

pub use self::encounters::{EncounterKind, EncounterLog, EncounterRecord};
pub use self::nbody::NBodyDynamics;

/// Explicit force-model configuration, threaded through every call.
///
/// The central body and the relativity flag affect the numerical result, so they live
/// here rather than in ambient state; concurrent propagations with different settings
/// are safe. [`ForceSettings::default`] seeds the relativity flag from the process-wide
/// switch ([`crate::set_relativity`]).
#[derive(Clone, Debug)]
pub struct ForceSettings {
    /// Central body index; its gravitational parameter defines the Keplerian term.
    pub central: usize,
    /// Per-planet perturber mask, indexed 0 = Mercury ... 9 = Moon.
    pub planet_mask: [bool; NPLANETS],
    /// Number of minor-body perturbers to draw from the ephemeris catalogue.
    pub asteroids: usize,
    /// First-order relativistic correction due to the central body (Sun only).
    pub relativity: bool,
    /// Radial acceleration in AU/day^2 applied to massless particles, positive outward.
    pub radial_accel: Option<f64>,
}

impl Default for ForceSettings {
    fn default() -> Self {
        Self {
            central: SUN,
            planet_mask: [false; NPLANETS],
            asteroids: 0,
            relativity: crate::relativity(),
            radial_accel: None,
        }
    }
}

impl ForceSettings {
    /// Heliocentric two-body motion: no perturbers, no relativity.
    pub fn two_body() -> Self {
        Self {
            relativity: false,
            ..Self::default()
        }
    }

    /// All planetary perturbers active.
    pub fn all_planets() -> Self {
        Self {
            planet_mask: [true; NPLANETS],
            ..Self::default()
        }
    }

    /// Enables a single planetary perturber.
    pub fn with_planet(mut self, planet: usize) -> Self {
        self.planet_mask[planet] = true;
        self
    }
}
