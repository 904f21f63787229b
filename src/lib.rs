//! # astroprop
//!
//! An N-body orbit propagation core for solar-system dynamics. The crate advances the
//! Cartesian states of many massless test particles (plus, optionally, a few additional
//! massive bodies) under the Newtonian attraction of the Sun, the planets and the Moon,
//! a catalogue of minor-body perturbers, an optional first-order relativistic correction
//! and an optional radial (radiation-pressure-like) acceleration.
//!
//! Three integrators share one force model:
//!
//!  * a Bulirsch-Stoer variable-order extrapolation integrator built on the modified
//!    midpoint method (cf. the `propagators` module),
//!  * a 15th-order Gauss-Radau implicit single-sequence integrator with adaptive step
//!    control,
//!  * a universal-variable two-body Kepler solver (cf. the `kepler` module).
//!
//! Positions are in AU, velocities in AU/day, epochs in MJD. Perturber positions come
//! from an [`ephemeris::Ephemeris`] provider supplied by the caller; this crate ships
//! only trivial providers for validation. State transition matrices can be carried
//! alongside the states through the Bulirsch-Stoer integrator, and every propagation
//! produces a log of close encounters and impacts with the major bodies.
//!
//! NOTE: It is recommended to compile all code in `astroprop` with the `--release`
//! flag. A lot of heavy computation is done in this library, and no one likes waiting
//! for production code to run.

#[macro_use]
extern crate log;

/// Re-export of the linear algebra backend used throughout the crate.
pub mod dimensions {
    pub use nalgebra::allocator::Allocator;
    pub use nalgebra::{
        DefaultAllocator, DimName, Matrix3, Matrix6, MatrixN, Vector3, Vector6, VectorN, U3, U6,
        U7,
    };
}

/// Crate-wide error type.
pub mod errors;

/// Astrodynamical constants: gravitational parameters, collision radii, unit conversions.
pub mod constants;

/// The batch of integrated bodies: states, optional state transition matrices, masses.
pub mod state;

/// The ephemeris port: perturber positions are queried through this trait.
pub mod ephemeris;

/// The interaction function (accelerations and their partials) and the encounter log.
pub mod dynamics;

/// Provides the integrators and the top-level propagation driver.
pub mod propagators;

/// Universal-variable two-body propagation.
pub mod kepler;

/// Small numerical helpers shared by the library and its validation tests.
pub mod utils;

pub use crate::errors::PropError;
pub use crate::state::ParticleBatch;

use std::sync::atomic::{AtomicBool, Ordering};

static RELATIVITY: AtomicBool = AtomicBool::new(true);

/// Sets the process-wide default for the relativistic correction.
///
/// The switch seeds [`dynamics::ForceSettings::default`]; a settings struct built before
/// the call keeps the value it was created with. Defaults to enabled.
pub fn set_relativity(enabled: bool) {
    RELATIVITY.store(enabled, Ordering::Relaxed);
}

/// Returns the process-wide default for the relativistic correction.
pub fn relativity() -> bool {
    RELATIVITY.load(Ordering::Relaxed)
}
