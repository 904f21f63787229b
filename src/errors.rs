use thiserror::Error;

/// The error type returned by every fallible entry point of this crate.
///
/// On error the caller's state and STM buffers may hold values from the last successful
/// step; working buffers are always released. There is no panicking path in the library.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PropError {
    /// The ephemeris provider refused the lookup.
    #[error("ephemeris lookup failed: {0}")]
    Ephemeris(String),
    /// The relativistic correction is only defined for a heliocentric force model.
    #[error("relativistic correction requires the Sun as central body")]
    RelativityFrame,
    /// Newton, Laguerre and bisection all failed on the universal Kepler equation.
    #[error("universal Kepler solver did not converge")]
    KeplerNoConvergence,
    /// The recursive step splitter of the Kepler solver hit its depth bound.
    #[error("universal Kepler step splitting exceeded depth {0}")]
    KeplerDepthExceeded(u32),
    /// The hyperbolic anomaly argument grew past the overflow guard of the active
    /// iterate family. Triggers the recursive step splitter when it happens inside
    /// `kepler_step`.
    #[error("hyperbolic anomaly argument {arg:.3e} exceeds overflow guard {guard}")]
    HyperbolicOverflow { arg: f64, guard: f64 },
    /// More than ten step shrinks on the first Gauss-Radau sequence.
    #[error("Gauss-Radau step collapsed: more than {0} shrinks on the first sequence")]
    RadauStepCollapse(u32),
    /// State transition matrices are not available through the Gauss-Radau integrator.
    #[error("state transition matrices are not available with the Gauss-Radau integrator")]
    StmUnavailable,
    /// The trailing remainder of the interval slicing exceeds the step size.
    #[error("integration remainder {rem:.6e} d exceeds the step size {step:.6e} d")]
    RemainderExceedsStep { rem: f64, step: f64 },
    /// Nothing to integrate.
    #[error("cannot propagate an empty particle batch")]
    EmptyBatch,
    /// Additional massive perturbers must trail the massless particles in a batch.
    #[error("additional perturbers must trail the massless particles in the batch")]
    MassOrdering,
    /// The caller-supplied encounter log is too narrow for this batch.
    #[error("encounter log holds {rows} x {cols} records, this propagation needs {need_rows} x {need_cols}")]
    EncounterBufferTooSmall {
        rows: usize,
        cols: usize,
        need_rows: usize,
        need_cols: usize,
    },
    /// A force evaluation produced a non-finite acceleration.
    #[error("non-finite force evaluation at MJD {0}")]
    NonFinite(f64),
}
