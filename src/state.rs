use crate::dimensions::{Matrix6, Vector6};
use crate::errors::PropError;

/// An ordered batch of integrated bodies.
///
/// Each state is a six-component Cartesian vector (position in AU, velocity in AU/day)
/// in the central-body equatorial frame. When a mass vector is supplied, the trailing
/// bodies with positive mass are *additional perturbers*: they are propagated alongside
/// the massless particles and attract them, but never each other and never the
/// ephemeris-supplied bodies. Massless particles exert no force on anything.
///
/// State transition matrices, when carried, hold d(state now)/d(state at t0) per body
/// and are seeded with the identity.
#[derive(Clone, Debug, PartialEq)]
pub struct ParticleBatch {
    states: Vec<Vector6<f64>>,
    stms: Option<Vec<Matrix6<f64>>>,
    masses: Option<Vec<f64>>,
}

impl ParticleBatch {
    /// A batch of massless test particles.
    pub fn new(states: Vec<Vector6<f64>>) -> Self {
        Self {
            states,
            stms: None,
            masses: None,
        }
    }

    /// A batch whose trailing members are additional massive perturbers.
    ///
    /// `masses` is in solar masses, one entry per state; a positive entry marks an
    /// additional perturber. All massive entries must trail the massless ones.
    pub fn with_masses(states: Vec<Vector6<f64>>, masses: Vec<f64>) -> Result<Self, PropError> {
        if masses.len() != states.len() {
            return Err(PropError::MassOrdering);
        }
        let first_massive = masses.iter().position(|&m| m > 0.0).unwrap_or(masses.len());
        if masses[first_massive..].iter().any(|&m| m <= 0.0) {
            return Err(PropError::MassOrdering);
        }
        Ok(Self {
            states,
            stms: None,
            masses: Some(masses),
        })
    }

    /// Enables state transition matrix propagation, seeding each STM with the identity.
    pub fn with_stm(mut self) -> Self {
        self.stms = Some(vec![Matrix6::identity(); self.states.len()]);
        self
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn states(&self) -> &[Vector6<f64>] {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut [Vector6<f64>] {
        &mut self.states
    }

    pub fn stms(&self) -> Option<&[Matrix6<f64>]> {
        self.stms.as_deref()
    }

    pub fn stms_mut(&mut self) -> Option<&mut Vec<Matrix6<f64>>> {
        self.stms.as_mut()
    }

    pub fn masses(&self) -> Option<&[f64]> {
        self.masses.as_deref()
    }

    /// Number of trailing additional perturbers.
    pub fn n_additional(&self) -> usize {
        match &self.masses {
            Some(masses) => masses.iter().filter(|&&m| m > 0.0).count(),
            None => 0,
        }
    }

    /// Number of leading massless particles.
    pub fn n_massless(&self) -> usize {
        self.len() - self.n_additional()
    }

    /// Splits the batch into the simultaneous views the integrators need.
    pub(crate) fn parts_mut(
        &mut self,
    ) -> (
        &mut [Vector6<f64>],
        Option<&mut Vec<Matrix6<f64>>>,
        Option<&[f64]>,
    ) {
        (&mut self.states, self.stms.as_mut(), self.masses.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mass_ordering() {
        let s = vec![Vector6::zeros(); 3];
        assert!(ParticleBatch::with_masses(s.clone(), vec![0.0, 0.0, 1e-9]).is_ok());
        assert_eq!(
            ParticleBatch::with_masses(s.clone(), vec![0.0, 1e-9, 0.0]).unwrap_err(),
            PropError::MassOrdering
        );
        assert_eq!(
            ParticleBatch::with_masses(s, vec![0.0, 0.0]).unwrap_err(),
            PropError::MassOrdering
        );
    }

    #[test]
    fn test_stm_seed() {
        let batch = ParticleBatch::new(vec![Vector6::zeros(); 2]).with_stm();
        assert_eq!(batch.stms().unwrap().len(), 2);
        assert_eq!(batch.stms().unwrap()[1], Matrix6::identity());
        assert_eq!(batch.n_massless(), 2);
        assert_eq!(batch.n_additional(), 0);
    }
}
