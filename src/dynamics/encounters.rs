use crate::constants::NBODIES;
use crate::errors::PropError;

/// Category of an encounter record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncounterKind {
    /// The distance dropped below the body's collision radius.
    Impact,
    /// Closest non-impacting approach observed so far.
    Approach,
    /// No observation yet.
    Pending,
}

impl EncounterKind {
    /// Numeric category code: 1 = impact, 2 = approach, 3 = pending.
    pub fn code(self) -> u8 {
        match self {
            EncounterKind::Impact => 1,
            EncounterKind::Approach => 2,
            EncounterKind::Pending => 3,
        }
    }
}

/// One (particle, body) pairing of the encounter table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EncounterRecord {
    /// Epoch of the evaluation that produced this record.
    pub mjd: f64,
    pub kind: EncounterKind,
    /// Distance in AU; +inf until the first observation.
    pub distance: f64,
    /// Magnitude of the substep at which the record was taken, in days.
    pub step: f64,
}

impl Default for EncounterRecord {
    fn default() -> Self {
        Self {
            mjd: 0.0,
            kind: EncounterKind::Pending,
            distance: f64::INFINITY,
            step: 0.0,
        }
    }
}

/// Returns whether `new` replaces `old` under the merge rules: an impact beats any
/// record that is not an earlier impact; among non-impacts the smaller distance wins.
fn supersedes(new: &EncounterRecord, old: &EncounterRecord) -> bool {
    match (new.kind, old.kind) {
        (EncounterKind::Impact, EncounterKind::Impact) => new.mjd < old.mjd,
        (EncounterKind::Impact, _) => true,
        (_, EncounterKind::Impact) => false,
        (EncounterKind::Pending, _) => false,
        (_, EncounterKind::Pending) => true,
        _ => new.distance < old.distance,
    }
}

/// The per-propagation close-encounter table.
///
/// One record per (particle, body) pairing. Body columns 0..=9 are Mercury through the
/// Moon, column 10 is the Sun (always written, mask or not), and columns from 11 on are
/// the additional perturbers of the batch (always [`EncounterKind::Approach`]: their
/// collision radii are unknown).
#[derive(Clone, Debug)]
pub struct EncounterLog {
    particles: usize,
    bodies: usize,
    records: Vec<EncounterRecord>,
}

impl EncounterLog {
    /// An empty log for `particles` rows and the standard 11 bodies plus
    /// `n_additional` extra columns.
    pub fn new(particles: usize, n_additional: usize) -> Self {
        let bodies = NBODIES + n_additional;
        Self {
            particles,
            bodies,
            records: vec![EncounterRecord::default(); particles * bodies],
        }
    }

    pub fn particles(&self) -> usize {
        self.particles
    }

    pub fn bodies(&self) -> usize {
        self.bodies
    }

    /// Errors if this log is narrower than the requested propagation needs.
    pub fn check_dims(&self, particles: usize, n_additional: usize) -> Result<(), PropError> {
        if self.particles < particles || self.bodies < NBODIES + n_additional {
            return Err(PropError::EncounterBufferTooSmall {
                rows: self.particles,
                cols: self.bodies,
                need_rows: particles,
                need_cols: NBODIES + n_additional,
            });
        }
        Ok(())
    }

    pub fn get(&self, particle: usize, body: usize) -> &EncounterRecord {
        &self.records[particle * self.bodies + body]
    }

    /// Offers one observation to the table, keeping whichever record wins the merge.
    pub fn record(
        &mut self,
        particle: usize,
        body: usize,
        mjd: f64,
        kind: EncounterKind,
        distance: f64,
        step: f64,
    ) {
        if particle >= self.particles || body >= self.bodies {
            return;
        }
        let new = EncounterRecord {
            mjd,
            kind,
            distance,
            step,
        };
        let slot = &mut self.records[particle * self.bodies + body];
        if supersedes(&new, slot) {
            *slot = new;
        }
    }

    /// Merges a nested call's log into this one, cell by cell, under the same rules.
    pub fn merge_from(&mut self, other: &EncounterLog) {
        debug_assert!(self.particles >= other.particles);
        let bodies = self.bodies.min(other.bodies);
        for p in 0..self.particles.min(other.particles) {
            for b in 0..bodies {
                let theirs = other.get(p, b);
                let slot = &mut self.records[p * self.bodies + b];
                if supersedes(theirs, slot) {
                    *slot = *theirs;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const R_BODY: f64 = 4e-5;

    fn observe(log: &mut EncounterLog, mjd: f64, distance: f64, step: f64) {
        let kind = if distance < R_BODY {
            EncounterKind::Impact
        } else {
            EncounterKind::Approach
        };
        log.record(0, 2, mjd, kind, distance, step);
    }

    #[test]
    fn test_approach_keeps_minimum_distance() {
        let mut log = EncounterLog::new(1, 0);
        observe(&mut log, 10.0, 2e-3, 1.0);
        observe(&mut log, 11.0, 1e-3, 1.0);
        observe(&mut log, 12.0, 5e-3, 1.0);
        let rec = log.get(0, 2);
        assert_eq!(rec.kind, EncounterKind::Approach);
        assert_eq!(rec.distance, 1e-3);
        assert_eq!(rec.mjd, 11.0);
    }

    #[test]
    fn test_impact_promotes_and_earliest_wins() {
        let mut log = EncounterLog::new(1, 0);
        observe(&mut log, 10.0, 1e-3, 1.0);
        observe(&mut log, 12.0, 1e-5, 1.0);
        assert_eq!(log.get(0, 2).kind, EncounterKind::Impact);
        // a later impact does not displace an earlier one, even if closer
        observe(&mut log, 13.0, 1e-6, 1.0);
        assert_eq!(log.get(0, 2).mjd, 12.0);
        // an earlier impact does
        observe(&mut log, 11.0, 2e-5, 1.0);
        assert_eq!(log.get(0, 2).mjd, 11.0);
        // and no approach ever displaces an impact
        observe(&mut log, 9.0, 1e-3, 1.0);
        assert_eq!(log.get(0, 2).kind, EncounterKind::Impact);
    }

    /// Merging nested sub-logs must agree with direct evaluation over the union of
    /// the substeps.
    #[test]
    fn test_merge_matches_direct_evaluation() {
        let observations: [(f64, f64); 6] = [
            (10.0, 3e-3),
            (10.5, 9e-4),
            (11.0, 3e-5), // impact
            (11.5, 2e-5), // later, closer impact: must not win
            (12.0, 7e-4),
            (12.5, 4e-3),
        ];

        let mut direct = EncounterLog::new(1, 0);
        for &(mjd, d) in &observations {
            observe(&mut direct, mjd, d, 0.5);
        }

        let mut outer = EncounterLog::new(1, 0);
        for chunk in observations.chunks(2) {
            let mut nested = EncounterLog::new(1, 0);
            for &(mjd, d) in chunk {
                observe(&mut nested, mjd, d, 0.5);
            }
            outer.merge_from(&nested);
        }

        assert_eq!(outer.get(0, 2), direct.get(0, 2));
        assert_eq!(outer.get(0, 2).mjd, 11.0);
        assert_eq!(outer.get(0, 2).kind, EncounterKind::Impact);
    }

    #[test]
    fn test_initial_state_is_pending_at_infinity() {
        let log = EncounterLog::new(2, 1);
        assert_eq!(log.bodies(), NBODIES + 1);
        let rec = log.get(1, NBODIES);
        assert_eq!(rec.kind, EncounterKind::Pending);
        assert!(rec.distance.is_infinite());
        assert!(log.check_dims(2, 1).is_ok());
        assert!(log.check_dims(3, 1).is_err());
        assert!(log.check_dims(2, 2).is_err());
    }
}
