use super::extrapolation::{BsExtrapolation, ExtrapolationTable};
use super::midpoint::midpoint_step;
use crate::dimensions::{Matrix6, Vector6};
use crate::dynamics::encounters::EncounterLog;
use crate::dynamics::NBodyDynamics;
use crate::ephemeris::Ephemeris;
use crate::errors::PropError;

/// Substep counts of the successive midpoint rows fed into the extrapolation.
pub(crate) const SUBSTEP_SEQUENCE: [usize; 27] = [
    2, 4, 6, 8, 12, 16, 24, 32, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024, 1536, 2048, 3072,
    4096, 6144, 8192, 12288, 16384, 24576,
];

/// One Bulirsch-Stoer step of size `h` for the whole batch.
///
/// Midpoint rows over the doubling substep sequence feed the extrapolation tableau
/// until every particle (and, when carried, every STM) has converged; each particle's
/// output is read from the column it first converged at. Returns false when some
/// particle ran out of rows without converging; its output is then the last column
/// and the caller decides whether that is fatal.
pub(crate) fn bs_step<E: Ephemeris>(
    dynamics: &NBodyDynamics<'_, E>,
    mjd0: f64,
    h: f64,
    states: &mut [Vector6<f64>],
    mut stms: Option<&mut Vec<Matrix6<f64>>>,
    masses: Option<&[f64]>,
    variant: BsExtrapolation,
    enc: &mut EncounterLog,
) -> Result<bool, PropError> {
    let n = states.len();
    let max_rows = SUBSTEP_SEQUENCE.len();
    let mut state_tab = ExtrapolationTable::new(n, 6, max_rows, variant);
    let mut stm_tab = stms
        .as_ref()
        .map(|_| ExtrapolationTable::new(n, 36, max_rows, variant));

    let mut state_row = vec![0.0; n * 6];
    let mut stm_row = vec![0.0; n * 36];

    for &nsub in &SUBSTEP_SEQUENCE {
        let (out, out_stm) = midpoint_step(
            dynamics,
            mjd0,
            h,
            nsub,
            states,
            stms.as_ref().map(|s| s.as_slice()),
            masses,
            enc,
        )?;
        let h2 = (h / nsub as f64).powi(2);
        for (i, s) in out.iter().enumerate() {
            for c in 0..6 {
                state_row[i * 6 + c] = s[c];
            }
        }
        state_tab.add_row(h2, &state_row);
        if let (Some(tab), Some(ms)) = (stm_tab.as_mut(), &out_stm) {
            for (i, m) in ms.iter().enumerate() {
                for r in 0..6 {
                    for c in 0..6 {
                        stm_row[i * 36 + r * 6 + c] = m[(r, c)];
                    }
                }
            }
            tab.add_row(h2, &stm_row);
        }
        if state_tab.all_converged() && stm_tab.as_ref().map_or(true, |t| t.all_converged()) {
            break;
        }
    }

    let mut all_converged = true;
    for i in 0..n {
        let out = state_tab.result_for(i);
        for c in 0..6 {
            states[i][c] = out[c];
        }
        if state_tab.converged_at(i).is_none() {
            all_converged = false;
        }
    }
    if let (Some(tab), Some(ms)) = (&stm_tab, stms.as_mut()) {
        for i in 0..n {
            let out = tab.result_for(i);
            for r in 0..6 {
                for c in 0..6 {
                    ms[i][(r, c)] = out[r * 6 + c];
                }
            }
            if tab.converged_at(i).is_none() {
                all_converged = false;
            }
        }
    }
    if !all_converged {
        warn!(
            "Bulirsch-Stoer step of {} d at MJD {} exhausted the substep sequence without full convergence",
            h, mjd0
        );
    }
    Ok(all_converged)
}
