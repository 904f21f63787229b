use crate::dimensions::{Vector3, Vector6};

/// Returns the RSS position and velocity errors between two six-component states.
pub fn rss_errors(est: &Vector6<f64>, truth: &Vector6<f64>) -> (f64, f64) {
    let mut err_r = 0.0;
    let mut err_v = 0.0;
    for i in 0..3 {
        err_r += (est[i] - truth[i]).powi(2);
        err_v += (est[i + 3] - truth[i + 3]).powi(2);
    }
    (err_r.sqrt(), err_v.sqrt())
}

/// Returns the RSS position and velocity errors across two equally sized batches
/// of states.
pub fn rss_state_errors(est: &[Vector6<f64>], truth: &[Vector6<f64>]) -> (f64, f64) {
    debug_assert_eq!(est.len(), truth.len());
    let mut err_r = 0.0;
    let mut err_v = 0.0;
    for (e, t) in est.iter().zip(truth.iter()) {
        let (r, v) = rss_errors(e, t);
        err_r += r * r;
        err_v += v * v;
    }
    (err_r.sqrt(), err_v.sqrt())
}

/// Specific orbital energy v^2/2 - mu/r of a state about a body of parameter `mu`.
pub fn specific_energy(mu: f64, state: &Vector6<f64>) -> f64 {
    let r = (state[0].powi(2) + state[1].powi(2) + state[2].powi(2)).sqrt();
    let v2 = state[3].powi(2) + state[4].powi(2) + state[5].powi(2);
    0.5 * v2 - mu / r
}

/// Specific angular momentum r x v of a state.
pub fn angular_momentum(state: &Vector6<f64>) -> Vector3<f64> {
    let r = Vector3::new(state[0], state[1], state[2]);
    let v = Vector3::new(state[3], state[4], state[5]);
    r.cross(&v)
}
