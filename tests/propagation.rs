extern crate astroprop;

use approx::assert_abs_diff_eq;
use astroprop::constants::{GAUSS_K, GM_SUN, NBODIES, PLANETARY_RADII, SUN};
use astroprop::dimensions::Vector6;
use astroprop::dynamics::{EncounterKind, EncounterLog, ForceSettings, NBodyDynamics};
use astroprop::ephemeris::{NoEphemeris, StaticEphemeris};
use astroprop::kepler::kepler_step;
use astroprop::propagators::{
    BsExtrapolation, Finisher, Method, PropOpts, Propagator, RadauClass,
};
use astroprop::utils::{angular_momentum, rss_errors, rss_state_errors, specific_energy};
use astroprop::ParticleBatch;
use hifitime::Epoch;
use std::f64::consts::PI;

const T0: f64 = 58_849.0;

fn perihelion_state(ecc: f64) -> Vector6<f64> {
    // a = 1 AU, periapsis on the x axis, motion in the xy plane
    let rp = 1.0 - ecc;
    let vp = (GM_SUN * (2.0 / rp - 1.0)).sqrt();
    Vector6::new(rp, 0.0, 0.0, 0.0, vp, 0.0)
}

/// Both integrators must reproduce the universal Kepler solver over one period
/// across the eccentricity range.
#[test]
fn val_two_body_matches_kepler() {
    let _ = pretty_env_logger::try_init();
    let eph = NoEphemeris;
    let period = 2.0 * PI / GAUSS_K;

    for &ecc in &[0.0, 0.3, 0.7, 0.95] {
        let s0 = perihelion_state(ecc);
        let truth = kepler_step(SUN, period, &s0).unwrap();
        let step = if ecc > 0.5 { 1.0 } else { 5.0 };

        let prop = Propagator::new(
            NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
            PropOpts::bulirsch_stoer(step),
        );
        let mut batch = ParticleBatch::new(vec![s0]);
        let report = prop.propagate_mjd(T0, T0 + period, &mut batch).unwrap();
        assert!(report.converged);
        let (err_r, err_v) = rss_errors(&batch.states()[0], &truth);
        println!(
            "BS   e = {:.2}: pos err {:.3e} AU, vel err {:.3e} AU/d",
            ecc, err_r, err_v
        );
        assert!(err_r < 1e-10, "BS e = {}: position error {:.3e}", ecc, err_r);
        assert!(err_v < 1e-11, "BS e = {}: velocity error {:.3e}", ecc, err_v);

        let prop = Propagator::new(
            NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
            PropOpts::gauss_radau(10.0, 12, RadauClass::SecondOrder),
        );
        let mut batch = ParticleBatch::new(vec![s0]);
        prop.propagate_mjd(T0, T0 + period, &mut batch).unwrap();
        let (err_r, err_v) = rss_errors(&batch.states()[0], &truth);
        println!(
            "GR15 e = {:.2}: pos err {:.3e} AU, vel err {:.3e} AU/d",
            ecc, err_r, err_v
        );
        assert!(err_r < 1e-8, "GR15 e = {}: position error {:.3e}", ecc, err_r);
    }
}

/// Forward-then-backward propagation must return to the initial state.
#[test]
fn val_time_reversibility() {
    let eph = NoEphemeris;
    let s0 = perihelion_state(0.3);

    let prop = Propagator::new(
        NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
        PropOpts::bulirsch_stoer(1.0),
    );
    let mut batch = ParticleBatch::new(vec![s0]);
    prop.propagate_mjd(T0, T0 + 30.0, &mut batch).unwrap();
    prop.propagate_mjd(T0 + 30.0, T0, &mut batch).unwrap();
    let (err_r, err_v) = rss_state_errors(batch.states(), &[s0]);
    println!("BS   reversibility: {:.3e} AU, {:.3e} AU/d", err_r, err_v);
    assert!(err_r < 1e-12);
    assert!(err_v < 1e-12);

    let prop = Propagator::new(
        NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
        PropOpts::gauss_radau(10.0, 12, RadauClass::SecondOrder),
    );
    let mut batch = ParticleBatch::new(vec![s0]);
    prop.propagate_mjd(T0, T0 + 30.0, &mut batch).unwrap();
    prop.propagate_mjd(T0 + 30.0, T0, &mut batch).unwrap();
    let (err_r, err_v) = rss_state_errors(batch.states(), &[s0]);
    println!("GR15 reversibility: {:.3e} AU, {:.3e} AU/d", err_r, err_v);
    assert!(err_r < 1e-11);
    assert!(err_v < 1e-11);
}

/// Energy and angular momentum under the Kepler force over ten thousand steps.
#[test]
fn val_conservation_laws() {
    let eph = NoEphemeris;
    let s0 = perihelion_state(0.3);
    let e0 = specific_energy(GM_SUN, &s0);
    let l0 = angular_momentum(&s0);

    let prop = Propagator::new(
        NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
        PropOpts::bulirsch_stoer(0.1),
    );
    let mut batch = ParticleBatch::new(vec![s0]);
    let report = prop.propagate_mjd(T0, T0 + 1000.0, &mut batch).unwrap();
    assert_eq!(report.whole_steps, 10_000);

    let e1 = specific_energy(GM_SUN, &batch.states()[0]);
    let l1 = angular_momentum(&batch.states()[0]);
    let de = ((e1 - e0) / e0).abs();
    let dl = (l1 - l0).norm() / l0.norm();
    println!("dE/E = {:.3e}, dL/L = {:.3e} over 10^4 steps", de, dl);
    assert!(de < 1e-10);
    assert!(dl < 1e-10);
}

/// The state transition matrix must predict the effect of small initial
/// perturbations to second order.
#[test]
fn val_jacobian_consistency() {
    let eph = NoEphemeris;
    let s0 = perihelion_state(0.3);
    // short enough that the STM entries stay small; larger entries may
    // legitimately never settle below the absolute extrapolation threshold
    // and fall back to the last column
    let span = 10.0;
    let delta = 1e-6;

    let prop = Propagator::new(
        NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
        PropOpts::bulirsch_stoer(1.0),
    );
    let mut batch = ParticleBatch::new(vec![s0]).with_stm();
    prop.propagate_mjd(T0, T0 + span, &mut batch).unwrap();
    let nominal = batch.states()[0];
    let stm = batch.stms().unwrap()[0];

    for &j in &[0usize, 4] {
        let mut perturbed = s0;
        perturbed[j] += delta;
        let mut pbatch = ParticleBatch::new(vec![perturbed]);
        prop.propagate_mjd(T0, T0 + span, &mut pbatch).unwrap();
        let actual = pbatch.states()[0] - nominal;
        let mut dvec = Vector6::zeros();
        dvec[j] = delta;
        let predicted = stm * dvec;
        let rel = (actual - predicted).norm() / actual.norm();
        println!(
            "STM prediction error for a {} perturbation of s[{}]: {:.3e}",
            delta, j, rel
        );
        assert!(rel < 1e-5, "s[{}]: relative error {:.3e}", j, rel);
    }
}

/// Interval slicing: whole steps, remainder bookkeeping, and the cheap finisher.
#[test]
fn val_step_slicing() {
    let eph = NoEphemeris;
    let make = || {
        Propagator::new(
            NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
            PropOpts::bulirsch_stoer(1.0),
        )
    };

    // exact slicing: ten whole steps, no remainder, no finisher
    let mut batch = ParticleBatch::new(vec![perihelion_state(0.0)]);
    let report = make().propagate_mjd(T0, T0 + 10.0, &mut batch).unwrap();
    assert_eq!(report.whole_steps, 10);
    assert_eq!(report.remainder, 0.0);
    assert_eq!(report.finisher, Finisher::None);

    // a genuine remainder goes to the integrator
    let report = make().propagate_mjd(T0, T0 + 10.25, &mut batch).unwrap();
    assert_eq!(report.whole_steps, 10);
    assert_abs_diff_eq!(report.remainder, 0.25, epsilon = 1e-12);
    assert_eq!(report.finisher, Finisher::Integrator);
    assert_abs_diff_eq!(
        report.whole_steps as f64 * 1.0 + report.remainder,
        10.25,
        epsilon = 10.0 * f64::EPSILON
    );

    // backward slicing mirrors forward
    let report = make().propagate_mjd(T0, T0 - 10.0, &mut batch).unwrap();
    assert_eq!(report.whole_steps, 10);
    assert_eq!(report.remainder, 0.0);
    assert_eq!(report.finisher, Finisher::None);
}

/// A highly eccentric orbit forces the Gauss-Radau first sequence to shrink, and
/// the integration still matches Kepler.
#[test]
fn val_gr15_step_shrink() {
    let eph = NoEphemeris;
    let s0 = perihelion_state(0.99);
    let period = 2.0 * PI / GAUSS_K;
    let truth = kepler_step(SUN, period, &s0).unwrap();

    let prop = Propagator::new(
        NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
        PropOpts::gauss_radau(2.0, 12, RadauClass::SecondOrder),
    );
    let mut batch = ParticleBatch::new(vec![s0]);
    let report = prop.propagate_mjd(T0, T0 + period, &mut batch).unwrap();
    let (err_r, err_v) = rss_errors(&batch.states()[0], &truth);
    println!(
        "e = 0.99: {} sequences, {} shrinks, pos err {:.3e} AU, vel err {:.3e}",
        report.radau_sequences, report.radau_shrinks, err_r, err_v
    );
    assert!(report.radau_shrinks >= 1, "perihelion start must shrink");
    assert!(err_r < 1e-8, "GR15 e = 0.99: position error {:.3e}", err_r);
}

/// The Gauss-Radau classes agree on a velocity-independent force, and the
/// first-order class integrates the full state vector.
#[test]
fn val_gr15_classes() {
    let eph = NoEphemeris;
    let s0 = perihelion_state(0.3);
    let truth = kepler_step(SUN, 30.0, &s0).unwrap();

    for &(class, tol) in &[
        (RadauClass::SecondOrder, 1e-10),
        (RadauClass::PositionOnly, 1e-10),
        (RadauClass::FirstOrder, 1e-8),
    ] {
        let prop = Propagator::new(
            NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
            PropOpts::gauss_radau(10.0, 12, class),
        );
        let mut batch = ParticleBatch::new(vec![s0]);
        prop.propagate_mjd(T0, T0 + 30.0, &mut batch).unwrap();
        let (err_r, _) = rss_errors(&batch.states()[0], &truth);
        println!("{:?}: pos err {:.3e} AU", class, err_r);
        assert!(err_r < tol, "{:?}: position error {:.3e}", class, err_r);
    }
}

/// Gauss-Radau refuses state transition matrices, and nobody accepts an empty batch.
#[test]
fn val_error_paths() {
    let eph = NoEphemeris;
    let prop = Propagator::new(
        NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
        PropOpts::gauss_radau(10.0, 12, RadauClass::SecondOrder),
    );
    let mut batch = ParticleBatch::new(vec![perihelion_state(0.0)]).with_stm();
    assert_eq!(
        prop.propagate_mjd(T0, T0 + 1.0, &mut batch).unwrap_err(),
        astroprop::PropError::StmUnavailable
    );

    let mut empty = ParticleBatch::new(vec![]);
    assert_eq!(
        prop.propagate_mjd(T0, T0 + 1.0, &mut empty).unwrap_err(),
        astroprop::PropError::EmptyBatch
    );
}

/// A close pass by the Earth: the log must carry an approach while the particle is
/// outside the collision radius and promote it to an impact once it dips inside.
#[test]
fn val_earth_encounter() {
    let r_earth = PLANETARY_RADII[2];
    let mut planets = [Vector6::new(30.0, 30.0, 30.0, 0.0, 0.0, 0.0); 10];
    planets[2] = Vector6::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    let eph = StaticEphemeris::new(planets);

    // fast pass along -x with half an Earth radius of impact parameter, quick
    // enough that gravitational focusing stays mild
    let d0 = 1.01 * r_earth;
    let s0 = Vector6::new(1.0 + d0, 0.5 * r_earth, 0.0, -0.05, 0.0, 0.0);
    let settings = ForceSettings {
        relativity: false,
        ..ForceSettings::default()
    }
    .with_planet(2);

    let prop = Propagator::new(
        NBodyDynamics::new(&eph, settings).unwrap(),
        PropOpts::bulirsch_stoer(1e-4),
    );
    let mut batch = ParticleBatch::new(vec![s0]);
    let mut log = EncounterLog::new(1, 0);

    // a short first leg keeps the particle outside the collision radius
    let leg1 = 2e-5;
    prop.propagate_into(T0, T0 + leg1, &mut batch, &mut log)
        .unwrap();
    let rec = log.get(0, 2);
    assert_eq!(rec.kind, EncounterKind::Approach);
    assert!(rec.distance > r_earth);

    // the second leg carries it through the planet
    prop.propagate_into(T0 + leg1, T0 + 4e-3, &mut batch, &mut log)
        .unwrap();
    let rec = log.get(0, 2);
    println!(
        "Earth record: kind {:?}, distance {:.3e} AU ({:.2} radii), MJD {:.6}",
        rec.kind,
        rec.distance,
        rec.distance / r_earth,
        rec.mjd
    );
    assert_eq!(rec.kind, EncounterKind::Impact);
    assert!(rec.distance < r_earth);
    assert!(rec.mjd > T0 + leg1 && rec.mjd < T0 + 4e-3);

    // the Sun record is always written
    let sun = log.get(0, SUN);
    assert_eq!(sun.kind, EncounterKind::Approach);
    assert_abs_diff_eq!(sun.distance, 1.0, epsilon = 0.1);
}

/// Additional massive perturbers deflect the massless particles but are themselves
/// only driven by the central body.
#[test]
fn val_additional_perturbers() {
    let eph = NoEphemeris;
    let massless = perihelion_state(0.0);
    let heavy = Vector6::new(1.02, 0.0, 0.0, 0.0, GAUSS_K, 0.0);
    let span = 20.0;

    let make = || {
        Propagator::new(
            NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
            PropOpts::bulirsch_stoer(1.0),
        )
    };

    // reference: both bodies as plain test particles
    let mut plain = ParticleBatch::new(vec![massless, heavy]);
    make().propagate_mjd(T0, T0 + span, &mut plain).unwrap();

    // the same pair with the trailing body massive
    let mut mixed =
        ParticleBatch::with_masses(vec![massless, heavy], vec![0.0, 1e-6]).unwrap();
    let report = make().propagate_mjd(T0, T0 + span, &mut mixed).unwrap();

    // the massive body follows the exact same orbit it had as a test particle
    let (dr_heavy, _) = rss_errors(&mixed.states()[1], &plain.states()[1]);
    assert!(dr_heavy < 1e-13, "massive body self-influenced: {:.3e}", dr_heavy);

    // the massless one was measurably deflected
    let (dr_light, _) = rss_errors(&mixed.states()[0], &plain.states()[0]);
    println!("deflection by the additional perturber: {:.3e} AU", dr_light);
    assert!(dr_light > 1e-9, "no deflection recorded: {:.3e}", dr_light);

    // and the pairing was logged in the extra encounter column
    let rec = report.encounters.get(0, NBODIES);
    assert_eq!(rec.kind, EncounterKind::Approach);
    assert!(rec.distance < 0.05);
}

/// The rational extrapolation variant is selectable and agrees with Kepler.
#[test]
fn val_rational_extrapolation() {
    let eph = NoEphemeris;
    let s0 = perihelion_state(0.3);
    let truth = kepler_step(SUN, 10.0, &s0).unwrap();

    let prop = Propagator::new(
        NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
        PropOpts {
            method: Method::BulirschStoer(BsExtrapolation::Rational),
            step: 1.0,
        },
    );
    let mut batch = ParticleBatch::new(vec![s0]);
    let report = prop.propagate_mjd(T0, T0 + 10.0, &mut batch).unwrap();
    assert!(report.converged);
    let (err_r, _) = rss_errors(&batch.states()[0], &truth);
    assert!(err_r < 1e-10, "rational variant: position error {:.3e}", err_r);
}

/// The epoch-typed entry point agrees with the MJD one.
#[test]
fn val_epoch_entry_point() {
    let eph = NoEphemeris;
    let s0 = perihelion_state(0.3);
    let make = || {
        Propagator::new(
            NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
            PropOpts::bulirsch_stoer(1.0),
        )
    };

    let mut by_mjd = ParticleBatch::new(vec![s0]);
    make().propagate_mjd(T0, T0 + 10.0, &mut by_mjd).unwrap();

    let mut by_epoch = ParticleBatch::new(vec![s0]);
    make()
        .propagate(
            Epoch::from_mjd_tai(T0),
            Epoch::from_mjd_tai(T0 + 10.0),
            &mut by_epoch,
        )
        .unwrap();

    let (err_r, err_v) = rss_errors(&by_epoch.states()[0], &by_mjd.states()[0]);
    assert!(err_r < 1e-9 && err_v < 1e-9);
}

/// Relativity bends the two-body orbit: the perihelion advances.
#[test]
fn val_relativistic_drift() {
    let eph = NoEphemeris;
    // Mercury-like orbit: a = 0.387 AU, e = 0.2
    let a = 0.387;
    let ecc = 0.2;
    let rp = a * (1.0 - ecc);
    let vp = (GM_SUN * (2.0 / rp - 1.0 / a)).sqrt();
    let s0 = Vector6::new(rp, 0.0, 0.0, 0.0, vp, 0.0);
    let span = 100.0;

    let newtonian = {
        let prop = Propagator::new(
            NBodyDynamics::new(&eph, ForceSettings::two_body()).unwrap(),
            PropOpts::bulirsch_stoer(1.0),
        );
        let mut batch = ParticleBatch::new(vec![s0]);
        prop.propagate_mjd(T0, T0 + span, &mut batch).unwrap();
        batch.states()[0]
    };

    let relativistic = {
        let settings = ForceSettings {
            relativity: true,
            ..ForceSettings::default()
        };
        let prop = Propagator::new(
            NBodyDynamics::new(&eph, settings).unwrap(),
            PropOpts::bulirsch_stoer(1.0),
        );
        let mut batch = ParticleBatch::new(vec![s0]);
        prop.propagate_mjd(T0, T0 + span, &mut batch).unwrap();
        batch.states()[0]
    };

    let (dr, _) = rss_errors(&relativistic, &newtonian);
    println!("relativistic displacement over {} d: {:.3e} AU", span, dr);
    // the correction is tiny but decidedly above the integrator noise
    assert!(dr > 1e-10 && dr < 1e-4);
}
