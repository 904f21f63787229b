/// Gaussian gravitational constant, AU^(3/2) / day.
pub const GAUSS_K: f64 = 0.017_202_098_95;

/// Heliocentric gravitational parameter G * M_sun = k^2, in AU^3/day^2.
pub const GM_SUN: f64 = GAUSS_K * GAUSS_K;

/// Speed of light in AU/day.
pub const SPEED_OF_LIGHT: f64 = 173.144_632_72;

/// Astronomical unit in km, per the DE ephemerides.
pub const AU_KM: f64 = 149_597_870.7;

/// Number of planetary perturbers served by the ephemeris (Mercury through the Moon).
pub const NPLANETS: usize = 10;

/// Body index of the Sun.
pub const SUN: usize = 10;

/// Number of body columns in the encounter log before any additional perturbers.
pub const NBODIES: usize = 11;

/// Masses in solar masses, indexed 0 = Mercury ... 8 = Pluto, 9 = Moon, 10 = Sun.
/// Inverse values are the IAU planetary mass ratios used by the DE ephemerides.
pub const PLANETARY_MASSES: [f64; NBODIES] = [
    1.0 / 6_023_600.0,                    // Mercury
    1.0 / 408_523.71,                     // Venus
    1.0 / 332_946.050_895,                // Earth
    1.0 / 3_098_708.0,                    // Mars
    1.0 / 1_047.348_6,                    // Jupiter
    1.0 / 3_497.898,                      // Saturn
    1.0 / 22_902.98,                      // Uranus
    1.0 / 19_412.24,                      // Neptune
    1.0 / 135_200_000.0,                  // Pluto
    1.0 / (332_946.050_895 * 81.300_59), // Moon
    1.0,                                  // Sun
];

/// Collision radii in AU (equatorial radii; the Moon and Pluto use mean radii).
pub const PLANETARY_RADII: [f64; NBODIES] = [
    2_439.7 / AU_KM,   // Mercury
    6_051.8 / AU_KM,   // Venus
    6_378.136_3 / AU_KM, // Earth
    3_396.19 / AU_KM,  // Mars
    71_492.0 / AU_KM,  // Jupiter
    60_268.0 / AU_KM,  // Saturn
    25_559.0 / AU_KM,  // Uranus
    24_764.0 / AU_KM,  // Neptune
    1_188.3 / AU_KM,   // Pluto
    1_737.4 / AU_KM,   // Moon
    696_000.0 / AU_KM, // Sun
];

/// Gravitational parameter G * m of the requested body, in AU^3/day^2.
pub fn planetary_mu(body: usize) -> f64 {
    GM_SUN * PLANETARY_MASSES[body]
}

/// Human-readable body name for diagnostics.
pub fn body_name(body: usize) -> &'static str {
    match body {
        0 => "Mercury",
        1 => "Venus",
        2 => "Earth",
        3 => "Mars",
        4 => "Jupiter",
        5 => "Saturn",
        6 => "Uranus",
        7 => "Neptune",
        8 => "Pluto",
        9 => "Moon",
        10 => "Sun",
        _ => "additional perturber",
    }
}

#[test]
fn test_constants_sanity() {
    // G = k^2 with the Sun at one solar mass
    assert!((planetary_mu(SUN) - GM_SUN).abs() < f64::EPSILON);
    // Earth/Moon mass ratio
    let ratio = PLANETARY_MASSES[2] / PLANETARY_MASSES[9];
    assert!((ratio - 81.300_59).abs() < 1e-9);
    // All radii well below 1 AU
    for &r in &PLANETARY_RADII {
        assert!(r > 0.0 && r < 0.005);
    }
}
