//! Physical constants in CGS units.
//!
//! Values follow CODATA 2018 as used by astropy.

use std::f64::consts::PI;

/// Speed of light [cm / s]
pub const C: f64 = 2.997_924_58e10;
/// Planck constant [erg s]
pub const H: f64 = 6.626_070_15e-27;
/// Boltzmann constant [erg / K]
pub const K_B: f64 = 1.380_649e-16;
/// Electron mass [g]
pub const M_E: f64 = 9.109_383_701_5e-28;
/// Elementary charge [statC]
pub const E_CHARGE: f64 = 4.803_204_712_570_263e-10;
/// Stefan-Boltzmann constant [erg / (cm^2 s K^4)]
pub const SIGMA_SB: f64 = 5.670_374_419e-5;
/// Thomson cross section [cm^2]
pub const SIGMA_THOMSON: f64 = 6.652_458_732_1e-25;
/// Atomic mass unit [g]
pub const AMU: f64 = 1.660_539_066_60e-24;
/// Solar luminosity [erg / s]
pub const L_SUN: f64 = 3.828e33;
/// One electron volt [erg]
pub const EV: f64 = 1.602_176_634e-12;
/// One day [s]
pub const DAY: f64 = 86_400.0;
/// One Angstrom [cm]
pub const ANGSTROM: f64 = 1e-8;
/// One kilometre [cm]
pub const KM: f64 = 1e5;

/// Riemann zeta(5)
pub const ZETA_5: f64 = 1.036_927_755_143_37;

/// pi e^2 / (m_e c), the classical line absorption coefficient [cm^2 / s]
pub const SOBOLEV_COEFFICIENT: f64 = PI * E_CHARGE * E_CHARGE / (M_E * C);

/// Einstein A coefficient prefactor: A_ul = FA * nu^2 * (g_l / g_u) * f_lu
pub const EINSTEIN_A_COEFFICIENT: f64 = 8.0 * PI * PI * E_CHARGE * E_CHARGE / (M_E * C * C * C);

/// Einstein B coefficient prefactor: B_lu = FB * f_lu / nu (intensity normalisation)
pub const EINSTEIN_B_COEFFICIENT: f64 = 4.0 * PI * PI * E_CHARGE * E_CHARGE / (M_E * C * H);

/// Factor relating the nu_bar and J estimators to the radiation temperature [K s]
pub const T_RADIATIVE_ESTIMATOR_CONSTANT: f64 =
    (PI * PI * PI * PI / (15.0 * 24.0 * ZETA_5)) * (H / K_B);

/// Close-line threshold for the relative comoving frequency difference
pub const CLOSE_LINE_THRESHOLD: f64 = 1e-7;

/// Distance returned when an event can never happen [cm]
pub const MISS_DISTANCE: f64 = 1e99;

/// `(2 pi m_e k_B / h^2)^(3/2)` multiplied by `T^(3/2)` gives the electron partition
/// function per unit volume.
pub fn g_electron(temperature: f64) -> f64 {
    (2.0 * PI * M_E * K_B * temperature / (H * H)).powf(1.5)
}

/// Cube of the thermal de Broglie wavelength of the electron, `(h^2 / (2 pi m_e k T))^(3/2)`.
pub fn thermal_de_broglie_cubed(temperature: f64) -> f64 {
    1.0 / g_electron(temperature)
}

/// Planck function B_nu(T) [erg / (s cm^2 Hz sr)]
pub fn planck_nu(nu: f64, temperature: f64) -> f64 {
    let x = H * nu / (K_B * temperature);
    if x > 700.0 {
        return 0.0;
    }
    2.0 * H * nu * nu * nu / (C * C) / x.exp_m1()
}
