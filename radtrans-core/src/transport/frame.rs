//! Transformations between the lab frame and the comoving frame of the ejecta.
//!
//! In homologous expansion the local flow velocity at radius `r` is `r / t`.
//! With `beta = r / (c t)` the partially relativistic doppler factor is
//! `1 - mu beta`. The full treatment adds the Lorentz factor and the
//! aberration of angles.

use crate::constants::C;

#[inline]
fn beta(r: f64, time_explosion: f64) -> f64 {
    (r / time_explosion) / C
}

/// Ratio of comoving to lab frequency, `nu_cmf = nu_lab * D`.
pub fn get_doppler_factor(r: f64, mu: f64, time_explosion: f64, full_relativity: bool) -> f64 {
    let beta = beta(r, time_explosion);
    if full_relativity {
        get_doppler_factor_full_relativity(mu, beta)
    } else {
        get_doppler_factor_partial_relativity(mu, beta)
    }
}

pub fn get_doppler_factor_partial_relativity(mu: f64, beta: f64) -> f64 {
    1.0 - mu * beta
}

pub fn get_doppler_factor_full_relativity(mu: f64, beta: f64) -> f64 {
    (1.0 - mu * beta) / (1.0 - beta * beta).sqrt()
}

/// Ratio of lab to comoving frequency for a comoving direction `mu`.
pub fn get_inverse_doppler_factor(
    r: f64,
    mu: f64,
    time_explosion: f64,
    full_relativity: bool,
) -> f64 {
    let beta = beta(r, time_explosion);
    if full_relativity {
        get_inverse_doppler_factor_full_relativity(mu, beta)
    } else {
        get_inverse_doppler_factor_partial_relativity(mu, beta)
    }
}

pub fn get_inverse_doppler_factor_partial_relativity(mu: f64, beta: f64) -> f64 {
    1.0 / (1.0 - mu * beta)
}

pub fn get_inverse_doppler_factor_full_relativity(mu: f64, beta: f64) -> f64 {
    (1.0 + mu * beta) / (1.0 - beta * beta).sqrt()
}

/// Direction cosine seen in the lab frame for a comoving direction `mu`.
pub fn angle_aberration_cmf_to_lf(r: f64, mu: f64, time_explosion: f64) -> f64 {
    let beta = beta(r, time_explosion);
    (mu + beta) / (1.0 + beta * mu)
}

/// Direction cosine seen in the comoving frame for a lab direction `mu`.
pub fn angle_aberration_lf_to_cmf(r: f64, mu: f64, time_explosion: f64) -> f64 {
    let beta = beta(r, time_explosion);
    (mu - beta) / (1.0 - beta * mu)
}
