//! Distances to the next boundary, line resonance and electron scattering event.

use crate::constants::{C, CLOSE_LINE_THRESHOLD, MISS_DISTANCE, SIGMA_THOMSON};
use crate::errors::{RadTransError, RadTransResult};

/// Distance to the shell boundary the packet is heading to and the change in shell index.
///
/// An inward packet that misses the inner boundary crosses the shell and
/// leaves through the outer boundary.
pub fn calculate_distance_boundary(r: f64, mu: f64, r_inner: f64, r_outer: f64) -> (f64, i64) {
    let outward = || ((r_outer * r_outer + (mu * mu - 1.0) * r * r).sqrt() - r * mu, 1);
    if mu > 0.0 {
        return outward();
    }
    let check = r_inner * r_inner + r * r * (mu * mu - 1.0);
    if check >= 0.0 {
        (-r * mu - check.sqrt(), -1)
    } else {
        outward()
    }
}

/// Distance until the comoving frequency of the packet redshifts onto `nu_line`.
///
/// Lines closer than [`CLOSE_LINE_THRESHOLD`] in relative frequency are at
/// distance zero. A line bluewards of the comoving frequency is an error: the
/// packet has already passed it.
pub fn calculate_distance_line(
    r: f64,
    mu: f64,
    nu: f64,
    comov_nu: f64,
    nu_line: f64,
    time_explosion: f64,
    full_relativity: bool,
) -> RadTransResult<f64> {
    if nu_line == 0.0 {
        return Ok(MISS_DISTANCE);
    }
    let mut nu_diff = comov_nu - nu_line;
    if (nu_diff / comov_nu).abs() < CLOSE_LINE_THRESHOLD {
        nu_diff = 0.0;
    }
    if nu_diff < 0.0 {
        return Err(RadTransError::MonteCarlo(format!(
            "nu difference is less than 0.0: comov_nu={comov_nu}, nu_line={nu_line}, nu={nu}"
        )));
    }
    if full_relativity {
        return Ok(calculate_distance_line_full_relativity(
            r,
            mu,
            nu,
            nu_line,
            time_explosion,
        ));
    }
    Ok((nu_diff / nu) * C * time_explosion)
}

/// Exact resonance distance including the Lorentz factor of the flow.
pub fn calculate_distance_line_full_relativity(
    r: f64,
    mu: f64,
    nu: f64,
    nu_line: f64,
    time_explosion: f64,
) -> f64 {
    let nu_r = nu_line / nu;
    let ct = C * time_explosion;
    let impact_squared = r * r * (1.0 - mu * mu);
    let root = (ct * ct - impact_squared * (1.0 + nu_r.powi(-2))).sqrt();
    -mu * r + (ct - nu_r * nu_r * root) / (1.0 + nu_r * nu_r)
}

pub fn calculate_distance_electron(electron_density: f64, tau_event: f64) -> f64 {
    tau_event / (electron_density * SIGMA_THOMSON)
}

pub fn calculate_tau_electron(electron_density: f64, distance: f64) -> f64 {
    electron_density * SIGMA_THOMSON * distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::frame::get_doppler_factor;
    use approx::assert_relative_eq;

    #[test]
    fn test_distance_boundary_outward() {
        let (d, delta) = calculate_distance_boundary(1.0, 1.0, 0.5, 2.0);
        assert_relative_eq!(d, 1.0);
        assert_eq!(delta, 1);
    }

    #[test]
    fn test_distance_boundary_inward_hit() {
        let (d, delta) = calculate_distance_boundary(2.0, -1.0, 1.0, 3.0);
        assert_relative_eq!(d, 1.0);
        assert_eq!(delta, -1);
    }

    #[test]
    fn test_distance_boundary_inward_miss() {
        // Tangential flight misses the inner sphere
        let (d, delta) = calculate_distance_boundary(2.0, -0.1, 1.0, 3.0);
        assert_eq!(delta, 1);
        let expected = (9.0 + (0.01 - 1.0) * 4.0f64).sqrt() + 0.2;
        assert_relative_eq!(d, expected);
    }

    #[test]
    fn test_distance_line() {
        let (nu, comov_nu, nu_line, t) = (1.1e15, 1.0e15, 0.9e15, 1e6);
        let d = calculate_distance_line(1e14, 0.5, nu, comov_nu, nu_line, t, false).unwrap();
        assert_relative_eq!(d, (0.1e15 / nu) * C * t);
    }

    #[test]
    fn test_distance_line_close_and_passed() {
        let d = calculate_distance_line(1e14, 0.5, 1e15, 1e15, 1e15 * (1.0 - 1e-9), 1e6, false)
            .unwrap();
        assert_eq!(d, 0.0);
        assert!(calculate_distance_line(1e14, 0.5, 1e15, 1e15, 1.1e15, 1e6, false).is_err());
        assert_eq!(
            calculate_distance_line(1e14, 0.5, 1e15, 1e15, 0.0, 1e6, false).unwrap(),
            MISS_DISTANCE
        );
    }

    #[test]
    fn test_distance_line_full_relativity_reaches_resonance() {
        let (r, mu, nu, t) = (1.2e15, 0.3, 1.0e15, 1e6);
        let comov_nu = nu * get_doppler_factor(r, mu, t, true);
        let nu_line = comov_nu * 0.99;
        let d = calculate_distance_line(r, mu, nu, comov_nu, nu_line, t, true).unwrap();
        let new_r = (r * r + d * d + 2.0 * r * d * mu).sqrt();
        let new_mu = (mu * r + d) / new_r;
        let comov_at_d = nu * get_doppler_factor(new_r, new_mu, t, true);
        assert_relative_eq!(comov_at_d, nu_line, max_relative = 1e-9);
    }

    #[test]
    fn test_electron_distance_and_tau_are_inverse() {
        let d = calculate_distance_electron(1e9, 0.75);
        assert_relative_eq!(calculate_tau_electron(1e9, d), 0.75);
    }
}
