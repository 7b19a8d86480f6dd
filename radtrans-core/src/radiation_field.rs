//! Dilute blackbody description of the radiation field.
//!
//! In every shell the radiation field is approximated by a blackbody of
//! temperature `t_rad` diluted by a geometric factor `w`.

use crate::constants::{planck_nu, C, SIGMA_SB, T_RADIATIVE_ESTIMATOR_CONSTANT};
use crate::errors::{RadTransError, RadTransResult};
use crate::geometry::GeometryState;
use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default radiation temperature used when no initial value is configured [K]
pub const DEFAULT_T_RADIATIVE: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DilutePlanckianRadiationField {
    /// Radiation temperature per shell [K]
    pub t_rad: Array1<f64>,
    /// Dilution factor per shell
    pub w: Array1<f64>,
}

impl DilutePlanckianRadiationField {
    pub fn new(t_rad: Array1<f64>, w: Array1<f64>) -> RadTransResult<Self> {
        if t_rad.len() != w.len() {
            return Err(RadTransError::PlasmaShape {
                name: "dilution_factor".to_string(),
                expected: t_rad.len().to_string(),
                found: w.len().to_string(),
            });
        }
        Ok(Self { t_rad, w })
    }

    /// Initial guess from the geometry: a uniform temperature and the
    /// geometric dilution of a photosphere at the inner boundary.
    pub fn from_geometry(geometry: &GeometryState, t_rad: f64) -> Self {
        let r_photosphere = geometry.r_photosphere();
        let w = geometry
            .r_middle()
            .mapv(|r| geometric_dilution_factor(r_photosphere, r));
        Self {
            t_rad: Array1::from_elem(geometry.no_of_shells(), t_rad),
            w,
        }
    }

    pub fn no_of_shells(&self) -> usize {
        self.t_rad.len()
    }

    /// Mean intensity at the line frequencies, `W B_nu(T_rad)`, with one row per line.
    pub fn calculate_mean_intensity(&self, nus: &[f64]) -> Array2<f64> {
        let mut j = Array2::zeros((nus.len(), self.no_of_shells()));
        for (mut row, nu) in j.rows_mut().into_iter().zip(nus) {
            Zip::from(&mut row)
                .and(&self.t_rad)
                .and(&self.w)
                .for_each(|j, t, w| *j = w * planck_nu(*nu, *t));
        }
        j
    }
}

/// `0.5 (1 - sqrt(1 - (r_photosphere / r)^2))`
pub fn geometric_dilution_factor(r_photosphere: f64, r: f64) -> f64 {
    let ratio = (r_photosphere / r).min(1.0);
    0.5 * (1.0 - (1.0 - ratio * ratio).sqrt())
}

/// Inner boundary temperature emitting `luminosity` from `r_inner` [K].
pub fn t_inner_from_luminosity(luminosity: f64, r_inner: f64) -> f64 {
    (luminosity / (4.0 * PI * r_inner * r_inner * SIGMA_SB)).powf(0.25)
}

/// Blackbody luminosity of a sphere of radius `r_inner` at `t_inner` [erg / s].
pub fn luminosity_from_t_inner(t_inner: f64, r_inner: f64) -> f64 {
    4.0 * PI * r_inner * r_inner * SIGMA_SB * t_inner.powi(4)
}

/// Radiation field implied by the Monte Carlo `j` and `nu_bar` estimators.
///
/// Shells never crossed by a packet have `j = 0`; their temperature and
/// dilution factor come out as NaN and the caller decides how to treat them.
pub fn estimate_radiation_field(
    j_estimator: &Array1<f64>,
    nu_bar_estimator: &Array1<f64>,
    time_of_simulation: f64,
    volume: &Array1<f64>,
) -> DilutePlanckianRadiationField {
    let t_rad = Zip::from(nu_bar_estimator)
        .and(j_estimator)
        .map_collect(|nu_bar, j| T_RADIATIVE_ESTIMATOR_CONSTANT * nu_bar / j);
    let w = Zip::from(j_estimator)
        .and(&t_rad)
        .and(volume)
        .map_collect(|j, t, v| j / (4.0 * SIGMA_SB * t.powi(4) * time_of_simulation * v));
    DilutePlanckianRadiationField { t_rad, w }
}

/// Mean intensity in the blue wing of each line from the `j_blue` estimator,
/// `est c t_exp / (4 pi t_sim V)`.
pub fn estimate_j_blues(
    j_blue_estimator: &Array2<f64>,
    time_explosion: f64,
    time_of_simulation: f64,
    volume: &Array1<f64>,
) -> Array2<f64> {
    let mut j_blues = j_blue_estimator * (C * time_explosion / (4.0 * PI * time_of_simulation));
    for mut row in j_blues.rows_mut() {
        row /= volume;
    }
    j_blues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{DAY, L_SUN};
    use crate::geometry::HomologousRadial1DMesh;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_dilution_factor_limits() {
        assert_relative_eq!(geometric_dilution_factor(1.0, 1.0), 0.5);
        assert!(geometric_dilution_factor(1.0, 1e3) < 1e-6);
        assert_relative_eq!(
            geometric_dilution_factor(1.0, 2.0),
            0.5 * (1.0 - 0.75f64.sqrt())
        );
    }

    #[test]
    fn test_initial_field() {
        let geometry = HomologousRadial1DMesh::linspace(1.1e9, 2.0e9, 20, 13.0 * DAY)
            .unwrap()
            .geometry();
        let field = DilutePlanckianRadiationField::from_geometry(&geometry, DEFAULT_T_RADIATIVE);
        assert_eq!(field.no_of_shells(), 20);
        assert!(field.t_rad.iter().all(|t| *t == DEFAULT_T_RADIATIVE));
        assert!(field.w.iter().zip(field.w.iter().skip(1)).all(|(a, b)| b < a));
        assert!(field.w[0] < 0.5);
    }

    #[test]
    fn test_t_inner_luminosity_roundtrip() {
        let luminosity = 10f64.powf(9.44) * L_SUN;
        let r_inner = 1.1e9 * 13.0 * DAY;
        let t_inner = t_inner_from_luminosity(luminosity, r_inner);
        assert_relative_eq!(luminosity_from_t_inner(t_inner, r_inner), luminosity, max_relative = 1e-12);
    }

    #[test]
    fn test_estimators_recover_blackbody() {
        // j = 4 sigma T^4 W t_sim V for a diluted blackbody
        let t: f64 = 9000.0;
        let w = 0.3;
        let time_of_simulation = 2.0;
        let volume = array![1e40];
        let j = 4.0 * SIGMA_SB * t.powi(4) * w * time_of_simulation * volume[0];
        let nu_bar = j * t / T_RADIATIVE_ESTIMATOR_CONSTANT;
        let field = estimate_radiation_field(&array![j], &array![nu_bar], time_of_simulation, &volume);
        assert_relative_eq!(field.t_rad[0], t, max_relative = 1e-12);
        assert_relative_eq!(field.w[0], w, max_relative = 1e-12);
    }

    #[test]
    fn test_j_blues_estimate() {
        let estimator = array![[1.0, 2.0]];
        let j_blues = estimate_j_blues(&estimator, 3.0, 4.0, &array![5.0, 10.0]);
        let factor = C * 3.0 / (4.0 * PI * 4.0);
        assert_relative_eq!(j_blues[[0, 0]], factor / 5.0);
        assert_relative_eq!(j_blues[[0, 1]], factor * 2.0 / 10.0);
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(DilutePlanckianRadiationField::new(array![1.0], array![1.0, 2.0]).is_err());
    }
}
