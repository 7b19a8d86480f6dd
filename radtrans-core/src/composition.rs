//! Density profiles and elemental composition of the ejecta.
//!
//! Densities are evaluated at shell centres. All profiles describe the
//! ejecta at a reference time `time_0` and are scaled homologously to the
//! time since explosion with `(time_0 / t)^3`.

use crate::atomic::AtomicData;
use crate::constants::{AMU, DAY, KM};
use crate::errors::{RadTransError, RadTransResult};
use crate::geometry::GeometryState;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Reference density of the W7 fit [g / cm^3]
const W7_RHO_0: f64 = 3e29;
/// Reference velocity of the W7 fit [cm / s]
const W7_V_0: f64 = KM;
/// Reference time of the W7 fit [s]
const W7_TIME_0: f64 = 0.000_231_481 * DAY;
const W7_EXPONENT: f64 = -7.0;

/// Tolerance on the sum of mass fractions before a warning is raised
const MASS_FRACTION_TOLERANCE: f64 = 1e-6;

/// Analytic density profile in CGS units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DensityProfile {
    /// Constant density at `time_0`.
    Uniform { rho: f64, time_0: f64 },
    /// `rho_0 (v / v_0)^exponent`
    PowerLaw {
        rho_0: f64,
        v_0: f64,
        exponent: f64,
        time_0: f64,
    },
    /// `rho_0 exp(-v / v_0)`
    Exponential { rho_0: f64, v_0: f64, time_0: f64 },
    /// Power-law fit of the W7 deflagration model (Branch et al. 1985).
    Branch85W7,
}

impl DensityProfile {
    fn time_0(&self) -> f64 {
        match self {
            DensityProfile::Uniform { time_0, .. }
            | DensityProfile::PowerLaw { time_0, .. }
            | DensityProfile::Exponential { time_0, .. } => *time_0,
            DensityProfile::Branch85W7 => W7_TIME_0,
        }
    }

    /// Density at `velocity` and the reference time of the profile.
    fn density_at_time_0(&self, velocity: f64) -> f64 {
        match self {
            DensityProfile::Uniform { rho, .. } => *rho,
            DensityProfile::PowerLaw {
                rho_0,
                v_0,
                exponent,
                ..
            } => rho_0 * (velocity / v_0).powf(*exponent),
            DensityProfile::Exponential { rho_0, v_0, .. } => rho_0 * (-velocity / v_0).exp(),
            DensityProfile::Branch85W7 => W7_RHO_0 * (velocity / W7_V_0).powf(W7_EXPONENT),
        }
    }

    /// Shell-centre densities at the time of explosion of `geometry` [g / cm^3].
    pub fn calculate_density(&self, geometry: &GeometryState) -> RadTransResult<Array1<f64>> {
        let time_0 = self.time_0();
        if time_0 <= 0.0 {
            return Err(RadTransError::Config(format!(
                "density reference time must be positive, got {time_0}"
            )));
        }
        let scale = (time_0 / geometry.time_explosion).powi(3);
        Ok(geometry
            .v_middle()
            .mapv(|v| self.density_at_time_0(v) * scale))
    }
}

/// Elemental mass fractions per shell.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    /// Atomic numbers in ascending order
    pub atomic_numbers: Vec<u32>,
    /// Mass fractions, one row per element and one column per shell
    pub mass_fractions: Array2<f64>,
}

impl Composition {
    /// Builds a composition with the same mass fractions in every shell.
    ///
    /// Fractions are normalised to sum to one.
    pub fn uniform(fractions: &[(u32, f64)], no_of_shells: usize) -> RadTransResult<Self> {
        if fractions.is_empty() {
            return Err(RadTransError::Config(
                "composition needs at least one element".to_string(),
            ));
        }
        let mut sorted = fractions.to_vec();
        sorted.sort_by_key(|(z, _)| *z);
        if sorted.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(RadTransError::Config(
                "an element appears twice in the composition".to_string(),
            ));
        }
        if let Some((z, x)) = sorted.iter().find(|(_, x)| *x < 0.0) {
            return Err(RadTransError::Config(format!(
                "mass fraction of element {z} is negative ({x})"
            )));
        }

        let total: f64 = sorted.iter().map(|(_, x)| x).sum();
        if total <= 0.0 {
            return Err(RadTransError::Config(
                "mass fractions sum to zero".to_string(),
            ));
        }
        if (total - 1.0).abs() > MASS_FRACTION_TOLERANCE {
            warn!(total, "Mass fractions do not sum to 1, normalising");
        }

        let mut mass_fractions = Array2::zeros((sorted.len(), no_of_shells));
        for (row, (_, x)) in sorted.iter().enumerate() {
            mass_fractions.row_mut(row).fill(x / total);
        }

        Ok(Self {
            atomic_numbers: sorted.iter().map(|(z, _)| *z).collect(),
            mass_fractions,
        })
    }

    pub fn no_of_shells(&self) -> usize {
        self.mass_fractions.ncols()
    }

    /// Element number densities `rho X / m_atom` [1 / cm^3].
    ///
    /// Rows follow the element order of `atomic_data`. Elements without a
    /// mass fraction get zero density.
    pub fn number_densities(
        &self,
        atomic_data: &AtomicData,
        density: &Array1<f64>,
    ) -> RadTransResult<Array2<f64>> {
        if density.len() != self.no_of_shells() {
            return Err(RadTransError::PlasmaShape {
                name: "density".to_string(),
                expected: self.no_of_shells().to_string(),
                found: density.len().to_string(),
            });
        }
        let mut result = Array2::zeros((atomic_data.elements.len(), density.len()));
        for (row, z) in self.atomic_numbers.iter().enumerate() {
            let element_index = atomic_data.element_index(*z).ok_or_else(|| {
                RadTransError::AtomicData(format!("no atomic data for element {z}"))
            })?;
            let mass = atomic_data.elements[element_index].mass;
            let fractions = self.mass_fractions.row(row);
            let mut target = result.row_mut(element_index);
            for ((n, x), rho) in target.iter_mut().zip(fractions.iter()).zip(density.iter()) {
                *n = rho * x / mass;
            }
        }
        Ok(result)
    }

    /// Mean atomic mass per shell in amu.
    pub fn mean_atomic_mass(&self, atomic_data: &AtomicData) -> RadTransResult<Array1<f64>> {
        let mut inverse = Array1::<f64>::zeros(self.no_of_shells());
        for (row, z) in self.atomic_numbers.iter().enumerate() {
            let element_index = atomic_data.element_index(*z).ok_or_else(|| {
                RadTransError::AtomicData(format!("no atomic data for element {z}"))
            })?;
            let mass_amu = atomic_data.elements[element_index].mass / AMU;
            inverse = inverse + &self.mass_fractions.row(row).mapv(|x| x / mass_amu);
        }
        Ok(inverse.mapv(|v| 1.0 / v))
    }
}
