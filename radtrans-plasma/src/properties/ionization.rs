//! Ionization balance.
//!
//! The Saha factor `phi = n_{j+1} n_e / n_j` of every ionization step is
//! stored in the row of the upper ion `j+1`. Rows of neutral species are zero.
//! [`IonNumberDensity`] turns the factors into ion populations by iterating
//! the electron density to self-consistency.

use super::{check_columns, single_output};
use ndarray::{Array1, Array2, ArrayView1};
use radtrans_core::atomic::AtomicData;
use radtrans_core::constants::{g_electron, EV, K_B};
use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::plasma::variables::{
    BETA_ELECTRON, BETA_RADIATION, DELTA, DILUTION_FACTOR, ELECTRON_DENSITIES,
    ION_NUMBER_DENSITY, NUMBER_DENSITY, PARTITION_FUNCTION, PHI, T_ELECTRONS, T_RAD,
};
use radtrans_core::plasma::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Ionization energy of Ca II, the reference of the radiation field correction [erg]
pub const DEFAULT_CHI_0: f64 = 11.871 * EV;

/// LTE Saha factors `2 g_e(T) Z_{j+1} / Z_j exp(-chi_j / kT)`.
pub fn saha_lte_phi(
    atomic_data: &AtomicData,
    partition_function: &Array2<f64>,
    beta_rad: &Array1<f64>,
) -> Array2<f64> {
    let mut phi = Array2::zeros(partition_function.raw_dim());
    for element in &atomic_data.elements {
        for lower in element.ions.start..element.ions.end - 1 {
            let chi = atomic_data.ions[lower].ionization_energy;
            for (shell, beta) in beta_rad.iter().enumerate() {
                let t = 1.0 / (K_B * beta);
                phi[[lower + 1, shell]] = 2.0
                    * g_electron(t)
                    * partition_function[[lower + 1, shell]]
                    / partition_function[[lower, shell]]
                    * (-chi * beta).exp();
            }
        }
    }
    phi
}

/// Saha ionization in local thermodynamic equilibrium at `T_rad`.
#[derive(Debug, Clone, Default)]
pub struct PhiSahaLte;

impl PlasmaProperty for PhiSahaLte {
    fn inputs(&self) -> Vec<String> {
        vec![PARTITION_FUNCTION.to_string(), BETA_RADIATION.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![PHI.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let partition_function = state.get_table(PARTITION_FUNCTION)?;
        check_rows(PARTITION_FUNCTION, partition_function, atomic_data.n_ions())?;
        let beta_rad = state.get_shells(BETA_RADIATION)?;
        Ok(single_output(
            PHI,
            saha_lte_phi(atomic_data, partition_function, beta_rad),
        ))
    }
}

/// Correction `delta` of the nebular approximation for ionizations from
/// excited levels (Mazzali & Lucy 1993).
///
/// Ionization energies below `chi_0` are treated as coming mostly from the
/// ground state of the ion, larger ones from the ground state of a reference
/// ion with ionization energy `chi_0`. The departure coefficient `b` defaults
/// to `1 / W`.
#[derive(Debug, Clone)]
pub struct RadiationFieldCorrection {
    /// [erg]
    pub chi_0: f64,
    pub departure_coefficient: Option<f64>,
}

impl Default for RadiationFieldCorrection {
    fn default() -> Self {
        Self {
            chi_0: DEFAULT_CHI_0,
            departure_coefficient: None,
        }
    }
}

impl RadiationFieldCorrection {
    pub fn correction(
        &self,
        chi: f64,
        t_rad: f64,
        t_electron: f64,
        w: f64,
        beta_rad: f64,
        beta_electron: f64,
    ) -> f64 {
        let departure_coefficient = self.departure_coefficient.unwrap_or(1.0 / w);
        let factor_a = t_electron / (departure_coefficient * w * t_rad);
        if chi >= self.chi_0 {
            factor_a * (chi * (beta_rad - beta_electron)).exp()
        } else {
            1.0 - (chi * beta_rad - beta_rad * self.chi_0).exp()
                + factor_a * (chi * beta_rad - self.chi_0 * beta_electron).exp()
        }
    }
}

impl PlasmaProperty for RadiationFieldCorrection {
    fn inputs(&self) -> Vec<String> {
        vec![
            T_RAD.to_string(),
            T_ELECTRONS.to_string(),
            DILUTION_FACTOR.to_string(),
            BETA_RADIATION.to_string(),
            BETA_ELECTRON.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![DELTA.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let t_rad = state.get_shells(T_RAD)?;
        let t_electrons = state.get_shells(T_ELECTRONS)?;
        let w = state.get_shells(DILUTION_FACTOR)?;
        let beta_rad = state.get_shells(BETA_RADIATION)?;
        let beta_electron = state.get_shells(BETA_ELECTRON)?;

        let mut delta = Array2::ones((atomic_data.n_ions(), t_rad.len()));
        for element in &atomic_data.elements {
            for lower in element.ions.start..element.ions.end - 1 {
                let chi = atomic_data.ions[lower].ionization_energy;
                for shell in 0..t_rad.len() {
                    delta[[lower + 1, shell]] = self.correction(
                        chi,
                        t_rad[shell],
                        t_electrons[shell],
                        w[shell],
                        beta_rad[shell],
                        beta_electron[shell],
                    );
                }
            }
        }
        Ok(single_output(DELTA, delta))
    }
}

/// Nebular approximation to the ionization balance (Mazzali & Lucy 1993).
///
/// `phi = phi_LTE W (delta zeta + W (1 - zeta)) sqrt(T_e / T_rad)` where zeta,
/// the fraction of recombinations going directly to the ground state, is
/// interpolated at `T_rad`.
#[derive(Debug, Clone, Default)]
pub struct PhiSahaNebular;

impl PlasmaProperty for PhiSahaNebular {
    fn inputs(&self) -> Vec<String> {
        vec![
            T_RAD.to_string(),
            T_ELECTRONS.to_string(),
            DILUTION_FACTOR.to_string(),
            BETA_RADIATION.to_string(),
            PARTITION_FUNCTION.to_string(),
            DELTA.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![PHI.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let t_rad = state.get_shells(T_RAD)?;
        let t_electrons = state.get_shells(T_ELECTRONS)?;
        let w = state.get_shells(DILUTION_FACTOR)?;
        let beta_rad = state.get_shells(BETA_RADIATION)?;
        let partition_function = state.get_table(PARTITION_FUNCTION)?;
        let delta = state.get_table(DELTA)?;
        check_rows(PARTITION_FUNCTION, partition_function, atomic_data.n_ions())?;
        check_rows(DELTA, delta, atomic_data.n_ions())?;

        let mut phi = saha_lte_phi(atomic_data, partition_function, beta_rad);
        for element in &atomic_data.elements {
            for upper in element.ions.start + 1..element.ions.end {
                for shell in 0..t_rad.len() {
                    let zeta = atomic_data.zeta.interpolate(upper, t_rad[shell]);
                    phi[[upper, shell]] *= w[shell]
                        * (delta[[upper, shell]] * zeta + w[shell] * (1.0 - zeta))
                        * (t_electrons[shell] / t_rad[shell]).sqrt();
                }
            }
        }
        Ok(single_output(PHI, phi))
    }
}

/// Numerical parameters of the electron density iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IonNumberDensitySolver {
    /// Relative change of the electron density accepted as converged
    pub tolerance: f64,
    /// Iterations after which a slow convergence warning is logged
    pub warn_iterations: usize,
    pub max_iterations: usize,
    /// Ion densities below this value are set to zero [1 / cm^3]
    pub ion_zero_threshold: f64,
}

impl Default for IonNumberDensitySolver {
    fn default() -> Self {
        Self {
            tolerance: 0.05,
            warn_iterations: 100,
            max_iterations: 1000,
            ion_zero_threshold: 1e-20,
        }
    }
}

/// Ion populations and the free electron density.
///
/// Starting from full ionization of one electron per atom, the ion
/// populations for a given electron density follow from the Saha factors.
/// The electron density is then recomputed from the ion charges and the
/// average of old and new value is used for the next step.
#[derive(Debug, Clone, Default)]
pub struct IonNumberDensity {
    pub solver: IonNumberDensitySolver,
}

impl IonNumberDensity {
    pub fn new(solver: IonNumberDensitySolver) -> Self {
        Self { solver }
    }

    /// Ion populations of one shell for a fixed electron density.
    fn populations_with_electron_density(
        &self,
        atomic_data: &AtomicData,
        phi: ArrayView1<f64>,
        number_density: ArrayView1<f64>,
        electron_density: f64,
    ) -> Array1<f64> {
        let mut populations = Array1::zeros(atomic_data.n_ions());
        for (element, n_element) in atomic_data.elements.iter().zip(number_density.iter()) {
            // Populations relative to the neutral stage
            let mut relative = Vec::with_capacity(element.ions.len());
            let mut current = 1.0;
            relative.push(current);
            for upper in element.ions.start + 1..element.ions.end {
                current *= phi[upper] / electron_density;
                relative.push(current);
            }
            let neutral = n_element / relative.iter().sum::<f64>();
            for (ion, ratio) in element.ions.clone().zip(relative) {
                let n = neutral * ratio;
                populations[ion] = if n < self.solver.ion_zero_threshold {
                    0.0
                } else {
                    n
                };
            }
        }
        populations
    }

    fn solve_shell(
        &self,
        atomic_data: &AtomicData,
        shell: usize,
        phi: ArrayView1<f64>,
        number_density: ArrayView1<f64>,
    ) -> RadTransResult<(Array1<f64>, f64)> {
        let charges: Array1<f64> = atomic_data.ions.iter().map(|ion| ion.charge()).collect();
        let mut electron_density = number_density.sum();
        if electron_density <= 0.0 {
            return Err(RadTransError::PlasmaIonization {
                shell,
                message: "shell contains no matter".to_string(),
            });
        }

        for iteration in 1..=self.solver.max_iterations {
            let populations = self.populations_with_electron_density(
                atomic_data,
                phi,
                number_density,
                electron_density,
            );
            let new_electron_density = populations.dot(&charges);
            if new_electron_density.is_nan() {
                return Err(RadTransError::PlasmaIonization {
                    shell,
                    message: format!("electron density became NaN after {iteration} iterations"),
                });
            }
            if (new_electron_density - electron_density).abs()
                < self.solver.tolerance * electron_density
            {
                debug!(shell, iteration, electron_density = new_electron_density, "Electron density converged");
                return Ok((populations, new_electron_density));
            }
            electron_density = 0.5 * (new_electron_density + electron_density);
            if iteration == self.solver.warn_iterations {
                warn!(shell, iteration, "Electron density iteration is slow to converge");
            }
        }

        Err(RadTransError::PlasmaIonization {
            shell,
            message: format!(
                "electron density did not converge within {} iterations",
                self.solver.max_iterations
            ),
        })
    }
}

impl PlasmaProperty for IonNumberDensity {
    fn inputs(&self) -> Vec<String> {
        vec![PHI.to_string(), NUMBER_DENSITY.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![ION_NUMBER_DENSITY.to_string(), ELECTRON_DENSITIES.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let phi = state.get_table(PHI)?;
        let number_density = state.get_table(NUMBER_DENSITY)?;
        check_rows(PHI, phi, atomic_data.n_ions())?;
        check_rows(NUMBER_DENSITY, number_density, atomic_data.elements.len())?;
        check_columns(PHI, phi, number_density.ncols())?;

        let no_of_shells = number_density.ncols();
        let mut ion_number_density = Array2::zeros((atomic_data.n_ions(), no_of_shells));
        let mut electron_densities = Array1::zeros(no_of_shells);
        for shell in 0..no_of_shells {
            let (populations, electron_density) = self.solve_shell(
                atomic_data,
                shell,
                phi.column(shell),
                number_density.column(shell),
            )?;
            ion_number_density.column_mut(shell).assign(&populations);
            electron_densities[shell] = electron_density;
        }

        Ok(PlasmaOutputs::from([
            (ION_NUMBER_DENSITY.to_string(), ion_number_density.into()),
            (ELECTRON_DENSITIES.to_string(), electron_densities.into()),
        ]))
    }
}
