//! Recombination NLTE treatment of helium.
//!
//! In the dilute radiation field of the ejecta helium is far from LTE: He I
//! is populated mostly by recombination from He II. All helium level
//! populations are expressed relative to the ground state of He II and then
//! normalised to the helium number density.

use super::level_populations::boltzmann_populations;
use super::single_output;
use ndarray::{s, Array2};
use radtrans_core::atomic::AtomicData;
use radtrans_core::constants::thermal_de_broglie_cubed;
use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::plasma::variables::{
    BETA_RADIATION, DELTA, DILUTION_FACTOR, ELECTRON_DENSITIES, HELIUM_POPULATION,
    ION_NUMBER_DENSITY, LEVEL_BOLTZMANN_FACTOR, LEVEL_NUMBER_DENSITY, NUMBER_DENSITY,
    PARTITION_FUNCTION, T_ELECTRONS, T_RAD,
};
use radtrans_core::plasma::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState};
use std::ops::Range;

const HELIUM: u32 = 2;

/// Rows of the helium species in the atomic data.
struct HeliumIndices {
    element: usize,
    he_one: usize,
    he_two: usize,
    he_three: usize,
    /// All helium levels, from He I ground to He III
    levels: Range<usize>,
}

impl HeliumIndices {
    fn find(atomic_data: &AtomicData) -> RadTransResult<Self> {
        let missing =
            || RadTransError::AtomicData("helium NLTE needs He I, He II and He III".to_string());
        let element = atomic_data.element_index(HELIUM).ok_or_else(missing)?;
        let he_one = atomic_data.ion_index(HELIUM, 0).ok_or_else(missing)?;
        let he_two = atomic_data.ion_index(HELIUM, 1).ok_or_else(missing)?;
        let he_three = atomic_data.ion_index(HELIUM, 2).ok_or_else(missing)?;
        let levels = atomic_data.ions[he_one].levels.start..atomic_data.ions[he_three].levels.end;
        Ok(Self {
            element,
            he_one,
            he_two,
            he_three,
            levels,
        })
    }
}

/// Helium level populations in the recombination approximation.
///
/// Relative to the He II ground state:
/// * He II excited levels follow the (dilute) Boltzmann factor, `bf / g_{II,0}`
/// * He I excited levels `W g_i / (2 g_{II,0}) n_e Lambda^3 exp((chi_I - E_i) / kT_rad)`
/// * He I ground state is empty
/// * He III `2 g_III / g_{II,0} Lambda^-3 exp(-chi_II / kT_rad) W (delta zeta + W (1 - zeta)) sqrt(T_e / T_rad) / n_e`
///
/// where `Lambda^3` is the cube of the thermal de Broglie wavelength at `T_rad`.
#[derive(Debug, Clone, Default)]
pub struct HeliumNlte;

impl PlasmaProperty for HeliumNlte {
    fn inputs(&self) -> Vec<String> {
        vec![
            LEVEL_BOLTZMANN_FACTOR.to_string(),
            ELECTRON_DENSITIES.to_string(),
            NUMBER_DENSITY.to_string(),
            T_RAD.to_string(),
            T_ELECTRONS.to_string(),
            DILUTION_FACTOR.to_string(),
            BETA_RADIATION.to_string(),
            DELTA.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![HELIUM_POPULATION.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let he = HeliumIndices::find(atomic_data)?;
        let level_boltzmann_factor = state.get_table(LEVEL_BOLTZMANN_FACTOR)?;
        let electron_densities = state.get_shells(ELECTRON_DENSITIES)?;
        let number_density = state.get_table(NUMBER_DENSITY)?;
        let t_rad = state.get_shells(T_RAD)?;
        let t_electrons = state.get_shells(T_ELECTRONS)?;
        let w = state.get_shells(DILUTION_FACTOR)?;
        let beta_rad = state.get_shells(BETA_RADIATION)?;
        let delta = state.get_table(DELTA)?;
        check_rows(LEVEL_BOLTZMANN_FACTOR, level_boltzmann_factor, atomic_data.n_levels())?;
        check_rows(DELTA, delta, atomic_data.n_ions())?;

        let ions = &atomic_data.ions;
        let levels = &atomic_data.levels;
        let g_two_ground = levels[ions[he.he_two].levels.start].g;
        let g_three_ground = levels[ions[he.he_three].levels.start].g;
        let chi_one = ions[he.he_one].ionization_energy;
        let chi_two = ions[he.he_two].ionization_energy;

        let no_of_shells = t_rad.len();
        let offset = he.levels.start;
        let mut population = Array2::zeros((he.levels.len(), no_of_shells));
        for shell in 0..no_of_shells {
            let n_e = electron_densities[shell];
            if n_e <= 0.0 {
                return Err(RadTransError::PlasmaIonization {
                    shell,
                    message: "helium NLTE needs a positive electron density".to_string(),
                });
            }
            let lambda_cubed = thermal_de_broglie_cubed(t_rad[shell]);
            let beta = beta_rad[shell];

            for level in ions[he.he_one].levels.clone().skip(1) {
                population[[level - offset, shell]] = w[shell] * levels[level].g
                    / (2.0 * g_two_ground)
                    * n_e
                    * lambda_cubed
                    * ((chi_one - levels[level].energy) * beta).exp();
            }
            for level in ions[he.he_two].levels.clone() {
                population[[level - offset, shell]] =
                    level_boltzmann_factor[[level, shell]] / g_two_ground;
            }
            population[[ions[he.he_two].levels.start - offset, shell]] = 1.0;

            let zeta = atomic_data.zeta.interpolate(he.he_three, t_rad[shell]);
            population[[ions[he.he_three].levels.start - offset, shell]] = 2.0
                * (g_three_ground / g_two_ground)
                / lambda_cubed
                * (-chi_two * beta).exp()
                * w[shell]
                * (delta[[he.he_three, shell]] * zeta + w[shell] * (1.0 - zeta))
                * (t_electrons[shell] / t_rad[shell]).sqrt()
                / n_e;

            let total: f64 = population.column(shell).sum();
            let n_helium = number_density[[he.element, shell]];
            let scale = if total > 0.0 { n_helium / total } else { 0.0 };
            population.column_mut(shell).mapv_inplace(|n| n * scale);
        }
        Ok(single_output(HELIUM_POPULATION, population))
    }
}

/// Level populations with helium replaced by the recombination NLTE values.
#[derive(Debug, Clone)]
pub struct LevelNumberDensityHeNlte {
    output: String,
}

impl Default for LevelNumberDensityHeNlte {
    fn default() -> Self {
        Self::with_output(LEVEL_NUMBER_DENSITY)
    }
}

impl LevelNumberDensityHeNlte {
    pub fn with_output(output: &str) -> Self {
        Self {
            output: output.to_string(),
        }
    }
}

impl PlasmaProperty for LevelNumberDensityHeNlte {
    fn inputs(&self) -> Vec<String> {
        vec![
            LEVEL_BOLTZMANN_FACTOR.to_string(),
            ION_NUMBER_DENSITY.to_string(),
            PARTITION_FUNCTION.to_string(),
            HELIUM_POPULATION.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let he = HeliumIndices::find(atomic_data)?;
        let helium_population = state.get_table(HELIUM_POPULATION)?;
        check_rows(HELIUM_POPULATION, helium_population, he.levels.len())?;

        let mut populations = boltzmann_populations(
            atomic_data,
            state.get_table(LEVEL_BOLTZMANN_FACTOR)?,
            state.get_table(ION_NUMBER_DENSITY)?,
            state.get_table(PARTITION_FUNCTION)?,
        )?;
        populations
            .slice_mut(s![he.levels.clone(), ..])
            .assign(helium_population);
        Ok(single_output(&self.output, populations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array1};
    use radtrans_core::constants::K_B;
    use radtrans_core::plasma::PlasmaValue;
    use radtrans_core::testing::small_atomic_data;
    use std::sync::Arc;

    fn state() -> PlasmaState {
        let atomic = Arc::new(small_atomic_data().unwrap());
        let t_rad = array![10_000.0, 15_000.0];
        let beta_rad = t_rad.mapv(|t| 1.0 / (K_B * t));
        let w = array![0.4, 0.2];
        let factors = Array2::from_shape_fn((atomic.n_levels(), 2), |(level, shell)| {
            let level = &atomic.levels[level];
            level.g * (-level.energy * beta_rad[shell]).exp()
        });

        let mut state = PlasmaState::new(Arc::clone(&atomic));
        state.insert(LEVEL_BOLTZMANN_FACTOR, PlasmaValue::Table(factors));
        state.insert(ELECTRON_DENSITIES, PlasmaValue::Shells(array![1e9, 5e8]));
        state.insert(NUMBER_DENSITY, PlasmaValue::Table(array![[1e9, 1e9], [3e8, 2e8]]));
        state.insert(T_ELECTRONS, PlasmaValue::Shells(&t_rad * 0.9));
        state.insert(T_RAD, PlasmaValue::Shells(t_rad));
        state.insert(DILUTION_FACTOR, PlasmaValue::Shells(w));
        state.insert(BETA_RADIATION, PlasmaValue::Shells(beta_rad));
        state.insert(DELTA, PlasmaValue::Table(Array2::ones((atomic.n_ions(), 2))));
        state
    }

    fn helium_population(state: &PlasmaState) -> Array2<f64> {
        match &HeliumNlte.calculate(state).unwrap()[HELIUM_POPULATION] {
            PlasmaValue::Table(values) => values.clone(),
            other => panic!("expected a table, got {other:?}"),
        }
    }

    #[test]
    fn test_normalised_to_helium_density() {
        let population = helium_population(&state());
        assert_eq!(population.nrows(), 5 + 3 + 1);
        let totals: Array1<f64> = population.sum_axis(ndarray::Axis(0));
        assert_relative_eq!(totals[0], 3e8, max_relative = 1e-12);
        assert_relative_eq!(totals[1], 2e8, max_relative = 1e-12);
        // He I ground state is empty
        assert_eq!(population[[0, 0]], 0.0);
    }

    #[test]
    fn test_he_one_relative_to_he_two_ground() {
        let state = state();
        let atomic = state.atomic_data();
        let population = helium_population(&state);
        let he_two_ground = atomic.level_index(2, 1, 0).unwrap() - atomic.level_index(2, 0, 0).unwrap();
        let excited = atomic.level_index(2, 0, 3).unwrap();
        let level = &atomic.levels[excited];

        let t_rad = 10_000.0;
        let chi = atomic.ions[atomic.ion_index(2, 0).unwrap()].ionization_energy;
        let expected = 0.4 * level.g / (2.0 * 2.0)
            * 1e9
            * thermal_de_broglie_cubed(t_rad)
            * ((chi - level.energy) / (K_B * t_rad)).exp();
        let offset = atomic.level_index(2, 0, 0).unwrap();
        assert_relative_eq!(
            population[[excited - offset, 0]] / population[[he_two_ground, 0]],
            expected,
            max_relative = 1e-10
        );
    }

    #[test]
    fn test_he_two_and_he_three_relative_to_he_two_ground() {
        let mut state = state();
        let atomic = state.atomic_data_arc();
        let he_three_ion = atomic.ion_index(2, 2).unwrap();
        let mut delta = Array2::ones((atomic.n_ions(), 2));
        delta[[he_three_ion, 1]] = 0.5;
        state.insert(DELTA, PlasmaValue::Table(delta));
        let population = helium_population(&state);

        let shell = 1;
        let t_rad = 15_000.0;
        let t_e = 0.9 * t_rad;
        let w = 0.2;
        let n_e = 5e8;
        let beta = 1.0 / (K_B * t_rad);
        let offset = atomic.level_index(2, 0, 0).unwrap();
        let he_two = &atomic.ions[atomic.ion_index(2, 1).unwrap()];
        let he_two_ground = he_two.levels.start;
        let g_two_ground = atomic.levels[he_two_ground].g;
        let ground = population[[he_two_ground - offset, shell]];

        for level in he_two.levels.clone().skip(1) {
            let bf = atomic.levels[level].g * (-atomic.levels[level].energy * beta).exp();
            assert_relative_eq!(
                population[[level - offset, shell]] / ground,
                bf / g_two_ground,
                max_relative = 1e-10
            );
        }

        let he_three_ground = atomic.ions[he_three_ion].levels.start;
        let g_three = atomic.levels[he_three_ground].g;
        let chi_two = he_two.ionization_energy;
        let zeta = atomic.zeta.interpolate(he_three_ion, t_rad);
        let expected = 2.0 * g_three / g_two_ground / thermal_de_broglie_cubed(t_rad)
            * (-chi_two * beta).exp()
            * w
            * (0.5 * zeta + w * (1.0 - zeta))
            * (t_e / t_rad).sqrt()
            / n_e;
        assert_relative_eq!(
            population[[he_three_ground - offset, shell]] / ground,
            expected,
            max_relative = 1e-10
        );
    }

    #[test]
    fn test_level_number_density_replaces_helium_rows() {
        let mut state = state();
        let atomic = state.atomic_data_arc();
        let population = helium_population(&state);
        state.insert(HELIUM_POPULATION, PlasmaValue::Table(population.clone()));
        state.insert(ION_NUMBER_DENSITY, PlasmaValue::Table(Array2::from_elem((atomic.n_ions(), 2), 1e7)));
        let partition = Array2::from_elem((atomic.n_ions(), 2), 1.0);
        state.insert(PARTITION_FUNCTION, PlasmaValue::Table(partition));

        let outputs = LevelNumberDensityHeNlte::default().calculate(&state).unwrap();
        let PlasmaValue::Table(levels) = &outputs[LEVEL_NUMBER_DENSITY] else {
            panic!("expected a table")
        };
        let offset = atomic.level_index(2, 0, 0).unwrap();
        assert_eq!(levels[[offset + 2, 1]], population[[2, 1]]);
        // Hydrogen keeps its Boltzmann populations
        assert_relative_eq!(levels[[0, 0]], 1e7 * 2.0);
    }

    #[test]
    fn test_requires_helium() {
        let atomic = Arc::new(small_atomic_data().unwrap().select_elements(&[1]).unwrap());
        let state = PlasmaState::new(atomic);
        assert!(matches!(
            HeliumNlte.calculate(&state),
            Err(RadTransError::AtomicData(_))
        ));
    }
}
