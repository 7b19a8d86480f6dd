//! Statistical equilibrium of selected ions.

use super::single_output;
use ndarray::{Array1, Array2};
use radtrans_core::atomic::AtomicData;
use radtrans_core::constants::K_B;
use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::plasma::variables::{
    ELECTRON_DENSITIES, ION_NUMBER_DENSITY, J_BLUES, LEVEL_NUMBER_DENSITY,
    LTE_LEVEL_NUMBER_DENSITY, PREVIOUS_BETA_SOBOLEV, T_ELECTRONS,
};
use radtrans_core::plasma::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState};
use radtrans_core::utils::linear_algebra::solve_dense;
use tracing::warn;

/// Level populations from the rate equations of the configured species.
///
/// For every species and shell the populations balance the radiative rates
/// in the Sobolev approximation (`A_ul beta`, `B_lu J_blue beta` and
/// `B_ul J_blue beta`) and, optionally, collisional rates. Collisional
/// de-excitation scales as `C_ul (T_e / T_ref)^-1/2 n_e`, excitation follows
/// from detailed balance at `T_e`. One equation is replaced by the
/// conservation of the ion population.
///
/// The escape probabilities come from the previous iteration, the opacities
/// of the current one depend on these populations. Species that are not
/// configured keep the populations of `lte_level_number_density`.
#[derive(Debug, Clone)]
pub struct LevelNumberDensityNlte {
    /// `(atomic number, ion number)` of every species in NLTE
    pub species: Vec<(u32, u32)>,
    pub include_collisions: bool,
}

impl LevelNumberDensityNlte {
    pub fn new(species: Vec<(u32, u32)>, include_collisions: bool) -> Self {
        Self {
            species,
            include_collisions,
        }
    }

    /// Rate matrix of one ion in one shell.
    ///
    /// Entry `(i, j)` is the rate from level `j` into level `i`; the diagonal
    /// holds the total rate out of each level with a negative sign.
    #[allow(clippy::too_many_arguments)]
    pub fn rate_matrix(
        &self,
        atomic_data: &AtomicData,
        ion_index: usize,
        shell: usize,
        j_blues: &Array2<f64>,
        beta_sobolev: &Array2<f64>,
        t_electron: f64,
        electron_density: f64,
    ) -> Array2<f64> {
        let levels = atomic_data.ions[ion_index].levels.clone();
        let offset = levels.start;
        let mut rates = Array2::zeros((levels.len(), levels.len()));
        let mut add_rate = |from: usize, to: usize, rate: f64| {
            rates[[to - offset, from - offset]] += rate;
            rates[[from - offset, from - offset]] -= rate;
        };

        for (index, line) in atomic_data.lines.iter().enumerate() {
            if line.ion_index != ion_index {
                continue;
            }
            let j_blue = j_blues[[index, shell]];
            let beta = beta_sobolev[[index, shell]];
            add_rate(
                line.lower_level_index,
                line.upper_level_index,
                line.b_lu * j_blue * beta,
            );
            add_rate(
                line.upper_level_index,
                line.lower_level_index,
                (line.a_ul + line.b_ul * j_blue) * beta,
            );
        }

        if self.include_collisions {
            for collision in atomic_data
                .collisions
                .iter()
                .filter(|c| c.ion_index == ion_index)
            {
                let lower = &atomic_data.levels[collision.lower_level_index];
                let upper = &atomic_data.levels[collision.upper_level_index];
                let c_ul = collision.c_ul
                    * (t_electron / collision.temperature).powf(-0.5)
                    * electron_density;
                let c_lu = c_ul * upper.g / lower.g
                    * (-(upper.energy - lower.energy) / (K_B * t_electron)).exp();
                add_rate(collision.upper_level_index, collision.lower_level_index, c_ul);
                add_rate(collision.lower_level_index, collision.upper_level_index, c_lu);
            }
        }
        rates
    }

    fn solve_species(
        &self,
        atomic_data: &AtomicData,
        ion_index: usize,
        shell: usize,
        state: &PlasmaState,
    ) -> RadTransResult<Array1<f64>> {
        let ion_number_density = state.get_table(ION_NUMBER_DENSITY)?[[ion_index, shell]];
        let no_of_levels = atomic_data.ions[ion_index].levels.len();
        if no_of_levels == 1 {
            return Ok(Array1::from_elem(1, ion_number_density));
        }

        let mut rates = self.rate_matrix(
            atomic_data,
            ion_index,
            shell,
            state.get_table(J_BLUES)?,
            state.get_table(PREVIOUS_BETA_SOBOLEV)?,
            state.get_shells(T_ELECTRONS)?[shell],
            state.get_shells(ELECTRON_DENSITIES)?[shell],
        );
        rates.row_mut(0).fill(1.0);
        let mut rhs = Array1::zeros(no_of_levels);
        rhs[0] = ion_number_density;

        let populations = solve_dense(&rates, &rhs).map_err(|err| {
            RadTransError::PlasmaIonization {
                shell,
                message: format!("rate equations of ion {ion_index} cannot be solved: {err}"),
            }
        })?;
        if populations.iter().any(|n| *n < 0.0) {
            warn!(shell, ion_index, "Negative NLTE level population");
        }
        Ok(populations)
    }
}

impl PlasmaProperty for LevelNumberDensityNlte {
    fn inputs(&self) -> Vec<String> {
        vec![
            LTE_LEVEL_NUMBER_DENSITY.to_string(),
            ION_NUMBER_DENSITY.to_string(),
            ELECTRON_DENSITIES.to_string(),
            T_ELECTRONS.to_string(),
            J_BLUES.to_string(),
            PREVIOUS_BETA_SOBOLEV.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![LEVEL_NUMBER_DENSITY.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let lte = state.get_table(LTE_LEVEL_NUMBER_DENSITY)?;
        check_rows(LTE_LEVEL_NUMBER_DENSITY, lte, atomic_data.n_levels())?;
        check_rows(J_BLUES, state.get_table(J_BLUES)?, atomic_data.n_lines())?;
        check_rows(
            PREVIOUS_BETA_SOBOLEV,
            state.get_table(PREVIOUS_BETA_SOBOLEV)?,
            atomic_data.n_lines(),
        )?;

        let mut populations = lte.clone();
        for (atomic_number, ion_number) in &self.species {
            let ion_index = atomic_data
                .ion_index(*atomic_number, *ion_number)
                .ok_or_else(|| {
                    RadTransError::AtomicData(format!(
                        "NLTE species ({atomic_number}, {ion_number}) has no atomic data"
                    ))
                })?;
            let levels = atomic_data.ions[ion_index].levels.clone();
            for shell in 0..populations.ncols() {
                let solution = self.solve_species(atomic_data, ion_index, shell, state)?;
                for (level, n) in levels.clone().zip(solution) {
                    populations[[level, shell]] = n;
                }
            }
        }
        Ok(single_output(LEVEL_NUMBER_DENSITY, populations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use radtrans_core::constants::planck_nu;
    use radtrans_core::plasma::PlasmaValue;
    use radtrans_core::testing::small_atomic_data;
    use std::sync::Arc;

    fn state(j_blues: Array2<f64>, electron_density: f64, t_electron: f64) -> PlasmaState {
        let atomic = Arc::new(small_atomic_data().unwrap());
        let n_lines = atomic.n_lines();
        let mut state = PlasmaState::new(Arc::clone(&atomic));
        state.insert(
            LTE_LEVEL_NUMBER_DENSITY,
            PlasmaValue::Table(Array2::from_elem((atomic.n_levels(), 1), 7.0)),
        );
        state.insert(
            ION_NUMBER_DENSITY,
            PlasmaValue::Table(Array2::from_elem((atomic.n_ions(), 1), 1e6)),
        );
        state.insert(ELECTRON_DENSITIES, PlasmaValue::Shells(array![electron_density]));
        state.insert(T_ELECTRONS, PlasmaValue::Shells(array![t_electron]));
        state.insert(J_BLUES, PlasmaValue::Table(j_blues));
        state.insert(
            PREVIOUS_BETA_SOBOLEV,
            PlasmaValue::Table(Array2::from_elem((n_lines, 1), 0.5)),
        );
        state
    }

    fn populations(property: &LevelNumberDensityNlte, state: &PlasmaState) -> Array2<f64> {
        match &property.calculate(state).unwrap()[LEVEL_NUMBER_DENSITY] {
            PlasmaValue::Table(values) => values.clone(),
            other => panic!("expected a table, got {other:?}"),
        }
    }

    #[test]
    fn test_rate_matrix_columns_conserve_population() {
        let atomic = small_atomic_data().unwrap();
        let j_blues = Array2::from_elem((atomic.n_lines(), 1), 1e-5);
        let beta = Array2::from_elem((atomic.n_lines(), 1), 0.3);
        let property = LevelNumberDensityNlte::new(vec![(1, 0)], true);
        let rates = property.rate_matrix(&atomic, 0, 0, &j_blues, &beta, 9_000.0, 1e9);
        for column in rates.columns() {
            assert!(column.sum().abs() <= 1e-12 * column.iter().map(|r| r.abs()).sum::<f64>());
        }
    }

    #[test]
    fn test_no_radiation_puts_everything_in_ground_state() {
        let atomic = small_atomic_data().unwrap();
        let state = state(Array2::zeros((atomic.n_lines(), 1)), 1e9, 9_000.0);
        let property = LevelNumberDensityNlte::new(vec![(1, 0)], false);
        let n = populations(&property, &state);
        assert_relative_eq!(n[[0, 0]], 1e6, max_relative = 1e-12);
        assert!(n[[1, 0]].abs() < 1e-6);
        assert!(n[[2, 0]].abs() < 1e-6);
        // Other species keep their starting populations
        assert_eq!(n[[5, 0]], 7.0);
    }

    #[test]
    fn test_collisions_drive_boltzmann_at_electron_temperature() {
        let atomic = small_atomic_data().unwrap();
        let t_electron = 9_000.0;
        let state = state(Array2::zeros((atomic.n_lines(), 1)), 1e24, t_electron);
        let property = LevelNumberDensityNlte::new(vec![(1, 0)], true);
        let n = populations(&property, &state);

        let total: f64 = (0..3).map(|level| n[[level, 0]]).sum();
        assert_relative_eq!(total, 1e6, max_relative = 1e-10);
        for level in 1..3 {
            let upper = &atomic.levels[level];
            let expected = upper.g / atomic.levels[0].g * (-upper.energy / (K_B * t_electron)).exp();
            assert_relative_eq!(n[[level, 0]] / n[[0, 0]], expected, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_planck_field_keeps_lines_in_detailed_balance() {
        let atomic = small_atomic_data().unwrap();
        let t_rad = 12_000.0;
        let j_blues = Array2::from_shape_fn((atomic.n_lines(), 1), |(line, _)| {
            planck_nu(atomic.lines[line].nu, t_rad)
        });
        let state = state(j_blues, 1e9, t_rad);
        let property = LevelNumberDensityNlte::new(vec![(2, 1)], false);
        let n = populations(&property, &state);

        let offset = atomic.level_index(2, 1, 0).unwrap();
        let line = atomic
            .lines
            .iter()
            .find(|l| l.atomic_number == 2 && l.ion_number == 1 && l.level_number_upper == 1)
            .unwrap();
        let g_ratio = atomic.levels[offset + 1].g / atomic.levels[offset].g;
        let expected = g_ratio * (-radtrans_core::constants::H * line.nu / (K_B * t_rad)).exp();
        assert_relative_eq!(n[[offset + 1, 0]] / n[[offset, 0]], expected, max_relative = 1e-2);
    }

    #[test]
    fn test_unknown_species() {
        let atomic = small_atomic_data().unwrap();
        let state = state(Array2::zeros((atomic.n_lines(), 1)), 1e9, 9_000.0);
        let property = LevelNumberDensityNlte::new(vec![(26, 1)], false);
        assert!(matches!(
            property.calculate(&state),
            Err(RadTransError::AtomicData(_))
        ));
    }
}
