//! Boltzmann excitation of levels and ion partition functions.

use super::single_output;
use ndarray::{Array1, Array2};
use radtrans_core::atomic::AtomicData;
use radtrans_core::errors::RadTransResult;
use radtrans_core::plasma::variables::{
    BETA_RADIATION, DILUTION_FACTOR, LEVEL_BOLTZMANN_FACTOR, PARTITION_FUNCTION,
};
use radtrans_core::plasma::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState};

fn boltzmann_factors(atomic_data: &AtomicData, beta_rad: &Array1<f64>) -> Array2<f64> {
    let mut factors = Array2::zeros((atomic_data.n_levels(), beta_rad.len()));
    for (level, mut row) in atomic_data.levels.iter().zip(factors.rows_mut()) {
        row.assign(&beta_rad.mapv(|beta| level.g * (-level.energy * beta).exp()));
    }
    factors
}

/// `g exp(-E / (k_B T_rad))` for every level.
#[derive(Debug, Clone, Default)]
pub struct LevelBoltzmannFactorLte;

impl PlasmaProperty for LevelBoltzmannFactorLte {
    fn inputs(&self) -> Vec<String> {
        vec![BETA_RADIATION.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![LEVEL_BOLTZMANN_FACTOR.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let beta_rad = state.get_shells(BETA_RADIATION)?;
        Ok(single_output(
            LEVEL_BOLTZMANN_FACTOR,
            boltzmann_factors(state.atomic_data(), beta_rad),
        ))
    }
}

/// Boltzmann factors in a diluted radiation field.
///
/// Excited levels that can decay radiatively see the diluted field and are
/// scaled by `W`. Ground states and metastable levels keep their LTE factor.
#[derive(Debug, Clone, Default)]
pub struct LevelBoltzmannFactorDiluteLte;

impl PlasmaProperty for LevelBoltzmannFactorDiluteLte {
    fn inputs(&self) -> Vec<String> {
        vec![BETA_RADIATION.to_string(), DILUTION_FACTOR.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![LEVEL_BOLTZMANN_FACTOR.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let beta_rad = state.get_shells(BETA_RADIATION)?;
        let w = state.get_shells(DILUTION_FACTOR)?;

        let mut factors = boltzmann_factors(atomic_data, beta_rad);
        for (level, mut row) in atomic_data.levels.iter().zip(factors.rows_mut()) {
            if level.level_number > 0 && !level.metastable {
                row *= w;
            }
        }
        Ok(single_output(LEVEL_BOLTZMANN_FACTOR, factors))
    }
}

/// Sum of the Boltzmann factors over the levels of each ion.
#[derive(Debug, Clone, Default)]
pub struct PartitionFunction;

impl PlasmaProperty for PartitionFunction {
    fn inputs(&self) -> Vec<String> {
        vec![LEVEL_BOLTZMANN_FACTOR.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![PARTITION_FUNCTION.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let factors = state.get_table(LEVEL_BOLTZMANN_FACTOR)?;
        check_rows(LEVEL_BOLTZMANN_FACTOR, factors, atomic_data.n_levels())?;

        let mut partition = Array2::zeros((atomic_data.n_ions(), factors.ncols()));
        for (ion, mut row) in atomic_data.ions.iter().zip(partition.rows_mut()) {
            for level in ion.levels.clone() {
                row += &factors.row(level);
            }
        }
        Ok(single_output(PARTITION_FUNCTION, partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use radtrans_core::constants::K_B;
    use radtrans_core::plasma::PlasmaValue;
    use radtrans_core::testing::small_atomic_data;
    use std::sync::Arc;

    fn state() -> PlasmaState {
        let mut state = PlasmaState::new(Arc::new(small_atomic_data().unwrap()));
        let t_rad = array![10_000.0, 20_000.0];
        state.insert(BETA_RADIATION, PlasmaValue::Shells(t_rad.mapv(|t| 1.0 / (K_B * t))));
        state.insert(DILUTION_FACTOR, PlasmaValue::Shells(array![0.5, 0.1]));
        state
    }

    fn table(outputs: &PlasmaOutputs, name: &str) -> Array2<f64> {
        match &outputs[name] {
            PlasmaValue::Table(values) => values.clone(),
            other => panic!("expected a table, got {other:?}"),
        }
    }

    #[test]
    fn test_lte_factors() {
        let state = state();
        let atomic = state.atomic_data();
        let factors = table(&LevelBoltzmannFactorLte.calculate(&state).unwrap(), LEVEL_BOLTZMANN_FACTOR);
        assert_eq!(factors.dim(), (atomic.n_levels(), 2));

        // Ground state of H I
        assert_relative_eq!(factors[[0, 0]], 2.0);
        let level = &atomic.levels[1];
        let beta = 1.0 / (K_B * 10_000.0);
        assert_relative_eq!(factors[[1, 0]], 8.0 * (-level.energy * beta).exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_dilute_factors_scale_only_radiative_levels() {
        let state = state();
        let atomic = state.atomic_data();
        let lte = table(&LevelBoltzmannFactorLte.calculate(&state).unwrap(), LEVEL_BOLTZMANN_FACTOR);
        let dilute = table(
            &LevelBoltzmannFactorDiluteLte.calculate(&state).unwrap(),
            LEVEL_BOLTZMANN_FACTOR,
        );

        let he_metastable = atomic.level_index(2, 0, 1).unwrap();
        let h_excited = atomic.level_index(1, 0, 2).unwrap();
        assert_eq!(dilute[[0, 1]], lte[[0, 1]]);
        assert_eq!(dilute[[he_metastable, 0]], lte[[he_metastable, 0]]);
        assert_relative_eq!(dilute[[h_excited, 1]], 0.1 * lte[[h_excited, 1]]);
    }

    #[test]
    fn test_partition_function() {
        let mut state = state();
        let factors = table(&LevelBoltzmannFactorLte.calculate(&state).unwrap(), LEVEL_BOLTZMANN_FACTOR);
        state.insert(LEVEL_BOLTZMANN_FACTOR, PlasmaValue::Table(factors.clone()));
        let partition = table(&PartitionFunction.calculate(&state).unwrap(), PARTITION_FUNCTION);

        let atomic = state.atomic_data();
        assert_eq!(partition.nrows(), atomic.n_ions());
        let h_one = atomic.ion_index(1, 0).unwrap();
        let expected: f64 = (0..3).map(|i| factors[[i, 0]]).sum();
        assert_relative_eq!(partition[[h_one, 0]], expected);
        // Bare nuclei only have their single ground state
        let h_two = atomic.ion_index(1, 1).unwrap();
        assert_relative_eq!(partition[[h_two, 1]], 1.0);
    }
}
