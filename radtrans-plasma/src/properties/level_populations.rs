use super::single_output;
use ndarray::Array2;
use radtrans_core::atomic::AtomicData;
use radtrans_core::errors::RadTransResult;
use radtrans_core::plasma::variables::{
    ION_NUMBER_DENSITY, LEVEL_BOLTZMANN_FACTOR, LEVEL_NUMBER_DENSITY, LTE_LEVEL_NUMBER_DENSITY,
    PARTITION_FUNCTION,
};
use radtrans_core::plasma::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState};

/// `n_level = n_ion bf / Z` for every level.
pub(crate) fn boltzmann_populations(
    atomic_data: &AtomicData,
    level_boltzmann_factor: &Array2<f64>,
    ion_number_density: &Array2<f64>,
    partition_function: &Array2<f64>,
) -> RadTransResult<Array2<f64>> {
    check_rows(LEVEL_BOLTZMANN_FACTOR, level_boltzmann_factor, atomic_data.n_levels())?;
    check_rows(ION_NUMBER_DENSITY, ion_number_density, atomic_data.n_ions())?;
    check_rows(PARTITION_FUNCTION, partition_function, atomic_data.n_ions())?;

    let mut populations = Array2::zeros(level_boltzmann_factor.raw_dim());
    for (index, (level, mut row)) in atomic_data
        .levels
        .iter()
        .zip(populations.rows_mut())
        .enumerate()
    {
        let ion = level.ion_index;
        for shell in 0..row.len() {
            row[shell] = ion_number_density[[ion, shell]] * level_boltzmann_factor[[index, shell]]
                / partition_function[[ion, shell]];
        }
    }
    Ok(populations)
}

/// Boltzmann distribution of each ion over its levels.
///
/// Writes `level_number_density` unless constructed with
/// [`LevelNumberDensity::before_nlte`], in which case the populations are
/// the starting point of the rate equations.
#[derive(Debug, Clone)]
pub struct LevelNumberDensity {
    output: String,
}

impl Default for LevelNumberDensity {
    fn default() -> Self {
        Self {
            output: LEVEL_NUMBER_DENSITY.to_string(),
        }
    }
}

impl LevelNumberDensity {
    pub fn before_nlte() -> Self {
        Self {
            output: LTE_LEVEL_NUMBER_DENSITY.to_string(),
        }
    }
}

impl PlasmaProperty for LevelNumberDensity {
    fn inputs(&self) -> Vec<String> {
        vec![
            LEVEL_BOLTZMANN_FACTOR.to_string(),
            ION_NUMBER_DENSITY.to_string(),
            PARTITION_FUNCTION.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![self.output.clone()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let populations = boltzmann_populations(
            state.atomic_data(),
            state.get_table(LEVEL_BOLTZMANN_FACTOR)?,
            state.get_table(ION_NUMBER_DENSITY)?,
            state.get_table(PARTITION_FUNCTION)?,
        )?;
        Ok(single_output(&self.output, populations))
    }
}
