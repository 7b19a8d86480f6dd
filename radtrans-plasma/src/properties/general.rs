//! Thermal state and element densities of each shell.

use super::{check_columns, single_output};
use ndarray::{Array2, Zip};
use radtrans_core::constants::K_B;
use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::plasma::variables::{
    ABUNDANCE, BETA_ELECTRON, BETA_RADIATION, DENSITY, LINK_T_RAD_T_ELECTRON, NUMBER_DENSITY,
    T_ELECTRONS, T_RAD,
};
use radtrans_core::plasma::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState};

/// `1 / (k_B T_rad)`
#[derive(Debug, Clone, Default)]
pub struct BetaRadiation;

impl PlasmaProperty for BetaRadiation {
    fn inputs(&self) -> Vec<String> {
        vec![T_RAD.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![BETA_RADIATION.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let t_rad = state.get_shells(T_RAD)?;
        Ok(single_output(BETA_RADIATION, t_rad.mapv(|t| 1.0 / (K_B * t))))
    }
}

/// Electron temperature as a fixed fraction of the radiation temperature.
#[derive(Debug, Clone, Default)]
pub struct ElectronTemperature;

impl PlasmaProperty for ElectronTemperature {
    fn inputs(&self) -> Vec<String> {
        vec![T_RAD.to_string(), LINK_T_RAD_T_ELECTRON.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![T_ELECTRONS.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let t_rad = state.get_shells(T_RAD)?;
        let link = state.get_scalar(LINK_T_RAD_T_ELECTRON)?;
        Ok(single_output(T_ELECTRONS, t_rad * link))
    }
}

#[derive(Debug, Clone, Default)]
pub struct BetaElectron;

impl PlasmaProperty for BetaElectron {
    fn inputs(&self) -> Vec<String> {
        vec![T_ELECTRONS.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![BETA_ELECTRON.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let t_electrons = state.get_shells(T_ELECTRONS)?;
        Ok(single_output(
            BETA_ELECTRON,
            t_electrons.mapv(|t| 1.0 / (K_B * t)),
        ))
    }
}

/// Element number densities `rho X / m_atom`.
///
/// The abundance table has one row per element of the atomic data, in the
/// same order.
#[derive(Debug, Clone, Default)]
pub struct NumberDensity;

impl PlasmaProperty for NumberDensity {
    fn inputs(&self) -> Vec<String> {
        vec![DENSITY.to_string(), ABUNDANCE.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![NUMBER_DENSITY.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let density = state.get_shells(DENSITY)?;
        let abundance = state.get_table(ABUNDANCE)?;
        check_rows(ABUNDANCE, abundance, atomic_data.elements.len())?;
        check_columns(ABUNDANCE, abundance, density.len())?;
        if let Some(x) = abundance.iter().find(|x| **x < 0.0) {
            return Err(RadTransError::Config(format!(
                "abundances must be non-negative, got {x}"
            )));
        }

        let mut number_density = Array2::zeros(abundance.raw_dim());
        for ((element, mut row), fractions) in atomic_data
            .elements
            .iter()
            .zip(number_density.rows_mut())
            .zip(abundance.rows())
        {
            Zip::from(&mut row)
                .and(&fractions)
                .and(density)
                .for_each(|n, x, rho| *n = rho * x / element.mass);
        }
        Ok(single_output(NUMBER_DENSITY, number_density))
    }
}
