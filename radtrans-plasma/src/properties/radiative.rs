//! Line opacities, mean intensities and macro-atom transition probabilities.

use super::{check_columns, single_output};
use ndarray::{Array1, Array2, Zip};
use radtrans_core::atomic::{AtomicData, MacroAtomData, TransitionType};
use radtrans_core::constants::{planck_nu, SOBOLEV_COEFFICIENT};
use radtrans_core::errors::RadTransResult;
use radtrans_core::plasma::variables::{
    BETA_SOBOLEV, DILUTION_FACTOR, J_BLUES, J_BLUES_ESTIMATOR, LEVEL_NUMBER_DENSITY,
    STIMULATED_EMISSION_FACTOR, TAU_SOBOLEV, TIME_EXPLOSION, TRANSITION_PROBABILITIES, T_RAD,
};
use radtrans_core::plasma::{check_rows, PlasmaOutputs, PlasmaProperty, PlasmaState};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// `1 - (g_l n_u) / (g_u n_l)` for every line.
///
/// Lines with an empty lower level are given a factor of zero.
#[derive(Debug, Clone, Default)]
pub struct StimulatedEmissionFactor;

impl PlasmaProperty for StimulatedEmissionFactor {
    fn inputs(&self) -> Vec<String> {
        vec![LEVEL_NUMBER_DENSITY.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![STIMULATED_EMISSION_FACTOR.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let populations = state.get_table(LEVEL_NUMBER_DENSITY)?;
        check_rows(LEVEL_NUMBER_DENSITY, populations, atomic_data.n_levels())?;

        let mut factor = Array2::zeros((atomic_data.n_lines(), populations.ncols()));
        for (line, mut row) in atomic_data.lines.iter().zip(factor.rows_mut()) {
            let g_lower = atomic_data.levels[line.lower_level_index].g;
            let g_upper = atomic_data.levels[line.upper_level_index].g;
            Zip::from(&mut row)
                .and(&populations.row(line.lower_level_index))
                .and(&populations.row(line.upper_level_index))
                .for_each(|f, n_lower, n_upper| {
                    *f = if *n_lower == 0.0 {
                        0.0
                    } else {
                        1.0 - (g_lower * n_upper) / (g_upper * n_lower)
                    };
                });
        }
        Ok(single_output(STIMULATED_EMISSION_FACTOR, factor))
    }
}

/// Sobolev optical depth `pi e^2 / (m_e c) f_lu lambda t_exp n_l` corrected
/// for stimulated emission.
#[derive(Debug, Clone, Default)]
pub struct TauSobolev;

impl PlasmaProperty for TauSobolev {
    fn inputs(&self) -> Vec<String> {
        vec![
            LEVEL_NUMBER_DENSITY.to_string(),
            STIMULATED_EMISSION_FACTOR.to_string(),
            TIME_EXPLOSION.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![TAU_SOBOLEV.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let populations = state.get_table(LEVEL_NUMBER_DENSITY)?;
        let stimulated_emission = state.get_table(STIMULATED_EMISSION_FACTOR)?;
        let time_explosion = state.get_scalar(TIME_EXPLOSION)?;
        check_rows(LEVEL_NUMBER_DENSITY, populations, atomic_data.n_levels())?;
        check_rows(STIMULATED_EMISSION_FACTOR, stimulated_emission, atomic_data.n_lines())?;

        let mut tau = Array2::zeros(stimulated_emission.raw_dim());
        for ((line, mut row), stimulated) in atomic_data
            .lines
            .iter()
            .zip(tau.rows_mut())
            .zip(stimulated_emission.rows())
        {
            let prefactor = SOBOLEV_COEFFICIENT * line.f_lu * line.wavelength * time_explosion;
            Zip::from(&mut row)
                .and(&populations.row(line.lower_level_index))
                .and(&stimulated)
                .for_each(|tau, n_lower, stim| *tau = prefactor * n_lower * stim);
        }
        Ok(single_output(TAU_SOBOLEV, tau))
    }
}

/// Probability `(1 - e^-tau) / tau` that a photon escapes the resonance region.
pub fn escape_probability(tau: f64) -> f64 {
    if tau.abs() < 1e-4 {
        1.0 - 0.5 * tau + tau * tau / 6.0
    } else if tau > 1e3 {
        1.0 / tau
    } else {
        -(-tau).exp_m1() / tau
    }
}

#[derive(Debug, Clone, Default)]
pub struct BetaSobolev;

impl PlasmaProperty for BetaSobolev {
    fn inputs(&self) -> Vec<String> {
        vec![TAU_SOBOLEV.to_string()]
    }

    fn outputs(&self) -> Vec<String> {
        vec![BETA_SOBOLEV.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let tau = state.get_table(TAU_SOBOLEV)?;
        Ok(single_output(BETA_SOBOLEV, tau.mapv(escape_probability)))
    }
}

/// Source of the mean intensity at the blue wing of each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JBluesMode {
    /// `B_nu(T_rad)`
    Lte,
    /// `W B_nu(T_rad)`
    #[default]
    DiluteBlackbody,
    /// The Monte Carlo `j_blue` estimator of the previous iteration, falling
    /// back to the diluted blackbody before any estimate exists
    Detailed,
}

#[derive(Debug, Clone, Default)]
pub struct JBlues {
    pub mode: JBluesMode,
}

impl JBlues {
    pub fn new(mode: JBluesMode) -> Self {
        Self { mode }
    }

    fn blackbody(atomic_data: &AtomicData, t_rad: &Array1<f64>, w: Option<&Array1<f64>>) -> Array2<f64> {
        let mut j_blues = Array2::zeros((atomic_data.n_lines(), t_rad.len()));
        for (line, mut row) in atomic_data.lines.iter().zip(j_blues.rows_mut()) {
            row.assign(&t_rad.mapv(|t| planck_nu(line.nu, t)));
            if let Some(w) = w {
                row *= w;
            }
        }
        j_blues
    }
}

impl PlasmaProperty for JBlues {
    fn inputs(&self) -> Vec<String> {
        match self.mode {
            JBluesMode::Lte => vec![T_RAD.to_string()],
            JBluesMode::DiluteBlackbody => vec![T_RAD.to_string(), DILUTION_FACTOR.to_string()],
            JBluesMode::Detailed => vec![
                T_RAD.to_string(),
                DILUTION_FACTOR.to_string(),
                J_BLUES_ESTIMATOR.to_string(),
            ],
        }
    }

    fn outputs(&self) -> Vec<String> {
        vec![J_BLUES.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let t_rad = state.get_shells(T_RAD)?;
        let j_blues = match self.mode {
            JBluesMode::Lte => Self::blackbody(atomic_data, t_rad, None),
            JBluesMode::DiluteBlackbody => {
                let w = state.get_shells(DILUTION_FACTOR)?;
                Self::blackbody(atomic_data, t_rad, Some(w))
            }
            JBluesMode::Detailed => {
                let estimate = state.get_table(J_BLUES_ESTIMATOR)?;
                if estimate.is_empty() || estimate.iter().all(|j| *j == 0.0) {
                    debug!("No j_blue estimate yet, using the diluted blackbody");
                    let w = state.get_shells(DILUTION_FACTOR)?;
                    Self::blackbody(atomic_data, t_rad, Some(w))
                } else {
                    check_rows(J_BLUES_ESTIMATOR, estimate, atomic_data.n_lines())?;
                    check_columns(J_BLUES_ESTIMATOR, estimate, t_rad.len())?;
                    estimate.clone()
                }
            }
        };
        Ok(single_output(J_BLUES, j_blues))
    }
}

/// Macro-atom transition probabilities, normalised within the block of
/// transitions leaving each level.
///
/// Every transition rate is weighted by the escape probability of its line.
/// Internal up-jumps are additionally driven by the mean intensity in the
/// line and corrected for stimulated emission. Blocks whose rates all vanish
/// are left unnormalised.
#[derive(Debug, Clone, Default)]
pub struct TransitionProbabilities {
    /// Use the emission-only transition set
    pub downbranch: bool,
}

impl TransitionProbabilities {
    pub fn new(downbranch: bool) -> Self {
        Self { downbranch }
    }

    fn transitions<'a>(&self, atomic_data: &'a AtomicData) -> &'a MacroAtomData {
        if self.downbranch {
            &atomic_data.downbranch
        } else {
            &atomic_data.macro_atom
        }
    }
}

impl PlasmaProperty for TransitionProbabilities {
    fn inputs(&self) -> Vec<String> {
        vec![
            BETA_SOBOLEV.to_string(),
            J_BLUES.to_string(),
            STIMULATED_EMISSION_FACTOR.to_string(),
        ]
    }

    fn outputs(&self) -> Vec<String> {
        vec![TRANSITION_PROBABILITIES.to_string()]
    }

    fn calculate(&self, state: &PlasmaState) -> RadTransResult<PlasmaOutputs> {
        let atomic_data = state.atomic_data();
        let beta_sobolev = state.get_table(BETA_SOBOLEV)?;
        let j_blues = state.get_table(J_BLUES)?;
        let stimulated_emission = state.get_table(STIMULATED_EMISSION_FACTOR)?;
        check_rows(BETA_SOBOLEV, beta_sobolev, atomic_data.n_lines())?;
        check_rows(J_BLUES, j_blues, atomic_data.n_lines())?;
        check_rows(STIMULATED_EMISSION_FACTOR, stimulated_emission, atomic_data.n_lines())?;
        check_columns(J_BLUES, j_blues, beta_sobolev.ncols())?;

        let data = self.transitions(atomic_data);
        let mut probabilities = Array2::zeros((data.len(), beta_sobolev.ncols()));
        for (transition, mut row) in data.transitions.iter().zip(probabilities.rows_mut()) {
            let line = transition.line_index;
            row.assign(&(&beta_sobolev.row(line) * transition.coefficient));
            if transition.transition_type == TransitionType::InternalUp {
                row *= &stimulated_emission.row(line);
                row *= &j_blues.row(line);
            }
        }

        for level in 0..atomic_data.n_levels() {
            let block = data.block(level);
            if block.is_empty() {
                continue;
            }
            for mut column in probabilities.columns_mut() {
                let mut block_values = column.slice_mut(ndarray::s![block.clone()]);
                let norm = block_values.sum();
                if norm != 0.0 {
                    block_values /= norm;
                }
            }
        }
        Ok(single_output(TRANSITION_PROBABILITIES, probabilities))
    }
}
