//! Plasma quantities needed by the transport, flattened into plain arrays.

use crate::atomic::AtomicData;
use crate::errors::{RadTransError, RadTransResult};
use ndarray::{Array1, Array2};

/// Macro-atom transition tables, one row per transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacroAtomState {
    /// Probabilities normalised within each block, transitions x shells
    pub transition_probabilities: Array2<f64>,
    /// `-1` emission, `0` internal down, `1` internal up
    pub transition_type: Vec<i8>,
    pub destination_level_id: Vec<usize>,
    pub transition_line_id: Vec<usize>,
    /// Start of the block of each level; the last entry closes the final block
    pub block_references: Vec<usize>,
    /// Upper level of every line, the level activated by a line absorption
    pub line2macro_level_upper: Vec<usize>,
}

impl MacroAtomState {
    /// Builds the tables from atomic data and per-shell probabilities.
    ///
    /// `downbranch` selects the emission-only transition set.
    pub fn from_atomic_data(
        atomic_data: &AtomicData,
        transition_probabilities: Array2<f64>,
        downbranch: bool,
    ) -> RadTransResult<Self> {
        let data = if downbranch {
            &atomic_data.downbranch
        } else {
            &atomic_data.macro_atom
        };
        if transition_probabilities.nrows() != data.len() {
            return Err(RadTransError::PlasmaShape {
                name: "transition_probabilities".to_string(),
                expected: format!("{} rows", data.len()),
                found: format!("{} rows", transition_probabilities.nrows()),
            });
        }
        Ok(Self {
            transition_probabilities,
            transition_type: data
                .transitions
                .iter()
                .map(|t| t.transition_type.code())
                .collect(),
            destination_level_id: data
                .transitions
                .iter()
                .map(|t| t.destination_level)
                .collect(),
            transition_line_id: data.transitions.iter().map(|t| t.line_index).collect(),
            block_references: data.block_references.clone(),
            line2macro_level_upper: atomic_data
                .lines
                .iter()
                .map(|line| line.upper_level_index)
                .collect(),
        })
    }
}

/// Opacities seen by packets in every shell.
#[derive(Debug, Clone, PartialEq)]
pub struct OpacityState {
    /// Line frequencies in descending order [Hz]
    pub line_list_nu: Vec<f64>,
    /// Sobolev optical depths, lines x shells
    pub tau_sobolev: Array2<f64>,
    /// Free electron density per shell [1 / cm^3]
    pub electron_density: Array1<f64>,
    /// Only needed for the downbranch and macro-atom line interaction
    pub macro_atom: Option<MacroAtomState>,
}

impl OpacityState {
    pub fn new(
        line_list_nu: Vec<f64>,
        tau_sobolev: Array2<f64>,
        electron_density: Array1<f64>,
        macro_atom: Option<MacroAtomState>,
    ) -> RadTransResult<Self> {
        if tau_sobolev.nrows() != line_list_nu.len() {
            return Err(RadTransError::PlasmaShape {
                name: "tau_sobolev".to_string(),
                expected: format!("{} rows", line_list_nu.len()),
                found: format!("{} rows", tau_sobolev.nrows()),
            });
        }
        if tau_sobolev.ncols() != electron_density.len() {
            return Err(RadTransError::PlasmaShape {
                name: "tau_sobolev".to_string(),
                expected: format!("{} columns", electron_density.len()),
                found: format!("{} columns", tau_sobolev.ncols()),
            });
        }
        if line_list_nu.windows(2).any(|pair| pair[1] > pair[0]) {
            return Err(RadTransError::MonteCarlo(
                "line list must be sorted by descending frequency".to_string(),
            ));
        }
        Ok(Self {
            line_list_nu,
            tau_sobolev,
            electron_density,
            macro_atom,
        })
    }

    pub fn no_of_lines(&self) -> usize {
        self.line_list_nu.len()
    }

    pub fn no_of_shells(&self) -> usize {
        self.electron_density.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::small_atomic_data;
    use ndarray::array;

    #[test]
    fn test_shape_checks() {
        assert!(OpacityState::new(vec![2.0, 1.0], Array2::zeros((2, 3)), Array1::zeros(3), None).is_ok());
        assert!(OpacityState::new(vec![2.0, 1.0], Array2::zeros((1, 3)), Array1::zeros(3), None).is_err());
        assert!(OpacityState::new(vec![2.0, 1.0], Array2::zeros((2, 2)), Array1::zeros(3), None).is_err());
        assert!(OpacityState::new(vec![1.0, 2.0], Array2::zeros((2, 1)), array![1.0], None).is_err());
    }

    #[test]
    fn test_macro_atom_tables() {
        let atomic = small_atomic_data().unwrap();
        let n = atomic.macro_atom.len();
        let state =
            MacroAtomState::from_atomic_data(&atomic, Array2::zeros((n, 2)), false).unwrap();
        assert_eq!(state.transition_type.len(), n);
        assert_eq!(state.block_references.len(), atomic.n_levels() + 1);
        assert_eq!(state.line2macro_level_upper.len(), atomic.n_lines());
        assert!(MacroAtomState::from_atomic_data(&atomic, Array2::zeros((n + 1, 2)), false).is_err());
    }
}
