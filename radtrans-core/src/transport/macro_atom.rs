//! Macro-atom de-excitation cascade.

use super::opacity::MacroAtomState;
use crate::errors::{RadTransError, RadTransResult};
use rand::Rng;

/// Transition type code that ends the cascade with a line emission
const EMISSION: i8 = -1;

/// Runs the macro atom activated in `activation_level_id` until it emits.
///
/// Each jump picks a transition from the block of the current level with the
/// probabilities of `shell`. Returns the emitting line and the type of the
/// final transition.
pub fn macro_atom<R: Rng + ?Sized>(
    activation_level_id: usize,
    shell: usize,
    state: &MacroAtomState,
    max_jumps: usize,
    rng: &mut R,
) -> RadTransResult<(usize, i8)> {
    let mut level = activation_level_id;

    for _ in 0..max_jumps {
        let block_start = state.block_references[level];
        let block_end = state.block_references[level + 1];
        let probability_event: f64 = rng.gen();

        let mut probability = 0.0;
        let mut chosen = None;
        for transition_id in block_start..block_end {
            probability += state.transition_probabilities[[transition_id, shell]];
            if probability > probability_event {
                chosen = Some(transition_id);
                break;
            }
        }

        let transition_id = chosen.ok_or_else(|| {
            RadTransError::MonteCarlo(format!(
                "macro atom ran out of the block of level {level} in shell {shell} \
                 (cumulative probability {probability})"
            ))
        })?;

        let transition_type = state.transition_type[transition_id];
        if transition_type == EMISSION {
            return Ok((state.transition_line_id[transition_id], transition_type));
        }
        level = state.destination_level_id[transition_id];
    }

    Err(RadTransError::MonteCarlo(format!(
        "macro atom activated in level {activation_level_id} did not emit after {max_jumps} jumps"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Three levels, level 2 jumps internally to level 1 which emits in line 0
    fn cascade() -> MacroAtomState {
        MacroAtomState {
            transition_probabilities: array![[1.0], [0.0], [1.0]],
            transition_type: vec![-1, -1, 0],
            destination_level_id: vec![0, 0, 1],
            transition_line_id: vec![0, 1, 1],
            block_references: vec![0, 0, 1, 3],
            line2macro_level_upper: vec![1, 2],
        }
    }

    #[test]
    fn test_internal_jump_then_emission() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (line, kind) = macro_atom(2, 0, &cascade(), 100, &mut rng).unwrap();
        assert_eq!(line, 0);
        assert_eq!(kind, EMISSION);
    }

    #[test]
    fn test_direct_emission() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (line, _) = macro_atom(1, 0, &cascade(), 100, &mut rng).unwrap();
        assert_eq!(line, 0);
    }

    #[test]
    fn test_empty_block_fails() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(macro_atom(0, 0, &cascade(), 100, &mut rng).is_err());
    }

    #[test]
    fn test_runaway_is_capped() {
        let mut state = cascade();
        // Levels 1 and 2 jump into each other forever
        state.transition_probabilities = array![[1.0], [0.0], [1.0]];
        state.transition_type = vec![0, -1, 0];
        state.destination_level_id = vec![2, 0, 1];
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(matches!(
            macro_atom(2, 0, &state, 50, &mut rng),
            Err(RadTransError::MonteCarlo(_))
        ));
    }

    #[test]
    fn test_choice_follows_probabilities() {
        let state = MacroAtomState {
            transition_probabilities: array![[0.25], [0.75]],
            transition_type: vec![-1, -1],
            destination_level_id: vec![0, 0],
            transition_line_id: vec![0, 1],
            block_references: vec![0, 0, 2],
            line2macro_level_upper: vec![1, 1],
        };
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let n = 20_000;
        let first = (0..n)
            .filter(|_| macro_atom(1, 0, &state, 10, &mut rng).unwrap().0 == 0)
            .count();
        let fraction = first as f64 / n as f64;
        assert!((fraction - 0.25).abs() < 0.02, "fraction {fraction}");
    }
}
