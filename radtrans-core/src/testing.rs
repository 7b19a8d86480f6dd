//! Small bundled atomic data set for tests and demonstrations.
//!
//! Hydrogen with three levels, He I with five and He II with three. Enough to
//! exercise ionization, excitation, the helium treatments and the macro atom
//! without reading external files.

use crate::atomic::{AtomicData, AtomicDataFile};
use crate::errors::RadTransResult;

pub const H_HE_ATOMIC_DATA: &str = include_str!("../data/h_he_atomic_data.json");

pub fn small_atomic_file() -> AtomicDataFile {
    // The bundled document is checked by the tests of this module
    serde_json::from_str(H_HE_ATOMIC_DATA).unwrap_or_default()
}

pub fn small_atomic_data() -> RadTransResult<AtomicData> {
    let file: AtomicDataFile = serde_json::from_str(H_HE_ATOMIC_DATA)?;
    AtomicData::from_file_data(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_data_parses() {
        let file: AtomicDataFile = serde_json::from_str(H_HE_ATOMIC_DATA).unwrap();
        assert_eq!(file, small_atomic_file());
        let data = small_atomic_data().unwrap();
        assert_eq!(data.n_lines(), 9);
        assert_eq!(data.n_levels(), 3 + 1 + 5 + 3 + 1);
        assert_eq!(data.collisions.len(), 3);
    }
}
