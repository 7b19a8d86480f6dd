//! One-dimensional Monte Carlo radiative transfer for supernova ejecta.
//!
//! The [`simulation::Simulation`] driver couples the Monte Carlo transport of
//! `radtrans-core` with the plasma solver of `radtrans-plasma`, iterating the
//! radiation field and inner boundary temperature towards convergence before
//! computing the final spectrum. Runs are described by a YAML or TOML
//! [`config::Configuration`].

pub mod config;
pub mod convergence;
pub mod reference;
pub mod simulation;

use radtrans_core::atomic::AtomicData;
use radtrans_core::errors::RadTransResult;
use radtrans_core::testing::small_atomic_data;
use std::path::Path;

pub use config::Configuration;
pub use simulation::{Simulation, SimulationResult};

/// Reads atomic data from `path`, or the bundled H/He set when no path is given.
pub fn load_atomic_data(path: Option<&Path>) -> RadTransResult<AtomicData> {
    match path {
        Some(path) => AtomicData::from_json_path(path),
        None => small_atomic_data(),
    }
}
