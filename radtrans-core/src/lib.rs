//! Core building blocks of radtrans.
//!
//! Physical constants, unit-aware quantities, atomic data, the shell
//! geometry of the ejecta, the plasma property graph and the Monte Carlo
//! transport. Concrete plasma properties live in `radtrans-plasma`.

pub mod atomic;
pub mod composition;
pub mod constants;
pub mod geometry;
pub mod plasma;
pub mod radiation_field;
pub mod spectrum;
pub mod testing;
pub mod transport;
pub mod units;
pub mod utils;

pub mod errors;
