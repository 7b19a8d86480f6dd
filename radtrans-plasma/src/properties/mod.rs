mod excitation;
mod general;
mod helium;
pub mod ionization;
mod level_populations;
mod nlte;
pub mod radiative;

pub use excitation::{LevelBoltzmannFactorDiluteLte, LevelBoltzmannFactorLte, PartitionFunction};
pub use general::{BetaElectron, BetaRadiation, ElectronTemperature, NumberDensity};
pub use helium::{HeliumNlte, LevelNumberDensityHeNlte};
pub use ionization::{
    IonNumberDensity, IonNumberDensitySolver, PhiSahaLte, PhiSahaNebular,
    RadiationFieldCorrection,
};
pub use level_populations::LevelNumberDensity;
pub use nlte::LevelNumberDensityNlte;
pub use radiative::{
    BetaSobolev, JBlues, JBluesMode, StimulatedEmissionFactor, TauSobolev,
    TransitionProbabilities,
};

use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::plasma::{PlasmaOutputs, PlasmaValue};
use ndarray::Array2;

/// Wraps a single named value as the result of a calculation.
pub(crate) fn single_output(name: &str, value: impl Into<PlasmaValue>) -> PlasmaOutputs {
    PlasmaOutputs::from([(name.to_string(), value.into())])
}

/// Checks that a table has one column per shell.
pub(crate) fn check_columns(name: &str, table: &Array2<f64>, no_of_shells: usize) -> RadTransResult<()> {
    if table.ncols() != no_of_shells {
        return Err(RadTransError::PlasmaShape {
            name: name.to_string(),
            expected: format!("{no_of_shells} columns"),
            found: format!("{} columns", table.ncols()),
        });
    }
    Ok(())
}
