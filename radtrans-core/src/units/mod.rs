//! Physical quantities written as `"<value> <unit>"` strings.
//!
//! Configuration files describe every dimensional input with an explicit unit,
//! e.g. `"13 day"`, `"11000 km/s"` or `"1e-14 g/cm^3"`. [`Quantity`] parses these
//! into CGS values and carries the [`Dimension`] so that callers can reject
//! inputs of the wrong kind.
//!
//! Luminosities may also be given on a logarithmic solar scale with the
//! special unit `log_lsun` (`"9.44 log_lsun"` is `10^9.44 L_sun`).

pub mod dimension;
pub mod parser;
pub mod registry;

pub use dimension::Dimension;
pub use parser::ParsedUnit;

use crate::constants::{C, H, L_SUN};
use crate::errors::{RadTransError, RadTransResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const LOG_LSUN: &str = "log_lsun";

/// A value converted to CGS together with its dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Quantity {
    value: f64,
    dimension: Dimension,
    source: String,
}

impl Quantity {
    /// Creates a quantity directly from a CGS value.
    pub fn from_cgs(value: f64, dimension: Dimension) -> Self {
        Self {
            value,
            dimension,
            source: format!("{value} [{dimension}]"),
        }
    }

    /// Parses `"<number> <unit expression>"`.
    ///
    /// A bare number is treated as dimensionless.
    pub fn parse(input: &str) -> RadTransResult<Self> {
        let trimmed = input.trim();
        let (number, unit) = match trimmed.find(char::is_whitespace) {
            Some(idx) => (&trimmed[..idx], trimmed[idx..].trim()),
            None => (trimmed, ""),
        };
        let magnitude: f64 = number.parse().map_err(|_| RadTransError::QuantityParse {
            input: input.to_string(),
            reason: format!("'{number}' is not a number"),
        })?;

        if unit == LOG_LSUN {
            return Ok(Self {
                value: 10f64.powf(magnitude) * L_SUN,
                dimension: Dimension::POWER,
                source: trimmed.to_string(),
            });
        }

        let to_parse_error = |reason: String| RadTransError::QuantityParse {
            input: input.to_string(),
            reason,
        };
        let parsed = ParsedUnit::parse(unit).map_err(to_parse_error)?;
        let dimension = parsed.dimension().map_err(to_parse_error)?;
        let factor = parsed.to_cgs_factor().map_err(to_parse_error)?;

        Ok(Self {
            value: magnitude * factor,
            dimension,
            source: trimmed.to_string(),
        })
    }

    /// Value in CGS units, without a dimension check.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Value in CGS units, failing if the dimension does not match.
    pub fn to_cgs(&self, expected: Dimension) -> RadTransResult<f64> {
        if self.dimension != expected {
            return Err(RadTransError::WrongDimension {
                input: self.source.clone(),
                expected: expected.to_string(),
                found: self.dimension.to_string(),
            });
        }
        Ok(self.value)
    }

    /// Converts a spectral quantity (frequency, wavelength or photon energy) to Hz.
    pub fn to_frequency(&self) -> RadTransResult<f64> {
        match self.dimension {
            d if d == Dimension::FREQUENCY => Ok(self.value),
            d if d == Dimension::LENGTH => Ok(wavelength_to_frequency(self.value)),
            d if d == Dimension::ENERGY => Ok(self.value / H),
            _ => Err(RadTransError::WrongDimension {
                input: self.source.clone(),
                expected: "frequency, wavelength or energy".to_string(),
                found: self.dimension.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Quantity {
    type Error = RadTransError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Quantity> for String {
    fn from(value: Quantity) -> Self {
        value.source
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

/// Wavelength [cm] to frequency [Hz].
pub fn wavelength_to_frequency(wavelength: f64) -> f64 {
    C / wavelength
}

/// Frequency [Hz] to wavelength [cm].
pub fn frequency_to_wavelength(frequency: f64) -> f64 {
    C / frequency
}
