//! Physical dimensions for quantity validation.
//!
//! Dimensions are integer exponents of the CGS base quantities mass, length,
//! time and temperature. Derived dimensions (velocity, luminosity, density)
//! are combinations of these.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};

/// Represents the physical dimension of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Dimension {
    /// Mass exponent (M)
    pub mass: i8,
    /// Length exponent (L)
    pub length: i8,
    /// Time exponent (T)
    pub time: i8,
    /// Temperature exponent (Θ)
    pub temperature: i8,
}

impl Dimension {
    #[must_use]
    pub const fn new(mass: i8, length: i8, time: i8, temperature: i8) -> Self {
        Self {
            mass,
            length,
            time,
            temperature,
        }
    }

    pub const DIMENSIONLESS: Self = Self::new(0, 0, 0, 0);
    pub const MASS: Self = Self::new(1, 0, 0, 0);
    pub const LENGTH: Self = Self::new(0, 1, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0);
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 1);
    pub const FREQUENCY: Self = Self::new(0, 0, -1, 0);
    pub const VELOCITY: Self = Self::new(0, 1, -1, 0);
    pub const DENSITY: Self = Self::new(1, -3, 0, 0);
    pub const ENERGY: Self = Self::new(1, 2, -2, 0);
    /// erg / s
    pub const POWER: Self = Self::new(1, 2, -3, 0);

    /// Returns true if this dimension is dimensionless.
    #[must_use]
    pub const fn is_dimensionless(&self) -> bool {
        self.mass == 0 && self.length == 0 && self.time == 0 && self.temperature == 0
    }

    /// Raises the dimension to an integer power.
    #[must_use]
    pub fn pow(self, exp: i8) -> Self {
        Self::new(
            self.mass * exp,
            self.length * exp,
            self.time * exp,
            self.temperature * exp,
        )
    }
}

/// Multiplying quantities adds their dimension exponents.
impl Add for Dimension {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(
            self.mass + rhs.mass,
            self.length + rhs.length,
            self.time + rhs.time,
            self.temperature + rhs.temperature,
        )
    }
}

/// Dividing quantities subtracts their dimension exponents.
impl Sub for Dimension {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for Dimension {
    type Output = Self;

    fn neg(self) -> Self {
        self.pow(-1)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dimensionless() {
            return write!(f, "dimensionless");
        }
        let parts: Vec<String> = [
            ("M", self.mass),
            ("L", self.length),
            ("T", self.time),
            ("Θ", self.temperature),
        ]
        .iter()
        .filter(|(_, exp)| *exp != 0)
        .map(|(symbol, exp)| {
            if *exp == 1 {
                symbol.to_string()
            } else {
                format!("{symbol}^{exp}")
            }
        })
        .collect();
        write!(f, "{}", parts.join("·"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_is_length_over_time() {
        assert_eq!(Dimension::LENGTH - Dimension::TIME, Dimension::VELOCITY);
    }

    #[test]
    fn test_power_is_energy_over_time() {
        assert_eq!(Dimension::ENERGY - Dimension::TIME, Dimension::POWER);
    }

    #[test]
    fn test_display() {
        assert_eq!(Dimension::DENSITY.to_string(), "M·L^-3");
        assert_eq!(Dimension::DIMENSIONLESS.to_string(), "dimensionless");
    }
}
