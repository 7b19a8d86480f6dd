//! Unit registry with astrophysical units and CGS conversion factors.
//!
//! All conversion factors are the multiplier from the registered unit TO the
//! CGS base unit. For example `km` has factor 1e5 and `day` has 86400.

use super::dimension::Dimension;
use crate::constants::{ANGSTROM, DAY, EV, KM, L_SUN};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Information about a known unit.
#[derive(Debug, Clone)]
pub struct UnitInfo {
    pub dimension: Dimension,
    pub to_cgs_factor: f64,
}

/// SI prefixes accepted in front of metric base units.
static PREFIXES: &[(&str, f64)] = &[
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("n", 1e-9),
];

/// Base units which may carry an SI prefix.
static PREFIXABLE: &[&str] = &["m", "g", "s", "Hz", "eV", "W", "J"];

pub struct UnitRegistry {
    units: HashMap<&'static str, UnitInfo>,
}

impl UnitRegistry {
    fn new() -> Self {
        let mut units = HashMap::new();
        let mut add = |name: &'static str, dimension: Dimension, factor: f64| {
            units.insert(
                name,
                UnitInfo {
                    dimension,
                    to_cgs_factor: factor,
                },
            );
        };

        add("g", Dimension::MASS, 1.0);
        add("m", Dimension::LENGTH, 100.0);
        add("s", Dimension::TIME, 1.0);
        add("K", Dimension::TEMPERATURE, 1.0);

        add("cm", Dimension::LENGTH, 1.0);
        add("km", Dimension::LENGTH, KM);
        add("angstrom", Dimension::LENGTH, ANGSTROM);
        add("AA", Dimension::LENGTH, ANGSTROM);
        add("Angstrom", Dimension::LENGTH, ANGSTROM);

        add("day", Dimension::TIME, DAY);
        add("d", Dimension::TIME, DAY);
        add("h", Dimension::TIME, 3600.0);
        add("min", Dimension::TIME, 60.0);
        add("yr", Dimension::TIME, 365.25 * DAY);

        add("Hz", Dimension::FREQUENCY, 1.0);
        add("erg", Dimension::ENERGY, 1.0);
        add("J", Dimension::ENERGY, 1e7);
        add("eV", Dimension::ENERGY, EV);
        add("W", Dimension::POWER, 1e7);
        add("L_sun", Dimension::POWER, L_SUN);
        add("lsun", Dimension::POWER, L_SUN);
        add("Msun", Dimension::MASS, 1.988_409_870_7e33);

        Self { units }
    }

    /// Look up a unit symbol, resolving SI prefixes on metric units.
    pub fn lookup(&self, symbol: &str) -> Option<UnitInfo> {
        if let Some(info) = self.units.get(symbol) {
            return Some(info.clone());
        }
        for (prefix, factor) in PREFIXES {
            if let Some(base) = symbol.strip_prefix(prefix) {
                if PREFIXABLE.contains(&base) {
                    if let Some(info) = self.units.get(base) {
                        return Some(UnitInfo {
                            dimension: info.dimension,
                            to_cgs_factor: info.to_cgs_factor * factor,
                        });
                    }
                }
            }
        }
        None
    }
}

pub static UNIT_REGISTRY: LazyLock<UnitRegistry> = LazyLock::new(UnitRegistry::new);

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn test_lookup_prefixed() {
        let info = UNIT_REGISTRY.lookup("kHz").unwrap();
        assert_eq!(info.dimension, Dimension::FREQUENCY);
        assert!(is_close!(info.to_cgs_factor, 1e3));

        let info = UNIT_REGISTRY.lookup("mm").unwrap();
        assert!(is_close!(info.to_cgs_factor, 0.1));
    }

    #[test]
    fn test_unknown() {
        assert!(UNIT_REGISTRY.lookup("furlong").is_none());
        // Prefixes only apply to metric units
        assert!(UNIT_REGISTRY.lookup("kday").is_none());
    }
}
