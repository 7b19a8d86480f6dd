//! Simulation configuration.
//!
//! A configuration is read from YAML or TOML, chosen by the file extension.
//! Every dimensional value is written with its unit and parsed into a
//! [`Quantity`]; dimensions are checked when the simulation is assembled.
//!
//! ```yaml
//! supernova:
//!   luminosity_requested: 9.44 log_lsun
//!   time_explosion: 13 day
//! model:
//!   velocity: {start: 11000 km/s, stop: 20000 km/s, num: 20}
//!   density: {type: branch85_w7}
//!   abundances: {H: 0.7, He: 0.3}
//! spectrum: {start: 500 angstrom, stop: 20000 angstrom, num: 10000}
//! ```

use radtrans_core::composition::DensityProfile;
use radtrans_core::constants::ANGSTROM;
use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::units::{Dimension, Quantity};
use radtrans_plasma::PlasmaSettings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_SEED: u64 = 23_111_963;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub supernova: SupernovaConfig,
    /// Atomic data JSON, the bundled H/He set when absent
    #[serde(default)]
    pub atom_data: Option<PathBuf>,
    pub model: ModelConfig,
    #[serde(default)]
    pub plasma: PlasmaConfig,
    #[serde(default)]
    pub montecarlo: MonteCarloConfig,
    #[serde(default)]
    pub spectrum: SpectrumConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupernovaConfig {
    /// Luminosity the inner boundary is tuned to reproduce
    /// unit: power
    pub luminosity_requested: Quantity,
    /// unit: time
    pub time_explosion: Quantity,
    /// Band in which `luminosity_requested` is measured, open when absent
    #[serde(default)]
    pub luminosity_wavelength_start: Option<Quantity>,
    #[serde(default)]
    pub luminosity_wavelength_end: Option<Quantity>,
}

impl SupernovaConfig {
    /// Frequency band `(nu_start, nu_end)` of the requested luminosity [Hz].
    pub fn luminosity_nu_range(&self) -> RadTransResult<(f64, f64)> {
        // The long wavelength limit sets the low frequency
        let nu_start = match &self.luminosity_wavelength_end {
            Some(q) => q.to_frequency()?,
            None => 0.0,
        };
        let nu_end = match &self.luminosity_wavelength_start {
            Some(q) => q.to_frequency()?,
            None => f64::INFINITY,
        };
        Ok((nu_start, nu_end))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityConfig {
    /// unit: velocity
    pub start: Quantity,
    /// unit: velocity
    pub stop: Quantity,
    /// Number of shells
    pub num: usize,
}

/// Density profile with units, see [`DensityProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DensityConfig {
    Uniform {
        value: Quantity,
        /// Defaults to the time of explosion
        #[serde(default)]
        time_0: Option<Quantity>,
    },
    PowerLaw {
        rho_0: Quantity,
        v_0: Quantity,
        exponent: f64,
        time_0: Quantity,
    },
    Exponential {
        rho_0: Quantity,
        v_0: Quantity,
        time_0: Quantity,
    },
    #[serde(rename = "branch85_w7")]
    Branch85W7,
}

impl DensityConfig {
    pub fn to_profile(&self, time_explosion: f64) -> RadTransResult<DensityProfile> {
        let profile = match self {
            DensityConfig::Uniform { value, time_0 } => DensityProfile::Uniform {
                rho: value.to_cgs(Dimension::DENSITY)?,
                time_0: match time_0 {
                    Some(t) => t.to_cgs(Dimension::TIME)?,
                    None => time_explosion,
                },
            },
            DensityConfig::PowerLaw {
                rho_0,
                v_0,
                exponent,
                time_0,
            } => DensityProfile::PowerLaw {
                rho_0: rho_0.to_cgs(Dimension::DENSITY)?,
                v_0: v_0.to_cgs(Dimension::VELOCITY)?,
                exponent: *exponent,
                time_0: time_0.to_cgs(Dimension::TIME)?,
            },
            DensityConfig::Exponential { rho_0, v_0, time_0 } => DensityProfile::Exponential {
                rho_0: rho_0.to_cgs(Dimension::DENSITY)?,
                v_0: v_0.to_cgs(Dimension::VELOCITY)?,
                time_0: time_0.to_cgs(Dimension::TIME)?,
            },
            DensityConfig::Branch85W7 => DensityProfile::Branch85W7,
        };
        Ok(profile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub velocity: VelocityConfig,
    pub density: DensityConfig,
    /// Mass fractions keyed by element symbol, uniform in all shells
    pub abundances: BTreeMap<String, f64>,
}

/// Plasma approximations and the starting radiation field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlasmaConfig {
    #[serde(flatten)]
    pub settings: PlasmaSettings,
    /// Derived from the requested luminosity when absent
    #[serde(default)]
    pub initial_t_inner: Option<Quantity>,
    /// 10000 K when absent
    #[serde(default)]
    pub initial_t_rad: Option<Quantity>,
}

/// Damping and threshold of one converging quantity.
///
/// Unset values fall back to the strategy-wide ones.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceParameter {
    pub damping_constant: Option<f64>,
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceStrategy {
    /// Weight of the new estimate, `new = old + damping (estimate - old)`
    pub damping_constant: f64,
    /// Largest relative change counted as converged
    pub threshold: f64,
    /// Fraction of shells that have to be converged
    pub fraction: f64,
    /// Consecutive converged iterations required before convergence is declared
    pub hold_iterations: usize,
    pub stop_if_converged: bool,
    pub t_inner: ConvergenceParameter,
    pub t_rad: ConvergenceParameter,
    pub w: ConvergenceParameter,
    /// Exponent of `L_emitted / L_requested` in the inner temperature update
    pub t_inner_update_exponent: f64,
    /// The inner temperature is only updated every `lock_t_inner_cycles` iterations
    pub lock_t_inner_cycles: usize,
}

impl Default for ConvergenceStrategy {
    fn default() -> Self {
        Self {
            damping_constant: 1.0,
            threshold: 0.05,
            fraction: 0.8,
            hold_iterations: 3,
            stop_if_converged: false,
            t_inner: ConvergenceParameter::default(),
            t_rad: ConvergenceParameter::default(),
            w: ConvergenceParameter::default(),
            t_inner_update_exponent: -0.5,
            lock_t_inner_cycles: 1,
        }
    }
}

impl ConvergenceStrategy {
    pub fn damping(&self, parameter: &ConvergenceParameter) -> f64 {
        parameter.damping_constant.unwrap_or(self.damping_constant)
    }

    pub fn threshold(&self, parameter: &ConvergenceParameter) -> f64 {
        parameter.threshold.unwrap_or(self.threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub seed: u64,
    /// Packets per iteration
    pub no_of_packets: usize,
    pub iterations: usize,
    /// Packets of the final iteration, `no_of_packets` when absent
    pub last_no_of_packets: Option<usize>,
    /// Virtual packets per interaction in the final iteration
    pub no_of_virtual_packets: usize,
    /// Worker threads, 0 lets rayon decide
    pub nthreads: usize,
    pub enable_full_relativity: bool,
    pub disable_electron_scattering: bool,
    pub disable_line_scattering: bool,
    /// Record the path of every packet of the final iteration
    pub tracking: bool,
    pub max_macro_atom_jumps: usize,
    /// Wavelength range of real packets that spawn virtual packets
    pub virtual_spawn_start: Option<Quantity>,
    pub virtual_spawn_end: Option<Quantity>,
    pub convergence_strategy: ConvergenceStrategy,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            no_of_packets: 40_000,
            iterations: 20,
            last_no_of_packets: None,
            no_of_virtual_packets: 0,
            nthreads: 0,
            enable_full_relativity: false,
            disable_electron_scattering: false,
            disable_line_scattering: false,
            tracking: false,
            max_macro_atom_jumps: 10_000,
            virtual_spawn_start: None,
            virtual_spawn_end: None,
            convergence_strategy: ConvergenceStrategy::default(),
        }
    }
}

impl MonteCarloConfig {
    pub fn last_no_of_packets(&self) -> usize {
        self.last_no_of_packets.unwrap_or(self.no_of_packets)
    }

    /// Divides every packet count by `factor`, keeping at least one packet.
    pub fn reduce_packets(&mut self, factor: f64) -> RadTransResult<()> {
        if !(factor >= 1.0) {
            return Err(RadTransError::Config(format!(
                "packet reduction factor must be at least 1, got {factor}"
            )));
        }
        let reduce = |n: usize| ((n as f64 / factor).round() as usize).max(1);
        self.no_of_packets = reduce(self.no_of_packets);
        self.last_no_of_packets = self.last_no_of_packets.map(reduce);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// unit: length
    pub start: Quantity,
    /// unit: length
    pub stop: Quantity,
    pub num: usize,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            start: Quantity::from_cgs(500.0 * ANGSTROM, Dimension::LENGTH),
            stop: Quantity::from_cgs(20_000.0 * ANGSTROM, Dimension::LENGTH),
            num: 10_000,
        }
    }
}

impl Configuration {
    /// Reads a `.yml`/`.yaml` or `.toml` file.
    pub fn from_path(path: impl AsRef<Path>) -> RadTransResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("yml") | Some("yaml") => Self::from_yaml_str(&text)?,
            Some("toml") => Self::from_toml_str(&text)?,
            _ => {
                return Err(RadTransError::Config(format!(
                    "unknown configuration format for {}",
                    path.display()
                )))
            }
        };
        debug!(path = %path.display(), "Read configuration");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> RadTransResult<Self> {
        let config: Self =
            serde_yaml::from_str(text).map_err(|e| RadTransError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> RadTransResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| RadTransError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Atomic data path resolved against the directory of the configuration file.
    pub fn atom_data_path(&self, config_dir: Option<&Path>) -> Option<PathBuf> {
        self.atom_data.as_ref().map(|p| match config_dir {
            Some(dir) if p.is_relative() => dir.join(p),
            _ => p.clone(),
        })
    }

    /// Checks dimensions and ranges that serde cannot express.
    pub fn validate(&self) -> RadTransResult<()> {
        let fail = |message: String| Err(RadTransError::Config(message));

        self.supernova.luminosity_requested.to_cgs(Dimension::POWER)?;
        if self.supernova.time_explosion.to_cgs(Dimension::TIME)? <= 0.0 {
            return fail("time_explosion must be positive".to_string());
        }
        let (nu_start, nu_end) = self.supernova.luminosity_nu_range()?;
        if nu_start >= nu_end {
            return fail("luminosity wavelength range is empty".to_string());
        }

        let velocity = &self.model.velocity;
        let v_start = velocity.start.to_cgs(Dimension::VELOCITY)?;
        let v_stop = velocity.stop.to_cgs(Dimension::VELOCITY)?;
        if v_start <= 0.0 || v_stop <= v_start {
            return fail(format!(
                "velocity range must satisfy 0 < start < stop, got {} to {}",
                velocity.start, velocity.stop
            ));
        }
        if velocity.num == 0 {
            return fail("model needs at least one shell".to_string());
        }
        if self.model.abundances.is_empty() {
            return fail("model needs at least one abundance".to_string());
        }

        if let Some(t) = &self.plasma.initial_t_inner {
            if t.to_cgs(Dimension::TEMPERATURE)? <= 0.0 {
                return fail("initial_t_inner must be positive".to_string());
            }
        }
        if let Some(t) = &self.plasma.initial_t_rad {
            if t.to_cgs(Dimension::TEMPERATURE)? <= 0.0 {
                return fail("initial_t_rad must be positive".to_string());
            }
        }

        let montecarlo = &self.montecarlo;
        if montecarlo.no_of_packets == 0 || montecarlo.last_no_of_packets() == 0 {
            return fail("number of packets must be positive".to_string());
        }
        if montecarlo.iterations == 0 {
            return fail("at least one iteration is required".to_string());
        }
        for q in [&montecarlo.virtual_spawn_start, &montecarlo.virtual_spawn_end]
            .into_iter()
            .flatten()
        {
            q.to_frequency()?;
        }

        let strategy = &montecarlo.convergence_strategy;
        for (name, parameter) in [
            ("t_inner", &strategy.t_inner),
            ("t_rad", &strategy.t_rad),
            ("w", &strategy.w),
        ] {
            let damping = strategy.damping(parameter);
            if !(0.0..=1.0).contains(&damping) {
                return fail(format!("damping constant of {name} must be in [0, 1], got {damping}"));
            }
            if strategy.threshold(parameter) <= 0.0 {
                return fail(format!("convergence threshold of {name} must be positive"));
            }
        }
        if !(strategy.fraction > 0.0 && strategy.fraction <= 1.0) {
            return fail(format!(
                "convergence fraction must be in (0, 1], got {}",
                strategy.fraction
            ));
        }
        if strategy.lock_t_inner_cycles == 0 {
            return fail("lock_t_inner_cycles must be at least 1".to_string());
        }

        let start = self.spectrum.start.to_cgs(Dimension::LENGTH)?;
        let stop = self.spectrum.stop.to_cgs(Dimension::LENGTH)?;
        if start <= 0.0 || stop <= start || self.spectrum.num == 0 {
            return fail("spectrum needs 0 < start < stop and at least one bin".to_string());
        }
        Ok(())
    }
}
