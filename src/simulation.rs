//! Iterative solution of the plasma state and the radiation field.
//!
//! Each iteration runs the Monte Carlo transport through the current plasma,
//! turns the estimators into a new radiation field and inner boundary
//! temperature, damps the change and updates the plasma. Once the iterations
//! are done (or convergence is reached and `stop_if_converged` is set) a final
//! iteration with `last_no_of_packets` and virtual packets produces the
//! spectrum.

use crate::config::Configuration;
use crate::convergence::{ConvergenceReport, ConvergenceSolver};
use ndarray::{Array1, Array2};
use radtrans_core::atomic::AtomicData;
use radtrans_core::composition::Composition;
use radtrans_core::errors::{RadTransError, RadTransResult};
use radtrans_core::geometry::{GeometryState, HomologousRadial1DMesh};
use radtrans_core::radiation_field::{
    t_inner_from_luminosity, DilutePlanckianRadiationField, DEFAULT_T_RADIATIVE,
};
use radtrans_core::spectrum::{
    calculate_emitted_luminosity, calculate_reabsorbed_luminosity, SpectrumSet, SpectrumSolver,
};
use radtrans_core::transport::tracker::RPacketTracker;
use radtrans_core::transport::{
    montecarlo_main_loop, time_of_simulation, BlackBodySimpleSource, MonteCarloConfiguration,
    TransportOutput, VirtualPacketConfiguration,
};
use radtrans_core::units::Dimension;
use radtrans_plasma::{Plasma, PlasmaInputs};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Offsets the transport streams from the packet source streams.
const TRANSPORT_SEED_OFFSET: u64 = 0x9E37_79B9_7F4A_7C15;

/// State and diagnostics of one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub no_of_packets: usize,
    /// [K]
    pub t_inner: f64,
    /// [K]
    pub t_rad: Array1<f64>,
    pub w: Array1<f64>,
    /// [1 / cm^3]
    pub electron_densities: Array1<f64>,
    /// Emitted luminosity in the requested band [erg / s]
    pub luminosity_emitted: f64,
    /// [erg / s]
    pub luminosity_reabsorbed: f64,
    /// Absent for the final iteration
    pub convergence: Option<ConvergenceReport>,
}

/// Final state, spectra and history of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub converged: bool,
    pub iterations_executed: usize,
    /// [K]
    pub t_inner: f64,
    /// [K]
    pub t_rad: Array1<f64>,
    pub w: Array1<f64>,
    /// [1 / cm^3]
    pub electron_densities: Array1<f64>,
    /// [erg / s]
    pub luminosity_requested: f64,
    /// [erg / s]
    pub luminosity_emitted: f64,
    /// [s]
    pub time_of_simulation: f64,
    pub spectrum: SpectrumSet,
    pub history: Vec<IterationRecord>,
    /// Packet paths of the final iteration when tracking is enabled
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trackers: Vec<RPacketTracker>,
}

impl SimulationResult {
    pub fn to_json_string(&self) -> RadTransResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> RadTransResult<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

/// Output of a transport run together with the luminosities derived from it.
struct IterationOutput {
    transport: TransportOutput,
    time_of_simulation: f64,
    luminosity_emitted: f64,
    luminosity_reabsorbed: f64,
}

pub struct Simulation {
    config: Configuration,
    atomic_data: Arc<AtomicData>,
    geometry: GeometryState,
    volume: Array1<f64>,
    plasma: Plasma,
    t_inner: f64,
    luminosity_requested: f64,
    luminosity_nu_range: (f64, f64),
    source: BlackBodySimpleSource,
    spectrum_solver: SpectrumSolver,
    convergence: ConvergenceSolver,
    iterations_executed: usize,
    converged: bool,
    history: Vec<IterationRecord>,
}

impl Simulation {
    /// Assembles the model, the plasma and the packet source of a configuration.
    ///
    /// The atomic data is restricted to the elements of the model.
    pub fn from_config(config: Configuration, atomic_data: &AtomicData) -> RadTransResult<Self> {
        config.validate()?;
        let time_explosion = config.supernova.time_explosion.to_cgs(Dimension::TIME)?;
        let luminosity_requested = config
            .supernova
            .luminosity_requested
            .to_cgs(Dimension::POWER)?;

        let velocity = &config.model.velocity;
        let geometry = HomologousRadial1DMesh::linspace(
            velocity.start.to_cgs(Dimension::VELOCITY)?,
            velocity.stop.to_cgs(Dimension::VELOCITY)?,
            velocity.num,
            time_explosion,
        )?
        .geometry();
        let no_of_shells = geometry.no_of_shells();
        let density = config
            .model
            .density
            .to_profile(time_explosion)?
            .calculate_density(&geometry)?;

        let fractions = config
            .model
            .abundances
            .iter()
            .map(|(symbol, x)| Ok((atomic_number_of(atomic_data, symbol)?, *x)))
            .collect::<RadTransResult<Vec<_>>>()?;
        let composition = Composition::uniform(&fractions, no_of_shells)?;
        let atomic_data = Arc::new(atomic_data.select_elements(&composition.atomic_numbers)?);

        let mut abundance = Array2::zeros((atomic_data.elements.len(), no_of_shells));
        for (row, z) in composition.atomic_numbers.iter().enumerate() {
            let index = atomic_data.element_index(*z).ok_or_else(|| {
                RadTransError::AtomicData(format!("no atomic data for element {z}"))
            })?;
            abundance
                .row_mut(index)
                .assign(&composition.mass_fractions.row(row));
        }

        let r_inner = geometry.r_photosphere();
        let t_inner = match &config.plasma.initial_t_inner {
            Some(t) => t.to_cgs(Dimension::TEMPERATURE)?,
            None => t_inner_from_luminosity(luminosity_requested, r_inner),
        };
        let t_rad = match &config.plasma.initial_t_rad {
            Some(t) => t.to_cgs(Dimension::TEMPERATURE)?,
            None => DEFAULT_T_RADIATIVE,
        };
        let field = DilutePlanckianRadiationField::from_geometry(&geometry, t_rad);

        let plasma = config.plasma.settings.build(
            Arc::clone(&atomic_data),
            PlasmaInputs {
                t_rad: field.t_rad,
                dilution_factor: field.w,
                density,
                abundance,
                time_explosion,
            },
        )?;

        let spectrum_solver = SpectrumSolver::from_wavelength_range(
            config.spectrum.start.to_cgs(Dimension::LENGTH)?,
            config.spectrum.stop.to_cgs(Dimension::LENGTH)?,
            config.spectrum.num,
        )?;

        info!(
            shells = no_of_shells,
            elements = atomic_data.elements.len(),
            lines = atomic_data.n_lines(),
            t_inner,
            "Initialised simulation"
        );

        Ok(Self {
            luminosity_nu_range: config.supernova.luminosity_nu_range()?,
            source: BlackBodySimpleSource::new(config.montecarlo.seed),
            convergence: ConvergenceSolver::new(config.montecarlo.convergence_strategy.clone()),
            volume: geometry.volume(),
            config,
            atomic_data,
            geometry,
            plasma,
            t_inner,
            luminosity_requested,
            spectrum_solver,
            iterations_executed: 0,
            converged: false,
            history: Vec::new(),
        })
    }

    pub fn atomic_data(&self) -> &AtomicData {
        &self.atomic_data
    }

    pub fn geometry(&self) -> &GeometryState {
        &self.geometry
    }

    pub fn plasma(&self) -> &Plasma {
        &self.plasma
    }

    pub fn t_inner(&self) -> f64 {
        self.t_inner
    }

    pub fn iterations_executed(&self) -> usize {
        self.iterations_executed
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn history(&self) -> &[IterationRecord] {
        &self.history
    }

    /// Transport settings, virtual packets and tracking only apply to the final iteration.
    fn montecarlo_configuration(&self, final_iteration: bool) -> RadTransResult<MonteCarloConfiguration> {
        let montecarlo = &self.config.montecarlo;
        let mut virtual_packets = VirtualPacketConfiguration {
            no_of_virtual_packets: if final_iteration {
                montecarlo.no_of_virtual_packets
            } else {
                0
            },
            ..Default::default()
        };
        if let Some(q) = &montecarlo.virtual_spawn_start {
            virtual_packets.spawn_end_frequency = q.to_frequency()?;
        }
        if let Some(q) = &montecarlo.virtual_spawn_end {
            virtual_packets.spawn_start_frequency = q.to_frequency()?;
        }
        Ok(MonteCarloConfiguration {
            line_interaction_type: self.config.plasma.settings.line_interaction_type,
            full_relativity: montecarlo.enable_full_relativity,
            disable_electron_scattering: montecarlo.disable_electron_scattering,
            disable_line_scattering: montecarlo.disable_line_scattering,
            virtual_packets,
            tracking: montecarlo.tracking && final_iteration,
            max_macro_atom_jumps: montecarlo.max_macro_atom_jumps,
            no_of_threads: montecarlo.nthreads,
        })
    }

    /// Runs the transport through the current plasma.
    fn iterate(&self, no_of_packets: usize, final_iteration: bool) -> RadTransResult<IterationOutput> {
        let iteration = self.iterations_executed as u64;
        let r_inner = self.geometry.r_photosphere();
        let opacity = self.plasma.to_opacity_state()?;
        let packets = self
            .source
            .create_packets(self.t_inner, no_of_packets, r_inner, iteration);
        let config = self.montecarlo_configuration(final_iteration)?;
        let seed = self
            .config
            .montecarlo
            .seed
            .wrapping_add(TRANSPORT_SEED_OFFSET)
            .wrapping_add(iteration);
        let transport = montecarlo_main_loop(&packets, &self.geometry, &opacity, &config, seed)?;

        let time_of_simulation = time_of_simulation(self.t_inner, r_inner);
        let (nu_start, nu_end) = self.luminosity_nu_range;
        let luminosity_emitted = calculate_emitted_luminosity(
            &transport.output_nus,
            &transport.output_energies,
            time_of_simulation,
            nu_start,
            nu_end,
        );
        let luminosity_reabsorbed = calculate_reabsorbed_luminosity(
            &transport.output_nus,
            &transport.output_energies,
            time_of_simulation,
            nu_start,
            nu_end,
        );
        info!(
            iteration = self.iterations_executed + 1,
            t_inner = format!("{:.3} K", self.t_inner),
            luminosity_emitted = format!("{luminosity_emitted:.4e} erg/s"),
            luminosity_requested = format!("{:.4e} erg/s", self.luminosity_requested),
            luminosity_reabsorbed = format!("{luminosity_reabsorbed:.4e} erg/s"),
            emitted = transport.no_of_emitted(),
            reabsorbed = transport.no_of_reabsorbed(),
            "Finished iteration"
        );
        Ok(IterationOutput {
            transport,
            time_of_simulation,
            luminosity_emitted,
            luminosity_reabsorbed,
        })
    }

    /// Estimates the new radiation field and inner temperature and updates the plasma.
    fn advance_state(&mut self, output: &IterationOutput) -> RadTransResult<ConvergenceReport> {
        let estimators = &output.transport.estimators;
        let estimated = estimators.radiation_field(output.time_of_simulation, &self.volume);
        let j_blues = estimators.j_blues(
            self.geometry.time_explosion,
            output.time_of_simulation,
            &self.volume,
        );
        let missing = estimated.t_rad.iter().filter(|t| !t.is_finite()).count();
        if missing > 0 {
            warn!(shells = missing, "No packets crossed some shells, keeping their radiation field");
        }

        let strategy = self.convergence.strategy();
        let t_inner_estimate = if output.luminosity_emitted > 0.0 {
            self.t_inner
                * (output.luminosity_emitted / self.luminosity_requested)
                    .powf(strategy.t_inner_update_exponent)
        } else {
            warn!("No luminosity emitted in the requested band, keeping t_inner");
            self.t_inner
        };
        let update_t_inner = (self.iterations_executed + 1) % strategy.lock_t_inner_cycles == 0;

        let t_rad = self.plasma.t_rad()?.clone();
        let w = self.plasma.dilution_factor()?.clone();
        let report = self.convergence.check(
            &t_rad,
            &estimated.t_rad,
            &w,
            &estimated.w,
            self.t_inner,
            t_inner_estimate,
        );

        let next_t_rad = self.convergence.damp_t_rad(&t_rad, &estimated.t_rad);
        let next_w = self.convergence.damp_w(&w, &estimated.w);
        let next_t_inner = if update_t_inner {
            self.convergence.damp_t_inner(self.t_inner, t_inner_estimate)
        } else {
            self.t_inner
        };

        for shell in 0..t_rad.len() {
            debug!(
                shell,
                t_rad = format!("{:.1} -> {:.1}", t_rad[shell], next_t_rad[shell]),
                w = format!("{:.4} -> {:.4}", w[shell], next_w[shell]),
                "Radiation field"
            );
        }
        info!(
            t_inner = format!("{:.3} -> {:.3} K", self.t_inner, next_t_inner),
            t_rad_converged = report.t_rad_fraction,
            w_converged = report.w_fraction,
            "Updated radiation field"
        );

        self.plasma
            .update_radiation_field(next_t_rad, next_w, Some(j_blues))?;
        self.t_inner = next_t_inner;
        Ok(report)
    }

    /// State the packets of `output` were run through.
    fn snapshot(
        &self,
        no_of_packets: usize,
        output: &IterationOutput,
    ) -> RadTransResult<IterationRecord> {
        Ok(IterationRecord {
            iteration: self.iterations_executed,
            no_of_packets,
            t_inner: self.t_inner,
            t_rad: self.plasma.t_rad()?.clone(),
            w: self.plasma.dilution_factor()?.clone(),
            electron_densities: self.plasma.electron_densities()?.clone(),
            luminosity_emitted: output.luminosity_emitted,
            luminosity_reabsorbed: output.luminosity_reabsorbed,
            convergence: None,
        })
    }

    /// Runs the convergence iterations and the final iteration.
    pub fn run(&mut self) -> RadTransResult<SimulationResult> {
        let montecarlo = self.config.montecarlo.clone();
        let strategy_stops = montecarlo.convergence_strategy.stop_if_converged;

        while self.iterations_executed + 1 < montecarlo.iterations {
            let output = self.iterate(montecarlo.no_of_packets, false)?;
            let record = self.snapshot(montecarlo.no_of_packets, &output)?;
            let report = self.advance_state(&output)?;
            self.history.push(IterationRecord {
                convergence: Some(report),
                ..record
            });
            self.iterations_executed += 1;
            self.converged = report.converged;
            if report.converged {
                info!(iteration = self.iterations_executed, "Simulation converged");
                if strategy_stops {
                    break;
                }
            }
        }

        let no_of_packets = montecarlo.last_no_of_packets();
        let output = self.iterate(no_of_packets, true)?;
        let record = self.snapshot(no_of_packets, &output)?;
        self.history.push(record);
        self.iterations_executed += 1;

        let spectrum = self.spectrum_solver.solve(
            &output.transport,
            output.time_of_simulation,
            montecarlo.no_of_virtual_packets > 0,
        );
        info!(
            iterations = self.iterations_executed,
            converged = self.converged,
            luminosity = format!("{:.4e} erg/s", spectrum.emitted.total_luminosity()),
            "Simulation finished"
        );

        Ok(SimulationResult {
            converged: self.converged,
            iterations_executed: self.iterations_executed,
            t_inner: self.t_inner,
            t_rad: self.plasma.t_rad()?.clone(),
            w: self.plasma.dilution_factor()?.clone(),
            electron_densities: self.plasma.electron_densities()?.clone(),
            luminosity_requested: self.luminosity_requested,
            luminosity_emitted: output.luminosity_emitted,
            time_of_simulation: output.time_of_simulation,
            spectrum,
            history: self.history.clone(),
            trackers: output.transport.trackers,
        })
    }
}

/// Atomic number of an element symbol, matched case-insensitively.
fn atomic_number_of(atomic_data: &AtomicData, symbol: &str) -> RadTransResult<u32> {
    atomic_data
        .elements
        .iter()
        .find(|e| e.symbol.eq_ignore_ascii_case(symbol))
        .map(|e| e.atomic_number)
        .ok_or_else(|| RadTransError::AtomicData(format!("unknown element symbol '{symbol}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use radtrans_core::testing::small_atomic_data;

    const CONFIG: &str = "
supernova:
  luminosity_requested: 9.44 log_lsun
  time_explosion: 13 day
model:
  velocity: {start: 11000 km/s, stop: 20000 km/s, num: 4}
  density: {type: branch85_w7}
  abundances: {H: 0.7, he: 0.3}
montecarlo:
  seed: 7
  no_of_packets: 400
  iterations: 3
  last_no_of_packets: 800
  no_of_virtual_packets: 2
  nthreads: 1
spectrum: {start: 500 angstrom, stop: 20000 angstrom, num: 100}
";

    fn simulation(text: &str) -> Simulation {
        let config = Configuration::from_yaml_str(text).unwrap();
        Simulation::from_config(config, &small_atomic_data().unwrap()).unwrap()
    }

    #[test]
    fn test_from_config() {
        let sim = simulation(CONFIG);
        assert_eq!(sim.geometry().no_of_shells(), 4);
        assert_eq!(sim.atomic_data().elements.len(), 2);
        let expected = t_inner_from_luminosity(
            10f64.powf(9.44) * radtrans_core::constants::L_SUN,
            sim.geometry().r_photosphere(),
        );
        approx::assert_relative_eq!(sim.t_inner(), expected);
        assert_eq!(sim.iterations_executed(), 0);
    }

    #[test]
    fn test_unknown_symbol() {
        let config = Configuration::from_yaml_str(&CONFIG.replace("he: 0.3", "Xx: 0.3")).unwrap();
        assert!(matches!(
            Simulation::from_config(config, &small_atomic_data().unwrap()),
            Err(RadTransError::AtomicData(_))
        ));
    }

    #[test]
    fn test_run_records_history() {
        let mut sim = simulation(CONFIG);
        let result = sim.run().unwrap();
        assert_eq!(result.iterations_executed, 3);
        assert_eq!(result.history.len(), 3);
        assert!(result.history[..2].iter().all(|r| r.convergence.is_some()));
        assert!(result.history[2].convergence.is_none());
        assert_eq!(result.history[2].no_of_packets, 800);
        assert!(result.t_rad.iter().all(|t| t.is_finite() && *t > 0.0));
        assert!(result.spectrum.virtual_spectrum.is_some());
        assert!(result.spectrum.emitted.total_luminosity() > 0.0);
    }

    #[test]
    fn test_run_is_reproducible() {
        let first = simulation(CONFIG).run().unwrap();
        let second = simulation(CONFIG).run().unwrap();
        assert_eq!(first.t_inner, second.t_inner);
        assert_eq!(first.spectrum, second.spectrum);
    }

    #[test]
    fn test_single_iteration_is_final() {
        let mut sim = simulation(&CONFIG.replace("iterations: 3", "iterations: 1"));
        let result = sim.run().unwrap();
        assert_eq!(result.iterations_executed, 1);
        assert_eq!(result.history.len(), 1);
        assert!(!result.converged);
    }

    #[test]
    fn test_result_json() {
        let mut sim = simulation(&CONFIG.replace("iterations: 3", "iterations: 2"));
        let result = sim.run().unwrap();
        let json = result.to_json_string().unwrap();
        let parsed: SimulationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.history.len(), 2);
        approx::assert_relative_eq!(parsed.t_inner, result.t_inner, max_relative = 1e-12);
    }
}
