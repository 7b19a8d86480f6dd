//! End-to-end runs of the configurations in `demos/`.
//!
//! Packet counts are reduced so that the runs finish quickly. Reference data
//! is compared when `RADTRANS_REFERENCE_PATH` is set and regenerated when
//! `RADTRANS_GENERATE_REFERENCE` is set as well.

use approx::assert_relative_eq;
use radtrans::reference::{ReferenceData, ReferenceOutcome, ReferenceSettings};
use radtrans::{load_atomic_data, Configuration, Simulation, SimulationResult};
use std::path::PathBuf;

const PACKET_REDUCTION: f64 = 100.0;

fn demo(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("demos")
        .join(name)
}

fn run_demo(name: &str, iterations: usize) -> SimulationResult {
    let mut config = Configuration::from_path(demo(name)).unwrap();
    config.montecarlo.reduce_packets(PACKET_REDUCTION).unwrap();
    config.montecarlo.iterations = iterations;
    config.montecarlo.nthreads = 2;
    let atomic_data = load_atomic_data(None).unwrap();
    Simulation::from_config(config, &atomic_data)
        .unwrap()
        .run()
        .unwrap()
}

mod paper1 {
    use super::*;

    #[test]
    fn test_run_and_reference() {
        let result = run_demo("paper1.yml", 3);
        assert_eq!(result.iterations_executed, 3);
        assert_eq!(result.t_rad.len(), 20);
        assert!(result.t_rad.iter().all(|t| *t > 1000.0 && *t < 50_000.0));
        assert!(result.w.iter().all(|w| *w > 0.0));
        assert!(result.electron_densities.iter().all(|n| *n > 0.0));
        assert!(result.spectrum.virtual_spectrum.is_some());

        let outcome = ReferenceSettings::from_env()
            .check("paper1", &ReferenceData::from(&result))
            .unwrap();
        if std::env::var_os(radtrans::reference::REFERENCE_PATH_VAR).is_none() {
            assert_eq!(outcome, ReferenceOutcome::Skipped);
        }
    }

    /// Packets either leave the ejecta or return into the photosphere, up to
    /// the energy exchanged with the expanding flow.
    #[test]
    fn test_luminosity_is_accounted_for() {
        let result = run_demo("paper1.yml", 1);
        let last = result.history.last().unwrap();
        let inner_luminosity = 1.0 / result.time_of_simulation;
        assert_relative_eq!(
            last.luminosity_emitted + last.luminosity_reabsorbed,
            inner_luminosity,
            max_relative = 0.3
        );
    }

    #[test]
    fn test_result_json_round_trip() {
        let result = run_demo("paper1.yml", 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper1.json");
        result.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: SimulationResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.history.len(), result.history.len());
        let luminosity = &result.spectrum.emitted.luminosity;
        assert_eq!(parsed.spectrum.emitted.luminosity.len(), luminosity.len());
        for (parsed, original) in parsed.spectrum.emitted.luminosity.iter().zip(luminosity) {
            assert_relative_eq!(*parsed, *original, max_relative = 1e-12);
        }
    }
}

mod nlte {
    use super::*;

    #[test]
    fn test_toml_demo_runs() {
        let result = run_demo("nlte.toml", 2);
        assert!(result.iterations_executed <= 2);
        assert_eq!(result.t_rad.len(), 10);
        assert!(result.t_inner.is_finite() && result.t_inner > 0.0);
        assert!(result.spectrum.virtual_spectrum.is_none());
        assert!(result.spectrum.emitted.total_luminosity() > 0.0);
    }
}
