//! radtrans command line interface
//!
//! ```bash
//! radtrans run demos/paper1.yml --reduce-packets 10 --output result.json
//! ```

use clap::{Parser, Subcommand};
use radtrans::reference::{ReferenceData, ReferenceSettings, DEFAULT_RTOL};
use radtrans::{load_atomic_data, Configuration, Simulation};
use radtrans_core::errors::RadTransResult;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "radtrans")]
#[command(about = "Monte Carlo radiative transfer for supernova ejecta")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulation described by a YAML or TOML configuration
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Configuration file
    config: PathBuf,

    /// Atomic data JSON, overrides the configuration
    #[arg(long)]
    atomic_data: Option<PathBuf>,

    /// Packets per iteration
    #[arg(long)]
    packets: Option<usize>,

    /// Divide all packet counts by this factor
    #[arg(long)]
    reduce_packets: Option<f64>,

    #[arg(long)]
    iterations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Worker threads, 0 lets rayon decide
    #[arg(long)]
    threads: Option<usize>,

    /// Write the result as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write reference data into this directory
    #[arg(long, conflicts_with = "compare_reference")]
    generate_reference: Option<PathBuf>,

    /// Compare against reference data in this directory
    #[arg(long)]
    compare_reference: Option<PathBuf>,

    /// Relative tolerance of the reference comparison
    #[arg(long, default_value_t = DEFAULT_RTOL)]
    rtol: f64,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => run(args),
    };
    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> RadTransResult<()> {
    info!("Loading configuration from {}", args.config.display());
    let mut config = Configuration::from_path(&args.config)?;

    let montecarlo = &mut config.montecarlo;
    if let Some(packets) = args.packets {
        montecarlo.no_of_packets = packets;
    }
    if let Some(factor) = args.reduce_packets {
        montecarlo.reduce_packets(factor)?;
    }
    if let Some(iterations) = args.iterations {
        montecarlo.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        montecarlo.seed = seed;
    }
    if let Some(threads) = args.threads {
        montecarlo.nthreads = threads;
    }
    config.validate()?;

    let atomic_path = args
        .atomic_data
        .clone()
        .or_else(|| config.atom_data_path(args.config.parent()));
    let atomic_data = load_atomic_data(atomic_path.as_deref())?;

    let mut simulation = Simulation::from_config(config, &atomic_data)?;
    let result = simulation.run()?;

    if let Some(output) = &args.output {
        result.write_json(output)?;
        info!("Wrote result to {}", output.display());
    }

    let name = args
        .config
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "simulation".to_string());
    let reference = ReferenceData::from(&result);
    if let Some(directory) = args.generate_reference {
        let settings = ReferenceSettings {
            path: Some(directory),
            generate: true,
            rtol: args.rtol,
        };
        settings.check(&name, &reference)?;
    }
    if let Some(directory) = args.compare_reference {
        let settings = ReferenceSettings {
            path: Some(directory),
            generate: false,
            rtol: args.rtol,
        };
        settings.check(&name, &reference)?;
    }
    Ok(())
}
