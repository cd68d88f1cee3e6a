//! # SHIELDSIM-RS
//!
//! Command-line driver: runs the synthetic shielding source or replays a
//! captured `events.jsonl`, then prints the run summary and writes the
//! particle list and ntuples.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use shieldsim_rs::*;

#[derive(Parser, Debug)]
#[command(name = "shieldsim")]
#[command(version)]
#[command(about = "Shielding Monte Carlo run statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the synthetic shielding source
    Run(RunArgs),

    /// Replay events from a JSON-lines file
    Replay {
        /// Path to events.jsonl
        #[arg(long, required = true)]
        events: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Show version and build info
    Version,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads
    #[arg(long, short = 't')]
    threads: Option<usize>,

    /// Number of events
    #[arg(long, short = 'n')]
    events_count: Option<u64>,

    /// Primary particle name
    #[arg(long)]
    particle: Option<String>,

    /// Primary kinetic energy (MeV)
    #[arg(long)]
    energy: Option<f64>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Output folder
    #[arg(long, short = 'o')]
    output_folder: Option<String>,

    /// Sub-folder for the particle lists
    #[arg(long)]
    list_folder: Option<String>,

    /// Also write run_summary.json
    #[arg(long)]
    summary_json: bool,
}

impl RunArgs {
    fn into_config(self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(threads) = self.threads {
            config.n_threads = threads;
        }
        if let Some(n) = self.events_count {
            config.n_events = n;
        }
        if let Some(particle) = self.particle {
            config.primary_particle = particle;
        }
        if let Some(energy) = self.energy {
            config.primary_energy = energy;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(folder) = self.output_folder {
            config.output.folder_name = folder;
        }
        if let Some(list) = self.list_folder {
            config.output.list_folder = list;
        }
        if self.summary_json {
            config.output.write_summary_json = true;
        }

        config.validate()?;
        Ok(config)
    }
}

fn print_outcome(outcome: &RunOutcome) {
    println!("{}", outcome.summary);
    println!();
    if let Some(report) = &outcome.report_file {
        println!("Particle list: {}", report.path.display());
    }
    for path in &outcome.ntuple_files {
        println!("Ntuple: {}", path.display());
    }
    if let Some(path) = &outcome.summary_file {
        println!("Summary: {}", path.display());
    }
    println!("Ntuple rows: {}", outcome.ntuple_rows);
    println!("Wall-clock time: {:.3} s", outcome.elapsed);
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let manager = RunManager::new(args.into_config()?)?;
            let outcome = manager.run_synthetic()?;
            print_outcome(&outcome);
        }
        Commands::Replay { events, run } => {
            let manager = RunManager::new(run.into_config()?)?;
            let outcome = manager.replay(&events)?;
            print_outcome(&outcome);
        }
        Commands::Version => {
            println!("{}", info());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
