//! Spectra CLI - Command-line front end for the Spectra spectrum analyzer.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spectra")]
#[command(author, version, about = "Spectra real-time spectrum analyzer", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config, if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List audio input devices
    Devices(commands::devices::DevicesArgs),

    /// Analyze a live or replayed source and print per-channel results
    Monitor(commands::monitor::MonitorArgs),

    /// Capture a number of blocks and write the PSD table to a file
    Dump(commands::dump::DumpArgs),

    /// Create or inspect the configuration file
    Config(commands::config::ConfigArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Monitor(args) => commands::monitor::run(args, config),
        Commands::Dump(args) => commands::dump::run(args, config),
        Commands::Config(args) => commands::config::run(args, config),
    }
}
