//! Configuration file management.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use spectra_config::{AnalyzerConfig, default_config_path};

use super::common::load_config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a default configuration file
    Init {
        /// Destination (defaults to --config, then the user config path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration as TOML
    Show,

    /// Print the user configuration file path
    Path,
}

pub fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Init { path, force } => {
            let path = path
                .or_else(|| config_path.map(Path::to_path_buf))
                .unwrap_or_else(default_config_path);
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            AnalyzerConfig::default().save(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        ConfigCommand::Show => {
            let config = load_config(config_path)?;
            print!("{}", config.to_toml()?);
        }
        ConfigCommand::Path => {
            println!("{}", default_config_path().display());
        }
    }
    Ok(())
}
