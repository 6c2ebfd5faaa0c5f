use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stallsweep")]
#[command(about = "Evicts stalled downloads from Sonarr/Radarr queues", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll every configured manager until interrupted
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Configuration file (defaults to $STALLSWEEP_CONFIG or config/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
