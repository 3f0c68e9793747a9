use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "flowaccel-agent",
    about = "Flow-acceleration manager for a fast-path offload engine"
)]
pub struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "/etc/flowaccel/config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the version and exit.
    Version,
}

pub fn parse() -> Cli {
    Cli::parse()
}
