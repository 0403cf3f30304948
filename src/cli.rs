//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

fn default_config_path() -> PathBuf {
    PathBuf::from("picalor_config.yaml")
}

/// Multi-channel heat-flow calorimetry controller.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file. Created with the embedded default
    /// template if it doesn't exist.
    #[arg(long, default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Log level: error, warn, info, debug or trace.
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the embedded default configuration template and exit.
    #[arg(long)]
    pub show_default_config: bool,
}
