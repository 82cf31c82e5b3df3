//! Command line arguments

use clap::Parser;

/// Vanish - ephemeral, anonymous, encrypted relay console
#[derive(Debug, Parser)]
#[command(name = "vanish", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Seconds between expiry sweeps
    #[arg(long)]
    pub cleanup_interval: Option<u64>,

    /// Minutes of inactivity before an identity is erased
    #[arg(long)]
    pub inactivity_threshold: Option<u64>,

    /// Minimum username length
    #[arg(long)]
    pub min_username_length: Option<usize>,

    /// Don't echo broadcast events to the console
    #[arg(long)]
    pub quiet_broadcasts: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,
}
