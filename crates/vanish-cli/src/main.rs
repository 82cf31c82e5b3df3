//! Vanish console entry point

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use vanish_cli::{AppConfig, Cli, Shell};
use vanish_runtime::RelayBuilder;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?;
    if cli.print_config {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let service = Arc::new(RelayBuilder::new().config(config.relay.clone()).build()?);
    service.start()?;
    info!(
        "Relay started (sweep every {}s, expire after {}m idle)",
        config.relay.cleanup_interval_secs, config.relay.inactivity_threshold_mins
    );

    let result = Shell::new(Arc::clone(&service), config.console).run().await;

    service.stop().await;
    let erased = service.wipe()?;
    info!("Relay stopped, erased {} identities", erased);
    result
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file, environment and flags
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    if let Some(config_path) = &cli.config {
        info!("Loading configuration from: {}", config_path);
    }
    AppConfig::load(cli)
}
