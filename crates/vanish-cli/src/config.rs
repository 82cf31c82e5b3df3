//! Vanish CLI Configuration Management
//!
//! Configuration is layered with the following priority:
//! CLI args > environment variables (`VANISH_*`) > config file > defaults.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vanish_core::RelayConfig;

use crate::cli::Cli;

/// Prefix of environment variables that override configuration
pub const ENV_PREFIX: &str = "VANISH_";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the console application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Relay core configuration
    pub relay: RelayConfig,
    /// Console-specific configuration
    pub console: ConsoleConfig,
}

/// Console presentation options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Prompt shown before each command
    pub prompt: String,
    /// Echo broadcast fan-out events
    pub show_broadcasts: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prompt: "vanish> ".to_string(),
            show_broadcasts: true,
        }
    }
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Apply `VANISH_*` overrides from `(name, value)` pairs
    pub fn apply_env_overrides<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(key) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "CLEANUP_INTERVAL_SECS" => {
                    self.relay.cleanup_interval_secs = parse_env(&name, &value)?;
                }
                "INACTIVITY_THRESHOLD_MINS" => {
                    self.relay.inactivity_threshold_mins = parse_env(&name, &value)?;
                }
                "MIN_USERNAME_LENGTH" => {
                    self.relay.min_username_length = parse_env(&name, &value)?;
                }
                _ => continue,
            }
            debug!("Applied environment override {}", name);
        }
        Ok(())
    }

    /// Apply command line overrides
    pub fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(secs) = cli.cleanup_interval {
            self.relay.cleanup_interval_secs = secs;
        }
        if let Some(mins) = cli.inactivity_threshold {
            self.relay.inactivity_threshold_mins = mins;
        }
        if let Some(length) = cli.min_username_length {
            self.relay.min_username_length = length;
        }
        if cli.quiet_broadcasts {
            self.console.show_broadcasts = false;
        }
    }

    /// Build the effective configuration for this invocation
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(std::env::vars())?;
        config.apply_cli_overrides(cli);
        config.relay.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid value for {}: {:?}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [relay]
            inactivity_threshold_mins = 10

            [console]
            prompt = "> "
            "#,
        )
        .unwrap();

        assert_eq!(config.relay.inactivity_threshold_mins, 10);
        assert_eq!(config.relay.cleanup_interval_secs, 300);
        assert_eq!(config.relay.min_username_length, 3);
        assert_eq!(config.console.prompt, "> ");
        assert!(config.console.show_broadcasts);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[
                ("VANISH_CLEANUP_INTERVAL_SECS", "60"),
                ("VANISH_MIN_USERNAME_LENGTH", " 5 "),
                ("VANISH_UNRELATED", "x"),
                ("HOME", "/root"),
            ]))
            .unwrap();

        assert_eq!(config.relay.cleanup_interval_secs, 60);
        assert_eq!(config.relay.min_username_length, 5);
        assert_eq!(config.relay.inactivity_threshold_mins, 30);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_overrides(env(&[("VANISH_INACTIVITY_THRESHOLD_MINS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("VANISH_INACTIVITY_THRESHOLD_MINS"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let cli = Cli::parse_from([
            "vanish",
            "--cleanup-interval",
            "15",
            "--inactivity-threshold",
            "2",
            "--quiet-broadcasts",
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(env(&[("VANISH_CLEANUP_INTERVAL_SECS", "60")]))
            .unwrap();
        config.apply_cli_overrides(&cli);

        assert_eq!(config.relay.cleanup_interval_secs, 15);
        assert_eq!(config.relay.inactivity_threshold_mins, 2);
        assert!(!config.console.show_broadcasts);
    }
}
