//! Relay configuration
//!
//! All tunables of the relay core live in [`RelayConfig`]. Every field has a
//! default, so partial TOML files deserialize cleanly.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{RelayError, Result};

/// Placeholder relay addresses advertised by the relay; never dialed
pub const DEFAULT_RELAY_URLS: [&str; 3] = [
    "wss://relay.damus.io",
    "wss://nostr-pub.wellorder.net",
    "wss://relay.nostr.info",
];

// ----------------------------------------------------------------------------
// Relay Configuration
// ----------------------------------------------------------------------------

/// Configuration for session lifecycle, expiry and message caching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Seconds between expiry sweeps
    pub cleanup_interval_secs: u64,
    /// Minutes of inactivity after which an identity is erased
    pub inactivity_threshold_mins: u64,
    /// Minimum username length in characters
    pub min_username_length: usize,
    /// Maximum username length in characters
    pub max_username_length: usize,
    /// Maximum plaintext size of a single message in bytes
    pub max_message_bytes: usize,
    /// Maximum number of messages cached per identity (oldest dropped first)
    pub max_cached_messages: usize,
    /// Capacity of the broadcast fan-out channel
    pub broadcast_capacity: usize,
    /// External relay addresses (informational only)
    pub relay_urls: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 300,   // 5 minutes
            inactivity_threshold_mins: 30,
            min_username_length: 3,
            max_username_length: 32,
            max_message_bytes: 65536, // 64KB per message
            max_cached_messages: 1000,
            broadcast_capacity: 256,
            relay_urls: DEFAULT_RELAY_URLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RelayConfig {
    /// Create configuration suited to tests: short intervals, small caches
    pub fn testing() -> Self {
        Self {
            cleanup_interval_secs: 1,
            inactivity_threshold_mins: 1,
            max_cached_messages: 16,
            broadcast_capacity: 64,
            relay_urls: Vec::new(),
            ..Self::default()
        }
    }

    /// Interval between expiry sweeps
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Inactivity threshold after which identities expire
    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_mins * 60)
    }

    /// Check the configuration for values the relay can't operate with
    pub fn validate(&self) -> Result<()> {
        if self.cleanup_interval_secs == 0 {
            return Err(RelayError::config_error("cleanup_interval_secs must be positive"));
        }
        if self.inactivity_threshold_mins == 0 {
            return Err(RelayError::config_error(
                "inactivity_threshold_mins must be positive",
            ));
        }
        if self.min_username_length == 0 {
            return Err(RelayError::config_error("min_username_length must be positive"));
        }
        if self.min_username_length > self.max_username_length {
            return Err(RelayError::config_error(format!(
                "min_username_length ({}) exceeds max_username_length ({})",
                self.min_username_length, self.max_username_length
            )));
        }
        if self.max_message_bytes == 0 || self.max_cached_messages == 0 {
            return Err(RelayError::config_error("message limits must be positive"));
        }
        if self.broadcast_capacity == 0 {
            return Err(RelayError::config_error("broadcast_capacity must be positive"));
        }
        Ok(())
    }
}
