//! Anonymous identity records and username validation

use rand_core::{OsRng, RngCore};

use crate::config::RelayConfig;
use crate::errors::{RelayError, Result};
use crate::types::{IdentityHandle, SessionToken, Timestamp};

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// One anonymous participant for the lifetime of one session
///
/// Only the registry holds these; other components keep handles or tokens.
#[derive(Debug, Clone)]
pub struct Identity {
    username: String,
    handle: IdentityHandle,
    session_token: SessionToken,
    created_at: Timestamp,
    last_active_at: Timestamp,
}

impl Identity {
    /// Create an identity with a freshly derived handle and a random token
    pub(crate) fn create(username: String, now: Timestamp) -> Self {
        let mut nonce = [0u8; 16];
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);
        OsRng.fill_bytes(&mut salt);

        Self {
            handle: IdentityHandle::derive(&username, &nonce, &salt),
            session_token: SessionToken::generate(),
            username,
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn handle(&self) -> IdentityHandle {
        self.handle
    }

    pub(crate) fn session_token(&self) -> SessionToken {
        self.session_token
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_active_at(&self) -> Timestamp {
        self.last_active_at
    }

    /// Record an authenticated action
    pub(crate) fn touch(&mut self, now: Timestamp) {
        // Never move backwards if a caller's clock reading is stale
        if now > self.last_active_at {
            self.last_active_at = now;
        }
    }

    /// Whether inactivity strictly exceeds `threshold_ms` at `now`
    pub fn is_expired(&self, now: Timestamp, threshold_ms: u64) -> bool {
        now - self.last_active_at > threshold_ms
    }

    /// Case-insensitive comparison against another username
    pub fn has_username(&self, other: &str) -> bool {
        self.username.to_lowercase() == other.to_lowercase()
    }
}

// ----------------------------------------------------------------------------
// Username Validation
// ----------------------------------------------------------------------------

/// Trim and validate a requested username, returning the accepted form
pub fn normalize_username(raw: &str, config: &RelayConfig) -> Result<String> {
    let username = raw.trim();

    if username.is_empty() {
        return Err(RelayError::invalid_username("username must not be empty"));
    }

    let length = username.chars().count();
    if length < config.min_username_length {
        return Err(RelayError::invalid_username(format!(
            "username must be at least {} characters",
            config.min_username_length
        )));
    }
    if length > config.max_username_length {
        return Err(RelayError::invalid_username(format!(
            "username must be at most {} characters",
            config.max_username_length
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(RelayError::invalid_username(
            "username must not contain control characters",
        ));
    }

    Ok(username.to_string())
}
