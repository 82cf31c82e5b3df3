//! Core types for the Vanish relay
//!
//! Newtype wrappers for identifiers and timestamps, plus the [`TimeSource`]
//! trait used to inject a clock into the registry and the expiry reaper.

use core::fmt;
use core::ops::Sub;
use core::str::FromStr;
use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::RelayError;

// ----------------------------------------------------------------------------
// Identity Handle
// ----------------------------------------------------------------------------

/// Opaque public reference to an anonymous participant (16 bytes)
///
/// Safe to log and broadcast. Derived from the username, a per-session
/// nonce and a random salt, so it can't be predicted from the username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityHandle([u8; 16]);

impl IdentityHandle {
    /// Create a handle from raw bytes
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Derive a handle from a username, session nonce and salt
    pub fn derive(username: &str, nonce: &[u8], salt: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(username.as_bytes());
        hasher.update(b":");
        hasher.update(hex::encode(nonce).as_bytes());
        hasher.update(b":");
        hasher.update(hex::encode(salt).as_bytes());
        let digest = hasher.finalize();

        let mut handle = [0u8; 16];
        handle.copy_from_slice(&digest[..16]);
        Self(handle)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for IdentityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ----------------------------------------------------------------------------
// Session Token
// ----------------------------------------------------------------------------

/// Private credential proving control of an identity (32 random bytes)
///
/// `Debug` is redacted so tokens never end up in logs. `Display` renders the
/// hex form handed to the owning client.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken([u8; 32]);

impl SessionToken {
    /// Generate a fresh random token
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create a token from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for SessionToken {
    type Err = RelayError;

    /// Malformed tokens are indistinguishable from unknown ones
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|_| RelayError::InvalidSession)?;
        let token: [u8; 32] = bytes.try_into().map_err(|_| RelayError::InvalidSession)?;
        Ok(Self(token))
    }
}

// ----------------------------------------------------------------------------
// Message Identifier
// ----------------------------------------------------------------------------

/// Random identifier assigned to every sent message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a fresh random message id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    /// Create a new timestamp
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as u64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Get duration since another timestamp (zero if `other` is later)
    pub fn duration_since(&self, other: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(other.0))
    }
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Clock abstraction so expiry can be tested without sleeping
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Wall-clock time source
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Manually driven time source
///
/// Clones share the same underlying clock, so a test can keep one handle
/// and advance time seen by the registry and the reaper.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    current_time: Arc<AtomicU64>,
}

impl ManualTimeSource {
    /// Create a manual clock starting at time 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manual clock starting at a specific time
    pub fn new_at(start_millis: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(start_millis)),
        }
    }

    /// Advance the clock
    pub fn advance(&self, by: Duration) {
        self.current_time
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute value
    pub fn set_time(&self, millis: u64) {
        self.current_time.store(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp(self.current_time.load(Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_derivation_depends_on_salt() {
        let nonce = [7u8; 16];
        let a = IdentityHandle::derive("alice", &nonce, &[1u8; 16]);
        let b = IdentityHandle::derive("alice", &nonce, &[2u8; 16]);
        assert_ne!(a, b);
        assert_eq!(a, IdentityHandle::derive("alice", &nonce, &[1u8; 16]));
        assert_eq!(a.to_string().len(), 32);
    }

    #[test]
    fn test_handle_displays_as_hex() {
        let handle = IdentityHandle::new([0xAB; 16]);
        assert_eq!(handle.to_string(), "ab".repeat(16));
    }

    #[test]
    fn test_session_token_debug_is_redacted() {
        let token = SessionToken::from_bytes([0x42; 32]);
        let debug = format!("{:?}", token);
        assert!(!debug.contains("42"));
        assert_eq!(token.to_string(), "42".repeat(32));
    }

    #[test]
    fn test_session_token_parse_rejects_garbage() {
        assert_eq!("zz".parse::<SessionToken>(), Err(RelayError::InvalidSession));
        assert_eq!("abcd".parse::<SessionToken>(), Err(RelayError::InvalidSession));

        let token = SessionToken::generate();
        assert_eq!(token.to_string().parse::<SessionToken>(), Ok(token));
    }

    #[test]
    fn test_manual_time_source_shares_clock() {
        let clock = ManualTimeSource::new_at(1_000);
        let shared = clock.clone();
        clock.advance(Duration::from_secs(2));
        assert_eq!(shared.now().as_millis(), 3_000);

        shared.set_time(10);
        assert_eq!(clock.now(), Timestamp::new(10));
    }

    #[test]
    fn test_timestamp_subtraction_saturates() {
        let earlier = Timestamp::new(100);
        let later = Timestamp::new(250);
        assert_eq!(later - earlier, 150);
        assert_eq!(earlier - later, 0);
        assert_eq!(later.duration_since(earlier), Duration::from_millis(150));
    }
}
