//! Error types for the Vanish relay core
//!
//! All fallible operations in the core return [`RelayError`]. Each variant
//! belongs to an [`ErrorClass`] that tells the transport layer whether the
//! caller or the relay is at fault.

use crate::types::IdentityHandle;

// ----------------------------------------------------------------------------
// Error Class
// ----------------------------------------------------------------------------

/// Coarse classification used by the transport to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request was rejected; retrying it unchanged will fail again
    Client,
    /// The relay failed while handling a valid request
    Server,
}

// ----------------------------------------------------------------------------
// Relay Error
// ----------------------------------------------------------------------------

/// Core error types for the Vanish relay
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid username: {reason}")]
    InvalidUsername { reason: String },

    #[error("Username already taken: {username}")]
    UsernameTaken { username: String },

    #[error("Invalid session")]
    InvalidSession,

    #[error("No key issued for identity {handle}")]
    UnknownIdentity { handle: IdentityHandle },

    #[error("Decryption failed for identity {handle}")]
    DecryptionFailed { handle: IdentityHandle },

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Key already issued for identity {handle}")]
    DuplicateIdentity { handle: IdentityHandle },

    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    /// A thread panicked while holding the relay state lock
    #[error("Relay state lock poisoned")]
    StatePoisoned,
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl RelayError {
    /// Create an invalid username error with a reason
    pub fn invalid_username<T: Into<String>>(reason: T) -> Self {
        RelayError::InvalidUsername {
            reason: reason.into(),
        }
    }

    /// Create a username taken error
    pub fn username_taken<T: Into<String>>(username: T) -> Self {
        RelayError::UsernameTaken {
            username: username.into(),
        }
    }

    /// Create a send failure with a reason
    pub fn send_failed<T: Into<String>>(reason: T) -> Self {
        RelayError::SendFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid message error with a reason
    pub fn invalid_message<T: Into<String>>(reason: T) -> Self {
        RelayError::InvalidMessage {
            reason: reason.into(),
        }
    }

    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        RelayError::Configuration {
            reason: reason.into(),
        }
    }

    /// Classify this error for the transport layer
    pub fn class(&self) -> ErrorClass {
        match self {
            RelayError::InvalidUsername { .. }
            | RelayError::UsernameTaken { .. }
            | RelayError::InvalidSession
            | RelayError::InvalidMessage { .. } => ErrorClass::Client,
            RelayError::UnknownIdentity { .. }
            | RelayError::DecryptionFailed { .. }
            | RelayError::SendFailed { .. }
            | RelayError::DuplicateIdentity { .. }
            | RelayError::Configuration { .. }
            | RelayError::StatePoisoned => ErrorClass::Server,
        }
    }

    /// HTTP-style status code a transport would answer with
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::InvalidSession => 401,
            _ => match self.class() {
                ErrorClass::Client => 400,
                ErrorClass::Server => 500,
            },
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, RelayError>;
pub type RelayResult<T> = Result<T>;
