//! Vanish Core
//!
//! Session lifecycle and per-identity encryption for an ephemeral, anonymous
//! messaging relay. Participants join under a transient username, every
//! identity gets its own symmetric key, and all state belonging to an
//! identity is erased on leave or after a period of inactivity.
//!
//! This crate is synchronous and memory-only. Scheduling the expiry sweep
//! and fanning messages out to clients live in `vanish-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod identity;
pub mod message;
pub mod reaper;
pub mod registry;
pub mod router;
pub mod types;
pub mod vault;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::RelayConfig;
pub use errors::{ErrorClass, RelayError, RelayResult, Result};
pub use message::{
    FetchedMessage, MessageContent, MessageRecord, MessageSink, NullSink, Recipient,
};
pub use reaper::ExpiryReaper;
pub use registry::{IdentityRegistry, JoinReceipt, RegistryStats};
pub use router::MessageRouter;
pub use types::{
    IdentityHandle, ManualTimeSource, MessageId, SessionToken, SystemTimeSource, TimeSource,
    Timestamp,
};
pub use vault::KeyVault;
