//! Vanish Runtime
//!
//! Async wiring around `vanish-core`:
//! - `RelayService`: the facade the transport layer calls into
//! - `ReaperTask`: periodic expiry sweep with a cooperative stop signal
//! - `BroadcastSink`: tokio broadcast fan-out of sent messages

pub mod builder;
pub mod reaper_task;
pub mod service;
pub mod sink;

pub use builder::{build_test_service, RelayBuilder};
pub use reaper_task::{ReaperHandle, ReaperTask};
pub use service::RelayService;
pub use sink::BroadcastSink;

// Re-export core types for convenience
pub use vanish_core::{
    ErrorClass, FetchedMessage, IdentityHandle, JoinReceipt, ManualTimeSource, MessageContent,
    MessageId, MessageRecord, Recipient, RegistryStats, RelayConfig, RelayError, RelayResult,
    SessionToken, TimeSource,
};
