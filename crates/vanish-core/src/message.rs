//! Message records and the outbound fan-out seam

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{IdentityHandle, MessageId, Timestamp};

/// Wire value addressing every connected participant
pub const BROADCAST_RECIPIENT: &str = "all";

// ----------------------------------------------------------------------------
// Recipient
// ----------------------------------------------------------------------------

/// Addressee of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recipient {
    /// Every connected participant
    Broadcast,
    /// A single participant, by username
    User(String),
}

impl Recipient {
    /// Parse a client-supplied recipient; empty or `"all"` means broadcast
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Recipient::Broadcast,
            Some(name) if name.eq_ignore_ascii_case(BROADCAST_RECIPIENT) => Recipient::Broadcast,
            Some(name) => Recipient::User(name.to_string()),
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::Broadcast => f.write_str(BROADCAST_RECIPIENT),
            Recipient::User(name) => f.write_str(name),
        }
    }
}

// ----------------------------------------------------------------------------
// Message Record
// ----------------------------------------------------------------------------

/// Encrypted message as cached and broadcast by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: MessageId,
    pub sender_handle: IdentityHandle,
    pub sender_username: String,
    /// `nonce || ciphertext || tag` under the sender's key
    pub ciphertext: Vec<u8>,
    pub recipient: Recipient,
    pub timestamp: Timestamp,
}

// ----------------------------------------------------------------------------
// Fetched Message
// ----------------------------------------------------------------------------

/// Result of decrypting one cached message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageContent {
    Plaintext(String),
    /// The caller's key couldn't open this message
    Undecryptable,
}

impl MessageContent {
    /// Plaintext if decryption succeeded
    pub fn as_plaintext(&self) -> Option<&str> {
        match self {
            MessageContent::Plaintext(text) => Some(text),
            MessageContent::Undecryptable => None,
        }
    }
}

/// Message as returned to its owner by a fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedMessage {
    pub id: MessageId,
    pub sender_handle: IdentityHandle,
    pub sender_username: String,
    pub recipient: Recipient,
    pub timestamp: Timestamp,
    pub content: MessageContent,
}

impl FetchedMessage {
    pub(crate) fn from_record(record: &MessageRecord, content: MessageContent) -> Self {
        Self {
            id: record.id,
            sender_handle: record.sender_handle,
            sender_username: record.sender_username.clone(),
            recipient: record.recipient.clone(),
            timestamp: record.timestamp,
            content,
        }
    }
}

// ----------------------------------------------------------------------------
// Message Sink
// ----------------------------------------------------------------------------

/// Outbound seam towards the transport's broadcast fan-out
///
/// Called after the relay state lock has been released. Implementations
/// must not block.
pub trait MessageSink: Send + Sync {
    /// Hand one freshly sent message to the transport
    fn deliver(&self, record: &MessageRecord);
}

/// Sink that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn deliver(&self, _record: &MessageRecord) {}
}
