//! Identity registry
//!
//! Owns every piece of per-identity state: identity records, the session
//! token index, the key vault and the message cache. All of it sits behind a
//! single mutex, so the username uniqueness check is atomic with insertion
//! and erasure removes everything for an identity in one lock hold.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use core::time::Duration;

use hashbrown::HashMap;
use tracing::{debug, error, info, warn};

use crate::config::RelayConfig;
use crate::errors::{RelayError, Result};
use crate::identity::{normalize_username, Identity};
use crate::message::{FetchedMessage, MessageContent, MessageRecord, Recipient};
use crate::types::{IdentityHandle, MessageId, SessionToken, SystemTimeSource, TimeSource};
use crate::vault::KeyVault;

// ----------------------------------------------------------------------------
// Public Records
// ----------------------------------------------------------------------------

/// What a successful join hands back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinReceipt {
    pub session_token: SessionToken,
    pub identity_handle: IdentityHandle,
    pub username: String,
}

/// Counts of live per-identity state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistryStats {
    pub identities: usize,
    pub sessions: usize,
    pub keys: usize,
    pub cached_messages: usize,
}

// ----------------------------------------------------------------------------
// Relay State
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RelayState {
    identities: HashMap<IdentityHandle, Identity>,
    sessions: HashMap<SessionToken, IdentityHandle>,
    vault: KeyVault,
    mailboxes: HashMap<IdentityHandle, VecDeque<MessageRecord>>,
}

impl RelayState {
    fn resolve(&self, token: &SessionToken) -> Result<IdentityHandle> {
        self.sessions
            .get(token)
            .copied()
            .filter(|handle| self.identities.contains_key(handle))
            .ok_or(RelayError::InvalidSession)
    }

    fn identity_mut(&mut self, token: &SessionToken) -> Result<&mut Identity> {
        let handle = self.resolve(token)?;
        self.identities
            .get_mut(&handle)
            .ok_or(RelayError::InvalidSession)
    }

    /// The only deletion path: identity, token, key and mailbox go together
    fn erase(&mut self, handle: &IdentityHandle) -> bool {
        let identity = self.identities.remove(handle);
        if let Some(identity) = &identity {
            self.sessions.remove(&identity.session_token());
        }
        self.vault.revoke_key(handle);
        self.mailboxes.remove(handle);
        identity.is_some()
    }
}

// ----------------------------------------------------------------------------
// Identity Registry
// ----------------------------------------------------------------------------

/// Registry of live anonymous identities
pub struct IdentityRegistry {
    state: Mutex<RelayState>,
    config: RelayConfig,
    time_source: Arc<dyn TimeSource>,
}

impl core::fmt::Debug for IdentityRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IdentityRegistry")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl IdentityRegistry {
    /// Create a registry using the wall clock
    pub fn new(config: RelayConfig) -> Result<Self> {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    /// Create a registry with an injected clock
    pub fn with_time_source(config: RelayConfig, time_source: Arc<dyn TimeSource>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(RelayState::default()),
            config,
            time_source,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, RelayState>> {
        self.state.lock().map_err(|_| {
            error!("Relay state lock poisoned");
            RelayError::StatePoisoned
        })
    }

    // ------------------------------------------------------------------------
    // Session Lifecycle
    // ------------------------------------------------------------------------

    /// Register a new anonymous identity under `username`
    pub fn join(&self, username: &str) -> Result<JoinReceipt> {
        let username = normalize_username(username, &self.config).map_err(|e| {
            warn!("Rejected join: {}", e);
            e
        })?;

        let mut guard = self.lock()?;
        let state = &mut *guard;

        if state
            .identities
            .values()
            .any(|identity| identity.has_username(&username))
        {
            warn!("Rejected join: username {} already taken", username);
            return Err(RelayError::username_taken(username));
        }

        let identity = Identity::create(username, self.time_source.now());
        let handle = identity.handle();
        let token = identity.session_token();

        if state.identities.contains_key(&handle) || state.sessions.contains_key(&token) {
            error!("Identifier collision while creating identity {}", handle);
            return Err(RelayError::DuplicateIdentity { handle });
        }
        match state.vault.issue_key(handle) {
            Ok(record) => debug!("Issued key {} for identity {}", record.fingerprint(), handle),
            Err(e) => {
                error!("Key vault out of sync with registry: {}", e);
                return Err(e);
            }
        }

        let receipt = JoinReceipt {
            session_token: token,
            identity_handle: handle,
            username: identity.username().to_string(),
        };

        state.sessions.insert(token, handle);
        state.mailboxes.insert(handle, VecDeque::new());
        state.identities.insert(handle, identity);

        info!("Identity {} joined as {}", handle, receipt.username);
        Ok(receipt)
    }

    /// Resolve a session token and record activity
    pub fn touch(&self, token: &SessionToken) -> Result<IdentityHandle> {
        let now = self.time_source.now();
        let mut state = self.lock()?;
        let identity = state.identity_mut(token)?;
        identity.touch(now);
        Ok(identity.handle())
    }

    /// Resolve a session token without recording activity
    pub fn resolve(&self, token: &SessionToken) -> Result<IdentityHandle> {
        self.lock()?.resolve(token)
    }

    /// Erase the identity behind `token`; unknown tokens are a no-op
    pub fn leave(&self, token: &SessionToken) -> Result<()> {
        let mut state = self.lock()?;
        if let Ok(handle) = state.resolve(token) {
            state.erase(&handle);
            info!("Identity {} left", handle);
        } else {
            debug!("Leave for unknown session ignored");
        }
        Ok(())
    }

    /// Usernames of all live identities, for presence display
    pub fn list_usernames(&self) -> Result<Vec<String>> {
        let state = self.lock()?;
        let mut usernames: Vec<String> = state
            .identities
            .values()
            .map(|identity| identity.username().to_string())
            .collect();
        usernames.sort_by_key(|name| name.to_lowercase());
        Ok(usernames)
    }

    /// Erase every trace of `handle`; returns whether it was live
    pub fn erase(&self, handle: &IdentityHandle) -> Result<bool> {
        Ok(self.lock()?.erase(handle))
    }

    /// Erase every identity
    pub fn clear(&self) -> Result<usize> {
        let mut state = self.lock()?;
        let handles: Vec<IdentityHandle> = state.identities.keys().copied().collect();
        for handle in &handles {
            state.erase(handle);
        }
        info!("Erased all {} identities", handles.len());
        Ok(handles.len())
    }

    pub fn stats(&self) -> Result<RegistryStats> {
        let state = self.lock()?;
        Ok(RegistryStats {
            identities: state.identities.len(),
            sessions: state.sessions.len(),
            keys: state.vault.len(),
            cached_messages: state.mailboxes.values().map(VecDeque::len).sum(),
        })
    }

    // ------------------------------------------------------------------------
    // Expiry Support
    // ------------------------------------------------------------------------

    /// Snapshot of identities whose inactivity exceeds `threshold`
    pub fn inactive_handles(&self, threshold: Duration) -> Result<Vec<IdentityHandle>> {
        let now = self.time_source.now();
        let threshold_ms = threshold.as_millis() as u64;
        let state = self.lock()?;
        Ok(state
            .identities
            .values()
            .filter(|identity| identity.is_expired(now, threshold_ms))
            .map(Identity::handle)
            .collect())
    }

    /// Erase `handle` only if it is still live and still inactive
    pub fn expire_if_inactive(&self, handle: &IdentityHandle, threshold: Duration) -> Result<bool> {
        let now = self.time_source.now();
        let threshold_ms = threshold.as_millis() as u64;
        let mut state = self.lock()?;

        let still_expired = state
            .identities
            .get(handle)
            .is_some_and(|identity| identity.is_expired(now, threshold_ms));
        if !still_expired {
            return Ok(false);
        }
        Ok(state.erase(handle))
    }

    // ------------------------------------------------------------------------
    // Message Cache
    // ------------------------------------------------------------------------

    /// Encrypt and cache an outbound message for the sender behind `token`
    pub(crate) fn record_outbound(
        &self,
        token: &SessionToken,
        plaintext: &[u8],
        recipient: Recipient,
    ) -> Result<MessageRecord> {
        let now = self.time_source.now();
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let identity = state.identity_mut(token)?;
        check_message_body(plaintext, self.config.max_message_bytes)?;
        identity.touch(now);
        let handle = identity.handle();
        let sender_username = identity.username().to_string();

        let ciphertext = state.vault.encrypt(&handle, plaintext).map_err(|e| {
            error!("Encryption failed for identity {}: {}", handle, e);
            RelayError::send_failed(e.to_string())
        })?;

        let record = MessageRecord {
            id: MessageId::generate(),
            sender_handle: handle,
            sender_username,
            ciphertext,
            recipient,
            timestamp: now,
        };

        let mailbox = state.mailboxes.entry(handle).or_default();
        while mailbox.len() >= self.config.max_cached_messages {
            mailbox.pop_front();
        }
        mailbox.push_back(record.clone());

        Ok(record)
    }

    /// Decrypt the cached messages of the caller behind `token`
    pub(crate) fn read_mailbox(&self, token: &SessionToken) -> Result<Vec<FetchedMessage>> {
        let now = self.time_source.now();
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let identity = state.identity_mut(token)?;
        identity.touch(now);
        let handle = identity.handle();

        let Some(mailbox) = state.mailboxes.get(&handle) else {
            return Ok(Vec::new());
        };

        let messages = mailbox
            .iter()
            .map(|record| {
                let content = if record.sender_handle == handle {
                    match state.vault.decrypt(&handle, &record.ciphertext) {
                        Ok(bytes) => String::from_utf8(bytes)
                            .map(MessageContent::Plaintext)
                            .unwrap_or(MessageContent::Undecryptable),
                        Err(e) => {
                            debug!("Cached message {} unreadable: {}", record.id, e);
                            MessageContent::Undecryptable
                        }
                    }
                } else {
                    MessageContent::Undecryptable
                };
                FetchedMessage::from_record(record, content)
            })
            .collect();

        Ok(messages)
    }

    #[cfg(test)]
    pub(crate) fn poison_state(&self) {
        let _ = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let _guard = self.state.lock();
                    panic!("relay state poisoned on purpose");
                })
                .join()
        });
    }

    #[cfg(test)]
    fn corrupt_cached_message(&self, handle: &IdentityHandle, index: usize) {
        let mut state = self.lock().unwrap();
        let record = &mut state.mailboxes.get_mut(handle).unwrap()[index];
        let last = record.ciphertext.len() - 1;
        record.ciphertext[last] ^= 0xFF;
    }
}

fn check_message_body(plaintext: &[u8], limit: usize) -> Result<()> {
    if plaintext.is_empty() {
        return Err(RelayError::invalid_message("message must not be empty"));
    }
    if plaintext.len() > limit {
        return Err(RelayError::invalid_message(format!(
            "message is {} bytes, limit is {}",
            plaintext.len(),
            limit
        )));
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
