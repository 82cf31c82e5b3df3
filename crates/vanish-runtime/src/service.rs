//! Relay service facade
//!
//! [`RelayService`] is the single entry point the transport layer talks to.
//! It owns the process-wide registry, routes messages through the broadcast
//! sink and runs the expiry reaper in the background.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::info;
use vanish_core::{
    ExpiryReaper, FetchedMessage, IdentityRegistry, JoinReceipt, MessageId, MessageRecord,
    MessageRouter, Recipient, RegistryStats, RelayConfig, RelayError, RelayResult, SessionToken,
};

use crate::reaper_task::{ReaperHandle, ReaperTask};
use crate::sink::BroadcastSink;

/// Process-scoped relay state plus its background reaper
#[derive(Debug)]
pub struct RelayService {
    registry: Arc<IdentityRegistry>,
    router: MessageRouter,
    sink: Arc<BroadcastSink>,
    reaper: Mutex<Option<ReaperHandle>>,
}

impl RelayService {
    pub(crate) fn from_parts(registry: Arc<IdentityRegistry>) -> Self {
        let sink = Arc::new(BroadcastSink::new(registry.config().broadcast_capacity));
        let router = MessageRouter::new(registry.clone(), sink.clone());
        Self {
            registry,
            router,
            sink,
            reaper: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        self.registry.config()
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Start the expiry reaper; must be called from within a tokio runtime
    pub fn start(&self) -> RelayResult<()> {
        let mut reaper = self.reaper.lock().map_err(|_| RelayError::StatePoisoned)?;
        if reaper.is_some() {
            return Err(RelayError::config_error("expiry reaper already running"));
        }

        let handle = ReaperTask::spawn(
            ExpiryReaper::new(self.registry.clone()),
            self.config().cleanup_interval(),
        );
        *reaper = Some(handle);
        info!("Relay service started");
        Ok(())
    }

    /// Stop the expiry reaper if it is running
    pub async fn stop(&self) {
        let handle = match self.reaper.lock() {
            Ok(mut reaper) => reaper.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.stop().await;
            info!("Relay service stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.reaper
            .lock()
            .map(|reaper| reaper.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Sweeps completed by the running reaper, if any
    pub fn reaper_sweeps(&self) -> Option<u64> {
        self.reaper
            .lock()
            .ok()
            .and_then(|reaper| reaper.as_ref().map(ReaperHandle::sweeps_completed))
    }

    // ------------------------------------------------------------------------
    // Inbound Operations
    // ------------------------------------------------------------------------

    pub fn join(&self, username: &str) -> RelayResult<JoinReceipt> {
        self.registry.join(username)
    }

    /// Send a message; `recipient` of `None` or `"all"` broadcasts
    pub fn send_message(
        &self,
        token: &SessionToken,
        message: &str,
        recipient: Option<&str>,
    ) -> RelayResult<MessageId> {
        self.router
            .send_message(token, message, Recipient::parse(recipient))
    }

    pub fn fetch_messages(&self, token: &SessionToken) -> RelayResult<Vec<FetchedMessage>> {
        self.router.fetch_messages(token)
    }

    pub fn leave(&self, token: &SessionToken) -> RelayResult<()> {
        self.registry.leave(token)
    }

    pub fn list_usernames(&self) -> RelayResult<Vec<String>> {
        self.registry.list_usernames()
    }

    pub fn stats(&self) -> RelayResult<RegistryStats> {
        self.registry.stats()
    }

    /// Receive every message sent after this call
    pub fn subscribe(&self) -> broadcast::Receiver<MessageRecord> {
        self.sink.subscribe()
    }

    /// Erase all identities immediately
    pub fn wipe(&self) -> RelayResult<usize> {
        self.registry.clear()
    }
}
