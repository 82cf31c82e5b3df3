//! Message routing between clients, the key vault and the transport
//!
//! Sending encrypts under the sender's key, caches the record in the sender's
//! own mailbox and then hands it to the [`MessageSink`]. Fetching returns the
//! caller's cache decrypted, which is the only read path the relay offers.

use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::message::{FetchedMessage, MessageSink, NullSink, Recipient};
use crate::registry::IdentityRegistry;
use crate::types::{MessageId, SessionToken};

/// Routes outbound messages and serves mailbox reads
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<IdentityRegistry>,
    sink: Arc<dyn MessageSink>,
}

impl core::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("registry", &self.registry)
            .field("sink", &"<MessageSink>")
            .finish()
    }
}

impl MessageRouter {
    /// Create a router delivering to `sink`
    pub fn new(registry: Arc<IdentityRegistry>, sink: Arc<dyn MessageSink>) -> Self {
        Self { registry, sink }
    }

    /// Create a router whose broadcasts go nowhere
    pub fn without_transport(registry: Arc<IdentityRegistry>) -> Self {
        Self::new(registry, Arc::new(NullSink))
    }

    pub fn registry(&self) -> &Arc<IdentityRegistry> {
        &self.registry
    }

    /// Encrypt and broadcast a message from the identity behind `token`
    ///
    /// The session is checked before the message body, so a dead token is
    /// always reported as `InvalidSession`.
    pub fn send_message(
        &self,
        token: &SessionToken,
        plaintext: &str,
        recipient: Recipient,
    ) -> Result<MessageId> {
        let record = self
            .registry
            .record_outbound(token, plaintext.as_bytes(), recipient)?;

        debug!(
            "Identity {} sent message {} to {}",
            record.sender_handle, record.id, record.recipient
        );
        self.sink.deliver(&record);
        Ok(record.id)
    }

    /// Decrypted copy of the caller's cached messages, oldest first
    pub fn fetch_messages(&self, token: &SessionToken) -> Result<Vec<FetchedMessage>> {
        let messages = self.registry.read_mailbox(token)?;
        debug!("Fetched {} cached messages", messages.len());
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::errors::RelayError;
    use crate::message::MessageRecord;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<MessageRecord>>,
    }

    impl MessageSink for RecordingSink {
        fn deliver(&self, record: &MessageRecord) {
            self.delivered.lock().unwrap().push(record.clone());
        }
    }

    fn router_with_sink() -> (MessageRouter, Arc<RecordingSink>) {
        let registry = Arc::new(IdentityRegistry::new(RelayConfig::default()).unwrap());
        let sink = Arc::new(RecordingSink::default());
        (MessageRouter::new(registry, sink.clone()), sink)
    }

    #[test]
    fn test_send_delivers_to_sink() {
        let (router, sink) = router_with_sink();
        let alice = router.registry().join("alice").unwrap();

        let id = router
            .send_message(&alice.session_token, "hi", Recipient::Broadcast)
            .unwrap();

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].id, id);
        assert_eq!(delivered[0].sender_username, "alice");
        assert_eq!(delivered[0].recipient, Recipient::Broadcast);
    }

    #[test]
    fn test_send_rejects_empty_and_oversized() {
        let (router, sink) = router_with_sink();
        let alice = router.registry().join("alice").unwrap();

        assert!(matches!(
            router.send_message(&alice.session_token, "", Recipient::Broadcast),
            Err(RelayError::InvalidMessage { .. })
        ));
        let huge = "x".repeat(RelayConfig::default().max_message_bytes + 1);
        assert!(matches!(
            router.send_message(&alice.session_token, &huge, Recipient::Broadcast),
            Err(RelayError::InvalidMessage { .. })
        ));
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dead_session_wins_over_bad_body() {
        let (router, sink) = router_with_sink();
        let alice = router.registry().join("alice").unwrap();
        router.registry().leave(&alice.session_token).unwrap();

        let huge = "x".repeat(RelayConfig::default().max_message_bytes + 1);
        for body in ["", huge.as_str()] {
            assert_eq!(
                router
                    .send_message(&alice.session_token, body, Recipient::Broadcast)
                    .unwrap_err(),
                RelayError::InvalidSession
            );
        }
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_session_sends_nothing() {
        let (router, sink) = router_with_sink();
        let token = SessionToken::generate();

        assert_eq!(
            router
                .send_message(&token, "hi", Recipient::Broadcast)
                .unwrap_err(),
            RelayError::InvalidSession
        );
        assert_eq!(
            router.fetch_messages(&token).unwrap_err(),
            RelayError::InvalidSession
        );
        assert!(sink.delivered.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fetch_is_private_to_sender() {
        let (router, _) = router_with_sink();
        let alice = router.registry().join("alice").unwrap();
        let bob = router.registry().join("bob").unwrap();

        router
            .send_message(&alice.session_token, "from alice", Recipient::User("bob".into()))
            .unwrap();

        assert_eq!(router.fetch_messages(&alice.session_token).unwrap().len(), 1);
        assert!(router.fetch_messages(&bob.session_token).unwrap().is_empty());
    }
}
