//! Session lifecycle tests
//!
//! End-to-end flows through the registry, router and reaper, including
//! concurrent joins and sends racing with erasure.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use vanish_core::*;

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn create_router() -> (MessageRouter, ManualTimeSource) {
    let clock = ManualTimeSource::new_at(1_700_000_000_000);
    let registry = Arc::new(
        IdentityRegistry::with_time_source(RelayConfig::default(), Arc::new(clock.clone()))
            .expect("default config is valid"),
    );
    (MessageRouter::without_transport(registry), clock)
}

fn assert_fully_erased(router: &MessageRouter, token: &SessionToken) {
    let registry = router.registry();
    assert_eq!(registry.resolve(token), Err(RelayError::InvalidSession));
    assert_eq!(registry.touch(token), Err(RelayError::InvalidSession));
    assert_eq!(
        router.fetch_messages(token).unwrap_err(),
        RelayError::InvalidSession
    );
    let oversized = "x".repeat(registry.config().max_message_bytes + 1);
    for body in ["still here?", "", oversized.as_str()] {
        assert_eq!(
            router
                .send_message(token, body, Recipient::Broadcast)
                .unwrap_err(),
            RelayError::InvalidSession
        );
    }
}

// ----------------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------------

#[test]
fn test_join_send_fetch_leave_scenario() {
    let (router, _) = create_router();
    let registry = router.registry();

    let alice = registry.join("alice").unwrap();
    assert_eq!(
        registry.join("Alice").unwrap_err(),
        RelayError::username_taken("Alice")
    );

    let message_id = router
        .send_message(&alice.session_token, "hi", Recipient::parse(Some("all")))
        .unwrap();

    let messages = router.fetch_messages(&alice.session_token).unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, message_id);
    assert_eq!(messages[0].sender_username, "alice");
    assert_eq!(messages[0].content, MessageContent::Plaintext("hi".to_string()));

    registry.leave(&alice.session_token).unwrap();
    assert_fully_erased(&router, &alice.session_token);
    assert_eq!(registry.stats().unwrap(), RegistryStats::default());
}

#[test]
fn test_expiry_erases_like_leave() {
    let (router, clock) = create_router();
    let registry = router.registry().clone();
    let reaper = ExpiryReaper::new(registry.clone());

    let alice = registry.join("alice").unwrap();
    let bob = registry.join("bob").unwrap();
    router
        .send_message(&alice.session_token, "one", Recipient::Broadcast)
        .unwrap();
    router
        .send_message(&bob.session_token, "two", Recipient::Broadcast)
        .unwrap();

    clock.advance(Duration::from_secs(25 * 60));
    router.fetch_messages(&bob.session_token).unwrap();
    clock.advance(Duration::from_secs(10 * 60));

    assert_eq!(reaper.sweep().unwrap(), 1);
    assert_fully_erased(&router, &alice.session_token);
    assert_eq!(
        registry.stats().unwrap(),
        RegistryStats {
            identities: 1,
            sessions: 1,
            keys: 1,
            cached_messages: 1,
        }
    );
}

#[test]
fn test_messages_are_returned_in_arrival_order() {
    let (router, clock) = create_router();
    let alice = router.registry().join("alice").unwrap();

    for i in 0..5 {
        clock.advance(Duration::from_millis(10));
        router
            .send_message(&alice.session_token, &format!("msg {}", i), Recipient::Broadcast)
            .unwrap();
    }

    let messages = router.fetch_messages(&alice.session_token).unwrap();
    let texts: Vec<&str> = messages
        .iter()
        .filter_map(|m| m.content.as_plaintext())
        .collect();
    assert_eq!(texts, vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    assert!(messages.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

// ----------------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------------

#[test]
fn test_concurrent_joins_admit_one_per_username() {
    let registry = Arc::new(IdentityRegistry::new(RelayConfig::default()).unwrap());
    let variants = ["alice", "Alice", "ALICE", "aLiCe", "alicE", "ALIce", "aliCE", "AlIcE"];
    let barrier = Arc::new(Barrier::new(variants.len()));

    let handles: Vec<_> = variants
        .iter()
        .map(|name| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            let name = name.to_string();
            thread::spawn(move || {
                barrier.wait();
                registry.join(&name)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, RelayError::UsernameTaken { .. })));
    assert_eq!(registry.stats().unwrap().identities, 1);
}

#[test]
fn test_sends_racing_with_leave_see_consistent_state() {
    let registry = Arc::new(IdentityRegistry::new(RelayConfig::default()).unwrap());
    let router = MessageRouter::without_transport(registry.clone());
    let alice = registry.join("alice").unwrap();
    let barrier = Arc::new(Barrier::new(5));

    let senders: Vec<_> = (0..4)
        .map(|_| {
            let router = router.clone();
            let barrier = barrier.clone();
            let token = alice.session_token;
            thread::spawn(move || {
                barrier.wait();
                (0..200)
                    .map(|i| router.send_message(&token, &format!("{}", i), Recipient::Broadcast))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    barrier.wait();
    registry.leave(&alice.session_token).unwrap();

    for sender in senders {
        for result in sender.join().unwrap() {
            match result {
                Ok(_) | Err(RelayError::InvalidSession) => {}
                Err(other) => panic!("unexpected send error: {:?}", other),
            }
        }
    }

    assert_eq!(registry.stats().unwrap(), RegistryStats::default());
}

#[test]
fn test_fetch_racing_with_sweep() {
    let clock = ManualTimeSource::new_at(0);
    let registry = Arc::new(
        IdentityRegistry::with_time_source(RelayConfig::default(), Arc::new(clock.clone()))
            .unwrap(),
    );
    let router = MessageRouter::without_transport(registry.clone());
    let reaper = ExpiryReaper::new(registry.clone());

    let alice = registry.join("alice").unwrap();
    router
        .send_message(&alice.session_token, "hello", Recipient::Broadcast)
        .unwrap();
    clock.advance(Duration::from_secs(31 * 60));

    let fetcher = {
        let router = router.clone();
        let token = alice.session_token;
        thread::spawn(move || router.fetch_messages(&token))
    };
    reaper.sweep().unwrap();

    match fetcher.join().unwrap() {
        // Fetch won the race: full, readable history and a refreshed session
        Ok(messages) => {
            assert_eq!(messages.len(), 1);
            assert_eq!(messages[0].content.as_plaintext(), Some("hello"));
        }
        Err(e) => assert_eq!(e, RelayError::InvalidSession),
    }
}
