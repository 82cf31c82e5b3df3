//! Property-based tests for the key vault and username uniqueness
//!
//! These tests verify round-trip correctness, nonce freshness, and that
//! ciphertexts are bound to the identity they were produced for.

use proptest::prelude::*;
use vanish_core::{IdentityHandle, IdentityRegistry, KeyVault, RelayConfig, RelayError};

/// Generate arbitrary identity handles
fn arb_handle() -> impl Strategy<Value = IdentityHandle> {
    any::<[u8; 16]>().prop_map(IdentityHandle::new)
}

/// Generate arbitrary plaintexts, including empty ones
fn arb_plaintext() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Generate valid usernames
fn arb_username() -> impl Strategy<Value = String> {
    prop::string::string_regex(r"[a-zA-Z][a-zA-Z0-9_]{2,15}").unwrap()
}

proptest! {
    /// Property: decrypt(encrypt(p)) == p
    #[test]
    fn roundtrip(handle in arb_handle(), plaintext in arb_plaintext()) {
        let mut vault = KeyVault::new();
        vault.issue_key(handle).unwrap();

        let ciphertext = vault.encrypt(&handle, &plaintext).unwrap();
        prop_assert_eq!(vault.decrypt(&handle, &ciphertext).unwrap(), plaintext);
    }

    /// Property: encrypting the same plaintext twice never repeats a ciphertext
    #[test]
    fn nonce_freshness(handle in arb_handle(), plaintext in arb_plaintext()) {
        let mut vault = KeyVault::new();
        vault.issue_key(handle).unwrap();

        let first = vault.encrypt(&handle, &plaintext).unwrap();
        let second = vault.encrypt(&handle, &plaintext).unwrap();
        prop_assert_ne!(first, second);
    }

    /// Property: a ciphertext for B never opens under A
    #[test]
    fn key_binding(a in arb_handle(), b in arb_handle(), plaintext in arb_plaintext()) {
        prop_assume!(a != b);
        let mut vault = KeyVault::new();
        vault.issue_key(a).unwrap();
        vault.issue_key(b).unwrap();

        let for_b = vault.encrypt(&b, &plaintext).unwrap();
        prop_assert_eq!(
            vault.decrypt(&a, &for_b).unwrap_err(),
            RelayError::DecryptionFailed { handle: a }
        );
    }

    /// Property: arbitrary bytes never panic the decrypt path
    #[test]
    fn malformed_input_is_rejected(handle in arb_handle(), garbage in arb_plaintext()) {
        let mut vault = KeyVault::new();
        vault.issue_key(handle).unwrap();

        prop_assert!(matches!(
            vault.decrypt(&handle, &garbage),
            Err(RelayError::DecryptionFailed { .. })
        ), "expected DecryptionFailed for malformed input");
    }

    /// Property: any case variant of a live username is rejected
    #[test]
    fn case_variants_are_taken(
        name in arb_username(),
        flips in prop::collection::vec(any::<bool>(), 16),
    ) {
        let registry = IdentityRegistry::new(RelayConfig::default()).unwrap();
        registry.join(&name).unwrap();

        let variant: String = name
            .chars()
            .zip(flips.iter().cycle())
            .map(|(c, flip)| if *flip { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            .collect();

        let is_taken = matches!(registry.join(&variant), Err(RelayError::UsernameTaken { .. }));
        prop_assert!(is_taken);
    }
}
