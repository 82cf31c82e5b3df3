//! Per-identity key vault
//!
//! Every identity gets exactly one ChaCha20-Poly1305 key for the lifetime of
//! its session. Ciphertexts are bound to the identity handle through the AEAD
//! associated data, and revoking a key zeroizes it, which leaves every
//! ciphertext produced under it permanently unreadable.
//!
//! Ciphertext layout: `nonce (12 bytes) || ciphertext || tag (16 bytes)`.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hashbrown::HashMap;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::{RelayError, Result};
use crate::types::IdentityHandle;

/// Nonce length for ChaCha20-Poly1305
pub const NONCE_SIZE: usize = 12;

/// Authentication tag length
pub const TAG_SIZE: usize = 16;

// ----------------------------------------------------------------------------
// Key Record
// ----------------------------------------------------------------------------

/// Symmetric key owned by a single identity
///
/// Key bytes never leave the vault and are wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyRecord {
    #[zeroize(skip)]
    handle: IdentityHandle,
    key: [u8; 32],
}

impl KeyRecord {
    fn generate(handle: IdentityHandle) -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { handle, key }
    }

    /// Short non-reversible fingerprint of the key, for diagnostics
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key);
        hex::encode(&digest[..8])
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.key))
    }
}

impl core::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("handle", &self.handle)
            .field("key", &"<redacted>")
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Key Vault
// ----------------------------------------------------------------------------

/// Issues, uses and revokes per-identity keys
#[derive(Debug, Default)]
pub struct KeyVault {
    keys: HashMap<IdentityHandle, KeyRecord>,
}

impl KeyVault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh random key for `handle`
    ///
    /// An existing key is never overwritten.
    pub fn issue_key(&mut self, handle: IdentityHandle) -> Result<&KeyRecord> {
        if self.keys.contains_key(&handle) {
            return Err(RelayError::DuplicateIdentity { handle });
        }
        Ok(self
            .keys
            .entry(handle)
            .or_insert_with(|| KeyRecord::generate(handle)))
    }

    /// Encrypt `plaintext` under the key of `handle` with a fresh nonce
    pub fn encrypt(&self, handle: &IdentityHandle, plaintext: &[u8]) -> Result<Vec<u8>> {
        let record = self
            .keys
            .get(handle)
            .ok_or(RelayError::UnknownIdentity { handle: *handle })?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let sealed = record
            .cipher()
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: plaintext,
                    aad: handle.as_bytes(),
                },
            )
            .map_err(|_| RelayError::send_failed("encryption failed"))?;

        let mut output = Vec::with_capacity(NONCE_SIZE + sealed.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&sealed);
        Ok(output)
    }

    /// Decrypt a ciphertext produced by [`KeyVault::encrypt`] for `handle`
    pub fn decrypt(&self, handle: &IdentityHandle, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let record = self
            .keys
            .get(handle)
            .ok_or(RelayError::UnknownIdentity { handle: *handle })?;

        if ciphertext.len() < NONCE_SIZE + TAG_SIZE {
            return Err(RelayError::DecryptionFailed { handle: *handle });
        }
        let (nonce, sealed) = ciphertext.split_at(NONCE_SIZE);

        record
            .cipher()
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: handle.as_bytes(),
                },
            )
            .map_err(|_| RelayError::DecryptionFailed { handle: *handle })
    }

    /// Remove and wipe the key of `handle`; returns whether one existed
    pub fn revoke_key(&mut self, handle: &IdentityHandle) -> bool {
        self.keys.remove(handle).is_some()
    }

    /// Whether a key exists for `handle`
    pub fn contains(&self, handle: &IdentityHandle) -> bool {
        self.keys.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
