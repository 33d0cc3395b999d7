//! Encrypted-at-rest file backend for the session store.
//!
//! Session slots are kept in one file sealed with XChaCha20-Poly1305.
//! The sealing key is random, stored in the OS keychain, and never
//! derived from user input. A file that cannot be unsealed is treated
//! as absent so the worst case is a logged-out session, never a crash.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use keyring::Entry;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

use super::store::StorageBackend;

/// Keyring service name under which the sealing key is kept
const KEYRING_SERVICE: &str = "coffer";

/// Keyring account name for the sealing key
const KEYRING_ACCOUNT: &str = "session-sealing-key";

/// XChaCha20-Poly1305 nonce length, prefixed to the sealed file
const NONCE_LEN: usize = 24;

/// Sealing key length in bytes
const KEY_LEN: usize = 32;

/// Storage backend that seals all slots into a single encrypted file.
pub struct SealedFileBackend {
    path: PathBuf,
    cipher: XChaCha20Poly1305,
    slots: Mutex<BTreeMap<String, String>>,
}

impl SealedFileBackend {
    /// Open the backend at `path`, fetching or creating the sealing key
    /// in the OS keychain.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let key = Self::load_or_create_key()?;
        Ok(Self::with_key(path, &key))
    }

    /// Open the backend with an explicit sealing key, bypassing the
    /// keychain. Used by tests and by hosts that manage keys themselves.
    pub fn with_key(path: impl Into<PathBuf>, key: &[u8; KEY_LEN]) -> Self {
        let path = path.into();
        let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
        let slots = Mutex::new(Self::unseal(&path, &cipher));
        Self {
            path,
            cipher,
            slots,
        }
    }

    fn load_or_create_key() -> Result<[u8; KEY_LEN]> {
        let entry = Entry::new(KEYRING_SERVICE, KEYRING_ACCOUNT)
            .context("Failed to create keyring entry for sealing key")?;

        match entry.get_password() {
            Ok(encoded) => match Self::decode_key(&encoded) {
                Some(key) => Ok(key),
                None => {
                    warn!("stored sealing key is malformed, replacing it");
                    Self::create_key(&entry)
                }
            },
            Err(keyring::Error::NoEntry) => Self::create_key(&entry),
            Err(e) => Err(e).context("Failed to read sealing key from keychain"),
        }
    }

    fn create_key(entry: &Entry) -> Result<[u8; KEY_LEN]> {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        entry
            .set_password(&BASE64.encode(key))
            .context("Failed to store sealing key in keychain")?;
        Ok(key)
    }

    fn decode_key(encoded: &str) -> Option<[u8; KEY_LEN]> {
        let bytes = BASE64.decode(encoded).ok()?;
        bytes.try_into().ok()
    }

    /// Decrypt the sealed file into the slot map. Any failure along the
    /// way degrades to an empty map.
    fn unseal(path: &Path, cipher: &XChaCha20Poly1305) -> BTreeMap<String, String> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(error = %e, "failed to read sealed session file, starting empty");
                return BTreeMap::new();
            }
        };

        if bytes.len() < NONCE_LEN {
            warn!("sealed session file is truncated, starting empty");
            return BTreeMap::new();
        }

        let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = match cipher.decrypt(XNonce::from_slice(nonce), ciphertext) {
            Ok(plaintext) => plaintext,
            Err(_) => {
                warn!("sealed session file cannot be opened with the current key, starting empty");
                return BTreeMap::new();
            }
        };

        match serde_json::from_slice(&plaintext) {
            Ok(slots) => slots,
            Err(e) => {
                warn!(error = %e, "sealed session file contents are malformed, starting empty");
                BTreeMap::new()
            }
        }
    }

    fn seal(&self, slots: &BTreeMap<String, String>) -> Result<()> {
        let plaintext = serde_json::to_vec(slots).context("Failed to serialize session slots")?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| anyhow!("Failed to seal session file: {e}"))?;

        let mut contents = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        contents.extend_from_slice(&nonce);
        contents.extend_from_slice(&ciphertext);

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        std::fs::write(&self.path, contents).context("Failed to write sealed session file")?;
        Ok(())
    }
}

impl StorageBackend for SealedFileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(key.to_string(), value.to_string());
        self.seal(&slots)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.remove(key).is_some() {
            self.seal(&slots)?;
        }
        Ok(())
    }

    fn write_many(&self, entries: &[(&str, Option<&str>)]) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        for (key, value) in entries {
            match value {
                Some(value) => {
                    slots.insert((*key).to_string(), (*value).to_string());
                }
                None => {
                    slots.remove(*key);
                }
            }
        }
        self.seal(&slots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: [u8; KEY_LEN] = [7u8; KEY_LEN];

    #[test]
    fn test_roundtrip_through_reopen() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("session.sealed");

        let backend = SealedFileBackend::with_key(&path, &TEST_KEY);
        backend.write("access_credential", "access-one").unwrap();
        backend.write("refresh_credential", "refresh-one").unwrap();
        drop(backend);

        let reopened = SealedFileBackend::with_key(&path, &TEST_KEY);
        assert_eq!(
            reopened.read("access_credential").unwrap().as_deref(),
            Some("access-one")
        );
        assert_eq!(
            reopened.read("refresh_credential").unwrap().as_deref(),
            Some("refresh-one")
        );
    }

    #[test]
    fn test_file_on_disk_is_not_plaintext() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("session.sealed");

        let backend = SealedFileBackend::with_key(&path, &TEST_KEY);
        backend.write("refresh_credential", "refresh-secret").unwrap();

        let raw = std::fs::read(&path).expect("sealed file exists");
        let needle = b"refresh-secret";
        assert!(!raw.windows(needle.len()).any(|window| window == needle));
    }

    #[test]
    fn test_wrong_key_starts_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("session.sealed");

        let backend = SealedFileBackend::with_key(&path, &TEST_KEY);
        backend.write("access_credential", "access-one").unwrap();
        drop(backend);

        let other_key = [9u8; KEY_LEN];
        let reopened = SealedFileBackend::with_key(&path, &other_key);
        assert!(reopened.read("access_credential").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("session.sealed");
        std::fs::write(&path, b"definitely not a sealed session").unwrap();

        let backend = SealedFileBackend::with_key(&path, &TEST_KEY);
        assert!(backend.read("access_credential").unwrap().is_none());
    }

    #[test]
    fn test_write_many_applies_batch() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("session.sealed");

        let backend = SealedFileBackend::with_key(&path, &TEST_KEY);
        backend.write("refresh_credential", "refresh-one").unwrap();

        backend
            .write_many(&[
                ("access_credential", Some("access-two")),
                ("refresh_credential", None),
            ])
            .unwrap();

        assert_eq!(
            backend.read("access_credential").unwrap().as_deref(),
            Some("access-two")
        );
        assert!(backend.read("refresh_credential").unwrap().is_none());
    }
}
