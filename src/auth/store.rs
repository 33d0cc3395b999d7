//! Session store holding the credential pair and identity record.
//!
//! The store keeps an in-memory mirror as the authoritative copy and
//! writes through to a pluggable key-value backend so sessions survive
//! process restarts. Writes are serialized behind one mutex; the store
//! trusts its callers and performs no validation.
//!
//! Capability changes are published on a watch channel so the navigation
//! layer can react to login, logout, and session termination.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::warn;

use super::identity::{Capabilities, IdentityRecord};

/// Storage slot for the bearer credential attached to authenticated calls
const ACCESS_SLOT: &str = "access_credential";

/// Storage slot for the credential used to renew an expired session
const REFRESH_SLOT: &str = "refresh_credential";

/// Storage slot for the serialized identity record
const IDENTITY_SLOT: &str = "identity_record";

/// Storage slot recording when the current credential pair was granted
const ISSUED_AT_SLOT: &str = "issued_at";

/// The credential pair granted at login or refresh.
///
/// The refresh credential is absent for sessions that cannot be renewed,
/// such as platform-owner sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: Option<String>,
}

/// Durable string-keyed storage behind the session store.
///
/// Implementations must tolerate reads of keys that were never written
/// and deletes of keys that are already absent.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;

    /// Apply several writes and deletes as one batch.
    ///
    /// Backends with a single underlying file override this so a
    /// credential pair is never persisted half-updated.
    fn write_many(&self, entries: &[(&str, Option<&str>)]) -> Result<()> {
        for (key, value) in entries {
            match value {
                Some(value) => self.write(key, value)?,
                None => self.delete(key)?,
            }
        }
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    slots: Mutex<HashMap<String, String>>,
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(key);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    credentials: Option<CredentialPair>,
    identity: Option<IdentityRecord>,
    issued_at: Option<DateTime<Utc>>,
}

/// The one mutable shared resource of the session layer.
///
/// Exactly three call sites write to it: interactive login, a successful
/// refresh, and termination (logout or refresh failure). The in-memory
/// mirror is authoritative; backend persistence failures are logged and
/// do not roll the mirror back.
pub struct SessionStore {
    backend: Box<dyn StorageBackend>,
    inner: Mutex<StoreInner>,
    capabilities: watch::Sender<Capabilities>,
}

impl SessionStore {
    /// Open a store over the given backend, restoring any persisted session.
    ///
    /// Unreadable or unparsable slots are treated as absent so a damaged
    /// session file degrades to "logged out" rather than an error.
    pub fn open(backend: Box<dyn StorageBackend>) -> Self {
        let access = Self::restore_slot(backend.as_ref(), ACCESS_SLOT);
        let refresh = Self::restore_slot(backend.as_ref(), REFRESH_SLOT);
        let credentials = access.map(|access| CredentialPair { access, refresh });

        let identity = Self::restore_slot(backend.as_ref(), IDENTITY_SLOT).and_then(|raw| {
            match serde_json::from_str(&raw) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "stored identity record is unreadable, ignoring");
                    None
                }
            }
        });

        let issued_at = Self::restore_slot(backend.as_ref(), ISSUED_AT_SLOT).and_then(|raw| {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    warn!(error = %e, "stored issue timestamp is unreadable, ignoring");
                    None
                }
            }
        });

        let (capabilities, _) = watch::channel(Capabilities::resolve(identity.as_ref()));
        Self {
            backend,
            inner: Mutex::new(StoreInner {
                credentials,
                identity,
                issued_at,
            }),
            capabilities,
        }
    }

    /// Open a store with no persistence beyond the process lifetime
    pub fn in_memory() -> Self {
        Self::open(Box::new(MemoryBackend::default()))
    }

    fn restore_slot(backend: &dyn StorageBackend, key: &str) -> Option<String> {
        match backend.read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(slot = key, error = %e, "failed to read session slot");
                None
            }
        }
    }

    /// Current credential pair, if a session exists
    pub fn credentials(&self) -> Option<CredentialPair> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.credentials.clone()
    }

    /// Replace the credential pair, stamping the grant time.
    pub fn set_credentials(&self, pair: CredentialPair) {
        let issued_at = Utc::now();
        let stamp = issued_at.to_rfc3339();

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let persisted = self.backend.write_many(&[
            (ACCESS_SLOT, Some(pair.access.as_str())),
            (REFRESH_SLOT, pair.refresh.as_deref()),
            (ISSUED_AT_SLOT, Some(stamp.as_str())),
        ]);
        if let Err(e) = persisted {
            warn!(error = %e, "failed to persist credentials, session will not survive restart");
        }
        inner.credentials = Some(pair);
        inner.issued_at = Some(issued_at);
    }

    /// Current identity record, if a session exists
    pub fn identity(&self) -> Option<IdentityRecord> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.identity.clone()
    }

    /// Replace the identity record and publish the derived capabilities.
    pub fn set_identity(&self, record: IdentityRecord) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            match serde_json::to_string(&record) {
                Ok(serialized) => {
                    if let Err(e) = self.backend.write(IDENTITY_SLOT, &serialized) {
                        warn!(error = %e, "failed to persist identity record");
                    }
                }
                Err(e) => warn!(error = %e, "failed to serialize identity record"),
            }
            inner.identity = Some(record);
        }
        self.publish();
    }

    /// When the current credential pair was granted, if known
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.issued_at
    }

    /// Erase the session entirely: credentials, identity, and grant time.
    pub fn clear(&self) {
        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = self.backend.write_many(&[
                (ACCESS_SLOT, None),
                (REFRESH_SLOT, None),
                (IDENTITY_SLOT, None),
                (ISSUED_AT_SLOT, None),
            ]) {
                warn!(error = %e, "failed to clear persisted session");
            }
            *inner = StoreInner::default();
        }
        self.publish();
    }

    /// Capability flags derived from the current identity
    pub fn capabilities(&self) -> Capabilities {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Capabilities::resolve(inner.identity.as_ref())
    }

    /// Watch capability changes; receivers wake on login, logout, and
    /// session termination.
    pub fn subscribe(&self) -> watch::Receiver<Capabilities> {
        self.capabilities.subscribe()
    }

    fn publish(&self) {
        let caps = self.capabilities();
        self.capabilities.send_replace(caps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::PrivilegeLevel;

    fn member_record() -> IdentityRecord {
        IdentityRecord::Member {
            name: "Dana Whitfield".to_string(),
            privilege: PrivilegeLevel::Administrator,
        }
    }

    #[test]
    fn test_set_and_get_credentials() {
        let store = SessionStore::in_memory();
        assert!(store.credentials().is_none());

        store.set_credentials(CredentialPair {
            access: "access-one".to_string(),
            refresh: Some("refresh-one".to_string()),
        });

        let pair = store.credentials().expect("credentials present");
        assert_eq!(pair.access, "access-one");
        assert_eq!(pair.refresh.as_deref(), Some("refresh-one"));
        assert!(store.issued_at().is_some());
    }

    #[test]
    fn test_clear_erases_everything() {
        let store = SessionStore::in_memory();
        store.set_credentials(CredentialPair {
            access: "access-one".to_string(),
            refresh: None,
        });
        store.set_identity(member_record());

        store.clear();

        assert!(store.credentials().is_none());
        assert!(store.identity().is_none());
        assert!(store.issued_at().is_none());
        assert!(!store.capabilities().authenticated);
    }

    #[test]
    fn test_capabilities_follow_identity() {
        let store = SessionStore::in_memory();
        assert!(!store.capabilities().authenticated);

        store.set_identity(member_record());
        let caps = store.capabilities();
        assert!(caps.authenticated);
        assert!(caps.administrator);
        assert!(!caps.owner);
    }

    #[test]
    fn test_subscribers_observe_termination() {
        let store = SessionStore::in_memory();
        store.set_identity(member_record());

        let rx = store.subscribe();
        assert!(rx.borrow().authenticated);

        store.clear();
        assert!(!rx.borrow().authenticated);
    }

    #[test]
    fn test_restore_from_backend() {
        let backend = MemoryBackend::default();
        backend.write(ACCESS_SLOT, "access-one").unwrap();
        backend.write(REFRESH_SLOT, "refresh-one").unwrap();
        backend
            .write(IDENTITY_SLOT, r#"{"kind":"owner","name":"Priya Nair"}"#)
            .unwrap();

        let store = SessionStore::open(Box::new(backend));

        let pair = store.credentials().expect("restored credentials");
        assert_eq!(pair.access, "access-one");
        assert_eq!(pair.refresh.as_deref(), Some("refresh-one"));
        assert!(store.capabilities().owner);
    }

    #[test]
    fn test_restore_ignores_corrupt_identity() {
        let backend = MemoryBackend::default();
        backend.write(ACCESS_SLOT, "access-one").unwrap();
        backend.write(IDENTITY_SLOT, "not json at all").unwrap();

        let store = SessionStore::open(Box::new(backend));

        assert!(store.credentials().is_some());
        assert!(store.identity().is_none());
        assert!(!store.capabilities().authenticated);
    }

    #[test]
    fn test_restore_without_access_credential_is_logged_out() {
        let backend = MemoryBackend::default();
        backend.write(REFRESH_SLOT, "refresh-one").unwrap();

        let store = SessionStore::open(Box::new(backend));

        assert!(store.credentials().is_none());
    }
}
