//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionStore`: the credential pair and identity record, mirrored
//!   in memory and persisted through a pluggable `StorageBackend`
//! - `SealedFileBackend`: encrypted-at-rest persistence with the
//!   sealing key held in the OS keychain
//! - `RefreshCoordinator`: single-flight session renewal
//! - `Capabilities`: the derived flags navigation guards read
//! - `PasswordVault`: optional remembered-password storage via keyring

pub mod credentials;
pub mod identity;
pub mod refresh;
pub mod sealed;
pub mod store;

pub use credentials::PasswordVault;
pub use identity::{Capabilities, IdentityRecord, PrivilegeLevel};
pub use refresh::{RefreshCoordinator, RefreshError};
pub use sealed::SealedFileBackend;
pub use store::{CredentialPair, MemoryBackend, SessionStore, StorageBackend};
