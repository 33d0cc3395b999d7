//! Core library for Coffer - an administrative console for a
//! multi-tenant organization's financial records.
//!
//! This crate is the client the console sits on: the authenticated API
//! client with its single-flight session-refresh coordinator, session
//! and credential persistence, identity resolution, and typed wrappers
//! for the org-scoped endpoints.
//!
//! A typical consumer wires it up like this:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use coffer_core::auth::{SealedFileBackend, SessionStore};
//! use coffer_core::{ApiClient, Config};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let backend = SealedFileBackend::open(Config::session_path()?)?;
//! let store = Arc::new(SessionStore::open(Box::new(backend)));
//! let client = ApiClient::new(config.base_url.clone(), Arc::clone(&store))?;
//!
//! let mut capabilities = client.subscribe();
//! // navigation guards react to capability changes; a transition to
//! // authenticated == false after a failed refresh sends the user
//! // back to the login screen.
//! # let _ = capabilities.changed().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{Capabilities, IdentityRecord, PrivilegeLevel, SessionStore};
pub use config::Config;
