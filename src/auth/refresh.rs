//! Single-flight coordination of session refresh.
//!
//! However many requests observe an expired session at once, at most
//! one refresh exchange is ever in flight. The coordinator keeps an
//! optional shared future in a mutex-guarded slot; concurrent callers
//! clone and await the same future, and the slot is emptied the moment
//! the exchange settles.
//!
//! Refresh failure is terminal for the session and never retried here.
//! Clearing the store on failure is the request pipeline's job, so
//! login, successful refresh, and termination remain the only three
//! writers of session state.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::api::exchange::AuthExchange;

use super::store::{CredentialPair, SessionStore};

/// Upper bound on one refresh exchange in seconds.
/// A hung exchange is treated the same as a failed one.
const REFRESH_TIMEOUT_SECS: u64 = 10;

/// Why a session could not be renewed.
///
/// Cloneable because every caller awaiting the same in-flight refresh
/// receives the same outcome.
#[derive(Error, Debug, Clone)]
pub enum RefreshError {
    #[error("No refresh credential is available for this session")]
    Unavailable,

    #[error("Refresh exchange failed: {0}")]
    Exchange(String),

    #[error("Refresh exchange timed out")]
    TimedOut,
}

type PendingRefresh = Shared<BoxFuture<'static, Result<CredentialPair, RefreshError>>>;

/// Owner of the single-flight refresh protocol.
/// Clones share the pending slot, so however many pipeline handles
/// exist, the single-flight guarantee still holds process-wide.
#[derive(Clone)]
pub struct RefreshCoordinator {
    store: Arc<SessionStore>,
    exchange: Arc<AuthExchange>,
    timeout: Duration,
    pending: Arc<Mutex<Option<PendingRefresh>>>,
}

impl RefreshCoordinator {
    /// Create a coordinator with the default exchange timeout
    pub fn new(store: Arc<SessionStore>, exchange: Arc<AuthExchange>) -> Self {
        Self::with_timeout(store, exchange, Duration::from_secs(REFRESH_TIMEOUT_SECS))
    }

    /// Create a coordinator with an explicit exchange timeout
    pub fn with_timeout(
        store: Arc<SessionStore>,
        exchange: Arc<AuthExchange>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            exchange,
            timeout,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Return fresh credentials, joining the in-flight refresh if one
    /// exists and starting one otherwise.
    ///
    /// Fails with `RefreshError::Unavailable` without issuing any
    /// exchange when the store holds no refresh credential.
    pub async fn ensure_fresh_credentials(&self) -> Result<CredentialPair, RefreshError> {
        let fut = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(inflight) = pending.as_ref() {
                debug!("refresh already in flight, awaiting its outcome");
                inflight.clone()
            } else {
                let refresh = match self.store.credentials().and_then(|pair| pair.refresh) {
                    Some(refresh) => refresh,
                    None => {
                        debug!("no refresh credential stored, session cannot be renewed");
                        return Err(RefreshError::Unavailable);
                    }
                };
                debug!("starting refresh exchange");
                let fut = Self::run_exchange(
                    Arc::clone(&self.store),
                    Arc::clone(&self.exchange),
                    Arc::clone(&self.pending),
                    self.timeout,
                    refresh,
                )
                .boxed()
                .shared();
                *pending = Some(fut.clone());
                fut
            }
        };
        fut.await
    }

    /// The one in-flight exchange. On success the grant is persisted to
    /// the store first, then the pending slot is emptied, and only then
    /// do awaiters see the outcome. A later expiry therefore always
    /// starts a new exchange, and nobody can read refreshed credentials
    /// while the slot that produced them is still occupied.
    async fn run_exchange(
        store: Arc<SessionStore>,
        exchange: Arc<AuthExchange>,
        pending: Arc<Mutex<Option<PendingRefresh>>>,
        limit: Duration,
        refresh_credential: String,
    ) -> Result<CredentialPair, RefreshError> {
        let outcome = match timeout(limit, exchange.refresh(&refresh_credential)).await {
            Ok(Ok(grant)) => {
                store.set_credentials(grant.credentials.clone());
                store.set_identity(grant.identity);
                info!("session refresh succeeded");
                Ok(grant.credentials)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "refresh exchange failed");
                Err(RefreshError::Exchange(e.to_string()))
            }
            Err(_) => {
                warn!(limit_secs = limit.as_secs(), "refresh exchange timed out");
                Err(RefreshError::TimedOut)
            }
        };

        pending.lock().unwrap_or_else(|e| e.into_inner()).take();

        outcome
    }
}
