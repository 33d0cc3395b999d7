//! Authenticated request pipeline for the Coffer API.
//!
//! Every outbound call passes through `ApiClient`: the current access
//! credential is attached as a bearer header, failures are classified
//! once, and an expired session triggers at most one refresh-and-replay
//! before the outcome is returned. Refresh failure terminates the
//! session; the capability watch channel carries that signal upward.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::auth::identity::{Capabilities, IdentityRecord};
use crate::auth::refresh::RefreshCoordinator;
use crate::auth::store::SessionStore;
use crate::models::{Contribution, Expense, Member, MembersResponse, Payout, ReportSummary};

use super::error::{classify, ApiError, CallFailure};
use super::exchange::{AuthExchange, ExchangeError};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// API client for the Coffer service.
/// Clone is cheap - reqwest::Client uses Arc internally, and clones
/// share the session store and the single-flight refresh state.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    store: Arc<SessionStore>,
    exchange: Arc<AuthExchange>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    /// Create a new API client over the given session store
    pub fn new(base_url: impl Into<String>, store: Arc<SessionStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_http(http, base_url, store))
    }

    /// Create a client over an existing HTTP client, sharing its
    /// connection pool.
    pub fn with_http(http: Client, base_url: impl Into<String>, store: Arc<SessionStore>) -> Self {
        let base_url = base_url.into();
        let exchange = Arc::new(AuthExchange::new(http.clone(), base_url.clone()));
        let coordinator = RefreshCoordinator::new(Arc::clone(&store), Arc::clone(&exchange));
        Self {
            http,
            base_url,
            store,
            exchange,
            coordinator,
        }
    }

    // ===== Session Lifecycle =====

    /// Log in with a username and password, persisting the granted
    /// session.
    ///
    /// A rejected login is an ordinary failure: 401 at the login
    /// endpoint means the proof was wrong, not that a session expired,
    /// so this path never enters the refresh flow.
    pub async fn login(&self, username: &str, password: &str) -> Result<IdentityRecord, ApiError> {
        let grant = self
            .exchange
            .login(username, password)
            .await
            .map_err(Self::exchange_failure)?;

        self.store.set_credentials(grant.credentials);
        self.store.set_identity(grant.identity.clone());
        info!(subject = %grant.identity.name(), "login succeeded");
        Ok(grant.identity)
    }

    /// End the session locally. The wire contract has no logout
    /// endpoint; clearing the store is the whole operation.
    pub fn logout(&self) {
        info!("logging out, clearing session");
        self.store.clear();
    }

    /// Capability flags for the current session
    pub fn capabilities(&self) -> Capabilities {
        self.store.capabilities()
    }

    /// Watch capability changes; navigation guards observe login,
    /// logout, and terminal session end here.
    pub fn subscribe(&self) -> watch::Receiver<Capabilities> {
        self.store.subscribe()
    }

    fn exchange_failure(err: ExchangeError) -> ApiError {
        match err {
            ExchangeError::Transport(source) => ApiError::Transport {
                source,
                from_retry: false,
            },
            ExchangeError::Rejected { messages, .. } => ApiError::Rejected {
                messages,
                from_retry: false,
            },
            ExchangeError::Decode(message) => ApiError::Decode(message),
        }
    }

    // ===== Request Pipeline =====

    /// Send one request with the given bearer credential and classify
    /// the outcome.
    async fn dispatch<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<reqwest::Response, CallFailure> {
        let mut request = self.http.request(method, url);
        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        classify(request.send().await).await
    }

    /// The pipeline: attach the stored credential, send, and recover an
    /// expired session at most once by refreshing and replaying.
    ///
    /// The expired-session text from the server is never surfaced; it
    /// only drives the refresh flow. A replay that reports expiry again
    /// is returned as `ApiError::Expired` without another refresh, and
    /// a failed refresh clears the store before `ApiError::SessionEnded`
    /// is returned.
    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let bearer = self.store.credentials().map(|pair| pair.access);

        match self
            .dispatch(method.clone(), &url, body, bearer.as_deref())
            .await
        {
            Ok(response) => return Ok(response),
            Err(CallFailure::Transport(source)) => {
                return Err(ApiError::Transport {
                    source,
                    from_retry: false,
                })
            }
            Err(CallFailure::Application { messages }) => {
                return Err(ApiError::Rejected {
                    messages,
                    from_retry: false,
                })
            }
            Err(CallFailure::SessionExpired { .. }) => {
                debug!(url = %url, "session expired, renewing credentials before replay");
            }
        }

        let fresh = match self.coordinator.ensure_fresh_credentials().await {
            Ok(pair) => pair,
            Err(e) => {
                info!(error = %e, "session could not be renewed, ending it");
                self.store.clear();
                return Err(ApiError::SessionEnded);
            }
        };

        match self
            .dispatch(method, &url, body, Some(fresh.access.as_str()))
            .await
        {
            Ok(response) => Ok(response),
            Err(CallFailure::Transport(source)) => Err(ApiError::Transport {
                source,
                from_retry: true,
            }),
            Err(CallFailure::Application { messages }) => Err(ApiError::Rejected {
                messages,
                from_retry: true,
            }),
            Err(CallFailure::SessionExpired { messages }) => Err(ApiError::Expired { messages }),
        }
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self
            .execute(Method::GET, path, None::<&serde_json::Value>)
            .await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let response = self.execute(Method::POST, path, Some(body)).await?;
        Self::decode(response).await
    }

    // ===== Data Fetching Methods =====

    /// Fetch all contributions recorded for the organization
    pub async fn fetch_contributions(&self, org_id: &str) -> Result<Vec<Contribution>, ApiError> {
        self.get(&format!("/orgs/{}/contributions", org_id)).await
    }

    /// Fetch all expenses recorded for the organization
    pub async fn fetch_expenses(&self, org_id: &str) -> Result<Vec<Expense>, ApiError> {
        self.get(&format!("/orgs/{}/expenses", org_id)).await
    }

    /// Fetch all payouts recorded for the organization
    pub async fn fetch_payouts(&self, org_id: &str) -> Result<Vec<Payout>, ApiError> {
        self.get(&format!("/orgs/{}/payouts", org_id)).await
    }

    /// Fetch the membership roster for the organization
    pub async fn fetch_members(&self, org_id: &str) -> Result<Vec<Member>, ApiError> {
        let response: MembersResponse = self.get(&format!("/orgs/{}/members", org_id)).await?;
        Ok(response.members)
    }

    /// Fetch aggregated totals for a reporting period
    pub async fn fetch_report_summary(
        &self,
        org_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ReportSummary, ApiError> {
        let body = serde_json::json!({
            "fromDate": from.format("%Y-%m-%d").to_string(),
            "toDate": to.format("%Y-%m-%d").to_string(),
        });
        self.post(&format!("/orgs/{}/reports/summary", org_id), &body)
            .await
    }
}
