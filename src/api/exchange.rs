//! Login and refresh exchanges against the authentication endpoints.
//!
//! Both exchanges trade a proof (password or refresh credential) for a
//! `SessionGrant`. They are always sent without a bearer header; an
//! HTTP 401 here means the proof was rejected, not that a session
//! expired.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::auth::identity::{IdentityRecord, PrivilegeLevel};
use crate::auth::store::CredentialPair;

use super::error::parse_error_messages;

/// Everything the server grants on a successful login or refresh.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub credentials: CredentialPair,
    pub identity: IdentityRecord,
}

/// Failure of a login or refresh exchange.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{}", messages.join("; "))]
    Rejected {
        status: StatusCode,
        messages: Vec<String>,
    },

    #[error("Malformed grant response: {0}")]
    Decode(String),
}

#[derive(Debug, Deserialize)]
struct GrantResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
    user: GrantUser,
}

#[derive(Debug, Deserialize)]
struct GrantUser {
    name: String,
    role: GrantRole,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum GrantRole {
    Owner,
    Administrator,
    Member,
}

impl From<GrantResponse> for SessionGrant {
    fn from(grant: GrantResponse) -> Self {
        let identity = match grant.user.role {
            GrantRole::Owner => IdentityRecord::Owner {
                name: grant.user.name,
            },
            GrantRole::Administrator => IdentityRecord::Member {
                name: grant.user.name,
                privilege: PrivilegeLevel::Administrator,
            },
            GrantRole::Member => IdentityRecord::Member {
                name: grant.user.name,
                privilege: PrivilegeLevel::Member,
            },
        };
        Self {
            credentials: CredentialPair {
                access: grant.access_token,
                refresh: grant.refresh_token,
            },
            identity,
        }
    }
}

/// Client for the two credential-granting endpoints.
pub struct AuthExchange {
    http: Client,
    base_url: String,
}

impl AuthExchange {
    /// Create an exchange against `base_url`, sharing an existing
    /// connection pool.
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Trade a username and password for a session grant
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionGrant, ExchangeError> {
        debug!(username, "requesting login grant");
        self.grant_request(
            "/auth/login",
            json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Trade a refresh credential for a new session grant
    pub async fn refresh(&self, refresh_credential: &str) -> Result<SessionGrant, ExchangeError> {
        debug!("requesting refresh grant");
        self.grant_request(
            "/auth/refresh",
            json!({ "refreshToken": refresh_credential }),
        )
        .await
    }

    async fn grant_request(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<SessionGrant, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let messages = parse_error_messages(status, &body);
            return Err(ExchangeError::Rejected { status, messages });
        }

        let text = response.text().await?;
        let grant: GrantResponse =
            serde_json::from_str(&text).map_err(|e| ExchangeError::Decode(e.to_string()))?;
        Ok(grant.into())
    }
}
