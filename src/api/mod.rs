//! REST API client module for the Coffer service.
//!
//! This module provides the `ApiClient` that wraps every outbound call
//! in the authenticated request pipeline, plus the unauthenticated
//! login/refresh exchanges it sits on.
//!
//! The API uses bearer token authentication; an HTTP 401 on an
//! authenticated call is the machine-readable signal that the session
//! expired and drives the refresh-and-replay flow.

pub mod client;
pub mod error;
pub mod exchange;

pub use client::ApiClient;
pub use error::ApiError;
pub use exchange::{AuthExchange, ExchangeError, SessionGrant};
