//! Error taxonomy for the authenticated request pipeline.
//!
//! Every failed call is first classified into a `CallFailure` by one
//! adapter, then mapped to the public `ApiError` once the retry policy
//! has run. `ApiError::notices` returns the user-visible messages as
//! data; displaying them is the caller's concern.

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Maximum length for error response bodies quoted in messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Notice used when the transport produced no structured response
const TRANSPORT_NOTICE: &str = "Unable to reach the server. Check your connection and try again.";

/// Notice used when a successful response could not be decoded
const DECODE_NOTICE: &str = "The server returned an unexpected response.";

/// Failure of an authenticated API call, after the retry policy ran.
#[derive(Error, Debug)]
pub enum ApiError {
    /// No structured response was received at all.
    #[error("Network error: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
        from_retry: bool,
    },

    /// The server rejected the call for an ordinary application reason.
    #[error("{}", messages.join("; "))]
    Rejected {
        messages: Vec<String>,
        from_retry: bool,
    },

    /// The replayed request reported an expired session again.
    #[error("Session expired and could not be recovered")]
    Expired { messages: Vec<String> },

    /// Credential renewal failed; the session has been terminated.
    #[error("Session ended - please log in again")]
    SessionEnded,

    /// A successful response carried a body this client cannot decode.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Messages to surface as user-visible notifications, one per entry.
    ///
    /// Expired-session text is never surfaced, replay failures stay
    /// quiet to avoid double-notifying during recovery, and session
    /// termination is signaled through the capability watch instead.
    pub fn notices(&self) -> Vec<String> {
        match self {
            ApiError::Transport { from_retry: false, .. } => vec![TRANSPORT_NOTICE.to_string()],
            ApiError::Transport { from_retry: true, .. } => Vec::new(),
            ApiError::Rejected {
                messages,
                from_retry: false,
            } => messages.clone(),
            ApiError::Rejected { from_retry: true, .. } => Vec::new(),
            ApiError::Expired { .. } => Vec::new(),
            ApiError::SessionEnded => Vec::new(),
            ApiError::Decode(_) => vec![DECODE_NOTICE.to_string()],
        }
    }
}

/// Discriminated outcome of a single dispatch attempt, before any
/// retry decision has been made.
#[derive(Debug)]
pub(crate) enum CallFailure {
    /// No structured response: connectivity, TLS, or timeout.
    Transport(reqwest::Error),
    /// The server flagged the bearer credential as expired.
    SessionExpired { messages: Vec<String> },
    /// Any other failure response.
    Application { messages: Vec<String> },
}

/// Classify one dispatch outcome. An expired session is signaled by
/// HTTP 401 and nothing else; every other failure status is an
/// application failure carrying its parsed messages.
pub(crate) async fn classify(
    outcome: Result<reqwest::Response, reqwest::Error>,
) -> Result<reqwest::Response, CallFailure> {
    let response = outcome.map_err(CallFailure::Transport)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let messages = parse_error_messages(status, &body);
    if status == StatusCode::UNAUTHORIZED {
        Err(CallFailure::SessionExpired { messages })
    } else {
        Err(CallFailure::Application { messages })
    }
}

#[derive(Debug, Deserialize)]
struct FailureBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Extract user-facing messages from a failure response body.
///
/// Understands `{"errors": [...]}` and `{"message": "..."}` bodies;
/// anything else collapses to a status line with the body quoted.
pub(crate) fn parse_error_messages(status: StatusCode, body: &str) -> Vec<String> {
    if let Ok(parsed) = serde_json::from_str::<FailureBody>(body) {
        if !parsed.errors.is_empty() {
            return parsed.errors;
        }
        if let Some(message) = parsed.message {
            if !message.is_empty() {
                return vec![message];
            }
        }
    }

    if body.trim().is_empty() {
        vec![format!("Request failed with status {status}")]
    } else {
        vec![format!(
            "Request failed with status {status}: {}",
            truncate_body(body)
        )]
    }
}

/// Truncate a response body to avoid carrying excessive data in messages
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut cut = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}... (truncated, {} total bytes)",
        &body[..cut],
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_messages_from_errors_array() {
        let body = r#"{"errors": ["Amount must be positive", "Fund is required"]}"#;
        let messages = parse_error_messages(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(
            messages,
            vec!["Amount must be positive", "Fund is required"]
        );
    }

    #[test]
    fn test_parse_messages_from_message_field() {
        let body = r#"{"message": "Payout already finalized"}"#;
        let messages = parse_error_messages(StatusCode::CONFLICT, body);
        assert_eq!(messages, vec!["Payout already finalized"]);
    }

    #[test]
    fn test_parse_messages_falls_back_to_status_line() {
        let messages = parse_error_messages(StatusCode::BAD_GATEWAY, "<html>oops</html>");
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Request failed with status 502"));
        assert!(messages[0].contains("<html>oops</html>"));
    }

    #[test]
    fn test_parse_messages_empty_body() {
        let messages = parse_error_messages(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(messages, vec!["Request failed with status 500 Internal Server Error"]);
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let body = "é".repeat(600);
        let truncated = truncate_body(&body);
        assert!(truncated.contains("truncated"));
        assert!(truncated.len() < body.len());
    }

    #[test]
    fn test_notices_for_ordinary_rejection() {
        let err = ApiError::Rejected {
            messages: vec!["Amount must be positive".to_string()],
            from_retry: false,
        };
        assert_eq!(err.notices(), vec!["Amount must be positive"]);
    }

    #[test]
    fn test_notices_suppressed_on_replay() {
        let err = ApiError::Rejected {
            messages: vec!["Amount must be positive".to_string()],
            from_retry: true,
        };
        assert!(err.notices().is_empty());
    }

    #[test]
    fn test_expired_session_is_never_surfaced() {
        let err = ApiError::Expired {
            messages: vec!["token expired".to_string()],
        };
        assert!(err.notices().is_empty());
        assert!(ApiError::SessionEnded.notices().is_empty());
    }
}
