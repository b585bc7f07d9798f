//! Proxy errors and their HTTP encoding
//!
//! Every failure is turned into a response here, so callers always receive
//! a well-formed reply:
//!
//! | Error                  | Status            | Body                              |
//! |------------------------|-------------------|-----------------------------------|
//! | `MethodNotAllowed`     | 405               | `Method Not Allowed` (plain text) |
//! | `Upstream`             | upstream's status | `{"error": .., "details": ..}`    |
//! | everything else        | 500               | `{"error": ..}`                   |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Plain-text body returned for non-POST requests
pub const METHOD_NOT_ALLOWED_BODY: &str = "Method Not Allowed";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("OpenAI API key is not set in environment variables.")]
    MissingApiKey,
    #[error("Failed to read request body: {0}")]
    BodyRead(#[source] axum::Error),
    #[error("Invalid JSON in request body: {0}")]
    InvalidBody(#[source] serde_json::Error),
    #[error("Upstream request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Invalid JSON in upstream response: {0}")]
    InvalidUpstreamResponse(#[source] serde_json::Error),
    #[error("OpenAI API request failed with status {status}")]
    Upstream { status: StatusCode, details: String },
}

impl ProxyError {
    /// Status code this error is answered with
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Upstream { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short tag for logs. The wire format does not distinguish these.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::MethodNotAllowed => "method_not_allowed",
            ProxyError::MissingApiKey => "configuration",
            ProxyError::BodyRead(_) => "body_read",
            ProxyError::InvalidBody(_) => "invalid_body",
            ProxyError::Network(_) => "network",
            ProxyError::InvalidUpstreamResponse(_) => "invalid_upstream_response",
            ProxyError::Upstream { .. } => "upstream",
        }
    }
}

/// JSON error envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.to_string();
        let details = match self {
            ProxyError::MethodNotAllowed => {
                return (status, METHOD_NOT_ALLOWED_BODY).into_response();
            }
            ProxyError::Upstream { details, .. } => Some(details),
            _ => None,
        };
        (status, Json(ErrorBody { error, details })).into_response()
    }
}
