//! Request-path errors and their HTTP rendering.
//!
//! Upstream 4xx/5xx responses are NOT errors; they are relayed verbatim.
//! Everything here stops a request before a response from the target exists.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::signing::SigningError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no route matches {0}")]
    NoRoute(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body is not valid JSON: {0}")]
    InvalidJsonBody(#[from] serde_json::Error),

    #[error("failed to build upstream request: {0}")]
    BuildRequest(#[from] http::Error),

    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("upstream request failed: {0}")]
    UpstreamDispatch(#[from] hyper_util::client::legacy::Error),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoRoute(_) => StatusCode::NOT_FOUND,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BodyRead(_) | ProxyError::InvalidJsonBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::BuildRequest(_) | ProxyError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::UpstreamDispatch(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Proxy request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Proxy request rejected");
        }

        let body = match &self {
            // don't leak upstream addresses or signing details to the caller
            ProxyError::UpstreamDispatch(_) => "Upstream request failed".to_string(),
            ProxyError::BuildRequest(_) | ProxyError::Signing(_) => "Internal proxy error".to_string(),
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}
