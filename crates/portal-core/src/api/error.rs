use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No access token available. Please sign in.")]
    Unauthenticated,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to encode request: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("{0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Message shown for transport failures
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Backend error envelope: `{"detail": "..."}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<serde_json::Value>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut = (0..=MAX_ERROR_BODY_LENGTH)
                .rev()
                .find(|&i| body.is_char_boundary(i))
                .unwrap_or(0);
            format!("{}... (truncated, {} total bytes)", &body[..cut], body.len())
        }
    }

    /// Pull the server-provided message out of a `{"detail": ...}` body.
    /// Only string details count; validation arrays fall back to the generic message.
    pub fn detail_message(body: &str) -> Option<String> {
        let envelope: ErrorEnvelope = serde_json::from_str(body).ok()?;
        match envelope.detail? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::AuthenticationFailed,
            code => {
                let message = Self::detail_message(body)
                    .unwrap_or_else(|| format!("API Error: {}", code));
                ApiError::Api {
                    status: code,
                    message,
                }
            }
        }
    }

    /// Raw body excerpt for debug logs
    pub fn body_excerpt(body: &str) -> String {
        Self::truncate_body(body)
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthenticationFailed => Some(401),
            ApiError::Api { status, .. } => Some(*status),
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether a read may be re-issued by the request cache.
    ///
    /// A fail-fast 401 counts: the session store refreshes in the background,
    /// so the second attempt usually carries a fresh token.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::NetworkError(_) | ApiError::AuthenticationFailed => true,
            ApiError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Unauthenticated | ApiError::AuthenticationFailed)
    }

    /// Message suitable for an inline error banner
    pub fn user_message(&self) -> String {
        match self {
            ApiError::NetworkError(_) | ApiError::InvalidResponse(_) => {
                UNEXPECTED_ERROR_MESSAGE.to_string()
            }
            other => other.to_string(),
        }
    }
}
