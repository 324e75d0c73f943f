//! Error types for the session guard.
//!
//! Storage and identity-fetch failures are recovered inside the session
//! store (logged, never surfaced). Callers only ever see `SessionError`
//! from `login()` and `PipelineError` from outgoing requests.

use reqwest::StatusCode;

/// Failure reported by a `KeyValueStore` backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Rejected session mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Token must not be empty")]
    EmptyToken,
}

/// Failure from the "fetch profile by token" collaborator.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Profile request failed with HTTP {0}")]
    Status(u16),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to decode profile: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether the server rejected the token itself.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Unauthorized)
    }
}

/// Failure surfaced to the caller of a pipeline request.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 401 from the server. The session has already been cleared and the
    /// login redirect issued by the time the caller sees this.
    #[error("Authentication rejected for {url}")]
    AuthRejected { url: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl PipelineError {
    /// HTTP status associated with the failure, when there is one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PipelineError::AuthRejected { .. } => Some(StatusCode::UNAUTHORIZED),
            PipelineError::Transport(e) => e.status(),
            PipelineError::InvalidUrl(_) => None,
        }
    }

    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, PipelineError::AuthRejected { .. })
    }
}
