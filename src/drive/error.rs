use crate::token::RefreshError;
use thiserror::Error;

pub type DriveResult<T> = Result<T, DriveError>;

/// Failures of a delegated drive operation.
///
/// Messages never include token material; upstream bodies are passed
/// through because the provider never echoes credentials back.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("{0}")]
    BadRequest(String),

    #[error("No drive credential found for user '{0}'")]
    NotFound(String),

    #[error("User '{0}' has no stored refresh token; the drive is not connected")]
    NotConnected(String),

    #[error("Failed to refresh access token: {0}")]
    RefreshFailed(#[source] RefreshError),

    #[error("Drive API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("Drive API request failed: {0}")]
    Transport(String),

    /// A 2xx response whose body is not the expected JSON shape
    #[error("Drive API returned an unreadable response ({status}): {message}")]
    Malformed { status: u16, message: String },

    #[error("Upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl DriveError {
    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{:#}", err))
    }

    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else {
            Self::Transport(err.without_url().to_string())
        }
    }

    /// Stable identifier used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DriveError::BadRequest(_) => "bad_request",
            DriveError::NotFound(_) => "not_found",
            DriveError::NotConnected(_) => "not_connected",
            DriveError::RefreshFailed(_) => "refresh_failed",
            DriveError::Upstream { .. } => "upstream_error",
            DriveError::Transport(_) => "upstream_unavailable",
            DriveError::Malformed { .. } => "upstream_malformed",
            DriveError::PayloadTooLarge { .. } => "payload_too_large",
            DriveError::Storage(_) => "storage_error",
        }
    }
}
