//! Per-user drive credential storage.
//!
//! One row per user who has completed the drive consent flow. The row keeps
//! the long-lived refresh token (encrypted when a master key is configured,
//! plaintext otherwise), the granted scope, and two connection markers:
//! `connected_at` and the cached `access_token`.
//!
//! # Soft disconnect
//!
//! Disconnecting clears the markers but keeps the refresh token, so the UI
//! shows the drive as disconnected while administrators can still act on
//! the user's files until the provider stops honouring the token. Rows are
//! never deleted by the normal flows.
//!
//! # Security
//!
//! - Refresh tokens never leave this module except through
//!   [`CredentialStore::resolve_refresh_token`], used by admin paths only
//! - `Debug` output of [`Credential`] redacts token material
//! - AES-256-GCM with a unique nonce per sealed value

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

mod encryption;
mod storage;

pub use storage::CredentialStore;

pub use encryption::{open, seal, validate_key};

/// A stored drive credential row.
#[derive(Clone)]
pub struct Credential {
    pub user_id: String,

    /// Plaintext refresh token column
    pub refresh_token: Option<String>,

    /// Sealed refresh token column (`<nonce>:<ciphertext>`)
    pub encrypted_refresh_token: Option<String>,

    /// Scope string granted at consent time
    pub scope: Option<String>,

    /// None means the user is considered disconnected
    pub connected_at: Option<DateTime<Utc>>,

    /// Whether a short-lived access token is cached on the row
    pub has_access_token: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// True when either refresh token column is populated.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some() || self.encrypted_refresh_token.is_some()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("user_id", &self.user_id)
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field(
                "encrypted_refresh_token",
                &self.encrypted_refresh_token.as_deref().map(redact),
            )
            .field("scope", &self.scope)
            .field("connected_at", &self.connected_at)
            .field("has_access_token", &self.has_access_token)
            .finish()
    }
}

/// Tokens obtained from a successful consent exchange.
#[derive(Clone)]
pub struct ConnectionGrant {
    /// Absent when the provider did not issue a new refresh token on re-consent
    pub refresh_token: Option<String>,
    pub access_token: Option<String>,
    pub scope: Option<String>,
}

impl fmt::Debug for ConnectionGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionGrant")
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .field("access_token", &self.access_token.as_deref().map(redact))
            .field("scope", &self.scope)
            .finish()
    }
}

/// Which column a resolved refresh token came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    Encrypted,
    Plaintext,
}

/// Outcome of walking the encrypted column and then the plaintext column.
#[derive(Clone, Default)]
pub struct ResolvedToken {
    /// The usable refresh token and where it came from
    pub token: Option<(String, TokenSource)>,

    /// Why the encrypted column could not be used, when it was populated
    pub decrypt_error: Option<String>,
}

impl fmt::Debug for ResolvedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedToken")
            .field(
                "token",
                &self.token.as_ref().map(|(t, source)| (redact(t), *source)),
            )
            .field("decrypt_error", &self.decrypt_error)
            .finish()
    }
}

/// Connection state visible to the user themselves. Never carries tokens.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub user_id: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Replaces secret material with its length.
pub fn redact(secret: &str) -> String {
    format!("[redacted: {} chars]", secret.chars().count())
}
