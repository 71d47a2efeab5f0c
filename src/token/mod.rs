//! OAuth token endpoint client.
//!
//! Two grants are used:
//! - `refresh_token`: every delegated drive operation trades the stored
//!   refresh token for a fresh access token
//! - `authorization_code`: the consent callback trades the code for the
//!   initial token pair
//!
//! Nothing here retries. A refresh token the provider rejected will not
//! become valid on a second attempt, so failures surface to the caller.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// A short-lived bearer token owned by the request that fetched it.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_in_seconds: Option<i64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &crate::credentials::redact(&self.token))
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish()
    }
}

/// Tokens issued by the authorization-code exchange.
#[derive(Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: Option<i64>,
    pub scope: Option<String>,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in_seconds", &self.expires_in_seconds)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Why the token endpoint did not produce a token.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The provider refused the grant (revoked, expired, or wrong client).
    #[error("token endpoint rejected the grant ({status}): {error}{}", description_suffix(.description))]
    Rejected {
        status: u16,
        error: String,
        description: Option<String>,
    },

    /// The provider failed on its side (5xx).
    #[error("token endpoint unavailable ({status}): {body}")]
    Upstream { status: u16, body: String },

    /// The request never completed (connect failure or timeout).
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    /// A success status with a body we could not use.
    #[error("token endpoint returned an unusable response: {0}")]
    Malformed(String),
}

fn description_suffix(description: &Option<String>) -> String {
    description
        .as_ref()
        .map(|d| format!(" - {}", d))
        .unwrap_or_default()
}

impl RefreshError {
    /// True when retrying later could succeed without operator action.
    pub fn is_transient(&self) -> bool {
        matches!(self, RefreshError::Upstream { .. } | RefreshError::Transport(_))
    }
}

/// Raw token endpoint body. Both success and error shapes share it because
/// some providers answer 200 with an `error` field.
#[derive(Deserialize, Default)]
struct TokenEndpointBody {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client for the provider's OAuth token endpoint.
#[derive(Clone)]
pub struct TokenClient {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl TokenClient {
    pub fn new(http: Client, token_url: String, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            token_url,
            client_id,
            client_secret,
        }
    }

    /// Exchanges a stored refresh token for an access token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessToken, RefreshError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let body = self.post_form(&form).await?;
        let token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RefreshError::Malformed("missing access_token".to_string()))?;

        debug!(expires_in = ?body.expires_in, "Access token refreshed");

        Ok(AccessToken {
            token,
            expires_in_seconds: body.expires_in,
        })
    }

    /// Exchanges an authorization code from the consent callback.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, RefreshError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let body = self.post_form(&form).await?;
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RefreshError::Malformed("missing access_token".to_string()))?;

        debug!(
            has_refresh_token = body.refresh_token.is_some(),
            expires_in = ?body.expires_in,
            "Authorization code exchanged"
        );

        Ok(TokenGrant {
            access_token,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
            expires_in_seconds: body.expires_in,
            scope: body.scope,
        })
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenEndpointBody, RefreshError> {
        let response = self
            .http
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| RefreshError::Transport(describe_transport_error(e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RefreshError::Transport(describe_transport_error(e)))?;

        classify_response(status, &text)
    }
}

fn classify_response(status: StatusCode, text: &str) -> Result<TokenEndpointBody, RefreshError> {
    let parsed = serde_json::from_str::<TokenEndpointBody>(text);

    if status.is_server_error() {
        return Err(RefreshError::Upstream {
            status: status.as_u16(),
            body: text.to_string(),
        });
    }

    if !status.is_success() {
        let body = parsed.unwrap_or_default();
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            error: body.error.unwrap_or_else(|| status.to_string()),
            description: body.error_description,
        });
    }

    let mut body = parsed.map_err(|e| RefreshError::Malformed(e.to_string()))?;
    if let Some(error) = body.error.take() {
        return Err(RefreshError::Rejected {
            status: status.as_u16(),
            error,
            description: body.error_description.take(),
        });
    }

    Ok(body)
}

fn describe_transport_error(error: reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        "connection failed".to_string()
    } else {
        error.without_url().to_string()
    }
}
