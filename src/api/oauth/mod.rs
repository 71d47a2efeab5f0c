//! OAuth 2.0 consent flow that creates drive credentials.
//!
//! 1. Portal sends the user to GET /api/drive/oauth/start?userId=
//! 2. We record a single-use state and redirect to the provider
//! 3. Provider redirects to /api/drive/oauth/callback?code&state
//! 4. State is consumed, the code exchanged, the credential upserted

mod provider;
mod state_manager;

pub use provider::{build_auth_url, callback_url};
pub use state_manager::{run_state_cleanup, StateEntry, StateManager};

use axum::{
    extract::{Query, State},
    response::{Json, Redirect},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::drive::UserQuery;
use super::error::{required, ApiError};
use super::AppState;
use crate::credentials::ConnectionGrant;

/// OAuth callback query parameters
#[derive(Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSuccessResponse {
    success: bool,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

pub fn create_oauth_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/drive/oauth/start", get(oauth_start))
        .route("/api/drive/oauth/callback", get(oauth_callback))
        .with_state(state)
}

/// GET /api/drive/oauth/start?userId=
///
/// `userId` is the identity the session layer already resolved.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Redirect, ApiError> {
    let user_id = required(query.user_id, "userId")?;

    if !state.provider.is_configured() {
        error!("OAuth start requested but client credentials are not configured");
        return Err(ApiError::ServerError(
            "OAuth not configured. Set DRIVEGATE_GOOGLE_CLIENT_ID and DRIVEGATE_GOOGLE_CLIENT_SECRET."
                .to_string(),
        ));
    }

    let csrf_state = state.state_manager.create_state(&user_id);
    let redirect_uri = callback_url(&state.callback_base_url);
    let auth_url = build_auth_url(&state.provider, &csrf_state, &redirect_uri);

    info!(user_id = %user_id, "Redirecting to OAuth provider");
    Ok(Redirect::temporary(&auth_url))
}

/// GET /api/drive/oauth/callback
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(callback): Query<OAuthCallback>,
) -> Result<Json<OAuthSuccessResponse>, ApiError> {
    // A returned state is spent even when the provider reports an error
    let consumed = callback
        .state
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| state.state_manager.validate_and_consume(s.trim()));

    if let Some(error) = callback.error {
        let description = callback
            .error_description
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!(error = %error, description = %description, "OAuth authorization failed");
        return Err(ApiError::BadRequest(format!(
            "OAuth authorization failed: {} - {}",
            error, description
        )));
    }

    let code = required(callback.code, "code")?;
    let consumed = consumed.ok_or_else(|| ApiError::missing("state"))?;

    let entry = consumed.ok_or_else(|| {
        warn!("Invalid, reused or expired OAuth state");
        ApiError::Unauthorized("Invalid or expired OAuth state".to_string())
    })?;
    let user_id = entry.user_id;

    debug!(user_id = %user_id, "OAuth state validated, exchanging code");

    // Must match the redirect_uri sent on start
    let redirect_uri = callback_url(&state.callback_base_url);
    let grant = state
        .tokens
        .exchange_code(&code, &redirect_uri)
        .await
        .map_err(|e| {
            error!(user_id = %user_id, error = %e, "Token exchange failed");
            ApiError::BadGateway(format!("Failed to exchange authorization code: {}", e))
        })?;

    if grant.refresh_token.is_none() {
        warn!(
            user_id = %user_id,
            "Provider issued no refresh token; keeping any previously stored one"
        );
    }

    let scope = grant.scope.clone();
    state
        .store
        .upsert_connection(
            &user_id,
            &ConnectionGrant {
                refresh_token: grant.refresh_token,
                access_token: Some(grant.access_token),
                scope: grant.scope,
            },
        )
        .map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to store drive credential");
            ApiError::ServerError(format!("Failed to store credentials: {:#}", e))
        })?;

    info!(user_id = %user_id, scope = ?scope, "Drive connected");

    Ok(Json(OAuthSuccessResponse {
        success: true,
        user_id,
        scope,
    }))
}
