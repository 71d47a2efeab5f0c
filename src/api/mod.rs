//! HTTP surface.
//!
//! - `/api/admin/drive/*`: admin-delegated drive operations and
//!   diagnostics, behind the `x-admin-token` gate
//! - `/api/drive/*`: user-facing connection status, soft disconnect and
//!   the OAuth consent flow, behind the portal's session layer
//! - `/health`

mod account;
mod diagnostics;
mod drive;
mod error;
pub mod oauth;

pub use account::create_account_router;
pub use drive::create_admin_router;
pub use error::{ApiError, ErrorResponse};
pub use oauth::{create_oauth_router, run_state_cleanup, StateManager};

use axum::{response::Json, routing::get, Router};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AdminGate;
use crate::config::{DriveGateConfig, ProviderConfig};
use crate::credentials::CredentialStore;
use crate::diagnostics::DiagnosticsReporter;
use crate::drive::{DelegatedDrive, DriveClient};
use crate::token::TokenClient;

/// Everything the handlers share. Owned by the process and built once in `main`.
pub struct AppState {
    pub store: Arc<CredentialStore>,
    pub drive: DelegatedDrive,
    pub diagnostics: DiagnosticsReporter,
    pub tokens: TokenClient,
    pub state_manager: StateManager,
    pub provider: ProviderConfig,
    pub callback_base_url: String,
    pub admin_gate: AdminGate,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wires the drive, token and diagnostics clients from configuration.
    pub fn from_config(
        config: &DriveGateConfig,
        admin_token: Option<String>,
        store: Arc<CredentialStore>,
        http: Client,
    ) -> Self {
        let provider = config.provider.clone();
        let tokens = TokenClient::new(
            http.clone(),
            provider.token_url.clone(),
            provider.client_id.clone(),
            provider.client_secret.clone(),
        );
        let client = DriveClient::new(http, provider.api_base.clone(), provider.upload_base.clone());

        Self {
            drive: DelegatedDrive::new(store.clone(), tokens.clone(), client),
            diagnostics: DiagnosticsReporter::new(store.clone(), tokens.clone()),
            store,
            tokens,
            state_manager: StateManager::new(config.oauth.state_expiry_seconds),
            provider,
            callback_base_url: config.oauth.callback_base_url.clone(),
            admin_gate: AdminGate::new(admin_token),
            max_upload_bytes: config.server.max_upload_bytes,
        }
    }
}

/// All routers merged, plus `/health`.
pub fn create_router(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/health", get(health))
        .merge(create_admin_router(state.clone()))
        .merge(create_account_router(state.clone()))
        .merge(create_oauth_router(state))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
