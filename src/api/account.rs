//! User-facing connection routes.
//!
//! These sit behind the portal's session layer, not the admin gate. They
//! only ever expose connection markers; token material stays in the store.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::drive::{json_body, UserQuery};
use super::error::{required, ApiError};
use super::AppState;
use crate::credentials::ConnectionStatus;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    user_id: Option<String>,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

pub fn create_account_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/drive/disconnect", post(disconnect))
        .route("/api/drive/status", get(status))
        .with_state(state)
}

/// POST /api/drive/disconnect
///
/// Soft disconnect: the user's UI shows the drive as disconnected, but the
/// refresh token is kept. Admin-delegated operations keep working until
/// the provider itself rejects the token (for example after the user
/// revokes the app). Repeating the call changes nothing.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DisconnectRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let request = json_body(payload)?;
    let user_id = required(request.user_id, "userId")?;

    let found = state
        .store
        .clear_connection_markers(&user_id)
        .map_err(|e| ApiError::ServerError(format!("Failed to disconnect drive: {:#}", e)))?;

    if !found {
        return Err(ApiError::NotFound(format!(
            "No drive connection found for user '{}'",
            user_id
        )));
    }

    info!(user_id = %user_id, "Drive soft-disconnected");
    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/drive/status?userId=
async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ConnectionStatus>, ApiError> {
    let user_id = required(query.user_id, "userId")?;

    state
        .store
        .connection_status(&user_id)
        .map_err(|e| ApiError::ServerError(format!("Failed to read connection status: {:#}", e)))?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!("No drive connection found for user '{}'", user_id))
        })
}
