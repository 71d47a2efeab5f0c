use axum::{
    extract::{Query, State},
    response::Json,
};
use std::sync::Arc;

use super::drive::UserQuery;
use super::error::{required, ApiError};
use super::AppState;
use crate::diagnostics::DiagnosticsReport;

/// GET /api/admin/drive/diagnostics?userId=
///
/// Mounted on the admin router, so the gate has already run.
pub(super) async fn get_diagnostics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<DiagnosticsReport>, ApiError> {
    let user_id = required(query.user_id, "userId")?;
    let report = state.diagnostics.diagnose(&user_id).await?;
    Ok(Json(report))
}
