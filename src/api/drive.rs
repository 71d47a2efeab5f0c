//! Admin-delegated drive routes.
//!
//! Every route here sits behind [`require_admin`], which runs before body
//! extraction. A request without the admin token never reads a credential
//! or reaches the provider.

use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::{header, StatusCode},
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

use super::diagnostics::get_diagnostics;
use super::error::{required, ApiError};
use super::AppState;
use crate::auth::require_admin;
use crate::drive::{DriveError, DriveFile, ListQuery, StorageQuota, UploadPayload, UploadedFile};

/// Headroom above the file size limit for multipart boundaries and text fields
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Filename used when neither `name` nor the file part provides one
const DEFAULT_UPLOAD_NAME: &str = "upload";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    user_id: Option<String>,
    folder_name: Option<String>,
    parent_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequest {
    user_id: Option<String>,
    file_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    user_id: Option<String>,
    folder_id: Option<String>,
    page_token: Option<String>,
    page_size: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<String>,
}

#[derive(Serialize)]
struct FolderResponse {
    success: bool,
    folder: DriveFile,
}

#[derive(Serialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotaResponse {
    success: bool,
    storage_quota: StorageQuota,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    success: bool,
    files: Vec<DriveFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<String>,
}

pub fn create_admin_router(state: Arc<AppState>) -> Router {
    let upload_limit = state.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/api/admin/drive/folders", post(create_folder))
        .route("/api/admin/drive/delete", post(delete_file))
        .route("/api/admin/drive/download", post(download_file))
        .route(
            "/api/admin/drive/upload",
            post(upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/admin/drive/storage-quota", get(storage_quota))
        .route("/api/admin/drive/list", post(list_files))
        .route("/api/admin/drive/diagnostics", get(get_diagnostics))
        .route_layer(middleware::from_fn_with_state(
            state.admin_gate.clone(),
            require_admin,
        ))
        .with_state(state)
}

/// Unwraps a JSON body, turning extractor rejections into our 400 shape.
pub(super) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))
}

/// POST /api/admin/drive/folders
async fn create_folder(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateFolderRequest>, JsonRejection>,
) -> Result<Json<FolderResponse>, ApiError> {
    let request = json_body(payload)?;
    let user_id = required(request.user_id, "userId")?;
    let folder_name = required(request.folder_name, "folderName")?;
    let parent_id = request.parent_id.filter(|p| !p.trim().is_empty());

    let folder = state
        .drive
        .create_folder(&user_id, &folder_name, parent_id)
        .await?;

    Ok(Json(FolderResponse {
        success: true,
        folder,
    }))
}

/// POST /api/admin/drive/delete
async fn delete_file(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FileRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = json_body(payload)?;
    let user_id = required(request.user_id, "userId")?;
    let file_id = required(request.file_id, "fileId")?;

    state.drive.delete_file(&user_id, &file_id).await?;

    Ok(Json(json!({ "ok": true })))
}

/// POST /api/admin/drive/download
///
/// Streams the provider's response body through with its content type.
async fn download_file(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FileRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload)?;
    let user_id = required(request.user_id, "userId")?;
    let file_id = required(request.file_id, "fileId")?;

    let download = state.drive.download_file(&user_id, &file_id).await?;
    debug!(
        user_id = %user_id,
        file_id = %file_id,
        content_length = ?download.content_length,
        "Streaming download to admin"
    );

    let content_type = download
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type);
    if let Some(length) = download.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(download.response.bytes_stream()))
        .map_err(|e| ApiError::ServerError(format!("Failed to build download response: {}", e)))
}

/// POST /api/admin/drive/upload (multipart: `userId`, `file`, `parentId?`, `name?`)
async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError> {
    let limit = state.max_upload_bytes;
    let mut multipart = multipart
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e.body_text())))?;

    let mut user_id = None;
    let mut parent_id = None;
    let mut name = None;
    let mut file: Option<(Option<String>, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "userId" => user_id = Some(field_text(field, limit).await?),
            "parentId" => parent_id = Some(field_text(field, limit).await?),
            "name" => name = Some(field_text(field, limit).await?),
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                if bytes.len() > limit {
                    return Err(DriveError::PayloadTooLarge { limit }.into());
                }
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            other => debug!(field = %other, "Ignoring unknown upload field"),
        }
    }

    let user_id = required(user_id, "userId")?;
    let (file_name, content_type, bytes) = file.ok_or_else(|| ApiError::missing("file"))?;

    let name = name
        .filter(|n| !n.trim().is_empty())
        .or(file_name.filter(|n| !n.is_empty()))
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());

    let uploaded = state
        .drive
        .upload_file(
            &user_id,
            UploadPayload {
                name,
                parent_id: parent_id.filter(|p| !p.trim().is_empty()),
                content_type,
                bytes,
            },
        )
        .await?;

    Ok(Json(UploadResponse { file: uploaded }))
}

async fn field_text(field: Field<'_>, limit: usize) -> Result<String, ApiError> {
    field.text().await.map_err(|e| multipart_error(e, limit))
}

fn multipart_error(error: MultipartError, limit: usize) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!(limit, "Upload rejected: body exceeds limit");
        DriveError::PayloadTooLarge { limit }.into()
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", error.body_text()))
    }
}

/// GET /api/admin/drive/storage-quota?userId=
async fn storage_quota(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<QuotaResponse>, ApiError> {
    let user_id = required(query.user_id, "userId")?;
    let storage_quota = state.drive.storage_quota(&user_id).await?;

    Ok(Json(QuotaResponse {
        success: true,
        storage_quota,
    }))
}

/// POST /api/admin/drive/list
async fn list_files(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ListRequest>, JsonRejection>,
) -> Result<Json<ListResponse>, ApiError> {
    let request = json_body(payload)?;
    let user_id = required(request.user_id, "userId")?;

    let query = ListQuery {
        folder_id: request.folder_id.filter(|f| !f.trim().is_empty()),
        page_token: request.page_token.filter(|t| !t.is_empty()),
        page_size: request.page_size,
    };
    let list = state.drive.list_files(&user_id, &query).await?;

    Ok(Json(ListResponse {
        success: true,
        files: list.files,
        next_page_token: list.next_page_token,
    }))
}
