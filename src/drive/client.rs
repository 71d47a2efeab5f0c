use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::{DriveError, DriveResult};
use super::model::{
    About, DriveFile, FileList, FileMetadata, ListQuery, StorageQuota, UploadPayload, UploadedFile,
    FOLDER_FIELDS, LIST_FIELDS, UPLOAD_FIELDS,
};
use crate::token::AccessToken;

/// Fallback content type for uploads that did not declare one
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// A download whose body has not been read yet.
pub struct DownloadedFile {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub response: Response,
}

/// HTTP client for the provider's drive REST API.
///
/// Every method makes exactly one request authenticated with the
/// caller-supplied access token.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Create a client against explicit API bases (the mock server in tests).
    pub fn new(http: Client, api_base: String, upload_base: String) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch storage usage and limit.
    pub async fn storage_quota(&self, token: &AccessToken) -> DriveResult<StorageQuota> {
        let response = self
            .http
            .get(format!("{}/about", self.api_base))
            .query(&[("fields", "storageQuota")])
            .bearer_auth(&token.token)
            .send()
            .await
            .map_err(DriveError::transport)?;

        let about: About = read_json(check_response(response).await?).await?;
        Ok(about.storage_quota)
    }

    /// List direct children of a folder.
    pub async fn list_files(&self, token: &AccessToken, query: &ListQuery) -> DriveResult<FileList> {
        let page_size = query.effective_page_size().to_string();
        let search = query.search_expression();
        let mut params: Vec<(&str, &str)> = vec![
            ("q", search.as_str()),
            ("pageSize", page_size.as_str()),
            ("fields", LIST_FIELDS),
            ("orderBy", "folder,name"),
        ];
        if let Some(page_token) = query.page_token.as_deref() {
            params.push(("pageToken", page_token));
        }

        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .query(&params)
            .bearer_auth(&token.token)
            .send()
            .await
            .map_err(DriveError::transport)?;

        read_json(check_response(response).await?).await
    }

    /// Single-request multipart upload: a `metadata` JSON part and a `file` part.
    pub async fn upload_file(
        &self,
        token: &AccessToken,
        payload: UploadPayload,
    ) -> DriveResult<UploadedFile> {
        let metadata = FileMetadata::file(payload.name.clone(), payload.parent_id);
        let metadata_json = serde_json::to_string(&metadata)
            .map_err(|e| DriveError::BadRequest(format!("Invalid file metadata: {}", e)))?;

        let content_type = payload
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let metadata_part = multipart::Part::text(metadata_json)
            .mime_str("application/json")
            .map_err(|e| DriveError::BadRequest(format!("Invalid metadata part: {}", e)))?;
        let file_part = multipart::Part::bytes(payload.bytes)
            .file_name(payload.name)
            .mime_str(&content_type)
            .map_err(|e| DriveError::BadRequest(format!("Invalid content type: {}", e)))?;

        let form = multipart::Form::new()
            .part("metadata", metadata_part)
            .part("file", file_part);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .query(&[("uploadType", "multipart"), ("fields", UPLOAD_FIELDS)])
            .bearer_auth(&token.token)
            .multipart(form)
            .send()
            .await
            .map_err(DriveError::transport)?;

        read_json(check_response(response).await?).await
    }

    /// Start a media download. The body is left unread so it can be streamed.
    pub async fn download_file(&self, token: &AccessToken, file_id: &str) -> DriveResult<DownloadedFile> {
        let response = self
            .http
            .get(self.file_url(file_id))
            .query(&[("alt", "media")])
            .bearer_auth(&token.token)
            .send()
            .await
            .map_err(DriveError::transport)?;

        let response = check_response(response).await?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(DownloadedFile {
            content_type,
            content_length: response.content_length(),
            response,
        })
    }

    /// Delete a file. Any 2xx, including 204, is success.
    pub async fn delete_file(&self, token: &AccessToken, file_id: &str) -> DriveResult<()> {
        let response = self
            .http
            .delete(self.file_url(file_id))
            .bearer_auth(&token.token)
            .send()
            .await
            .map_err(DriveError::transport)?;

        let status = check_response(response).await?.status();
        debug!(status = status.as_u16(), "Drive file deleted");
        Ok(())
    }

    /// Create a folder, optionally under a parent.
    pub async fn create_folder(
        &self,
        token: &AccessToken,
        name: &str,
        parent_id: Option<String>,
    ) -> DriveResult<DriveFile> {
        let response = self
            .http
            .post(format!("{}/files", self.api_base))
            .query(&[("fields", FOLDER_FIELDS)])
            .bearer_auth(&token.token)
            .json(&FileMetadata::folder(name, parent_id))
            .send()
            .await
            .map_err(DriveError::transport)?;

        read_json(check_response(response).await?).await
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.api_base, urlencoding::encode(file_id))
    }
}

/// Turn a non-2xx response into [`DriveError::Upstream`] carrying the body text.
async fn check_response(response: Response) -> DriveResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    let body = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body
    };

    Err(DriveError::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// Decode a 2xx body; a body that is not the expected JSON is [`DriveError::Malformed`].
async fn read_json<T: DeserializeOwned>(response: Response) -> DriveResult<T> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(DriveError::transport)?;
    serde_json::from_str(&body).map_err(|e| DriveError::Malformed {
        status,
        message: e.to_string(),
    })
}
