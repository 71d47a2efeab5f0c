//! Typed shapes for the drive API responses we consume and re-emit.
//!
//! Only the fields the portal uses are declared; anything else the
//! provider sends is dropped on deserialization.
//! See https://developers.google.com/drive/api/reference/rest/v3/files#File

use serde::{Deserialize, Serialize};

/// MIME type the provider uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Fields requested for file listings
pub const LIST_FIELDS: &str =
    "nextPageToken,files(id,name,mimeType,parents,size,modifiedTime,webViewLink,webContentLink)";

/// Fields requested for uploaded files
pub const UPLOAD_FIELDS: &str = "id,name,webViewLink,webContentLink";

/// Fields requested for created folders
pub const FOLDER_FIELDS: &str = "id,name,mimeType,parents,webViewLink";

/// Default and maximum page sizes for listings
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A file or folder as returned by the files endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
    /// Byte count, string-encoded by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_content_link: Option<String>,
}

impl DriveFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type.as_deref() == Some(FOLDER_MIME_TYPE)
    }
}

/// One page of a file listing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// The uploaded file summary handed back to the admin UI.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

/// Storage usage in bytes, kept string-encoded exactly as the provider sends it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageQuota {
    #[serde(default)]
    pub usage: Option<String>,
    /// Absent for accounts without a storage limit
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_in_drive: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_in_drive_trash: Option<String>,
}

/// `GET /about?fields=storageQuota`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct About {
    #[serde(default)]
    pub(crate) storage_quota: StorageQuota,
}

/// Metadata part of a multipart upload and body of a folder create.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

impl FileMetadata {
    pub fn file(name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            parents: parent.map(|p| vec![p]),
        }
    }

    pub fn folder(name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            parents: parent.map(|p| vec![p]),
        }
    }
}

/// Payload for a single-request upload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub name: String,
    pub parent_id: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Listing parameters.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Folder to list; `root` when None
    pub folder_id: Option<String>,
    pub page_token: Option<String>,
    pub page_size: Option<u32>,
}

impl ListQuery {
    /// The `q` search expression for direct, non-trashed children.
    pub fn search_expression(&self) -> String {
        let folder = self.folder_id.as_deref().unwrap_or("root");
        // Single quotes and backslashes must be escaped inside q literals
        let escaped = folder.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{}' in parents and trashed=false", escaped)
    }

    pub fn effective_page_size(&self) -> u32 {
        self.page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}
