//! Admin-delegated drive operations.
//!
//! Every operation runs the same preamble before its single provider call:
//!
//! ```text
//! credential lookup ──none──▶ NotFound
//!        │
//! refresh token? ─────none──▶ NotConnected     (no upstream calls)
//!        │
//! token endpoint ────error──▶ RefreshFailed    (no drive call)
//!        │
//! drive API call ────non-2xx▶ Upstream
//!        │
//!     typed result
//! ```
//!
//! Access tokens are never cached between requests. Two concurrent calls
//! for the same user each refresh on their own.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::client::{DownloadedFile, DriveClient};
use super::error::{DriveError, DriveResult};
use super::model::{DriveFile, FileList, ListQuery, StorageQuota, UploadPayload, UploadedFile};
use crate::credentials::CredentialStore;
use crate::token::{AccessToken, TokenClient};

/// Runs drive calls on behalf of a user with their stored refresh token.
pub struct DelegatedDrive {
    store: Arc<CredentialStore>,
    tokens: TokenClient,
    client: DriveClient,
}

impl DelegatedDrive {
    pub fn new(store: Arc<CredentialStore>, tokens: TokenClient, client: DriveClient) -> Self {
        Self {
            store,
            tokens,
            client,
        }
    }

    /// Resolves the user's credential and trades its refresh token for a
    /// fresh access token.
    pub async fn access_token_for(&self, user_id: &str) -> DriveResult<AccessToken> {
        let credential = self
            .store
            .get_credential(user_id)
            .map_err(DriveError::storage)?
            .ok_or_else(|| DriveError::NotFound(user_id.to_string()))?;

        let resolved = self.store.resolve_refresh_token(&credential);
        if let Some(reason) = &resolved.decrypt_error {
            warn!(
                user_id = %user_id,
                reason = %reason,
                "Encrypted refresh token unusable, trying plaintext column"
            );
        }

        let (refresh_token, source) = resolved
            .token
            .ok_or_else(|| DriveError::NotConnected(user_id.to_string()))?;

        debug!(
            user_id = %user_id,
            source = ?source,
            soft_disconnected = credential.connected_at.is_none(),
            "Refreshing access token for delegated call"
        );

        self.tokens.refresh(&refresh_token).await.map_err(|e| {
            warn!(user_id = %user_id, error = %e, "Access token refresh failed");
            DriveError::RefreshFailed(e)
        })
    }

    pub async fn storage_quota(&self, user_id: &str) -> DriveResult<StorageQuota> {
        let token = self.access_token_for(user_id).await?;
        self.client.storage_quota(&token).await
    }

    pub async fn list_files(&self, user_id: &str, query: &ListQuery) -> DriveResult<FileList> {
        let token = self.access_token_for(user_id).await?;
        self.client.list_files(&token, query).await
    }

    pub async fn upload_file(&self, user_id: &str, payload: UploadPayload) -> DriveResult<UploadedFile> {
        let token = self.access_token_for(user_id).await?;
        let size = payload.bytes.len();
        let uploaded = self.client.upload_file(&token, payload).await?;
        info!(user_id = %user_id, file_id = %uploaded.id, size, "Uploaded file to user drive");
        Ok(uploaded)
    }

    pub async fn download_file(&self, user_id: &str, file_id: &str) -> DriveResult<DownloadedFile> {
        let token = self.access_token_for(user_id).await?;
        self.client.download_file(&token, file_id).await
    }

    pub async fn delete_file(&self, user_id: &str, file_id: &str) -> DriveResult<()> {
        let token = self.access_token_for(user_id).await?;
        self.client.delete_file(&token, file_id).await?;
        info!(user_id = %user_id, file_id = %file_id, "Deleted file from user drive");
        Ok(())
    }

    pub async fn create_folder(
        &self,
        user_id: &str,
        name: &str,
        parent_id: Option<String>,
    ) -> DriveResult<DriveFile> {
        let token = self.access_token_for(user_id).await?;
        let folder = self.client.create_folder(&token, name, parent_id).await?;
        info!(user_id = %user_id, folder_id = %folder.id, "Created folder in user drive");
        Ok(folder)
    }
}
