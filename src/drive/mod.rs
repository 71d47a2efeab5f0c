//! Delegated cloud-drive access.
//!
//! [`DriveClient`] speaks the provider's REST API with a given access
//! token; [`DelegatedDrive`] wraps it with the credential lookup and token
//! refresh every admin-initiated call needs.

mod client;
mod error;
pub mod model;
mod operations;

pub use client::{DownloadedFile, DriveClient};
pub use error::{DriveError, DriveResult};
pub use model::{DriveFile, FileList, ListQuery, StorageQuota, UploadPayload, UploadedFile};
pub use operations::DelegatedDrive;
