use crate::models::{RemoteFile, RemoteFolder};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Remote API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to read staged file: {0}")]
    Io(#[from] std::io::Error),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// A file body ready to be pushed into a remote folder.
#[derive(Debug, Clone)]
pub struct RemoteUpload {
    pub name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
}

/// Minimal folder/file surface of a cloud file store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// First non-trashed folder whose name equals `name` exactly.
    async fn find_folder(&self, name: &str) -> RemoteResult<Option<RemoteFolder>>;

    async fn create_folder(&self, name: &str) -> RemoteResult<RemoteFolder>;

    async fn upload_file(&self, folder_id: &str, upload: RemoteUpload) -> RemoteResult<RemoteFile>;
}
