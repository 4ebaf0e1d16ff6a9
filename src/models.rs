use crate::config::Config;
use crate::storage::LocalStorage;
use crate::sync::RemoteSync;
use crate::types::Category;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub storage: LocalStorage,
    /// Present only when the Drive mirror is enabled
    pub sync: Option<Arc<RemoteSync>>,
}

impl AppState {
    pub fn new(config: Config, sync: Option<Arc<RemoteSync>>) -> Self {
        let storage = LocalStorage::new(
            config.uploads.dir.clone(),
            config.uploads.include_protocol_in_name,
        );
        Self { config, storage, sync }
    }
}

/// A file received in the form, held in memory until the whole form is parsed.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub category: Category,
    pub original_name: String,
    pub data: bytes::Bytes,
}

/// A file written to the local staging directory.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StagedFile {
    pub category: Category,
    pub original_name: String,
    /// Generated name, e.g. `DOC_ABC123_18102026.pdf`
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncFailure {
    pub file_name: String,
    pub error: String,
}

/// Outcome of mirroring one protocol's staged files.
///
/// Uploads that succeeded before a failure stay in the remote folder.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncReport {
    pub folder_id: String,
    pub uploaded: Vec<RemoteFile>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn first_error(&self) -> Option<&str> {
        self.failures.first().map(|f| f.error.as_str())
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub remote_sync: bool,
}
