//! Remote Sync
//!
//! Mirrors the files staged for one protocol into a remote folder named
//! after that protocol.
//!
//! 1. **Folder resolution**: look the folder up by exact name, create it when
//!    missing. Two requests racing on a brand-new protocol can both miss the
//!    lookup and both create a folder; nothing here prevents that.
//! 2. **Fan-out**: every staged file becomes its own upload task on a
//!    `JoinSet`, optionally capped by a semaphore. All tasks are awaited and
//!    their outcomes collected into a [`SyncReport`]. Files that made it to
//!    the remote side before another one failed are left there.

use crate::models::{RemoteFile, RemoteFolder, StagedFile, SyncFailure, SyncReport};
use crate::storage::{RemoteResult, RemoteStore, RemoteUpload};
use crate::types::ProtocolNumber;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

pub struct RemoteSync {
    store: Arc<dyn RemoteStore>,
    /// `None` means every upload starts at once
    limit: Option<Arc<Semaphore>>,
}

impl RemoteSync {
    pub fn new(store: Arc<dyn RemoteStore>, max_concurrency: usize) -> Self {
        let limit = (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)));
        Self { store, limit }
    }

    /// Find the folder named exactly `protocol`, creating it if absent.
    pub async fn resolve_folder(&self, protocol: &ProtocolNumber) -> RemoteResult<RemoteFolder> {
        if let Some(folder) = self.store.find_folder(protocol.as_str()).await? {
            info!(protocol = %protocol, folder_id = %folder.id, "Using existing remote folder");
            return Ok(folder);
        }

        info!(protocol = %protocol, "Remote folder not found, creating it");
        self.store.create_folder(protocol.as_str()).await
    }

    /// Resolve the folder, then upload every staged file concurrently.
    ///
    /// Errors only when folder resolution fails; per-file failures are
    /// reported in the returned [`SyncReport`]. Documents are launched
    /// before proofs of payment and results keep that order.
    pub async fn sync(&self, protocol: &ProtocolNumber, files: &[StagedFile]) -> RemoteResult<SyncReport> {
        let folder = self.resolve_folder(protocol).await?;

        let mut ordered: Vec<&StagedFile> = files.iter().collect();
        ordered.sort_by_key(|f| f.category);

        let mut tasks: JoinSet<(usize, String, RemoteResult<RemoteFile>)> = JoinSet::new();
        for (index, file) in ordered.into_iter().enumerate() {
            let store = Arc::clone(&self.store);
            let limit = self.limit.clone();
            let folder_id = folder.id.clone();
            let file = file.clone();

            tasks.spawn(async move {
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let result = upload_one(store.as_ref(), &folder_id, &file).await;
                (index, file.file_name, result)
            });
        }

        let mut uploaded: Vec<(usize, RemoteFile)> = Vec::new();
        let mut failures: Vec<(usize, SyncFailure)> = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(remote))) => uploaded.push((index, remote)),
                Ok((index, file_name, Err(e))) => {
                    error!(protocol = %protocol, file = %file_name, error = %e, "Remote upload failed");
                    failures.push((
                        index,
                        SyncFailure {
                            file_name,
                            error: e.to_string(),
                        },
                    ));
                }
                Err(e) => {
                    error!(protocol = %protocol, error = %e, "Upload task aborted");
                    failures.push((
                        usize::MAX,
                        SyncFailure {
                            file_name: String::new(),
                            error: format!("upload task aborted: {}", e),
                        },
                    ));
                }
            }
        }

        uploaded.sort_by_key(|(i, _)| *i);
        failures.sort_by_key(|(i, _)| *i);

        let report = SyncReport {
            folder_id: folder.id,
            uploaded: uploaded.into_iter().map(|(_, f)| f).collect(),
            failures: failures.into_iter().map(|(_, f)| f).collect(),
        };

        info!(
            protocol = %protocol,
            folder_id = %report.folder_id,
            uploaded = report.uploaded.len(),
            failed = report.failures.len(),
            "Remote sync finished"
        );
        Ok(report)
    }
}

async fn upload_one(store: &dyn RemoteStore, folder_id: &str, file: &StagedFile) -> RemoteResult<RemoteFile> {
    let data = tokio::fs::read(&file.path).await?;
    let upload = RemoteUpload {
        name: file.file_name.clone(),
        content_type: content_type_for(&file.file_name),
        data: bytes::Bytes::from(data),
    };
    store.upload_file(folder_id, upload).await
}

/// Content type guessed from the file extension.
pub fn content_type_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
