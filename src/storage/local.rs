//! Local staging of uploaded files.
//!
//! Files land in `<root>/<protocol>/` under a generated name built from the
//! category prefix, optionally the protocol number, and the calendar day.
//! The name carries no unique component, so a second file of the same
//! category for the same protocol on the same day replaces the first.

use crate::models::{IncomingFile, StagedFile};
use crate::types::{Category, ProtocolNumber};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    include_protocol_in_name: bool,
}

impl LocalStorage {
    pub fn new(root: PathBuf, include_protocol_in_name: bool) -> Self {
        Self {
            root,
            include_protocol_in_name,
        }
    }

    pub fn protocol_dir(&self, protocol: &ProtocolNumber) -> PathBuf {
        self.root.join(protocol)
    }

    /// Generated file name: `<PREFIX>_[<protocol>_]<DDMMYYYY><ext>`
    pub fn staged_name(
        &self,
        category: Category,
        protocol: &ProtocolNumber,
        original_name: &str,
        date: NaiveDate,
    ) -> String {
        let stamp = date.format("%d%m%Y");
        let ext = extension_of(original_name);
        if self.include_protocol_in_name {
            format!("{}_{}_{}{}", category.prefix(), protocol, stamp, ext)
        } else {
            format!("{}_{}{}", category.prefix(), stamp, ext)
        }
    }

    /// Write every file for `protocol`, dated with today's local calendar day.
    pub async fn stage(
        &self,
        protocol: &ProtocolNumber,
        files: Vec<IncomingFile>,
    ) -> std::io::Result<Vec<StagedFile>> {
        let today = chrono::Local::now().date_naive();
        self.stage_on(protocol, files, today).await
    }

    /// Same as [`stage`](Self::stage) with an explicit date.
    ///
    /// The returned list holds one entry per distinct path, in submission
    /// order; when two files map to the same name the later one wins.
    pub async fn stage_on(
        &self,
        protocol: &ProtocolNumber,
        files: Vec<IncomingFile>,
        date: NaiveDate,
    ) -> std::io::Result<Vec<StagedFile>> {
        let dir = self.protocol_dir(protocol);
        let mut staged: Vec<StagedFile> = Vec::with_capacity(files.len());

        for file in files {
            fs::create_dir_all(&dir).await?;

            let file_name = self.staged_name(file.category, protocol, &file.original_name, date);
            let path = dir.join(&file_name);
            fs::write(&path, &file.data).await?;

            debug!(
                protocol = %protocol,
                original = %file.original_name,
                file = %file_name,
                size = file.data.len(),
                "Staged file"
            );

            let entry = StagedFile {
                category: file.category,
                original_name: file.original_name,
                file_name,
                path,
                size: file.data.len() as u64,
            };

            if let Some(existing) = staged.iter_mut().find(|s| s.path == entry.path) {
                debug!(file = %entry.file_name, "Overwrote file staged earlier in the same request");
                *existing = entry;
            } else {
                staged.push(entry);
            }
        }

        info!(protocol = %protocol, files = staged.len(), dir = %dir.display(), "Upload staged locally");
        Ok(staged)
    }
}

/// Extension with its leading dot, or an empty string.
fn extension_of(original_name: &str) -> String {
    Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default()
}
