//! JSON document persistence shared by all three stores.
//!
//! Each store is mirrored to one JSON document that is reloaded at startup
//! and rewritten after every mutation. Loading never fails: a missing,
//! empty, unreadable or corrupt file yields an empty document.
//!
//! Writes go to a temp file that is then renamed over the target. Every
//! snapshot carries the store's mutation version; the writer drops any
//! snapshot older than the last one written, so concurrent mutations that
//! finish their I/O out of order cannot roll the file back.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;
use tradematch_types::{Result, TradematchError};
use uuid::Uuid;

/// A store's serialized state tagged with the mutation that produced it.
#[derive(Debug, Clone)]
pub struct Snapshot<D> {
    pub version: u64,
    pub document: D,
}

/// One persisted JSON document.
pub struct JsonDocument {
    /// Short name used in logs and errors ("offers", "ledger", ...).
    name: &'static str,
    /// `None` for in-memory stores.
    path: Option<PathBuf>,
    /// Version of the last snapshot written to disk.
    written: Mutex<u64>,
}

impl JsonDocument {
    #[must_use]
    pub fn new(name: &'static str, path: Option<PathBuf>) -> Self {
        Self {
            name,
            path,
            written: Mutex::new(0),
        }
    }

    #[must_use]
    pub fn in_memory(name: &'static str) -> Self {
        Self::new(name, None)
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the document, falling back to `D::default()` on any problem.
    pub fn load<D: DeserializeOwned + Default>(&self) -> D {
        let Some(path) = self.path.as_ref() else {
            return D::default();
        };

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    document = self.name,
                    path = %path.display(),
                    "No persisted document; starting empty"
                );
                return D::default();
            }
            Err(error) => {
                tracing::warn!(
                    document = self.name,
                    path = %path.display(),
                    error = %error,
                    "Failed to read document; starting empty"
                );
                return D::default();
            }
        };

        if raw.trim().is_empty() {
            return D::default();
        }

        match serde_json::from_str::<D>(&raw) {
            Ok(document) => document,
            Err(error) => {
                let err = TradematchError::CorruptState {
                    document: self.name.to_string(),
                    reason: error.to_string(),
                };
                tracing::warn!(
                    document = self.name,
                    path = %path.display(),
                    error = %err,
                    "Corrupt document; starting empty"
                );
                D::default()
            }
        }
    }

    /// Write a snapshot unless a newer one has already been written.
    ///
    /// Returns `Ok(false)` when the snapshot was stale and skipped.
    pub async fn write<D: Serialize>(&self, snapshot: &Snapshot<D>) -> Result<bool> {
        let Some(path) = self.path.as_ref() else {
            return Ok(false);
        };

        let mut written = self.written.lock().await;
        if snapshot.version <= *written {
            return Ok(false);
        }

        let payload = serde_json::to_vec_pretty(&snapshot.document)
            .map_err(|error| self.persistence_error(format!("encode failed: {error}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| self.persistence_error(format!("create dir failed: {error}")))?;
        }

        let temp_path = path.with_extension(format!("{}.tmp", Uuid::now_v7().simple()));
        tokio::fs::write(&temp_path, payload)
            .await
            .map_err(|error| self.persistence_error(format!("write failed: {error}")))?;

        if let Err(error) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(self.persistence_error(format!("rename failed: {error}")));
        }

        *written = snapshot.version;
        Ok(true)
    }

    /// Write a snapshot, logging instead of returning a failure.
    ///
    /// The in-memory store stays authoritative; the next successful write
    /// catches the file up.
    pub async fn write_logged<D: Serialize>(&self, snapshot: &Snapshot<D>) {
        if let Err(error) = self.write(snapshot).await {
            tracing::warn!(
                document = self.name,
                version = snapshot.version,
                error = %error,
                "Persisting document failed; keeping in-memory state"
            );
        }
    }

    fn persistence_error(&self, reason: String) -> TradematchError {
        TradematchError::Persistence {
            document: self.name.to_string(),
            reason,
        }
    }
}
