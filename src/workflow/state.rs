//! Execution Snapshot Files
//!
//! A [`Persistence`] implementation that keeps the latest snapshot of every
//! execution as pretty-printed JSON in a state directory:
//!
//! ```text
//! .steprunner/
//!   2f1c...e9.json
//!   order-42.json
//! ```
//!
//! Ids are percent-encoded into file names, so distinct ids never share a
//! file. Snapshots are written to a uniquely named temporary file and renamed
//! into place, one save at a time, so a reader never sees a half-written
//! record. The inspection CLI and restart
//! recovery ([`WorkflowManager::restore`](crate::execution::WorkflowManager::restore))
//! read them back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::fs;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::model::WorkflowExecution;
use crate::error::{BoxError, Result};
use crate::execution::Persistence;

/// File extension of snapshot files.
const SNAPSHOT_EXT: &str = "json";

/// Directory of execution snapshots, one file per execution.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    writes: Arc<Mutex<()>>,
}

impl FileSnapshotStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for an execution id.
    ///
    /// Bytes outside `[A-Za-z0-9_-]` are written as `%XX`, so caller-supplied
    /// ids cannot escape the directory and two ids never map to one file.
    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_id(id), SNAPSHOT_EXT))
    }

    /// Writes a snapshot, replacing any previous one for the same id.
    pub async fn save(&self, execution: &WorkflowExecution) -> Result<()> {
        let json = serde_json::to_string_pretty(execution)?;
        let path = self.path_for(&execution.id);
        let tmp = path.with_extension(format!("{}.{}.tmp", SNAPSHOT_EXT, Uuid::new_v4().simple()));

        let _write = self.writes.lock().await;
        fs::create_dir_all(&self.dir).await?;
        if let Err(e) = fs::write(&tmp, json).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        fs::rename(&tmp, &path).await?;

        debug!("Saved execution {} to {}", execution.id, path.display());
        Ok(())
    }

    /// Loads the snapshot of one execution.
    pub async fn load(&self, id: &str) -> Result<WorkflowExecution> {
        Self::read(&self.path_for(id)).await
    }

    /// Loads every readable snapshot in the directory, oldest first.
    ///
    /// Files that fail to parse are skipped with a warning. A missing
    /// directory yields an empty list.
    pub async fn load_all(&self) -> Result<Vec<WorkflowExecution>> {
        let mut executions = Vec::new();

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(executions),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }

            match Self::read(&path).await {
                Ok(execution) => executions.push(execution),
                Err(e) => warn!("Skipping unreadable snapshot {}: {}", path.display(), e),
            }
        }

        executions.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.id.cmp(&b.id)));
        info!(
            "Loaded {} execution snapshot(s) from {}",
            executions.len(),
            self.dir.display()
        );
        Ok(executions)
    }

    /// Deletes the snapshot of an execution. Returns false if none existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let path = self.path_for(id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted snapshot: {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(path: &Path) -> Result<WorkflowExecution> {
        let content = fs::read_to_string(path).await?;
        let mut execution: WorkflowExecution = serde_json::from_str(&content)?;
        execution.reindex();
        Ok(execution)
    }
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`.
fn encode_id(id: &str) -> String {
    let mut stem = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

#[async_trait]
impl Persistence for FileSnapshotStore {
    async fn save_execution(&self, execution: &WorkflowExecution) -> std::result::Result<(), BoxError> {
        self.save(execution).await.map_err(Into::into)
    }
}
