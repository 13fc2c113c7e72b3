//! File-backed collection store with per-collection mutual exclusion.
//!
//! Every collection is a JSON array in its own file. `mutate` holds the
//! collection's lock across read → update → write, so concurrent callers on
//! the same key are serialized instead of interleaved. Writes go to a temp
//! file in the destination directory and are renamed over the target, so a
//! crash mid-write leaves the previous contents intact.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::debug;

use super::error::PipelineError;
use crate::config::paths::Workspace;

/// Durable JSON collections under a workspace home
pub struct WorkspaceStore {
    workspace: Workspace,

    /// One async lock per collection key
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl WorkspaceStore {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Read the collection, apply `update`, and write the whole collection back.
    ///
    /// A missing file is treated as an empty collection. Returns whatever
    /// `update` returns.
    pub async fn mutate<T, R, F>(&self, key: &str, update: F) -> Result<R, PipelineError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>) -> R,
    {
        let (path, canonical) = self.resolve_key(key)?;
        let lock = self.lock_for(&canonical)?;
        let _guard = lock.lock().await;

        let mut records = read_collection(&path).await?;
        let result = update(&mut records);
        write_collection(&path, &records).await?;

        debug!(key, records = records.len(), "Collection written");
        Ok(result)
    }

    /// Replace a collection wholesale
    pub async fn replace<T>(&self, key: &str, records: Vec<T>) -> Result<(), PipelineError>
    where
        T: Serialize + DeserializeOwned,
    {
        self.mutate(key, move |existing: &mut Vec<T>| *existing = records)
            .await
    }

    /// Snapshot of a collection (empty if absent)
    pub async fn load<T>(&self, key: &str) -> Result<Vec<T>, PipelineError>
    where
        T: DeserializeOwned,
    {
        let (path, canonical) = self.resolve_key(key)?;
        let lock = self.lock_for(&canonical)?;
        let _guard = lock.lock().await;

        read_collection(&path).await
    }

    /// Keys of the `*.json` collections directly inside a directory key
    pub async fn list(&self, dir_key: &str) -> Result<Vec<String>, PipelineError> {
        let (dir, _) = self.resolve_key(dir_key)?;
        let mut keys = Vec::new();

        if !dir.exists() {
            return Ok(keys);
        }

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".json") && entry.file_type().await?.is_file() {
                    keys.push(format!("{}/{}", dir_key.trim_end_matches('/'), name));
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn lock_for(&self, key: &str) -> Result<Arc<tokio::sync::Mutex<()>>, PipelineError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| PipelineError::Persistence("store lock table poisoned".to_string()))?;

        Ok(Arc::clone(locks.entry(key.to_string()).or_default()))
    }

    /// Validate a key and return its file path plus the canonical key used
    /// for locking. Spellings of the same file (`runs/./x.json`,
    /// `runs//x.json`) share one canonical key and therefore one lock.
    fn resolve_key(&self, key: &str) -> Result<(PathBuf, String), PipelineError> {
        let mut parts = Vec::new();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(PipelineError::Persistence(format!(
                        "Invalid collection key: {}",
                        key
                    )))
                }
            }
        }

        if parts.is_empty() {
            return Err(PipelineError::Persistence(format!(
                "Invalid collection key: {}",
                key
            )));
        }

        let canonical = parts.join("/");
        Ok((self.workspace.resolve(&canonical), canonical))
    }
}

async fn read_collection<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PipelineError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).await.map_err(|e| {
        PipelineError::Persistence(format!("Failed to read {}: {}", path.display(), e))
    })?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|e| {
        PipelineError::Persistence(format!("Failed to parse {}: {}", path.display(), e))
    })
}

async fn write_collection<T: Serialize>(path: &Path, records: &[T]) -> Result<(), PipelineError> {
    let bytes = serde_json::to_vec_pretty(records).map_err(|e| {
        PipelineError::Persistence(format!("Failed to serialize {}: {}", path.display(), e))
    })?;

    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| PipelineError::Persistence(format!("No parent for {}", path.display())))?;

    fs::create_dir_all(&parent).await.map_err(|e| {
        PipelineError::Persistence(format!("Failed to create {}: {}", parent.display(), e))
    })?;

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| PipelineError::Persistence(format!("Write task failed: {}", e)))?
    .map_err(|e| PipelineError::Persistence(format!("Failed to write {}: {}", path.display(), e)))
}
