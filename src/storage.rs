//! Storage backends
//!
//! The store talks to persistence through [`StorageBackend`], a minimal
//! async contract: load or save one JSON blob under a fixed key. Any backend
//! failure surfaces as [`Error::StorageUnavailable`]; backends never retry.
//!
//! Two implementations ship with the crate: [`JsonFileBackend`] keeps blobs
//! in a JSON file on disk, and [`MemoryBackend`] keeps them in memory for
//! tests and embedding.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Async persistence contract consumed by [`PrefStore`](crate::PrefStore)
///
/// A backend is a flat key-to-blob mapping. The store only ever uses a single
/// fixed key, but the contract leaves the namespace to the backend so one
/// file or host store can hold entries for several components.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Loads the blob stored under `key`, or `None` if nothing is stored
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>>;

    /// Stores `blob` under `key`, replacing any previous value
    async fn save(&self, key: &str, blob: &serde_json::Value) -> Result<()>;
}

fn storage_err(context: &str, err: impl std::fmt::Display) -> Error {
    Error::StorageUnavailable {
        message: format!("{}: {}", context, err),
    }
}

/// File-backed storage
///
/// The whole backend is one JSON object mapping storage keys to blobs. Saves
/// go through a sibling `.tmp` file followed by a rename, so a crash mid-write
/// leaves the previous file intact. A missing file reads as an empty backend.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    // serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileBackend {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(serde_json::Map::new()),
            Err(err) => return Err(storage_err("failed to read preference file", err)),
        };
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|err| storage_err("preference file is not valid JSON", err))?;
        match value {
            serde_json::Value::Object(entries) => Ok(entries),
            _ => Err(storage_err(
                "preference file is malformed",
                "top-level value is not an object",
            )),
        }
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_entries().await?.get(key).cloned())
    }

    async fn save(&self, key: &str, blob: &serde_json::Value) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), blob.clone());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| storage_err("failed to create preference directory", err))?;
            }
        }

        let serialized = serde_json::to_vec_pretty(&serde_json::Value::Object(entries))
            .map_err(|err| storage_err("failed to serialize preferences", err))?;
        let tmp_path = self.path.with_extension("tmp");
        tokio::fs::write(&tmp_path, &serialized)
            .await
            .map_err(|err| storage_err("failed to write preference file", err))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|err| storage_err("failed to replace preference file", err))?;
        debug!(path = %self.path.display(), key, "saved preference blob");
        Ok(())
    }
}

/// In-memory storage, for tests and embedding
///
/// Clones share the same underlying map, so two stores constructed over
/// clones of one `MemoryBackend` observe each other's writes, mimicking two
/// extension contexts over the same host storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, serde_json::Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, blob: &serde_json::Value) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), blob.clone());
        Ok(())
    }
}
