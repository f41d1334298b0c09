//! Directory-backed state store.
//!
//! Layout (relative to the store root):
//!
//! ```text
//! tasks.json             TaskQueue
//! status.json            StatusRecord
//! results.json           ResultStore
//! AGENT_INSTRUCTIONS.md  role registry, embedded in free-form Markdown
//! ```
//!
//! Every document is replaced atomically (temp file in the same directory,
//! then rename). Other processes sharing the directory are not locked out;
//! across processes the last writer wins.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::registry_doc::{parse_registry, render_registry, reset_registry_text};
use crate::schema::{ResultStore, RoleRegistry, StatusRecord, TaskQueue};
use crate::storage_traits::*;

pub const TASKS_FILE: &str = "tasks.json";
pub const STATUS_FILE: &str = "status.json";
pub const RESULTS_FILE: &str = "results.json";
pub const REGISTRY_FILE: &str = "AGENT_INSTRUCTIONS.md";

/// Filesystem-backed [`StateStore`] rooted at a shared directory.
#[derive(Debug, Clone)]
pub struct FsStateStore {
    root: PathBuf,
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl FsStateStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            writer: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    async fn read_text(&self, file: &str) -> StorageResult<Option<String>> {
        let path = self.document_path(file);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> StorageResult<T> {
        let text = self
            .read_text(file)
            .await?
            .ok_or_else(|| StorageError::NotInitialized {
                document: file.to_string(),
            })?;
        serde_json::from_str(&text).map_err(|source| StorageError::Malformed {
            path: self.document_path(file).display().to_string(),
            source,
        })
    }

    async fn write_json<T: Serialize>(&self, file: &str, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(file, bytes).await
    }

    async fn write_bytes(&self, file: &str, bytes: Vec<u8>) -> StorageResult<()> {
        let dir = self.root.clone();
        let path = self.document_path(file);
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
            .await
            .map_err(std::io::Error::other)
            .and_then(|r| r)
            .map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }

    async fn exists(&self, file: &str) -> StorageResult<bool> {
        let path = self.document_path(file);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.display().to_string(),
                source,
            })
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn is_initialized(&self) -> StorageResult<bool> {
        for file in [TASKS_FILE, STATUS_FILE, RESULTS_FILE] {
            if !self.exists(file).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn load_tasks(&self) -> StorageResult<TaskQueue> {
        self.read_json(TASKS_FILE).await
    }

    async fn save_tasks(&self, tasks: &TaskQueue) -> StorageResult<()> {
        self.write_json(TASKS_FILE, tasks).await
    }

    async fn load_status(&self) -> StorageResult<StatusRecord> {
        self.read_json(STATUS_FILE).await
    }

    async fn save_status(&self, status: &StatusRecord) -> StorageResult<()> {
        self.write_json(STATUS_FILE, status).await
    }

    async fn load_results(&self) -> StorageResult<ResultStore> {
        self.read_json(RESULTS_FILE).await
    }

    async fn save_results(&self, results: &ResultStore) -> StorageResult<()> {
        self.write_json(RESULTS_FILE, results).await
    }

    async fn load_registry(&self) -> StorageResult<RoleRegistry> {
        let text = self
            .read_text(REGISTRY_FILE)
            .await?
            .ok_or_else(|| StorageError::NotInitialized {
                document: REGISTRY_FILE.to_string(),
            })?;
        Ok(parse_registry(&text))
    }

    async fn save_registry(&self, registry: &RoleRegistry) -> StorageResult<()> {
        let current = self.read_text(REGISTRY_FILE).await?.unwrap_or_default();
        let rendered = render_registry(&current, registry);
        self.write_bytes(REGISTRY_FILE, rendered.into_bytes()).await
    }

    async fn reset_registry(&self) -> StorageResult<RoleRegistry> {
        let current = self.read_text(REGISTRY_FILE).await?.unwrap_or_default();
        let rendered = reset_registry_text(&current);
        let registry = parse_registry(&rendered);
        self.write_bytes(REGISTRY_FILE, rendered.into_bytes()).await?;
        debug!(roles = registry.len(), "registry reset");
        Ok(registry)
    }

    async fn lock(&self) -> StoreLock {
        self.writer.clone().lock_owned().await
    }
}
