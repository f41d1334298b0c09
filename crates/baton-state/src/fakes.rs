//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryStateStore`, which satisfies the `StateStore` contract
//! without touching the filesystem.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{ResultStore, RoleRegistry, StatusRecord, TaskQueue};
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Documents {
    tasks: Option<TaskQueue>,
    status: Option<StatusRecord>,
    results: Option<ResultStore>,
    registry: Option<RoleRegistry>,
}

/// In-memory state store. Each document starts absent, like a fresh directory.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    docs: Mutex<Documents>,
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with only the registry document present.
    pub fn with_registry(registry: RoleRegistry) -> Self {
        let store = Self::new();
        store.docs.lock().unwrap().registry = Some(registry);
        store
    }

    /// Store with every document present: empty queue and results, a freshly
    /// initialized status record and all roles available.
    pub fn initialized() -> Self {
        let store = Self::with_registry(RoleRegistry::all_available());
        {
            let mut docs = store.docs.lock().unwrap();
            docs.tasks = Some(TaskQueue::default());
            docs.status = Some(StatusRecord::initialized());
            docs.results = Some(ResultStore::default());
        }
        store
    }
}

fn missing(document: &str) -> StorageError {
    StorageError::NotInitialized {
        document: document.to_string(),
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn is_initialized(&self) -> StorageResult<bool> {
        let docs = self.docs.lock().unwrap();
        Ok(docs.tasks.is_some() && docs.status.is_some() && docs.results.is_some())
    }

    async fn load_tasks(&self) -> StorageResult<TaskQueue> {
        let docs = self.docs.lock().unwrap();
        docs.tasks.clone().ok_or_else(|| missing("tasks"))
    }

    async fn save_tasks(&self, tasks: &TaskQueue) -> StorageResult<()> {
        self.docs.lock().unwrap().tasks = Some(tasks.clone());
        Ok(())
    }

    async fn load_status(&self) -> StorageResult<StatusRecord> {
        let docs = self.docs.lock().unwrap();
        docs.status.clone().ok_or_else(|| missing("status"))
    }

    async fn save_status(&self, status: &StatusRecord) -> StorageResult<()> {
        self.docs.lock().unwrap().status = Some(status.clone());
        Ok(())
    }

    async fn load_results(&self) -> StorageResult<ResultStore> {
        let docs = self.docs.lock().unwrap();
        docs.results.clone().ok_or_else(|| missing("results"))
    }

    async fn save_results(&self, results: &ResultStore) -> StorageResult<()> {
        self.docs.lock().unwrap().results = Some(results.clone());
        Ok(())
    }

    async fn load_registry(&self) -> StorageResult<RoleRegistry> {
        let docs = self.docs.lock().unwrap();
        docs.registry.clone().ok_or_else(|| missing("registry"))
    }

    async fn save_registry(&self, registry: &RoleRegistry) -> StorageResult<()> {
        self.docs.lock().unwrap().registry = Some(registry.clone());
        Ok(())
    }

    async fn reset_registry(&self) -> StorageResult<RoleRegistry> {
        let registry = RoleRegistry::all_available();
        self.docs.lock().unwrap().registry = Some(registry.clone());
        Ok(registry)
    }

    async fn lock(&self) -> StoreLock {
        self.writer.clone().lock_owned().await
    }
}
