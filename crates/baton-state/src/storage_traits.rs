//! Storage trait for the shared coordination documents.
//!
//! `StateStore` exposes one read and one write per document so callers never
//! depend on file paths. Multi-document updates are bracketed by
//! [`StateStore::lock`], which serialises writers that share the store.
//!
//! In-memory fakes are provided for testing via the `fakes` module.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::schema::{ResultStore, RoleRegistry, StatusRecord, TaskQueue};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Guard returned by [`StateStore::lock`]. Dropping it releases the lock.
pub type StoreLock = tokio::sync::OwnedMutexGuard<()>;

/// The four documents every participant shares.
///
/// Guarantees:
/// - Reads of a document that was never written fail with
///   `StorageError::NotInitialized`.
/// - Each `save_*` replaces exactly one document; a crash between two saves
///   can leave documents mutually inconsistent.
/// - Writers holding the [`StoreLock`] do not interleave with other writers
///   of the same store instance.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// True when tasks, status and results documents all exist.
    async fn is_initialized(&self) -> StorageResult<bool>;

    async fn load_tasks(&self) -> StorageResult<TaskQueue>;
    async fn save_tasks(&self, tasks: &TaskQueue) -> StorageResult<()>;

    async fn load_status(&self) -> StorageResult<StatusRecord>;
    async fn save_status(&self, status: &StatusRecord) -> StorageResult<()>;

    async fn load_results(&self) -> StorageResult<ResultStore>;
    async fn save_results(&self, results: &ResultStore) -> StorageResult<()>;

    async fn load_registry(&self) -> StorageResult<RoleRegistry>;
    async fn save_registry(&self, registry: &RoleRegistry) -> StorageResult<()>;

    /// Mark every role available, duplicate registry entries included, and
    /// return the resulting registry. Creates the registry when missing.
    async fn reset_registry(&self) -> StorageResult<RoleRegistry>;

    /// Acquire the single-writer lock for a read-modify-write cycle.
    async fn lock(&self) -> StoreLock;
}
