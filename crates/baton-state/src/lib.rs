//! Baton-State: shared coordination documents
//!
//! Orchestrator and agents coordinate through four documents in one shared
//! directory: a task queue, a status record, a result store and a Markdown
//! role registry. This crate owns their schema and the [`StateStore`]
//! abstraction the rest of Baton depends on.
//!
//! ## Key Components
//!
//! - `StateStore`: per-document read/write plus a single-writer lock
//! - `FsStateStore`: directory-backed implementation with atomic writes
//! - `fakes::MemoryStateStore`: in-memory implementation for tests
//! - `registry_doc`: text boundary for the role registry document

mod error;
pub mod fakes;
pub mod fs_store;
pub mod registry_doc;
mod schema;
pub mod storage_traits;

pub use error::StorageError;
pub use fs_store::FsStateStore;
pub use schema::{
    Occupant, ResultStatus, ResultStore, Role, RoleRegistry, StatusRecord, Task, TaskId,
    TaskQueue, TaskResult, TaskStatus, TARGET_ROLE_KEY,
};
pub use storage_traits::{StateStore, StorageResult, StoreLock};
