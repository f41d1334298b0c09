//! Baton Core Library
//!
//! Role assignment, task queue and orchestration control on top of a
//! [`baton_state::StateStore`].

pub mod assignment;
pub mod coordinator;
pub mod error;
pub mod obs;
pub mod orchestration;
pub mod queue;
pub mod telemetry;

pub use assignment::{
    occupant_id_at, required_roles, select_role, AgentBriefing, BriefedTask, RoleAssignment,
};
pub use coordinator::Coordinator;
pub use error::{BatonError, Result};
pub use orchestration::{derive_stage, OrchestrationReport, Stage, RESUMED};
pub use queue::{next_task_id, parse_task_data, tasks_for_role, TASK_SENT};
pub use telemetry::init_tracing;

pub use baton_state::{
    FsStateStore, Occupant, ResultStatus, ResultStore, Role, RoleRegistry, StateStore,
    StatusRecord, StorageError, Task, TaskId, TaskQueue, TaskResult, TaskStatus,
};

/// Crate version, reported by the CLI and the tool server.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
