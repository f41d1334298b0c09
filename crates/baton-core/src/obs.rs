//! Structured observability hooks for the coordination lifecycle.
//!
//! - One emitter per lifecycle event: role assignment, enqueue, start,
//!   completion and state reset
//!
//! Events are emitted at `info!` level; inconsistencies at `warn!`.

use baton_state::{ResultStatus, Role, TaskId};
use tracing::{info, warn};

pub fn emit_role_assigned(role: Role, occupant_id: &str) {
    info!(event = "role.assigned", role = %role, occupant_id = %occupant_id);
}

pub fn emit_task_enqueued(task_id: &TaskId, task_type: &str, target_role: Option<&str>) {
    info!(
        event = "task.enqueued",
        task_id = %task_id,
        task_type = %task_type,
        target_role = target_role.unwrap_or("-"),
    );
}

pub fn emit_task_started(task_id: &TaskId) {
    info!(event = "task.started", task_id = %task_id);
}

pub fn emit_task_completed(task_id: &TaskId, status: ResultStatus) {
    info!(event = "task.completed", task_id = %task_id, status = %status);
}

/// The completed id is not the current task: the result is kept but the
/// queue is left as it was.
pub fn emit_completion_mismatch(task_id: &TaskId, current: Option<&TaskId>) {
    warn!(
        event = "task.completion_mismatch",
        task_id = %task_id,
        current_task_id = current.map(TaskId::as_str).unwrap_or("none"),
    );
}

pub fn emit_state_reset(roles_reset: usize) {
    info!(event = "state.reset", roles_reset = roles_reset);
}
