//! Task queue operations.
//!
//! Lifecycle per task: `pending -> in_progress -> {completed, failed}`. There
//! is no retry and no cancellation. Only the current task can be started or
//! completed; other ids are ignored (start) or leave the queue untouched
//! (complete).

use baton_state::{
    ResultStatus, Role, StateStore, StatusRecord, Task, TaskId, TaskQueue, TaskResult,
    TaskStatus,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::coordinator::Coordinator;
use crate::error::{BatonError, Result};
use crate::obs;

/// Orchestrator status written when a task is dispatched.
pub const TASK_SENT: &str = "task_sent";

/// Time-derived id (milliseconds since the epoch), bumped past any id the
/// queue already holds.
pub fn next_task_id(queue: &TaskQueue, now: DateTime<Utc>) -> TaskId {
    let mut millis = now.timestamp_millis();
    loop {
        let id = TaskId(millis.to_string());
        if !queue.contains_id(&id) {
            return id;
        }
        millis += 1;
    }
}

/// Parse a CLI/tool supplied payload. Absent or empty input yields `{}`.
pub fn parse_task_data(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(BatonError::InvalidTaskData(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(BatonError::InvalidTaskData(e.to_string())),
    }
}

/// Tasks in `queue.pending_tasks` routed to `role`.
pub fn tasks_for_role(queue: &TaskQueue, role: Role) -> Vec<Task> {
    queue
        .pending_tasks
        .iter()
        .filter(|t| t.targets(role))
        .cloned()
        .collect()
}

impl<S> Coordinator<S>
where
    S: StateStore,
{
    /// Create a pending task, make it the current task and append it to the
    /// pending list.
    pub async fn enqueue(
        &self,
        task_type: &str,
        description: &str,
        data: Map<String, Value>,
    ) -> Result<TaskId> {
        let _lock = self.store.lock().await;
        let mut tasks = self.store.load_tasks().await?;
        let mut status = self.store.load_status().await?;

        let now = Utc::now();
        let task = Task {
            id: next_task_id(&tasks, now),
            task_type: task_type.to_string(),
            description: description.to_string(),
            data,
            status: TaskStatus::Pending,
            timestamp: now,
            started_at: None,
            completed_at: None,
        };
        let id = task.id.clone();
        obs::emit_task_enqueued(&id, &task.task_type, task.target_role());

        tasks.current_task = Some(task.clone());
        tasks.pending_tasks.push(task);
        self.store.save_tasks(&tasks).await?;

        status.orchestrator_status = TASK_SENT.to_string();
        status.current_task_id = Some(id.clone());
        status.touch();
        self.store.save_status(&status).await?;

        Ok(id)
    }

    /// Read-only: every task in the pending list routed to `role`.
    pub async fn claim_pending(&self, role: Role) -> Result<Vec<Task>> {
        let tasks = self.store.load_tasks().await?;
        Ok(tasks_for_role(&tasks, role))
    }

    /// Move the current task to `in_progress`.
    ///
    /// Returns `false` without writing anything when `task_id` is not the
    /// current task.
    #[tracing::instrument(name = "baton.task.start", skip_all, fields(task_id = %task_id))]
    pub async fn start(&self, task_id: &TaskId) -> Result<bool> {
        let _lock = self.store.lock().await;
        let mut tasks = self.store.load_tasks().await?;

        let now = Utc::now();
        match tasks.current_task.as_mut() {
            Some(current) if &current.id == task_id => {
                current.status = TaskStatus::InProgress;
                current.started_at = Some(now);
            }
            _ => {
                debug!(task_id = %task_id, "start ignored: not the current task");
                return Ok(false);
            }
        }
        if let Some(entry) = tasks.pending_tasks.iter_mut().find(|t| &t.id == task_id) {
            entry.status = TaskStatus::InProgress;
            entry.started_at = Some(now);
        }
        self.store.save_tasks(&tasks).await?;

        let mut status = self.store.load_status().await?;
        status.agent_status = StatusRecord::WORKING.to_string();
        status.touch();
        self.store.save_status(&status).await?;

        obs::emit_task_started(task_id);
        Ok(true)
    }

    /// Record a result for `task_id` and, when it is the current task, move
    /// it into the history with a terminal status.
    ///
    /// The result is recorded and the agent marked idle even when `task_id`
    /// does not match; in that case the current task is left in place.
    #[tracing::instrument(name = "baton.task.complete", skip_all, fields(task_id = %task_id))]
    pub async fn complete(
        &self,
        task_id: &TaskId,
        description: &str,
        output: Value,
        success: bool,
    ) -> Result<TaskResult> {
        let _lock = self.store.lock().await;
        let now = Utc::now();
        let outcome = ResultStatus::from_success(success);

        let result = TaskResult {
            task_id: task_id.clone(),
            description: description.to_string(),
            output,
            status: outcome,
            timestamp: now,
        };
        let mut results = self.store.load_results().await?;
        results.record(result.clone());
        self.store.save_results(&results).await?;

        let mut tasks = self.store.load_tasks().await?;
        match tasks.current_task.take() {
            Some(mut current) if &current.id == task_id => {
                current.status = outcome.task_status();
                current.completed_at = Some(now);
                tasks.pending_tasks.retain(|t| &t.id != task_id);
                tasks.task_history.push(current);
                self.store.save_tasks(&tasks).await?;
            }
            other => {
                obs::emit_completion_mismatch(task_id, other.as_ref().map(|t| &t.id));
            }
        }

        let mut status = self.store.load_status().await?;
        status.agent_status = StatusRecord::IDLE.to_string();
        status.current_task_id = None;
        status.touch();
        self.store.save_status(&status).await?;

        obs::emit_task_completed(task_id, outcome);
        Ok(result)
    }

    /// The current task, only while it is still waiting to be started.
    pub async fn check_for_tasks(&self) -> Result<Option<Task>> {
        let tasks = self.store.load_tasks().await?;
        Ok(tasks
            .current_task
            .filter(|t| t.status == TaskStatus::Pending))
    }

    pub async fn current_task(&self) -> Result<Option<Task>> {
        Ok(self.store.load_tasks().await?.current_task)
    }

    pub async fn pending_tasks(&self) -> Result<Vec<Task>> {
        Ok(self.store.load_tasks().await?.pending_tasks)
    }

    pub async fn task_history(&self) -> Result<Vec<Task>> {
        Ok(self.store.load_tasks().await?.task_history)
    }
}
