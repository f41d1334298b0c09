//! Orchestration control: stage derivation, initialisation and reset.

use std::fmt;

use baton_state::{ResultStore, StateStore, StatusRecord, TaskQueue, TaskResult, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::obs;

/// Orchestrator status written by [`Coordinator::resume`].
pub const RESUMED: &str = "resumed";

/// Summary label for overall progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NeedsInitialization,
    OrchestrationComplete,
    WorkInProgress,
    TasksPending,
    ReadyForTasks,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NeedsInitialization => "needs_initialization",
            Stage::OrchestrationComplete => "orchestration_complete",
            Stage::WorkInProgress => "work_in_progress",
            Stage::TasksPending => "tasks_pending",
            Stage::ReadyForTasks => "ready_for_tasks",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts behind a [`Stage`], plus the latest result and orchestrator status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationReport {
    pub stage: Stage,
    pub pending_tasks: usize,
    pub in_progress_tasks: usize,
    pub completed_tasks: usize,
    pub latest_result: Option<TaskResult>,
    pub orchestrator_status: Option<String>,
}

impl OrchestrationReport {
    fn needs_initialization() -> Self {
        Self {
            stage: Stage::NeedsInitialization,
            pending_tasks: 0,
            in_progress_tasks: 0,
            completed_tasks: 0,
            latest_result: None,
            orchestrator_status: None,
        }
    }
}

/// Stage from queue counts. Completion is checked first: it requires at
/// least one completed task in history and nothing pending or in progress.
pub fn derive_stage(queue: &TaskQueue) -> Stage {
    let pending = queue.count_pending_with(TaskStatus::Pending);
    let in_progress = queue.count_pending_with(TaskStatus::InProgress);
    let completed = queue.count_history_with(TaskStatus::Completed);

    if pending == 0 && in_progress == 0 && completed > 0 {
        Stage::OrchestrationComplete
    } else if in_progress > 0 {
        Stage::WorkInProgress
    } else if pending > 0 {
        Stage::TasksPending
    } else {
        Stage::ReadyForTasks
    }
}

impl<S> Coordinator<S>
where
    S: StateStore,
{
    pub async fn compute_stage(&self) -> Result<Stage> {
        Ok(self.orchestration_status().await?.stage)
    }

    /// Derive the stage from the stored documents. Any missing document
    /// yields [`Stage::NeedsInitialization`] rather than an error.
    pub async fn orchestration_status(&self) -> Result<OrchestrationReport> {
        let loaded = async {
            let status = self.store.load_status().await?;
            let tasks = self.store.load_tasks().await?;
            let results = self.store.load_results().await?;
            Ok::<_, baton_state::StorageError>((status, tasks, results))
        }
        .await;

        let (status, tasks, results) = match loaded {
            Ok(docs) => docs,
            Err(e) if e.is_not_initialized() => {
                return Ok(OrchestrationReport::needs_initialization())
            }
            Err(e) => return Err(e.into()),
        };

        Ok(OrchestrationReport {
            stage: derive_stage(&tasks),
            pending_tasks: tasks.count_pending_with(TaskStatus::Pending),
            in_progress_tasks: tasks.count_pending_with(TaskStatus::InProgress),
            completed_tasks: tasks.count_history_with(TaskStatus::Completed),
            latest_result: results.latest_result,
            orchestrator_status: Some(status.orchestrator_status),
        })
    }

    /// Write empty tasks/results documents and an `initialized` status.
    /// The role registry is not touched.
    pub async fn initialize(&self) -> Result<()> {
        let _lock = self.store.lock().await;
        self.write_clean_slate().await
    }

    /// Clean slate plus every registry role, orchestrator included, back to
    /// `AVAILABLE`.
    pub async fn reset_all(&self) -> Result<()> {
        let _lock = self.store.lock().await;
        self.write_clean_slate().await?;

        let registry = self.store.reset_registry().await?;

        obs::emit_state_reset(registry.len());
        Ok(())
    }

    /// Pick up from whatever state is on disk, initialising only when the
    /// documents are missing, then mark the orchestrator as resumed.
    ///
    /// The returned report describes the state found before resuming.
    pub async fn resume(&self) -> Result<OrchestrationReport> {
        let report = self.orchestration_status().await?;
        if report.stage == Stage::NeedsInitialization {
            info!("state documents missing; initialising a clean slate");
            self.initialize().await?;
        }
        self.update_orchestrator_status(RESUMED).await?;
        Ok(report)
    }

    /// Set `orchestrator_status`, creating the status document if needed.
    pub async fn update_orchestrator_status(&self, value: &str) -> Result<()> {
        let _lock = self.store.lock().await;
        let mut status = match self.store.load_status().await {
            Ok(status) => status,
            Err(e) if e.is_not_initialized() => StatusRecord::initialized(),
            Err(e) => return Err(e.into()),
        };
        status.orchestrator_status = value.to_string();
        status.touch();
        self.store.save_status(&status).await?;
        Ok(())
    }

    pub async fn latest_result(&self) -> Result<Option<TaskResult>> {
        Ok(self.store.load_results().await?.latest_result)
    }

    pub async fn results_history(&self) -> Result<Vec<TaskResult>> {
        Ok(self.store.load_results().await?.results_history)
    }

    pub async fn status(&self) -> Result<StatusRecord> {
        Ok(self.store.load_status().await?)
    }

    async fn write_clean_slate(&self) -> Result<()> {
        self.store.save_tasks(&TaskQueue::default()).await?;
        self.store.save_results(&ResultStore::default()).await?;
        self.store.save_status(&StatusRecord::initialized()).await?;
        Ok(())
    }
}
