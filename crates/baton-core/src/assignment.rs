//! Role assignment.
//!
//! A role can only be claimed when some pending task asks for it and the
//! registry still lists it as `AVAILABLE`. A successful claim changes exactly
//! one registry entry; a failed claim changes nothing.
//!
//! A `target_role` that names no known role (or a role missing from the
//! registry) is never served and never reported.

use std::collections::BTreeSet;

use baton_state::{Role, RoleRegistry, StateStore, Task, TaskQueue, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::obs;

/// Role handed to an agent, with the identifier now recorded in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleAssignment {
    pub role: Role,
    pub occupant_id: String,
}

/// A pending task as seen by a freshly assigned agent.
#[derive(Debug, Clone, Serialize)]
pub struct BriefedTask {
    pub task: Task,
    /// Routed to the briefed agent's role
    pub mine: bool,
}

/// Everything an agent needs right after joining.
#[derive(Debug, Clone, Serialize)]
pub struct AgentBriefing {
    pub assignment: RoleAssignment,
    pub role_description: &'static str,
    pub pending: Vec<BriefedTask>,
}

impl AgentBriefing {
    pub fn my_tasks(&self) -> impl Iterator<Item = &Task> {
        self.pending.iter().filter(|b| b.mine).map(|b| &b.task)
    }
}

/// Occupant identifier derived from the wall clock: seconds modulo 10000.
/// Two agents joining in the same second, or 10000 s apart, collide.
pub fn occupant_id_at(now: DateTime<Utc>) -> String {
    format!("terminal-{}", now.timestamp().rem_euclid(10_000))
}

/// Roles named by `target_role` on tasks still in `pending` state. Matching
/// is exact, the same as [`Task::targets`].
pub fn required_roles(queue: &TaskQueue) -> BTreeSet<Role> {
    queue
        .pending_tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter_map(Task::target_role)
        .filter_map(|name| Role::ALL.into_iter().find(|r| r.as_str() == name))
        .collect()
}

/// First role, in agent priority order (or only `requested`), that is both
/// required and available.
pub fn select_role(
    registry: &RoleRegistry,
    required: &BTreeSet<Role>,
    requested: Option<Role>,
) -> Option<Role> {
    let candidates: Vec<Role> = match requested {
        Some(role) => vec![role],
        None => Role::AGENT_PRIORITY.to_vec(),
    };
    candidates
        .into_iter()
        .find(|role| required.contains(role) && registry.is_available(*role))
}

impl<S> Coordinator<S>
where
    S: StateStore,
{
    /// Claim a role for a new agent.
    ///
    /// Returns `Ok(None)` when no pending task targets an available role (or
    /// the requested role); the registry is then left untouched.
    pub async fn assign_role(&self, requested: Option<Role>) -> Result<Option<RoleAssignment>> {
        let _lock = self.store.lock().await;
        let tasks = self.store.load_tasks().await?;

        let required = required_roles(&tasks);
        if required.is_empty() {
            info!("no pending task targets a role; nothing to assign");
            return Ok(None);
        }

        let mut registry = self.store.load_registry().await?;
        let Some(role) = select_role(&registry, &required, requested) else {
            info!(
                requested = requested.map(|r| r.as_str()).unwrap_or("any"),
                "no required role is available"
            );
            return Ok(None);
        };

        let occupant_id = occupant_id_at(Utc::now());
        registry.occupy(role, &occupant_id);
        self.store.save_registry(&registry).await?;

        obs::emit_role_assigned(role, &occupant_id);
        Ok(Some(RoleAssignment { role, occupant_id }))
    }

    /// Claim a role and brief the agent on the pending work.
    pub async fn initialize_agent(&self, requested: Option<Role>) -> Result<Option<AgentBriefing>> {
        let Some(assignment) = self.assign_role(requested).await? else {
            return Ok(None);
        };

        let pending = self
            .pending_tasks()
            .await?
            .into_iter()
            .map(|task| BriefedTask {
                mine: task.targets(assignment.role),
                task,
            })
            .collect();

        Ok(Some(AgentBriefing {
            role_description: assignment.role.description(),
            assignment,
            pending,
        }))
    }
}
