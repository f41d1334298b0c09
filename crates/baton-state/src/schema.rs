//! Document schema for the shared coordination directory.
//!
//! Every participant reads and writes the same four documents:
//!
//! - `tasks.json`: [`TaskQueue`]
//! - `status.json`: [`StatusRecord`]
//! - `results.json`: [`ResultStore`]
//! - `AGENT_INSTRUCTIONS.md`: [`RoleRegistry`] (see [`crate::registry_doc`])

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StorageError;

/// Key inside [`Task::data`] naming the role a task is meant for.
pub const TARGET_ROLE_KEY: &str = "target_role";

/// Timestamps in the shared documents.
///
/// Written as RFC 3339. Read as RFC 3339 or as a naive ISO 8601 local time
/// such as `2024-05-01T12:30:00.123456`, which other participants write.
pub mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn parse(value: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Some(
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| naive.and_utc()),
        )
    }

    fn parse_or_reject<E: de::Error>(raw: &str) -> Result<DateTime<Utc>, E> {
        parse(raw).ok_or_else(|| E::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        parse_or_reject(&String::deserialize(deserializer)?)
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse_or_reject(&raw))
            .transpose()
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Capability slot occupied by exactly one participant per orchestration cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Orchestrator,
    Architect,
    TerraformDeveloper,
    PlatformEngineer,
    ComplianceAdmin,
    Finops,
}

impl Role {
    /// Every role the registry tracks, in document order.
    pub const ALL: [Role; 6] = [
        Role::Orchestrator,
        Role::Architect,
        Role::TerraformDeveloper,
        Role::PlatformEngineer,
        Role::ComplianceAdmin,
        Role::Finops,
    ];

    /// Order in which agents are auto-assigned. The orchestrator slot is
    /// never handed to an agent.
    pub const AGENT_PRIORITY: [Role; 5] = [
        Role::Architect,
        Role::TerraformDeveloper,
        Role::PlatformEngineer,
        Role::ComplianceAdmin,
        Role::Finops,
    ];

    /// Registry spelling, e.g. `TERRAFORM_DEVELOPER`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Orchestrator => "ORCHESTRATOR",
            Role::Architect => "ARCHITECT",
            Role::TerraformDeveloper => "TERRAFORM_DEVELOPER",
            Role::PlatformEngineer => "PLATFORM_ENGINEER",
            Role::ComplianceAdmin => "COMPLIANCE_ADMIN",
            Role::Finops => "FINOPS",
        }
    }

    /// First-person persona line shown to the participant that claims the role.
    pub fn description(&self) -> &'static str {
        match self {
            Role::Orchestrator => "I break work into tasks, dispatch them and track results.",
            Role::Architect => {
                "I design high-level system architecture and create technical blueprints."
            }
            Role::TerraformDeveloper => {
                "I write terraform infrastructure code and implement technical solutions."
            }
            Role::PlatformEngineer => {
                "I design for scale, reliability, and operational excellence."
            }
            Role::ComplianceAdmin => "I ensure security and compliance requirements are met.",
            Role::Finops => "I optimize cloud costs and implement financial governance policies.",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StorageError::UnknownRole {
                name: s.to_string(),
            })
    }
}

/// Who currently holds a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupant {
    Available,
    Agent(String),
}

impl Occupant {
    pub const AVAILABLE: &'static str = "AVAILABLE";

    /// Only a value whose first word is `AVAILABLE` frees a role. Any other
    /// value, the empty one included, names the holder.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.split_whitespace().next() == Some(Self::AVAILABLE) {
            Occupant::Available
        } else {
            Occupant::Agent(value.to_string())
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Occupant::Available)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Occupant::Available => Self::AVAILABLE,
            Occupant::Agent(id) => id,
        }
    }
}

impl fmt::Display for Occupant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured view of the role registry document.
///
/// Roles absent from the document are absent here too; such a role is never
/// considered available.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRegistry {
    entries: BTreeMap<Role, Occupant>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every role in [`Role::ALL`] marked available.
    pub fn all_available() -> Self {
        let mut registry = Self::new();
        registry.reset();
        registry
    }

    pub fn get(&self, role: Role) -> Option<&Occupant> {
        self.entries.get(&role)
    }

    pub fn set(&mut self, role: Role, occupant: Occupant) {
        self.entries.insert(role, occupant);
    }

    pub fn is_available(&self, role: Role) -> bool {
        self.get(role).is_some_and(Occupant::is_available)
    }

    /// Hand an available role to `occupant_id`.
    ///
    /// Returns `false` and leaves the registry untouched when the role is
    /// missing or already occupied.
    pub fn occupy(&mut self, role: Role, occupant_id: &str) -> bool {
        match self.entries.get_mut(&role) {
            Some(slot) if slot.is_available() => {
                *slot = Occupant::Agent(occupant_id.to_string());
                true
            }
            _ => false,
        }
    }

    /// Mark every known role available again.
    pub fn reset(&mut self) {
        for role in Role::ALL {
            self.entries.insert(role, Occupant::Available);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (Role, &Occupant)> {
        self.entries.iter().map(|(role, occupant)| (*role, occupant))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Opaque task identifier, derived from the creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// Task lifecycle: `Pending -> InProgress -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A unit of requested work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: String,
    pub description: String,
    /// Free-form payload; `target_role` routes the task to a role.
    #[serde(default)]
    pub data: Map<String, Value>,
    pub status: TaskStatus,
    /// Creation time
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Raw `target_role` value, if present and a string.
    pub fn target_role(&self) -> Option<&str> {
        self.data.get(TARGET_ROLE_KEY).and_then(Value::as_str)
    }

    /// Whether the task is routed to `role`.
    pub fn targets(&self, role: Role) -> bool {
        self.target_role() == Some(role.as_str())
    }
}

/// Contents of `tasks.json`.
///
/// While non-terminal, `current_task` mirrors the most recently appended
/// element of `pending_tasks`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskQueue {
    pub current_task: Option<Task>,
    #[serde(default)]
    pub pending_tasks: Vec<Task>,
    #[serde(default)]
    pub task_history: Vec<Task>,
}

impl TaskQueue {
    pub fn contains_id(&self, id: &TaskId) -> bool {
        self.current_task.iter().any(|t| &t.id == id)
            || self.pending_tasks.iter().any(|t| &t.id == id)
            || self.task_history.iter().any(|t| &t.id == id)
    }

    pub fn count_pending_with(&self, status: TaskStatus) -> usize {
        self.pending_tasks.iter().filter(|t| t.status == status).count()
    }

    pub fn count_history_with(&self, status: TaskStatus) -> usize {
        self.task_history.iter().filter(|t| t.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Contents of `status.json`. Single shared record, last writer wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub orchestrator_status: String,
    pub agent_status: String,
    #[serde(default)]
    pub current_task_id: Option<TaskId>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub last_update: DateTime<Utc>,
}

impl StatusRecord {
    pub const INITIALIZED: &'static str = "initialized";
    pub const IDLE: &'static str = "idle";
    pub const WORKING: &'static str = "working";

    /// Record written by a clean-slate initialization.
    pub fn initialized() -> Self {
        Self {
            orchestrator_status: Self::INITIALIZED.to_string(),
            agent_status: Self::IDLE.to_string(),
            current_task_id: None,
            last_update: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_update = Utc::now();
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self::initialized()
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Terminal outcome reported by an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
}

impl ResultStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            ResultStatus::Completed
        } else {
            ResultStatus::Failed
        }
    }

    pub fn task_status(&self) -> TaskStatus {
        match self {
            ResultStatus::Completed => TaskStatus::Completed,
            ResultStatus::Failed => TaskStatus::Failed,
        }
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.task_status(), f)
    }
}

/// Result written when an agent finishes a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub description: String,
    /// Opaque agent output
    #[serde(default)]
    pub output: Value,
    pub status: ResultStatus,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
}

/// Contents of `results.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultStore {
    pub latest_result: Option<TaskResult>,
    #[serde(default)]
    pub results_history: Vec<TaskResult>,
}

impl ResultStore {
    /// Record `result` as the latest and append it to the history.
    pub fn record(&mut self, result: TaskResult) {
        self.latest_result = Some(result.clone());
        self.results_history.push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_data(data: Value) -> Task {
        Task {
            id: TaskId::from("1700000000000"),
            task_type: "deploy".to_string(),
            description: "apply config".to_string(),
            data: data.as_object().cloned().unwrap_or_default(),
            status: TaskStatus::Pending,
            timestamp: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn role_round_trips_through_registry_spelling() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(matches!(
            "JANITOR".parse::<Role>(),
            Err(StorageError::UnknownRole { .. })
        ));
    }

    #[test]
    fn role_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Role::TerraformDeveloper).unwrap();
        assert_eq!(json, "\"TERRAFORM_DEVELOPER\"");
    }

    #[test]
    fn agent_priority_excludes_orchestrator() {
        assert!(!Role::AGENT_PRIORITY.contains(&Role::Orchestrator));
        assert_eq!(Role::AGENT_PRIORITY[0], Role::Architect);
    }

    #[test]
    fn occupy_only_transitions_available_roles() {
        let mut registry = RoleRegistry::all_available();
        assert!(registry.occupy(Role::Finops, "terminal-0001"));
        assert!(!registry.occupy(Role::Finops, "terminal-0002"));
        assert_eq!(
            registry.get(Role::Finops),
            Some(&Occupant::Agent("terminal-0001".to_string()))
        );
    }

    #[test]
    fn missing_role_is_never_available() {
        let mut registry = RoleRegistry::new();
        assert!(!registry.is_available(Role::Architect));
        assert!(!registry.occupy(Role::Architect, "terminal-1"));
        assert!(registry.is_empty());
    }

    #[test]
    fn task_target_role_reads_data_field() {
        let task = task_with_data(serde_json::json!({"target_role": "ARCHITECT"}));
        assert_eq!(task.target_role(), Some("ARCHITECT"));
        assert!(task.targets(Role::Architect));
        assert!(!task.targets(Role::Finops));

        let untargeted = task_with_data(serde_json::json!({"target_role": 7}));
        assert_eq!(untargeted.target_role(), None);
    }

    #[test]
    fn task_serializes_type_key_and_omits_unset_timestamps() {
        let task = task_with_data(serde_json::json!({}));
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["type"], "deploy");
        assert_eq!(value["status"], "pending");
        assert!(value.get("started_at").is_none());
        assert!(value.get("completed_at").is_none());
    }

    #[test]
    fn naive_timestamps_are_accepted() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": "1700000000000",
            "type": "deploy",
            "description": "apply config",
            "data": {},
            "status": "in_progress",
            "timestamp": "2024-05-01T12:30:00.123456",
            "started_at": "2024-05-01T12:31:00",
            "completed_at": null
        }))
        .unwrap();
        assert!(task.started_at.unwrap() > task.timestamp);
        assert!(task.completed_at.is_none());

        let status: StatusRecord = serde_json::from_value(serde_json::json!({
            "orchestrator_status": "initialized",
            "agent_status": "idle",
            "last_update": "2024-05-01T12:30:00+02:00"
        }))
        .unwrap();
        assert_eq!(status.last_update.to_rfc3339(), "2024-05-01T10:30:00+00:00");
    }

    #[test]
    fn unparseable_timestamp_is_rejected() {
        assert!(timestamp::parse("yesterday").is_none());
        let err = serde_json::from_value::<StatusRecord>(serde_json::json!({
            "orchestrator_status": "initialized",
            "agent_status": "idle",
            "last_update": "yesterday"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn empty_queue_serializes_null_current_task() {
        let value = serde_json::to_value(TaskQueue::default()).unwrap();
        assert!(value["current_task"].is_null());
        assert_eq!(value["pending_tasks"], serde_json::json!([]));
        assert_eq!(value["task_history"], serde_json::json!([]));
    }

    #[test]
    fn result_store_record_updates_latest_and_history() {
        let mut store = ResultStore::default();
        for n in 0..2 {
            store.record(TaskResult {
                task_id: TaskId(n.to_string()),
                description: "done".to_string(),
                output: Value::Null,
                status: ResultStatus::Completed,
                timestamp: Utc::now(),
            });
        }
        assert_eq!(store.results_history.len(), 2);
        assert_eq!(store.latest_result.unwrap().task_id, TaskId::from("1"));
    }
}
