//! End-to-end coordination workflow tests.
//!
//! Orchestrator and agent share one directory-backed store, as two terminals
//! sharing an `agents/` directory would.

use baton_core::{Coordinator, FsStateStore, ResultStatus, Role, Stage, StateStore, TaskStatus};
use baton_state::fs_store::REGISTRY_FILE;
use serde_json::{json, Map, Value};

const INSTRUCTIONS: &str = "# Agent Instructions\n\
\n\
Claim one role, then poll for tasks.\n\
\n\
## Role Assignments\n\
- ORCHESTRATOR: AVAILABLE\n\
- ARCHITECT: AVAILABLE\n\
- TERRAFORM_DEVELOPER: AVAILABLE\n\
- PLATFORM_ENGINEER: AVAILABLE\n\
- COMPLIANCE_ADMIN: AVAILABLE\n\
- FINOPS: AVAILABLE\n\
\n\
Report results through the result store.\n";

fn target(role: &str) -> Map<String, Value> {
    json!({ "target_role": role }).as_object().cloned().unwrap()
}

async fn setup(dir: &tempfile::TempDir) -> (Coordinator<FsStateStore>, Coordinator<FsStateStore>) {
    setup_with(dir, INSTRUCTIONS).await
}

async fn setup_with(
    dir: &tempfile::TempDir,
    instructions: &str,
) -> (Coordinator<FsStateStore>, Coordinator<FsStateStore>) {
    tokio::fs::write(dir.path().join(REGISTRY_FILE), instructions)
        .await
        .unwrap();
    let store = FsStateStore::new(dir.path());
    let orchestrator = Coordinator::new(store.clone());
    let agent = Coordinator::new(store);
    (orchestrator, agent)
}

#[tokio::test]
async fn test_deploy_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup(&dir).await;

    assert_eq!(
        orchestrator.compute_stage().await.unwrap(),
        Stage::NeedsInitialization
    );
    orchestrator.initialize().await.unwrap();
    assert_eq!(orchestrator.compute_stage().await.unwrap(), Stage::ReadyForTasks);

    let id = orchestrator
        .enqueue("deploy", "apply config", target("TERRAFORM_DEVELOPER"))
        .await
        .unwrap();
    assert_eq!(orchestrator.compute_stage().await.unwrap(), Stage::TasksPending);

    let assignment = agent.assign_role(None).await.unwrap().unwrap();
    assert_eq!(assignment.role, Role::TerraformDeveloper);
    assert!(assignment.occupant_id.starts_with("terminal-"));

    let claimed = agent.claim_pending(assignment.role).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);

    assert!(agent.start(&id).await.unwrap());
    assert_eq!(
        orchestrator.compute_stage().await.unwrap(),
        Stage::WorkInProgress
    );

    agent
        .complete(&id, "done", json!("42 resources"), true)
        .await
        .unwrap();

    let history = orchestrator.task_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, id);
    assert_eq!(history[0].status, TaskStatus::Completed);
    assert!(orchestrator.current_task().await.unwrap().is_none());

    let results = orchestrator.results_history().await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].task_id, id);
    assert_eq!(results[0].status, ResultStatus::Completed);
    assert_eq!(results[0].output, json!("42 resources"));

    let report = orchestrator.orchestration_status().await.unwrap();
    assert_eq!(report.stage, Stage::OrchestrationComplete);
    assert_eq!(report.completed_tasks, 1);
    assert_eq!(report.latest_result.unwrap().task_id, id);
    assert_eq!(orchestrator.status().await.unwrap().agent_status, "idle");
}

#[tokio::test]
async fn test_assignment_changes_exactly_one_registry_line() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup(&dir).await;
    orchestrator.initialize().await.unwrap();
    orchestrator
        .enqueue("audit", "check tagging", target("FINOPS"))
        .await
        .unwrap();

    let path = dir.path().join(REGISTRY_FILE);
    let before = tokio::fs::read_to_string(&path).await.unwrap();
    let assignment = agent.assign_role(None).await.unwrap().unwrap();
    let after = tokio::fs::read_to_string(&path).await.unwrap();

    let changed: Vec<(&str, &str)> = before
        .lines()
        .zip(after.lines())
        .filter(|(a, b)| a != b)
        .collect();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].0, "- FINOPS: AVAILABLE");
    assert_eq!(
        changed[0].1,
        format!("- FINOPS: {}", assignment.occupant_id)
    );
    assert_eq!(before.lines().count(), after.lines().count());
}

#[tokio::test]
async fn test_failed_assignment_leaves_registry_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup(&dir).await;
    orchestrator.initialize().await.unwrap();
    orchestrator
        .enqueue("audit", "check tagging", target("FINOPS"))
        .await
        .unwrap();

    let path = dir.path().join(REGISTRY_FILE);
    let before = tokio::fs::read_to_string(&path).await.unwrap();

    // Requested role is not required by any pending task.
    assert!(agent.assign_role(Some(Role::Architect)).await.unwrap().is_none());
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), before);

    // Second claim of the same role fails once it is occupied.
    assert!(agent.assign_role(None).await.unwrap().is_some());
    let occupied = tokio::fs::read_to_string(&path).await.unwrap();
    assert!(agent.assign_role(None).await.unwrap().is_none());
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), occupied);
}

#[tokio::test]
async fn test_no_pending_work_means_no_assignment() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup(&dir).await;
    orchestrator.initialize().await.unwrap();

    assert!(agent.assign_role(None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_agent_briefing_marks_own_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup(&dir).await;
    orchestrator.initialize().await.unwrap();
    orchestrator
        .enqueue("design", "draft network layout", target("ARCHITECT"))
        .await
        .unwrap();
    orchestrator
        .enqueue("audit", "check tagging", target("FINOPS"))
        .await
        .unwrap();

    let briefing = agent
        .initialize_agent(Some(Role::Finops))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(briefing.assignment.role, Role::Finops);
    assert_eq!(briefing.role_description, Role::Finops.description());
    assert_eq!(briefing.pending.len(), 2);
    let mine: Vec<_> = briefing.my_tasks().collect();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].description, "check tagging");
}

#[tokio::test]
async fn test_reset_preserves_prose_and_frees_roles() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup(&dir).await;
    orchestrator.initialize().await.unwrap();
    orchestrator
        .enqueue("deploy", "apply config", target("TERRAFORM_DEVELOPER"))
        .await
        .unwrap();
    agent.assign_role(None).await.unwrap().unwrap();

    orchestrator.reset_all().await.unwrap();

    let text = tokio::fs::read_to_string(dir.path().join(REGISTRY_FILE))
        .await
        .unwrap();
    assert_eq!(text, INSTRUCTIONS);
    assert_eq!(orchestrator.compute_stage().await.unwrap(), Stage::ReadyForTasks);
    assert!(orchestrator.store().is_initialized().await.unwrap());
}

#[tokio::test]
async fn test_failed_task_does_not_complete_orchestration() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup(&dir).await;
    orchestrator.initialize().await.unwrap();
    let id = orchestrator
        .enqueue("deploy", "apply config", target("TERRAFORM_DEVELOPER"))
        .await
        .unwrap();

    agent.start(&id).await.unwrap();
    agent.complete(&id, "apply failed", Value::Null, false).await.unwrap();

    let history = orchestrator.task_history().await.unwrap();
    assert_eq!(history[0].status, TaskStatus::Failed);
    assert_eq!(orchestrator.compute_stage().await.unwrap(), Stage::ReadyForTasks);
}

async fn read_registry(dir: &tempfile::TempDir) -> String {
    tokio::fs::read_to_string(dir.path().join(REGISTRY_FILE))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_assignment_skips_role_named_prose() {
    let doc = "## Roles\n\
        - ARCHITECT: designs the system blueprint\n\
        \n\
        ## Role Assignments\n\
        ARCHITECT: AVAILABLE\n";
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup_with(&dir, doc).await;
    orchestrator.initialize().await.unwrap();
    orchestrator
        .enqueue("design", "draft network layout", target("ARCHITECT"))
        .await
        .unwrap();

    let assignment = agent.assign_role(None).await.unwrap().unwrap();
    assert_eq!(assignment.role, Role::Architect);

    let text = read_registry(&dir).await;
    assert_eq!(
        text,
        doc.replace(
            "ARCHITECT: AVAILABLE",
            &format!("ARCHITECT: {}", assignment.occupant_id)
        )
    );
    assert!(text.contains("- ARCHITECT: designs the system blueprint\n"));
    assert!(agent.assign_role(None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_available_line_with_trailing_text_is_assigned() {
    let doc = "## Role Assignments\nARCHITECT: AVAILABLE (claim me)\nFINOPS: AVAILABLE\n";
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup_with(&dir, doc).await;
    orchestrator.initialize().await.unwrap();
    orchestrator
        .enqueue("design", "draft network layout", target("ARCHITECT"))
        .await
        .unwrap();

    let assignment = agent.assign_role(None).await.unwrap().unwrap();
    assert_eq!(assignment.role, Role::Architect);
    assert_eq!(
        read_registry(&dir).await,
        format!(
            "## Role Assignments\nARCHITECT: {}\nFINOPS: AVAILABLE\n",
            assignment.occupant_id
        )
    );
}

#[tokio::test]
async fn test_duplicate_role_lines() {
    let doc = "## Role Assignments\n\
        ARCHITECT: AVAILABLE\n\
        \n\
        Notes\n\
        ARCHITECT: AVAILABLE\n";
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, agent) = setup_with(&dir, doc).await;
    orchestrator.initialize().await.unwrap();
    orchestrator
        .enqueue("design", "draft network layout", target("ARCHITECT"))
        .await
        .unwrap();

    // A claim moves only the first line.
    let assignment = agent.assign_role(None).await.unwrap().unwrap();
    let claimed = read_registry(&dir).await;
    assert_eq!(
        claimed,
        doc.replacen(
            "ARCHITECT: AVAILABLE",
            &format!("ARCHITECT: {}", assignment.occupant_id),
            1
        )
    );

    // Reset frees every line naming the role.
    tokio::fs::write(
        dir.path().join(REGISTRY_FILE),
        claimed.replace("Notes\nARCHITECT: AVAILABLE", "Notes\nARCHITECT: terminal-2"),
    )
    .await
    .unwrap();
    orchestrator.reset_all().await.unwrap();

    let text = read_registry(&dir).await;
    assert!(text.starts_with(doc));
    assert!(!text.contains("terminal-"));
    assert!(orchestrator
        .store()
        .load_registry()
        .await
        .unwrap()
        .is_available(Role::Architect));
}
