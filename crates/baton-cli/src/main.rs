//! Baton - shared-directory coordination for orchestrator and agent terminals
//!
//! ## Commands
//!
//! - `orchestrator`: initialise, resume or reset state; send tasks; inspect
//!   status and results
//! - `agent`: claim a role, poll for tasks, start and complete them
//! - `terraform`: run one catalog operation through the command adapter

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use baton_core::{
    parse_task_data, Coordinator, FsStateStore, OrchestrationReport, Role, Stage, Task, TaskId,
};
use baton_infra::{render_outcome, CommandRunner, InfraConfig, ShowFormat, TerraformOperation};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "baton")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "File-backed task coordination for multi-agent terminals", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Shared state directory
    #[arg(long, global = true, env = "BATON_STATE_DIR", default_value = "agents")]
    state_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Orchestrator operations
    Orchestrator {
        #[command(subcommand)]
        action: OrchestratorAction,
    },

    /// Agent operations
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Run a terraform operation
    Terraform {
        /// Working directory (default: TERRAFORM_DIR or the current directory)
        #[arg(long, global = true)]
        working_dir: Option<PathBuf>,

        /// Timeout in seconds (default: BATON_COMMAND_TIMEOUT_SECS or 300)
        #[arg(long, global = true)]
        timeout: Option<u64>,

        #[command(subcommand)]
        action: TerraformAction,
    },
}

#[derive(Subcommand)]
enum OrchestratorAction {
    /// Write a clean slate (role registry untouched)
    Init,

    /// Continue from the current state, initialising only if needed
    Resume,

    /// Clear all state and free every role
    Reset,

    /// Send a task to the agents
    Send {
        /// Task type
        task_type: String,

        /// Task description
        description: String,

        /// Task data as a JSON object
        #[arg(long)]
        data: Option<String>,

        /// Role that should pick the task up (merged into data)
        #[arg(long)]
        target_role: Option<Role>,
    },

    /// Show the shared status record
    Status,

    /// Show the latest result
    Results {
        /// Show every recorded result
        #[arg(long)]
        all: bool,
    },

    /// Show the orchestration stage and task counts
    Stage,

    /// Set the orchestrator status field
    SetStatus {
        value: String,
    },
}

#[derive(Subcommand)]
enum AgentAction {
    /// Claim a role and show the pending work
    Join {
        /// Only claim this role
        #[arg(long)]
        role: Option<Role>,
    },

    /// List pending tasks, optionally only those for one role
    Tasks {
        #[arg(long)]
        role: Option<Role>,
    },

    /// Show the current task if it is waiting to be started
    Check,

    /// Start the current task
    Start { task_id: String },

    /// Complete a task and report its result
    Complete {
        task_id: String,

        /// Result description
        description: String,

        /// Output (parsed as JSON when possible, otherwise kept as text)
        #[arg(long)]
        output: Option<String>,

        /// Record the task as failed
        #[arg(long)]
        failed: bool,
    },

    /// Show the current task
    Current,
}

#[derive(Subcommand)]
enum TerraformAction {
    Init,
    Plan {
        #[arg(long)]
        var_file: Option<String>,
        #[arg(long)]
        target: Option<String>,
    },
    Apply {
        #[arg(long)]
        var_file: Option<String>,
        #[arg(long)]
        auto_approve: bool,
    },
    Destroy {
        #[arg(long)]
        var_file: Option<String>,
        #[arg(long)]
        auto_approve: bool,
    },
    Validate,
    Fmt {
        #[arg(long)]
        check: bool,
    },
    Show {
        /// Output format (json, text)
        #[arg(long, default_value = "text")]
        format: String,
    },
    StateList,
}

impl From<TerraformAction> for TerraformOperation {
    fn from(action: TerraformAction) -> Self {
        match action {
            TerraformAction::Init => TerraformOperation::Init,
            TerraformAction::Plan { var_file, target } => {
                TerraformOperation::Plan { var_file, target }
            }
            TerraformAction::Apply {
                var_file,
                auto_approve,
            } => TerraformOperation::Apply {
                var_file,
                auto_approve,
            },
            TerraformAction::Destroy {
                var_file,
                auto_approve,
            } => TerraformOperation::Destroy {
                var_file,
                auto_approve,
            },
            TerraformAction::Validate => TerraformOperation::Validate,
            TerraformAction::Fmt { check } => TerraformOperation::Fmt { check },
            TerraformAction::Show { format } => TerraformOperation::Show {
                format: ShowFormat::parse(&format),
            },
            TerraformAction::StateList => TerraformOperation::StateList,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    baton_core::init_tracing(cli.json, level);

    let coordinator = Coordinator::new(FsStateStore::new(&cli.state_dir));

    match cli.command {
        Commands::Orchestrator { action } => match action {
            OrchestratorAction::Init => cmd_init(&coordinator).await,
            OrchestratorAction::Resume => cmd_resume(&coordinator).await,
            OrchestratorAction::Reset => cmd_reset(&coordinator).await,
            OrchestratorAction::Send {
                task_type,
                description,
                data,
                target_role,
            } => {
                cmd_send(
                    &coordinator,
                    &task_type,
                    &description,
                    data.as_deref(),
                    target_role,
                )
                .await
                .map(|_| ())
            }
            OrchestratorAction::Status => cmd_status(&coordinator).await,
            OrchestratorAction::Results { all } => cmd_results(&coordinator, all).await,
            OrchestratorAction::Stage => cmd_stage(&coordinator).await,
            OrchestratorAction::SetStatus { value } => {
                coordinator
                    .update_orchestrator_status(&value)
                    .await
                    .context("failed to update orchestrator status")?;
                println!("Orchestrator status: {value}");
                Ok(())
            }
        },
        Commands::Agent { action } => match action {
            AgentAction::Join { role } => cmd_join(&coordinator, role).await,
            AgentAction::Tasks { role } => cmd_tasks(&coordinator, role).await,
            AgentAction::Check => cmd_check(&coordinator).await,
            AgentAction::Start { task_id } => cmd_start(&coordinator, &task_id).await,
            AgentAction::Complete {
                task_id,
                description,
                output,
                failed,
            } => {
                cmd_complete(
                    &coordinator,
                    &task_id,
                    &description,
                    output.as_deref(),
                    !failed,
                )
                .await
            }
            AgentAction::Current => cmd_current(&coordinator).await,
        },
        Commands::Terraform {
            working_dir,
            timeout,
            action,
        } => {
            let mut config = InfraConfig::from_env();
            if let Some(secs) = timeout {
                config = config.with_timeout(Duration::from_secs(secs));
            }
            let dir = working_dir.unwrap_or_else(|| config.terraform_dir.clone());
            cmd_terraform(&config, &dir, action.into()).await
        }
    }
}

type Baton = Coordinator<FsStateStore>;

// ========== Orchestrator Commands ==========

async fn cmd_init(coordinator: &Baton) -> Result<()> {
    coordinator
        .initialize()
        .await
        .context("failed to initialise state documents")?;
    println!(
        "Initialized clean slate in {}",
        coordinator.store().root().display()
    );
    Ok(())
}

async fn cmd_resume(coordinator: &Baton) -> Result<()> {
    let report = coordinator.resume().await.context("resume failed")?;
    print_report(&report);
    println!("{}", stage_hint(report.stage));
    Ok(())
}

async fn cmd_reset(coordinator: &Baton) -> Result<()> {
    coordinator.reset_all().await.context("reset failed")?;
    println!("New orchestration started - all roles reset to AVAILABLE");
    Ok(())
}

async fn cmd_send(
    coordinator: &Baton,
    task_type: &str,
    description: &str,
    data: Option<&str>,
    target_role: Option<Role>,
) -> Result<TaskId> {
    let mut data = parse_task_data(data)?;
    if let Some(role) = target_role {
        data.insert(
            baton_state::TARGET_ROLE_KEY.to_string(),
            Value::String(role.as_str().to_string()),
        );
    }

    let id = coordinator
        .enqueue(task_type, description, data)
        .await
        .context("failed to send task")?;
    println!("Task sent: {description}");
    println!("Task ID: {id}");
    Ok(id)
}

async fn cmd_status(coordinator: &Baton) -> Result<()> {
    let status = coordinator.status().await.context("failed to read status")?;
    println!("Orchestrator: {}", status.orchestrator_status);
    println!("Agent: {}", status.agent_status);
    println!(
        "Current Task ID: {}",
        status
            .current_task_id
            .as_ref()
            .map(TaskId::as_str)
            .unwrap_or("none")
    );
    println!("Last Update: {}", status.last_update.to_rfc3339());
    Ok(())
}

async fn cmd_results(coordinator: &Baton, all: bool) -> Result<()> {
    if all {
        let history = coordinator
            .results_history()
            .await
            .context("failed to read results")?;
        if history.is_empty() {
            println!("No results yet");
        }
        for result in history {
            println!(
                "{} {} {} {}",
                result.timestamp.to_rfc3339(),
                result.task_id,
                result.status,
                result.description
            );
        }
        return Ok(());
    }

    match coordinator
        .latest_result()
        .await
        .context("failed to read results")?
    {
        Some(result) => {
            println!("Latest result: {}", result.description);
            println!("Status: {}", result.status);
            if !result.output.is_null() {
                println!("Output: {}", render_output(&result.output));
            }
        }
        None => println!("No results yet"),
    }
    Ok(())
}

async fn cmd_stage(coordinator: &Baton) -> Result<()> {
    let report = coordinator
        .orchestration_status()
        .await
        .context("failed to compute stage")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &OrchestrationReport) {
    println!("Current Stage: {}", report.stage);
    println!("Pending Tasks: {}", report.pending_tasks);
    println!("In Progress: {}", report.in_progress_tasks);
    println!("Completed: {}", report.completed_tasks);
    if let Some(status) = &report.orchestrator_status {
        println!("Orchestrator: {status}");
    }
    if let Some(result) = &report.latest_result {
        println!("Latest result: {}", result.description);
    }
}

fn stage_hint(stage: Stage) -> &'static str {
    match stage {
        Stage::NeedsInitialization => "Created clean state documents for a new orchestration",
        Stage::OrchestrationComplete => "All tasks completed; send more tasks or reset",
        Stage::WorkInProgress => "Agents are working; check status and results",
        Stage::TasksPending => "Tasks are waiting for agents to join and claim them",
        Stage::ReadyForTasks => "Ready for tasks; use `baton orchestrator send`",
    }
}

// ========== Agent Commands ==========

async fn cmd_join(coordinator: &Baton, role: Option<Role>) -> Result<()> {
    let briefing = coordinator
        .initialize_agent(role)
        .await
        .context("agent initialisation failed")?;

    let Some(briefing) = briefing else {
        bail!("no available role is required by a pending task");
    };

    let role = briefing.assignment.role;
    println!("Role assigned: {role}");
    println!("Terminal ID: {}", briefing.assignment.occupant_id);
    println!("My role: {}", briefing.role_description);
    println!();

    if briefing.pending.is_empty() {
        println!("No pending tasks in system");
    } else {
        println!("Found {} pending task(s):", briefing.pending.len());
        for entry in &briefing.pending {
            let marker = if entry.mine { "*" } else { " " };
            println!(
                "  {marker} {} (ID: {}) -> {}",
                entry.task.description,
                entry.task.id,
                entry.task.target_role().unwrap_or("NO TARGET ROLE")
            );
        }
    }

    let mine: Vec<&Task> = briefing.my_tasks().collect();
    if mine.is_empty() {
        println!("No tasks currently assigned to {role}");
    } else {
        println!();
        println!("My tasks ({role}):");
        for task in mine {
            println!("  {} (ID: {}) [{}]", task.description, task.id, task.status);
        }
    }
    Ok(())
}

async fn cmd_tasks(coordinator: &Baton, role: Option<Role>) -> Result<()> {
    let tasks = match role {
        Some(role) => coordinator.claim_pending(role).await,
        None => coordinator.pending_tasks().await,
    }
    .context("failed to read tasks")?;

    if tasks.is_empty() {
        println!("No pending tasks");
    }
    for task in tasks {
        print_task(&task);
    }
    Ok(())
}

async fn cmd_check(coordinator: &Baton) -> Result<()> {
    match coordinator
        .check_for_tasks()
        .await
        .context("failed to read tasks")?
    {
        Some(task) => {
            println!("New task received: {}", task.description);
            print_task(&task);
        }
        None => println!("No pending tasks"),
    }
    Ok(())
}

async fn cmd_start(coordinator: &Baton, task_id: &str) -> Result<()> {
    let started = coordinator
        .start(&TaskId::from(task_id))
        .await
        .context("failed to start task")?;
    if started {
        println!("Started working on task: {task_id}");
    } else {
        println!("Task {task_id} is not the current task; nothing changed");
    }
    Ok(())
}

async fn cmd_complete(
    coordinator: &Baton,
    task_id: &str,
    description: &str,
    output: Option<&str>,
    success: bool,
) -> Result<()> {
    let output = output.map(parse_output).unwrap_or(Value::Null);
    let result = coordinator
        .complete(&TaskId::from(task_id), description, output, success)
        .await
        .context("failed to complete task")?;
    println!("Task {}: {}", result.status, result.description);
    Ok(())
}

async fn cmd_current(coordinator: &Baton) -> Result<()> {
    match coordinator
        .current_task()
        .await
        .context("failed to read tasks")?
    {
        Some(task) => print_task(&task),
        None => println!("No current task"),
    }
    Ok(())
}

fn print_task(task: &Task) {
    println!("Task ID: {}", task.id);
    println!("  Type: {}", task.task_type);
    println!("  Description: {}", task.description);
    println!("  Status: {}", task.status);
    if !task.data.is_empty() {
        println!("  Data: {}", Value::Object(task.data.clone()));
    }
}

/// Agent output is stored as JSON when it parses, otherwise as a string.
fn parse_output(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn render_output(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ========== Terraform Commands ==========

async fn cmd_terraform(
    config: &InfraConfig,
    working_dir: &Path,
    operation: TerraformOperation,
) -> Result<()> {
    let argv = operation.argv(&config.binary);
    info!(tool = operation.tool_name(), dir = %working_dir.display(), "running terraform");

    let outcome = CommandRunner::new(config.command_timeout)
        .run(&argv, working_dir)
        .await;
    print!("{}", render_outcome(&outcome));

    if !outcome.success {
        bail!("{} exited with code {}", outcome.command, outcome.exit_code);
    }
    Ok(())
}
