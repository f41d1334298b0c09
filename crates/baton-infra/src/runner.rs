//! Bounded execution of external commands.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

/// Captured result of one command. Every failure mode lands here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    /// Exit code was 0
    pub success: bool,

    /// Process exit code, or -1 on timeout, signal or launch failure
    pub exit_code: i32,

    pub stdout: String,
    pub stderr: String,

    /// The argv joined by spaces
    pub command: String,
}

impl CommandOutcome {
    fn failed(command: String, stderr: String) -> Self {
        Self {
            success: false,
            exit_code: -1,
            stdout: String::new(),
            stderr,
            command,
        }
    }
}

/// Runs commands with a wall-clock timeout. The child is killed when the
/// timeout fires.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `argv` in `working_dir`. Never returns an error.
    pub async fn run(&self, argv: &[String], working_dir: &Path) -> CommandOutcome {
        let command = argv.join(" ");
        let Some((exe, args)) = argv.split_first() else {
            return CommandOutcome::failed(command, "empty command".to_string());
        };

        let start = Instant::now();
        let child = Command::new(exe)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(command = %command, error = %e, "failed to launch command");
                return CommandOutcome::failed(command, e.to_string());
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(command = %command, error = %e, "failed to collect command output");
                return CommandOutcome::failed(command, e.to_string());
            }
            Err(_) => {
                warn!(command = %command, timeout = ?self.timeout, "command timed out");
                return CommandOutcome::failed(
                    command,
                    format!("Command timed out after {}", describe(self.timeout)),
                );
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            command = %command,
            exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );

        CommandOutcome {
            success: output.status.success(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            command,
        }
    }
}

fn describe(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 && timeout.as_secs() > 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{} ms", timeout.as_millis())
    }
}
