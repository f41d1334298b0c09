//! Environment-derived configuration for terraform operations.

use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock bound on one command.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const TERRAFORM_DIR_ENV: &str = "TERRAFORM_DIR";
pub const TIMEOUT_ENV: &str = "BATON_COMMAND_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraConfig {
    /// Working directory used when a call does not name one
    pub terraform_dir: PathBuf,
    pub command_timeout: Duration,
    /// Executable placed at `argv[0]`
    pub binary: String,
}

impl InfraConfig {
    pub fn new(terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            terraform_dir: terraform_dir.into(),
            command_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            binary: "terraform".to_string(),
        }
    }

    /// Read `TERRAFORM_DIR` (falling back to the process working directory)
    /// and `BATON_COMMAND_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`InfraConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let terraform_dir = lookup(TERRAFORM_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let timeout_secs = match lookup(TIMEOUT_ENV) {
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "ignoring invalid {TIMEOUT_ENV}");
                DEFAULT_TIMEOUT_SECS
            }),
            None => DEFAULT_TIMEOUT_SECS,
        };

        Self {
            command_timeout: Duration::from_secs(timeout_secs),
            ..Self::new(terraform_dir)
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }
}
