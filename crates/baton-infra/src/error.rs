//! Error types for baton-infra

use thiserror::Error;

/// Errors raised while decoding a tool call or serving a resource.
///
/// External command failures are not errors: they are captured in
/// [`CommandOutcome`](crate::CommandOutcome).
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Unsupported URI scheme: {0}")]
    UnsupportedUri(String),

    #[error("File not found: {0}")]
    ResourceNotFound(String),

    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InfraError {
    /// True for errors caused by the caller's request rather than the host.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            InfraError::UnknownTool(_)
                | InfraError::InvalidArguments { .. }
                | InfraError::UnsupportedUri(_)
                | InfraError::ResourceNotFound(_)
        )
    }
}

pub type InfraResult<T> = std::result::Result<T, InfraError>;
