//! Baton-Infra: terraform operations for agents
//!
//! ## Key Components
//!
//! - `CommandRunner`: bounded external command execution that never fails
//! - `TerraformOperation` / `ToolCall`: the fixed tool catalog and its argv
//! - `ToolServer`: JSON-RPC stdio server exposing the catalog as MCP tools
//! - `InfraConfig`: `TERRAFORM_DIR` and timeout from the environment

pub mod catalog;
pub mod config;
pub mod error;
pub mod mcp;
pub mod runner;

pub use catalog::{render_outcome, tool_definitions, ShowFormat, TerraformOperation, ToolCall};
pub use config::InfraConfig;
pub use error::{InfraError, InfraResult};
pub use mcp::{McpRequest, McpResponse, ToolServer};
pub use runner::{CommandOutcome, CommandRunner};
