//! Terraform tool server speaking MCP over stdio.
//!
//! Stdout carries JSON-RPC responses only; logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use baton_infra::{InfraConfig, ToolServer};
use clap::Parser;
use tracing::{info, Level};

const SERVER_NAME: &str = "terraform-agent";

#[derive(Parser)]
#[command(name = "baton-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Terraform MCP tool server", long_about = None)]
struct Args {
    /// Default working directory for terraform (overrides TERRAFORM_DIR)
    #[arg(long)]
    terraform_dir: Option<PathBuf>,

    /// Command timeout in seconds (overrides BATON_COMMAND_TIMEOUT_SECS)
    #[arg(long)]
    timeout: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Flags applied on top of `base`. An empty directory flag is ignored.
    fn apply(&self, mut base: InfraConfig) -> InfraConfig {
        if let Some(dir) = self
            .terraform_dir
            .as_ref()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            base.terraform_dir = dir.clone();
        }
        if let Some(secs) = self.timeout {
            base = base.with_timeout(Duration::from_secs(secs));
        }
        base
    }

    fn config(&self) -> InfraConfig {
        self.apply(InfraConfig::from_env())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    baton_core::init_tracing(args.json, level);

    let config = args.config();
    info!(
        terraform_dir = %config.terraform_dir.display(),
        timeout_secs = config.command_timeout.as_secs(),
        "starting {SERVER_NAME}"
    );

    let server = ToolServer::new(SERVER_NAME, baton_core::VERSION, config);
    server.run_stdio().await.context("tool server failed")?;

    info!("{SERVER_NAME} stopped");
    Ok(())
}
