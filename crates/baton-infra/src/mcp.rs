//! MCP tool server over newline-delimited JSON-RPC 2.0.
//!
//! Serves the terraform catalog (`tools/list`, `tools/call`) and the `*.tf` /
//! `*.tfvars` files of the default working directory as resources.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::catalog::{render_outcome, tool_definitions, ToolCall};
use crate::config::InfraConfig;
use crate::error::{InfraError, InfraResult};
use crate::runner::CommandRunner;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpResponse {
    fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

enum Failure {
    MethodNotFound(String),
    Infra(InfraError),
}

impl From<InfraError> for Failure {
    fn from(e: InfraError) -> Self {
        Failure::Infra(e)
    }
}

/// A terraform tool server bound to one default working directory.
pub struct ToolServer {
    name: String,
    version: String,
    config: InfraConfig,
    runner: CommandRunner,
}

impl ToolServer {
    pub fn new(name: &str, version: &str, config: InfraConfig) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            runner: CommandRunner::new(config.command_timeout),
            config,
        }
    }

    pub fn config(&self) -> &InfraConfig {
        &self.config
    }

    /// Serve stdin/stdout until the client closes stdin.
    pub async fn run_stdio(&self) -> InfraResult<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one request per line from `reader`, one response per line to
    /// `writer`. Notifications (no `id`) get no response.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> InfraResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let io_err = |source: std::io::Error| InfraError::Io {
            path: "<stdio>".to_string(),
            source,
        };
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await.map_err(io_err)? == 0 {
                info!("client closed the stream");
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<McpRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => Some(McpResponse::err(
                    None,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                )),
            };
            let Some(response) = response else {
                continue;
            };

            let mut payload = serde_json::to_vec(&response)?;
            payload.push(b'\n');
            writer.write_all(&payload).await.map_err(io_err)?;
            writer.flush().await.map_err(io_err)?;
        }
        Ok(())
    }

    /// Handle one request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        debug!(method = %request.method, "mcp request");
        let result = match request.method.as_str() {
            "initialize" => Ok(self.handle_initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions(&self.config.terraform_dir) })),
            "tools/call" => self.handle_tools_call(&request.params).await,
            "resources/list" => self.handle_resources_list().await,
            "resources/read" => self.handle_resources_read(&request.params).await,
            m if m.starts_with("notifications/") => Ok(Value::Null),
            other => Err(Failure::MethodNotFound(other.to_string())),
        };

        request.id.as_ref()?;
        Some(match result {
            Ok(value) => McpResponse::ok(request.id, value),
            Err(Failure::MethodNotFound(method)) => McpResponse::err(
                request.id,
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
            Err(Failure::Infra(e)) => {
                let code = if e.is_client_error() {
                    INVALID_PARAMS
                } else {
                    INTERNAL_ERROR
                };
                warn!(method = %request.method, error = %e, "mcp request failed");
                McpResponse::err(request.id, code, e.to_string())
            }
        })
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {}
            },
            "serverInfo": {
                "name": self.name,
                "version": self.version
            }
        })
    }

    async fn handle_tools_call(&self, params: &Value) -> Result<Value, Failure> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| InfraError::InvalidArguments {
                tool: "<none>".to_string(),
                reason: "Missing tool name".to_string(),
            })?;
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        let call = ToolCall::parse(name, &arguments)?;
        let argv = call.operation.argv(&self.config.binary);
        let dir = call.resolve_dir(&self.config.terraform_dir);
        info!(tool = name, dir = %dir.display(), "running tool");

        let outcome = self.runner.run(&argv, dir).await;
        Ok(json!({
            "content": [{ "type": "text", "text": render_outcome(&outcome) }],
            "isError": !outcome.success
        }))
    }

    async fn handle_resources_list(&self) -> Result<Value, Failure> {
        let dir = &self.config.terraform_dir;
        let files = list_terraform_files(dir).await?;

        let resources: Vec<Value> = files
            .iter()
            .map(|file| {
                let kind = if file.ends_with(".tfvars") {
                    "Variables"
                } else {
                    "Config"
                };
                let noun = if kind == "Config" { "configuration" } else { "variables" };
                json!({
                    "uri": format!("file://{}/{}", dir.display(), file),
                    "name": format!("Terraform {kind}: {file}"),
                    "mimeType": "text/plain",
                    "description": format!("Terraform {noun} file: {file}")
                })
            })
            .collect();
        Ok(json!({ "resources": resources }))
    }

    async fn handle_resources_read(&self, params: &Value) -> Result<Value, Failure> {
        let uri = params
            .get("uri")
            .and_then(Value::as_str)
            .ok_or_else(|| InfraError::InvalidArguments {
                tool: "resources/read".to_string(),
                reason: "Missing uri".to_string(),
            })?;
        let path = uri
            .strip_prefix("file://")
            .ok_or_else(|| InfraError::UnsupportedUri(uri.to_string()))?;

        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InfraError::ResourceNotFound(path.to_string())
            } else {
                InfraError::Io {
                    path: path.to_string(),
                    source: e,
                }
            }
        })?;
        Ok(json!({
            "contents": [{ "uri": uri, "mimeType": "text/plain", "text": text }]
        }))
    }
}

/// `*.tf` files then `*.tfvars` files in `dir`, each group sorted by name.
pub async fn list_terraform_files(dir: &Path) -> InfraResult<Vec<String>> {
    let io_err = |source: std::io::Error| InfraError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut configs = Vec::new();
    let mut vars = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(".tf") {
            configs.push(name);
        } else if name.ends_with(".tfvars") {
            vars.push(name);
        }
    }
    configs.sort();
    vars.sort();
    configs.extend(vars);
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: i64, method: &str, params: Value) -> McpRequest {
        McpRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params,
        }
    }

    fn server(dir: &Path) -> ToolServer {
        ToolServer::new("terraform-agent", "0.0.0", InfraConfig::new(dir))
    }

    #[tokio::test]
    async fn test_initialize_reports_server_info() {
        let dir = tempfile::tempdir().unwrap();
        let resp = server(dir.path())
            .handle_request(request(1, "initialize", json!({})))
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "terraform-agent");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let dir = tempfile::tempdir().unwrap();
        let resp = server(dir.path())
            .handle_request(request(2, "prompts/list", Value::Null))
            .await
            .unwrap();
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
        assert_eq!(resp.id, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let dir = tempfile::tempdir().unwrap();
        let notification = McpRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: "notifications/initialized".to_string(),
            params: Value::Null,
        };
        assert!(server(dir.path())
            .handle_request(notification)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let resp = server(dir.path())
            .handle_request(request(
                3,
                "tools/call",
                json!({"name": "terraform_import", "arguments": {}}),
            ))
            .await
            .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("terraform_import"));
    }

    #[tokio::test]
    async fn test_resources_list_orders_configs_before_vars() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["variables.tf", "main.tf", "prod.tfvars", "README.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = list_terraform_files(dir.path()).await.unwrap();
        assert_eq!(files, vec!["main.tf", "variables.tf", "prod.tfvars"]);
    }

    #[tokio::test]
    async fn test_resources_read_rejects_other_schemes() {
        let dir = tempfile::tempdir().unwrap();
        let resp = server(dir.path())
            .handle_request(request(
                4,
                "resources/read",
                json!({"uri": "https://example.com/main.tf"}),
            ))
            .await
            .unwrap();
        let err = resp.error.unwrap();
        assert_eq!(err.code, INVALID_PARAMS);
        assert!(err.message.contains("Unsupported URI scheme"));
    }
}
