//! Fixed catalog of terraform operations.
//!
//! Each tool name maps to one [`TerraformOperation`], and each operation maps
//! 1:1 to an argv. Tool arguments that are absent, `null` or empty strings
//! are treated as unset.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{InfraError, InfraResult};
use crate::runner::CommandOutcome;

/// Output format for `terraform show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowFormat {
    #[default]
    Text,
    Json,
}

impl ShowFormat {
    /// `"json"` selects JSON; anything else is text.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            ShowFormat::Json
        } else {
            ShowFormat::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerraformOperation {
    Init,
    Plan {
        var_file: Option<String>,
        target: Option<String>,
    },
    Apply {
        var_file: Option<String>,
        auto_approve: bool,
    },
    Destroy {
        var_file: Option<String>,
        auto_approve: bool,
    },
    Validate,
    Fmt {
        check: bool,
    },
    Show {
        format: ShowFormat,
    },
    StateList,
}

impl TerraformOperation {
    pub const TOOL_NAMES: [&'static str; 8] = [
        "terraform_init",
        "terraform_plan",
        "terraform_apply",
        "terraform_destroy",
        "terraform_validate",
        "terraform_fmt",
        "terraform_show",
        "terraform_state_list",
    ];

    pub fn tool_name(&self) -> &'static str {
        match self {
            TerraformOperation::Init => "terraform_init",
            TerraformOperation::Plan { .. } => "terraform_plan",
            TerraformOperation::Apply { .. } => "terraform_apply",
            TerraformOperation::Destroy { .. } => "terraform_destroy",
            TerraformOperation::Validate => "terraform_validate",
            TerraformOperation::Fmt { .. } => "terraform_fmt",
            TerraformOperation::Show { .. } => "terraform_show",
            TerraformOperation::StateList => "terraform_state_list",
        }
    }

    /// Full argv with `binary` in position 0.
    pub fn argv(&self, binary: &str) -> Vec<String> {
        let mut argv = vec![binary.to_string()];
        let mut push = |s: &str| argv.push(s.to_string());
        match self {
            TerraformOperation::Init => push("init"),
            TerraformOperation::Plan { var_file, target } => {
                push("plan");
                if let Some(file) = var_file {
                    push("-var-file");
                    push(file.as_str());
                }
                if let Some(target) = target {
                    push("-target");
                    push(target.as_str());
                }
            }
            TerraformOperation::Apply {
                var_file,
                auto_approve,
            }
            | TerraformOperation::Destroy {
                var_file,
                auto_approve,
            } => {
                push(if matches!(self, TerraformOperation::Apply { .. }) {
                    "apply"
                } else {
                    "destroy"
                });
                if let Some(file) = var_file {
                    push("-var-file");
                    push(file.as_str());
                }
                if *auto_approve {
                    push("-auto-approve");
                }
            }
            TerraformOperation::Validate => push("validate"),
            TerraformOperation::Fmt { check } => {
                push("fmt");
                if *check {
                    push("-check");
                }
            }
            TerraformOperation::Show { format } => {
                push("show");
                if *format == ShowFormat::Json {
                    push("-json");
                }
            }
            TerraformOperation::StateList => {
                push("state");
                push("list");
            }
        }
        argv
    }
}

/// A decoded `tools/call`: the operation plus an optional directory override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub operation: TerraformOperation,
    pub working_dir: Option<PathBuf>,
}

impl ToolCall {
    /// Decode a tool name and its JSON arguments.
    pub fn parse(name: &str, arguments: &Value) -> InfraResult<Self> {
        let args: ToolArgs = match arguments {
            Value::Null => ToolArgs::default(),
            Value::Object(_) => {
                serde_json::from_value(arguments.clone()).map_err(|e| {
                    InfraError::InvalidArguments {
                        tool: name.to_string(),
                        reason: e.to_string(),
                    }
                })?
            }
            other => {
                return Err(InfraError::InvalidArguments {
                    tool: name.to_string(),
                    reason: format!("expected an object, got {other}"),
                })
            }
        };

        let var_file = non_empty(args.var_file);
        let auto_approve = args.auto_approve.unwrap_or(false);
        let operation = match name {
            "terraform_init" => TerraformOperation::Init,
            "terraform_plan" => TerraformOperation::Plan {
                var_file,
                target: non_empty(args.target),
            },
            "terraform_apply" => TerraformOperation::Apply {
                var_file,
                auto_approve,
            },
            "terraform_destroy" => TerraformOperation::Destroy {
                var_file,
                auto_approve,
            },
            "terraform_validate" => TerraformOperation::Validate,
            "terraform_fmt" => TerraformOperation::Fmt {
                check: args.check.unwrap_or(false),
            },
            "terraform_show" => TerraformOperation::Show {
                format: args
                    .format
                    .as_deref()
                    .map(ShowFormat::parse)
                    .unwrap_or_default(),
            },
            "terraform_state_list" => TerraformOperation::StateList,
            other => return Err(InfraError::UnknownTool(other.to_string())),
        };

        Ok(Self {
            operation,
            working_dir: non_empty(args.working_dir).map(PathBuf::from),
        })
    }

    /// Directory the command runs in: the override or `default_dir`.
    pub fn resolve_dir<'a>(&'a self, default_dir: &'a Path) -> &'a Path {
        self.working_dir.as_deref().unwrap_or(default_dir)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ToolArgs {
    working_dir: Option<String>,
    var_file: Option<String>,
    target: Option<String>,
    auto_approve: Option<bool>,
    check: Option<bool>,
    format: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Tool metadata advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// The whole catalog, with `default_dir` shown as the `working_dir` default.
pub fn tool_definitions(default_dir: &Path) -> Vec<ToolDefinition> {
    let dir = default_dir.display().to_string();
    let var_file = json!({ "type": "string", "description": "Variable file to use (optional)" });
    let approve = |what: &str| {
        json!({
            "type": "boolean",
            "description": format!("Auto-approve the {what}"),
            "default": false
        })
    };

    let tool = |name: &str, description: &str, extra: Vec<(&str, Value)>| {
        let mut properties = Map::new();
        properties.insert(
            "working_dir".to_string(),
            json!({
                "type": "string",
                "description": "Working directory for Terraform (optional)",
                "default": dir,
            }),
        );
        for (key, schema) in extra {
            properties.insert(key.to_string(), schema);
        }
        ToolDefinition {
            name: name.to_string(),
            description: description.to_string(),
            input_schema: json!({ "type": "object", "properties": properties }),
        }
    };

    vec![
        tool("terraform_init", "Initialize Terraform working directory", vec![]),
        tool(
            "terraform_plan",
            "Create Terraform execution plan",
            vec![
                ("var_file", var_file.clone()),
                (
                    "target",
                    json!({ "type": "string", "description": "Target specific resources (optional)" }),
                ),
            ],
        ),
        tool(
            "terraform_apply",
            "Apply Terraform changes",
            vec![("var_file", var_file.clone()), ("auto_approve", approve("apply"))],
        ),
        tool(
            "terraform_destroy",
            "Destroy Terraform-managed infrastructure",
            vec![("var_file", var_file), ("auto_approve", approve("destroy"))],
        ),
        tool("terraform_validate", "Validate Terraform configuration", vec![]),
        tool(
            "terraform_fmt",
            "Format Terraform configuration files",
            vec![(
                "check",
                json!({
                    "type": "boolean",
                    "description": "Check if formatting is needed without making changes",
                    "default": false
                }),
            )],
        ),
        tool(
            "terraform_show",
            "Show Terraform state or plan",
            vec![(
                "format",
                json!({
                    "type": "string",
                    "description": "Output format (json, text)",
                    "enum": ["json", "text"],
                    "default": "text"
                }),
            )],
        ),
        tool(
            "terraform_state_list",
            "List resources in Terraform state",
            vec![],
        ),
    ]
}

/// Human-readable text block for a finished command.
pub fn render_outcome(outcome: &CommandOutcome) -> String {
    let mut text = String::new();
    if outcome.success {
        let _ = write!(text, "Command executed successfully:\n{}\n\n", outcome.command);
        if !outcome.stdout.is_empty() {
            let _ = writeln!(text, "Output:\n{}", outcome.stdout);
        }
        if !outcome.stderr.is_empty() {
            let _ = writeln!(text, "Warnings:\n{}", outcome.stderr);
        }
    } else {
        let _ = write!(text, "Command failed:\n{}\n\n", outcome.command);
        let _ = writeln!(text, "Exit code: {}", outcome.exit_code);
        if !outcome.stderr.is_empty() {
            let _ = writeln!(text, "Error:\n{}", outcome.stderr);
        }
        if !outcome.stdout.is_empty() {
            let _ = writeln!(text, "Output:\n{}", outcome.stdout);
        }
    }
    text
}
