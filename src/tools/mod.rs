//! Tool dispatcher: executes one model-requested side effect against the
//! workspace.
//!
//! Tool failures are data, not errors: the dispatcher always returns a
//! [`ToolResult`] so the agent invoker can hand failures back to the model
//! as failure-typed tool results and let it recover within the same
//! invocation. The only distinct failure class is an unknown tool name.

mod bash;
mod fs;
mod schema;
mod search;

pub use schema::tool_schemas;
pub use search::MAX_GREP_MATCHES;

use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success { output: String },
    Failure { error: String },
}

impl ToolResult {
    #[must_use]
    pub fn success(output: impl Into<String>) -> Self {
        Self::Success {
            output: output.into(),
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The text delivered to the model, success or failure alike.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Success { output } => output,
            Self::Failure { error } => error,
        }
    }
}

impl<E: std::fmt::Display> From<Result<String, E>> for ToolResult {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(output) => Self::Success { output },
            Err(error) => Self::Failure {
                error: error.to_string(),
            },
        }
    }
}

/// Executes tool calls scoped to a fixed workspace root.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    workspace_root: PathBuf,
    bash_timeout: Duration,
}

impl ToolDispatcher {
    #[must_use]
    pub fn new(workspace_root: PathBuf, bash_timeout: Duration) -> Self {
        Self {
            workspace_root,
            bash_timeout,
        }
    }

    /// Execute one tool call.
    ///
    /// Unknown tool names surface as a dispatcher-level failure distinct
    /// from per-tool failures.
    pub async fn dispatch(&self, tool_name: &str, inputs: &Value) -> ToolResult {
        debug!(tool = tool_name, "dispatching tool call");
        match tool_name {
            "Read" => self.read(inputs),
            "Write" => self.write(inputs),
            "Edit" => self.edit(inputs),
            "Bash" => self.bash(inputs).await,
            "Glob" => self.glob(inputs),
            "Grep" => self.grep(inputs),
            other => ToolResult::failure(format!("unknown tool: {other}")),
        }
    }

    fn read(&self, inputs: &Value) -> ToolResult {
        match required_str(inputs, "Read", "file_path") {
            Ok(path) => fs::read_file(&self.workspace_root.join(path)).into(),
            Err(error) => ToolResult::failure(error),
        }
    }

    fn write(&self, inputs: &Value) -> ToolResult {
        let (path, content) = match (
            required_str(inputs, "Write", "file_path"),
            required_str(inputs, "Write", "content"),
        ) {
            (Ok(path), Ok(content)) => (path, content),
            (Err(error), _) | (_, Err(error)) => return ToolResult::failure(error),
        };
        match fs::write_file(&self.workspace_root.join(path), content) {
            Ok(()) => ToolResult::success(format!("Wrote {path}")),
            Err(error) => ToolResult::failure(error.to_string()),
        }
    }

    fn edit(&self, inputs: &Value) -> ToolResult {
        let (path, old, new) = match (
            required_str(inputs, "Edit", "file_path"),
            required_str(inputs, "Edit", "old_string"),
            required_str(inputs, "Edit", "new_string"),
        ) {
            (Ok(path), Ok(old), Ok(new)) => (path, old, new),
            (Err(error), ..) | (_, Err(error), _) | (.., Err(error)) => {
                return ToolResult::failure(error);
            }
        };
        match fs::edit_file(&self.workspace_root.join(path), old, new) {
            Ok(()) => ToolResult::success(format!("Edited {path}")),
            Err(error) => ToolResult::failure(error.to_string()),
        }
    }

    async fn bash(&self, inputs: &Value) -> ToolResult {
        match required_str(inputs, "Bash", "command") {
            Ok(command) => {
                bash::run_command(command, &self.workspace_root, self.bash_timeout)
                    .await
                    .into()
            }
            Err(error) => ToolResult::failure(error),
        }
    }

    fn glob(&self, inputs: &Value) -> ToolResult {
        match required_str(inputs, "Glob", "pattern") {
            Ok(pattern) => {
                let base = match optional_str(inputs, "path") {
                    Some(path) => self.workspace_root.join(path),
                    None => self.workspace_root.clone(),
                };
                search::glob_files(pattern, &base).into()
            }
            Err(error) => ToolResult::failure(error),
        }
    }

    fn grep(&self, inputs: &Value) -> ToolResult {
        match required_str(inputs, "Grep", "pattern") {
            Ok(pattern) => {
                let base = match optional_str(inputs, "path") {
                    Some(path) => self.workspace_root.join(path),
                    None => self.workspace_root.clone(),
                };
                search::grep_files(pattern, &base, optional_str(inputs, "glob")).into()
            }
            Err(error) => ToolResult::failure(error),
        }
    }
}

fn required_str<'a>(inputs: &'a Value, tool: &str, key: &str) -> Result<&'a str, String> {
    inputs
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{tool}: missing required input `{key}`"))
}

fn optional_str<'a>(inputs: &'a Value, key: &str) -> Option<&'a str> {
    inputs.get(key).and_then(Value::as_str)
}
