//! JSON Schemas advertised to the model for each tool.
//!
//! Names and required inputs match what the agents emit; the dispatcher in
//! `mod.rs` is the single source of truth for execution semantics.

use crate::llm::ToolSchema;
use serde_json::json;

/// Schemas for the full tool set, in a stable order.
#[must_use]
pub fn tool_schemas() -> Vec<ToolSchema> {
    vec![
        ToolSchema {
            name: "Read".to_string(),
            description: "Read the UTF-8 contents of a file in the workspace.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Workspace-relative path of the file to read"
                    }
                },
                "required": ["file_path"]
            }),
        },
        ToolSchema {
            name: "Write".to_string(),
            description: "Write a file, creating parent directories and overwriting \
                          any existing content."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Workspace-relative path of the file to write"
                    },
                    "content": {
                        "type": "string",
                        "description": "Full file content"
                    }
                },
                "required": ["file_path", "content"]
            }),
        },
        ToolSchema {
            name: "Edit".to_string(),
            description: "Replace old_string with new_string in a file. old_string must \
                          occur exactly once."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "Workspace-relative path of the file to edit"
                    },
                    "old_string": {
                        "type": "string",
                        "description": "Exact text to replace; must be unique in the file"
                    },
                    "new_string": {
                        "type": "string",
                        "description": "Replacement text"
                    }
                },
                "required": ["file_path", "old_string", "new_string"]
            }),
        },
        ToolSchema {
            name: "Bash".to_string(),
            description: "Run a shell command in the workspace root. Stderr is merged \
                          into the output; a non-zero exit or timeout is reported as a \
                          failure."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The command to run"
                    }
                },
                "required": ["command"]
            }),
        },
        ToolSchema {
            name: "Glob".to_string(),
            description: "List files matching a glob pattern, searched recursively."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Glob pattern, e.g. **/*.py"
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory to search (defaults to the workspace root)"
                    }
                },
                "required": ["pattern"]
            }),
        },
        ToolSchema {
            name: "Grep".to_string(),
            description: "Regex line search across workspace files. Reports at most 100 \
                          matches as file:line: text."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regular expression to search for"
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory or file to search (defaults to the workspace root)"
                    },
                    "glob": {
                        "type": "string",
                        "description": "Restrict the search to files matching this glob"
                    }
                },
                "required": ["pattern"]
            }),
        },
    ]
}
