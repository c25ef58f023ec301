//! Error types for every component seam.
//!
//! Each seam gets its own `thiserror` enum; the top-level
//! [`OrchestratorError`] composes them with `#[from]` conversions. Library
//! code returns these and never calls `std::process::exit`; the CLI maps
//! them to exit codes in `exit_codes.rs`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration and environment errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("project root {0} is not a directory")]
    BadProjectRoot(PathBuf),

    #[error(
        "no test framework detected in the workspace and test.command is not set; \
         add `test.command=<command>` to tdd.properties"
    )]
    NoTestCommand,

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-tool execution errors. These are rendered into failure-typed tool
/// results for the agent; they never cross the agent boundary as `Err`.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("not a regular file: {0}")]
    NotAFile(String),

    #[error("directory not found: {0}")]
    MissingDirectory(String),

    #[error("old_string must not be empty")]
    EmptyAnchor,

    #[error("old_string not found in {0}")]
    AnchorMissing(String),

    #[error("old_string occurs {count} times in {path}; it must occur exactly once")]
    AnchorAmbiguous { path: String, count: usize },

    #[error("Exit code {code}\n{output}")]
    NonZeroExit { code: i32, output: String },

    #[error("command timed out after {0} seconds")]
    Timeout(u64),

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("invalid regex {pattern:?}: {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// LLM transport and protocol errors.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("provider returned a server error: {0}")]
    Outage(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("misconfiguration: {0}")]
    Misconfiguration(String),
}

/// Agent invocation failures (transport plus internal limits).
#[derive(Error, Debug)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("agent {name} exceeded {limit} turns without reaching a terminal reply")]
    TurnLimitExceeded { name: String, limit: u32 },
}

/// Git capability errors.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("commit message must not be blank")]
    BlankMessage,

    #[error("{0} is not a git repository")]
    NotARepository(PathBuf),

    #[error("git {op} failed (exit {code}): {stderr}")]
    CommandFailed {
        op: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Handoff store errors. All are hard: the workflow cannot proceed with a
/// broken audit trail.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(
        "malformed handoff record on commit {commit}: {reason}; \
         inspect or repair the refs/notes/tdd-handoffs namespace"
    )]
    Malformed { commit: String, reason: String },

    #[error("{source}; inspect or repair the refs/notes/tdd-handoffs namespace")]
    Git {
        #[from]
        source: GitError,
    },

    #[error("failed to serialize handoff record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Test-selection parse errors. Hard: proceeding without a selection is not
/// meaningful. The message always points at the expected JSON shape.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error(
        "no test selection found; expected a JSON object \
         {{\"currentTest\": null | {{\"description\", \"testFile\", \"implFile\"}}}}"
    )]
    MissingSelection,

    #[error(
        "test selection is missing required field {0:?}; expected \
         {{\"currentTest\": {{\"description\", \"testFile\", \"implFile\"}}}}"
    )]
    MissingField(&'static str),

    #[error("test selection field {0:?} must be a non-empty string")]
    BlankField(&'static str),

    #[error(
        "\"currentTest\" must be null or an object with \
         \"description\", \"testFile\" and \"implFile\", got {0}"
    )]
    WrongShape(String),

    #[error("test selection is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Top-level error composing every seam.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("handoff store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("test selection error: {0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Workflow(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_zero_exit_text_begins_with_exit_code() {
        let err = ToolError::NonZeroExit {
            code: 2,
            output: "ls: cannot access".to_string(),
        };
        assert!(err.to_string().starts_with("Exit code 2"));
    }

    #[test]
    fn test_timeout_text_mentions_timed_out() {
        let err = ToolError::Timeout(120);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_rate_limit_text_mentions_rate_limit() {
        let err = LlmError::RateLimit("429 from provider".to_string());
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn test_llm_timeout_text_mentions_timed_out() {
        let err = LlmError::Timeout(Duration::from_secs(300));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_store_errors_carry_repair_hint() {
        let malformed = StoreError::Malformed {
            commit: "abc123".to_string(),
            reason: "unexpected EOF".to_string(),
        };
        assert!(malformed.to_string().contains("refs/notes/tdd-handoffs"));

        let git: StoreError = GitError::BlankMessage.into();
        assert!(git.to_string().contains("refs/notes/tdd-handoffs"));
    }

    #[test]
    fn test_parse_errors_point_at_expected_shape() {
        let err = ParseError::MissingField("testFile");
        let text = err.to_string();
        assert!(text.contains("testFile"));
        assert!(text.contains("currentTest"));
    }
}
