//! CLI exit codes.
//!
//! The contract is small: 0 success, 1 failure, 2 misuse (bad arguments or
//! unusable configuration). clap's own argument errors already exit with 2,
//! so misuse detected after parsing maps to the same code.

use crate::error::OrchestratorError;

/// Process exit codes for the `redgreen` CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Failure,
    Misuse,
}

impl ExitCode {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Misuse => 2,
        }
    }
}

/// Maps an orchestrator error to the exit code the CLI reports.
#[must_use]
pub fn exit_code_for(error: &OrchestratorError) -> ExitCode {
    match error {
        OrchestratorError::Config(_) => ExitCode::Misuse,
        _ => ExitCode::Failure,
    }
}
