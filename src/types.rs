//! Core data model for the TDD workflow.
//!
//! The JSON field names and enum spellings here are an external contract:
//! handoff records attached to commits must round-trip byte-compatibly with
//! documents written by earlier runs, so serde attributes pin the exact
//! casing (`camelCase` fields, `UPPERCASE` enum variants).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum retries per phase before the workflow aborts.
pub const MAX_RETRIES_PER_PHASE: u32 = 3;

/// Hard cap on TDD cycles to prevent runaway loops.
pub const MAX_CYCLES: u32 = 100;

/// A step in the red-green-refactor cycle.
///
/// `Complete` is terminal and never executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    Plan,
    Red,
    Green,
    Refactor,
    Complete,
}

impl Phase {
    /// Returns the canonical string spelling used in handoff records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "PLAN",
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Refactor => "REFACTOR",
            Self::Complete => "COMPLETE",
        }
    }

    /// The phase the workflow executes after this one succeeds.
    ///
    /// `Plan → Red` is the mechanical successor; the workflow driver replaces
    /// it with `Complete` when the test-list agent selects no further test.
    #[must_use]
    pub const fn next(&self) -> Self {
        match self {
            Self::Plan => Self::Red,
            Self::Red => Self::Green,
            Self::Green => Self::Refactor,
            Self::Refactor => Self::Plan,
            Self::Complete => Self::Complete,
        }
    }

    /// Conventional-commit prefix agents use for this phase.
    #[must_use]
    pub const fn commit_prefix(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Red => "test",
            Self::Green => "feat",
            Self::Refactor => "refactor",
            Self::Complete => "chore",
        }
    }

    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the project's test suite as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestResult {
    Pass,
    Fail,
}

/// One test the workflow drives through a full cycle.
///
/// All three fields are non-empty; the output parser enforces this before a
/// `TestCase` is constructed from agent output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Human prose describing the behaviour under test.
    pub description: String,
    /// Workspace-relative path of the test file.
    pub test_file: String,
    /// Workspace-relative path of the implementation file.
    pub impl_file: String,
}

impl TestCase {
    #[must_use]
    pub fn new(
        description: impl Into<String>,
        test_file: impl Into<String>,
        impl_file: impl Into<String>,
    ) -> Self {
        Self {
            description: description.into(),
            test_file: test_file.into(),
            impl_file: impl_file.into(),
        }
    }
}

/// Categorized error information carried on a handoff record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Short category tag, e.g. `CompilationError`, `TestFailure`.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Full error message.
    pub message: String,
}

impl ErrorDetails {
    #[must_use]
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

/// The shared state record handed between phases and persisted as a
/// commit-attached note.
///
/// Invariants maintained by the workflow driver:
/// - a description appears in at most one of `completed_tests`/`pending_tests`;
/// - `current_test` is present whenever `phase` is RED/GREEN/REFACTOR;
/// - on COMPLETE, `current_test` is absent and `pending_tests` is empty;
/// - after a successful transition the error fields are cleared and
///   `retry_count` is zero;
/// - `retry_count` never exceeds [`MAX_RETRIES_PER_PHASE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffState {
    pub phase: Phase,
    pub next_phase: Phase,
    pub cycle_number: u32,
    pub current_test: Option<TestCase>,
    pub completed_tests: Vec<String>,
    pub pending_tests: Vec<String>,
    pub test_result: Option<TestResult>,
    pub error: Option<String>,
    pub error_details: Option<ErrorDetails>,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl HandoffState {
    /// The state a fresh workflow starts from.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            phase: Phase::Plan,
            next_phase: Phase::Red,
            cycle_number: 1,
            current_test: None,
            completed_tests: Vec::new(),
            pending_tests: Vec::new(),
            test_result: None,
            error: None,
            error_details: None,
            retry_count: 0,
            timestamp: Utc::now(),
        }
    }

    /// Returns a copy carrying the given failure, with `retry_count` bumped.
    #[must_use]
    pub fn with_failure(&self, message: impl Into<String>, details: ErrorDetails) -> Self {
        let mut next = self.clone();
        next.error = Some(message.into());
        next.error_details = Some(details);
        next.retry_count += 1;
        next.timestamp = Utc::now();
        next
    }

    /// Clears error bookkeeping after a successful transition.
    pub fn clear_failure(&mut self) {
        self.error = None;
        self.error_details = None;
        self.retry_count = 0;
        self.timestamp = Utc::now();
    }
}

/// Result of running one phase to completion (or failure).
#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub executed_phase: Phase,
    pub updated_state: HandoffState,
    /// Commit observed at the end of the phase, if the agent produced one.
    pub commit_id: Option<String>,
    /// The agent's terminal text reply.
    pub agent_response: String,
    pub success: bool,
    pub error_message: Option<String>,
}

impl PhaseResult {
    #[must_use]
    pub fn succeeded(
        phase: Phase,
        state: HandoffState,
        commit_id: Option<String>,
        agent_response: String,
    ) -> Self {
        Self {
            executed_phase: phase,
            updated_state: state,
            commit_id,
            agent_response,
            success: true,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed(phase: Phase, state_at_entry: HandoffState, message: impl Into<String>) -> Self {
        Self {
            executed_phase: phase,
            updated_state: state_at_entry,
            commit_id: None,
            agent_response: String::new(),
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Final outcome of a workflow run, with every phase attempt in order.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub success: bool,
    pub final_state: HandoffState,
    /// Number of complete PLAN→RED→GREEN→REFACTOR cycles.
    pub completed_cycles: u32,
    pub phase_results: Vec<PhaseResult>,
    pub error_message: Option<String>,
}
