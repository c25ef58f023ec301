//! Error classification and recovery strategy.
//!
//! Failure text observed at the end of a phase attempt is mapped to a closed
//! [`ErrorKind`] taxonomy, and the taxonomy plus the phase and retry budget
//! select a [`RecoveryAction`]. The selection table is evaluated top-down;
//! every kind is retriable and only test failures require a rollback.

use crate::types::Phase;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// Closed taxonomy of phase-failure causes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Compilation,
    TestFailure,
    UnexpectedPass,
    Timeout,
    RateLimit,
    Network,
    Unknown,
}

impl ErrorKind {
    /// Category tag recorded in `errorDetails.type`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Compilation => "CompilationError",
            Self::TestFailure => "TestFailure",
            Self::UnexpectedPass => "UnexpectedPass",
            Self::Timeout => "Timeout",
            Self::RateLimit => "RateLimit",
            Self::Network => "NetworkError",
            Self::Unknown => "PhaseFailure",
        }
    }
}

/// What the workflow driver does next after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Record the outcome and move on; the observed failure is the phase's
    /// expected result (a failing test during RED).
    Continue,
    /// Re-run the same phase with the error text in the next prompt.
    RetryWithContext,
    /// Hard-reset to the given commit, then retry.
    RollbackAndRetry { commit: String },
    /// Sleep with exponential backoff, then retry.
    WaitAndRetry { delay: Duration },
    /// Fatal; the workflow ends in failure.
    Abort,
}

static TS_COMPILE_ERROR: Lazy<Regex> = Lazy::new(|| Regex::new(r"error TS\d+").unwrap());
static JUNIT_FAILURES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tests run: \d+, Failures: [1-9]").unwrap());
static JUNIT_ALL_GREEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tests run: \d+, Failures: 0").unwrap());
static PYTEST_PASSED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+ passed").unwrap());

/// Classify a failure message observed at the end of a phase attempt.
#[must_use]
pub fn classify(message: &str, phase: Phase) -> ErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("timed out") || lower.contains("timeout") {
        return ErrorKind::Timeout;
    }
    if lower.contains("rate limit") || message.contains("429") {
        return ErrorKind::RateLimit;
    }
    if has_compilation_marker(message) {
        return ErrorKind::Compilation;
    }
    if has_test_failure_marker(message) {
        return ErrorKind::TestFailure;
    }
    if phase == Phase::Red && has_success_marker(message) {
        return ErrorKind::UnexpectedPass;
    }
    if lower.contains("network")
        || lower.contains("connection")
        || lower.contains("transport")
        || lower.contains("dns")
    {
        return ErrorKind::Network;
    }
    ErrorKind::Unknown
}

fn has_compilation_marker(message: &str) -> bool {
    message.contains("COMPILATION ERROR")
        || message.contains("SyntaxError")
        || TS_COMPILE_ERROR.is_match(message)
}

fn has_test_failure_marker(message: &str) -> bool {
    message.contains("FAILURES!")
        || message.contains("FAIL:")
        || message.contains("FAILED")
        || JUNIT_FAILURES.is_match(message)
}

fn has_success_marker(message: &str) -> bool {
    message.contains("BUILD SUCCESS")
        || JUNIT_ALL_GREEN.is_match(message)
        || PYTEST_PASSED.is_match(message)
}

/// Select the recovery action for a failed attempt.
///
/// `retry_count` is the number of retries already consumed; `attempt` is the
/// 1-based attempt number used for the backoff schedule. `rollback_commit`
/// is the commit recorded at phase entry, when one exists.
#[must_use]
pub fn select_action(
    kind: ErrorKind,
    phase: Phase,
    retry_count: u32,
    max_retries: u32,
    rollback_commit: Option<&str>,
    attempt: u32,
) -> RecoveryAction {
    if retry_count >= max_retries {
        return RecoveryAction::Abort;
    }
    match kind {
        ErrorKind::TestFailure if phase == Phase::Red => RecoveryAction::Continue,
        ErrorKind::TestFailure if matches!(phase, Phase::Green | Phase::Refactor) => {
            match rollback_commit {
                Some(commit) => RecoveryAction::RollbackAndRetry {
                    commit: commit.to_string(),
                },
                // Nothing to reset to; retrying with context is the best left.
                None => RecoveryAction::RetryWithContext,
            }
        }
        ErrorKind::Timeout | ErrorKind::RateLimit | ErrorKind::Network => {
            RecoveryAction::WaitAndRetry {
                delay: backoff_delay(attempt),
            }
        }
        _ => RecoveryAction::RetryWithContext,
    }
}

/// Exponential backoff schedule: `2^(attempt-1)` seconds, so 1, 2, 4 s
/// across three retries.
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(6))
}

/// Sleep capability, injected so backoff is observable in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
