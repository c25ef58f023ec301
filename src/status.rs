//! Human-readable rendering of handoff records for `status` and `history`.

use crate::types::HandoffState;
use std::fmt::Write as _;

/// Render the current workflow state for `status`.
#[must_use]
pub fn render_status(record: Option<&(String, HandoffState)>) -> String {
    let Some((commit, state)) = record else {
        return "No handoff records on this branch; nothing in progress.\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "Phase:      {} (next: {})", state.phase, state.next_phase);
    let _ = writeln!(out, "Cycle:      {}", state.cycle_number);
    let _ = writeln!(out, "Commit:     {}", short(commit));
    match &state.current_test {
        Some(test) => {
            let _ = writeln!(out, "Test:       {}", test.description);
            let _ = writeln!(out, "  test file: {}", test.test_file);
            let _ = writeln!(out, "  impl file: {}", test.impl_file);
        }
        None => {
            let _ = writeln!(out, "Test:       (none)");
        }
    }
    let _ = writeln!(
        out,
        "Progress:   {} completed, {} pending",
        state.completed_tests.len(),
        state.pending_tests.len()
    );
    if let Some(result) = state.test_result {
        let _ = writeln!(out, "Last run:   {result:?}");
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "Error:      {error}");
        if let Some(details) = &state.error_details {
            let _ = writeln!(out, "  {} (retry {})", details.error_type, state.retry_count);
        }
    }
    let _ = writeln!(out, "Updated:    {}", state.timestamp.to_rfc3339());
    out
}

/// Render the record history for `history`, newest first.
#[must_use]
pub fn render_history(records: &[(String, HandoffState)]) -> String {
    if records.is_empty() {
        return "No handoff records on this branch.\n".to_string();
    }
    let mut out = String::new();
    for (commit, state) in records {
        let test = state
            .current_test
            .as_ref()
            .map_or("-", |t| t.description.as_str());
        let marker = if state.error.is_some() { " !" } else { "" };
        let _ = writeln!(
            out,
            "{} {:>8} -> {:<8} cycle {:<3} {}{}",
            short(commit),
            state.phase.as_str(),
            state.next_phase.as_str(),
            state.cycle_number,
            test,
            marker,
        );
    }
    out
}

fn short(commit: &str) -> &str {
    &commit[..commit.len().min(8)]
}
