//! Role system prompts and the per-phase user prompt builder.
//!
//! The builder is a pure function of `(phase, state, feature request)`; it
//! serializes state for the agent and never decides workflow policy.

use crate::types::{HandoffState, Phase};
use std::fmt::Write as _;

/// System prompt for the Test List agent (PLAN).
pub const TEST_LIST_SYSTEM_PROMPT: &str = "\
You are the Test List agent in an autonomous TDD workflow. You maintain \
test-list.md, a checklist of small behavioral test descriptions that together \
deliver the requested feature, and you pick the single next test to drive.

## Workflow
1. Read test-list.md if it exists; create it from the feature request if not. \
Use checklist syntax: `- [ ] description` per line, `- [x]` when done.
2. Pick the next unchecked test that delivers the most value, or decide the \
feature is complete when every test is checked.
3. Commit your changes with a message starting `plan: `.

## Output contract
End your reply with exactly one JSON object:
{\"currentTest\": {\"description\": \"...\", \"testFile\": \"...\", \"implFile\": \"...\"}}
or, when no tests remain:
{\"currentTest\": null}
The description is human prose; testFile and implFile are workspace-relative \
paths. Never select a test that is already checked off.
";

/// System prompt for the Test agent (RED).
pub const TEST_SYSTEM_PROMPT: &str = "\
You are the Test agent in an autonomous TDD workflow. You write exactly one \
failing test for the current test description - no implementation code.

## Rules
- Write the single smallest test that expresses the described behavior, in \
the test file you are given.
- Run the test suite and confirm the new test FAILS for the right reason. A \
test that passes immediately means you tested existing behavior; rewrite it.
- Do not touch implementation files.
- Commit with a message starting `test: `.
";

/// System prompt for the Implementing agent (GREEN).
pub const IMPLEMENTING_SYSTEM_PROMPT: &str = "\
You are the Implementing agent in an autonomous TDD workflow. You make the \
failing test pass with the smallest reasonable change.

## Rules
- Change implementation code only; never weaken or delete the failing test.
- Run the full test suite and confirm every test passes before you finish.
- Prefer the simplest implementation that makes the test pass; the refactor \
step comes next.
- Commit with a message starting `feat: ` (or `fix: ` for bug fixes).
";

/// System prompt for the Refactor agent (REFACTOR).
pub const REFACTOR_SYSTEM_PROMPT: &str = "\
You are the Refactor agent in an autonomous TDD workflow. You improve the \
code you just made green without changing behavior.

## Rules
- Remove duplication, clarify names, simplify structure. Skip refactoring \
when nothing needs it - say so instead of inventing churn.
- Run the full test suite after every change; it must stay green.
- Mark the current test as done in test-list.md (`- [ ]` becomes `- [x]`).
- Commit with a message starting `refactor: `.
";

/// System prompt for `phase`. COMPLETE has no agent.
#[must_use]
pub fn system_prompt_for(phase: Phase) -> &'static str {
    match phase {
        Phase::Plan => TEST_LIST_SYSTEM_PROMPT,
        Phase::Red => TEST_SYSTEM_PROMPT,
        Phase::Green => IMPLEMENTING_SYSTEM_PROMPT,
        Phase::Refactor => REFACTOR_SYSTEM_PROMPT,
        Phase::Complete => unreachable!("COMPLETE is terminal and never executed"),
    }
}

/// Display name for the agent driving `phase`.
#[must_use]
pub const fn agent_name_for(phase: Phase) -> &'static str {
    match phase {
        Phase::Plan => "Test List Agent",
        Phase::Red => "Test Agent",
        Phase::Green => "Implementing Agent",
        Phase::Refactor => "Refactor Agent",
        Phase::Complete => "none",
    }
}

/// Build the user prompt for one phase execution.
///
/// Carries the phase header, cycle number, current-test fields where the
/// phase requires them, PLAN checklists, and an error-context block iff the
/// state records a failure from a previous attempt.
#[must_use]
pub fn build_prompt(
    phase: Phase,
    state: &HandoffState,
    feature_request: Option<&str>,
    test_command: &str,
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "## {} Phase - Cycle {}", phase, state.cycle_number);
    prompt.push('\n');

    if let Some(test) = &state.current_test
        && phase != Phase::Plan
    {
        let _ = writeln!(prompt, "Current test:");
        let _ = writeln!(prompt, "- Description: {}", test.description);
        let _ = writeln!(prompt, "- Test file: {}", test.test_file);
        let _ = writeln!(prompt, "- Implementation file: {}", test.impl_file);
        prompt.push('\n');
    }

    if phase == Phase::Plan {
        if let Some(request) = feature_request {
            let _ = writeln!(prompt, "Feature request:\n{request}\n");
        }
        push_checklist(&mut prompt, "Completed tests", &state.completed_tests, true);
        push_checklist(&mut prompt, "Pending tests", &state.pending_tests, false);
    }

    if let Some(error) = &state.error {
        let _ = writeln!(
            prompt,
            "### Error Context (retry {} of {})",
            state.retry_count,
            crate::types::MAX_RETRIES_PER_PHASE
        );
        let _ = writeln!(prompt, "The previous attempt at this phase failed:");
        let _ = writeln!(prompt, "{error}");
        if let Some(details) = &state.error_details {
            let _ = writeln!(prompt, "Details: {}: {}", details.error_type, details.message);
        }
        let _ = writeln!(prompt, "Fix the cause before repeating the phase steps.");
        prompt.push('\n');
    }

    prompt.push_str("### Instructions\n");
    match phase {
        Phase::Plan => {
            let fresh = state.cycle_number == 1 && state.completed_tests.is_empty();
            if fresh {
                prompt.push_str(
                    "This is a new feature. Break the feature request into a list of \
                     small behavioral tests, write it to test-list.md, and select the \
                     first test to implement.\n",
                );
            } else {
                prompt.push_str(
                    "Select the next test from test-list.md, or report completion when \
                     all tests are checked off.\n",
                );
            }
            prompt.push_str(
                "Commit with a `plan: ` message, then end your reply with the \
                 {\"currentTest\": ...} JSON object.\n",
            );
        }
        Phase::Red => {
            let _ = writeln!(
                prompt,
                "Write one failing test for the current test description, run `{test_command}` \
                 to confirm it fails, then commit with a `test: ` message."
            );
        }
        Phase::Green => {
            let _ = writeln!(
                prompt,
                "Make the failing test pass, run `{test_command}` to confirm the whole \
                 suite is green, then commit with a `feat: ` message."
            );
        }
        Phase::Refactor => {
            let _ = writeln!(
                prompt,
                "Refactor the new code if it needs it, keep `{test_command}` green, mark \
                 the current test as `- [x]` in test-list.md, then commit with a \
                 `refactor: ` message."
            );
        }
        Phase::Complete => unreachable!("COMPLETE is terminal and never executed"),
    }

    prompt
}

fn push_checklist(prompt: &mut String, title: &str, items: &[String], checked: bool) {
    let _ = writeln!(prompt, "{title}:");
    if items.is_empty() {
        prompt.push_str("(none)\n");
    } else {
        let mark = if checked { "x" } else { " " };
        for item in items {
            let _ = writeln!(prompt, "- [{mark}] {item}");
        }
    }
    prompt.push('\n');
}
