//! Property tests: every serializable handoff state survives a JSON
//! round-trip, and the record keeps its contract field names.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use redgreen::types::{ErrorDetails, HandoffState, Phase, TestCase, TestResult};

fn phase_strategy() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Plan),
        Just(Phase::Red),
        Just(Phase::Green),
        Just(Phase::Refactor),
        Just(Phase::Complete),
    ]
}

fn test_case_strategy() -> impl Strategy<Value = TestCase> {
    (".{1,40}", ".{1,40}", ".{1,40}")
        .prop_map(|(d, t, i)| TestCase::new(d, t, i))
}

fn state_strategy() -> impl Strategy<Value = HandoffState> {
    (
        phase_strategy(),
        phase_strategy(),
        1u32..1000,
        proptest::option::of(test_case_strategy()),
        proptest::collection::vec(".{0,40}", 0..5),
        proptest::collection::vec(".{0,40}", 0..5),
        proptest::option::of(prop_oneof![Just(TestResult::Pass), Just(TestResult::Fail)]),
        proptest::option::of(".{0,60}"),
        0u32..=3,
        0i64..4_000_000_000,
    )
        .prop_map(
            |(
                phase,
                next_phase,
                cycle_number,
                current_test,
                completed_tests,
                pending_tests,
                test_result,
                error,
                retry_count,
                epoch_secs,
            )| {
                let error_details = error
                    .as_ref()
                    .map(|message| ErrorDetails::new("PhaseFailure", message.clone()));
                HandoffState {
                    phase,
                    next_phase,
                    cycle_number,
                    current_test,
                    completed_tests,
                    pending_tests,
                    test_result,
                    error,
                    error_details,
                    retry_count,
                    timestamp: Utc.timestamp_opt(epoch_secs, 0).unwrap(),
                }
            },
        )
}

proptest! {
    #[test]
    fn handoff_state_round_trips_through_json(state in state_strategy()) {
        let json = serde_json::to_string(&state).unwrap();
        let back: HandoffState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, state);
    }

    #[test]
    fn record_always_carries_contract_fields(state in state_strategy()) {
        let value = serde_json::to_value(&state).unwrap();
        let object = value.as_object().unwrap();
        for key in [
            "phase",
            "nextPhase",
            "cycleNumber",
            "currentTest",
            "completedTests",
            "pendingTests",
            "testResult",
            "error",
            "errorDetails",
            "retryCount",
            "timestamp",
        ] {
            prop_assert!(object.contains_key(key), "missing {}", key);
        }
        prop_assert_eq!(object.len(), 11);
    }

    #[test]
    fn retry_count_never_serializes_above_the_budget(state in state_strategy()) {
        let value = serde_json::to_value(&state).unwrap();
        prop_assert!(value["retryCount"].as_u64().unwrap() <= 3);
    }
}
