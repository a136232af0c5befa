//! Property-based tests for replica verdict aggregation.
//!
//! Verifies the worst-status fold over arbitrary replica outcome vectors
//! using proptest: failures always dominate, skips never pass a run by
//! themselves, and the tally partitions the replica set exactly.

#[macro_use]
mod common;

use lostwake::aggregate::summarize;
use lostwake::exit::ExitCode;
use lostwake::replicate::{WorkerExit, WorkerStatus};
use proptest::prelude::*;

fn init_test(name: &str) {
    common::init_test_logging();
    test_phase!(name);
}

// ============================================================================
// Arbitrary generators
// ============================================================================

fn arb_status() -> impl Strategy<Value = WorkerStatus> {
    prop_oneof![
        Just(WorkerStatus::Exited(ExitCode::SUCCESS)),
        Just(WorkerStatus::Exited(ExitCode::SKIPPED)),
        (1..=2i32).prop_map(WorkerStatus::Exited),
        (1..=31i32).prop_map(WorkerStatus::Signaled),
    ]
}

fn arb_exits() -> impl Strategy<Value = Vec<WorkerExit>> {
    prop::collection::vec(arb_status(), 0..12).prop_map(|statuses| {
        statuses
            .into_iter()
            .enumerate()
            .map(|(index, status)| WorkerExit {
                pid: 1_000 + i32::try_from(index).expect("small replica index"),
                status,
            })
            .collect()
    })
}

fn failure_code(status: WorkerStatus) -> Option<i32> {
    let code = status.code();
    (code != ExitCode::SUCCESS && code != ExitCode::SKIPPED).then_some(code)
}

// ============================================================================
// Verdict fold properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The worst failure recorded is exactly the maximum failure code in
    /// the input, and when one exists it becomes the verdict.
    #[test]
    fn failures_always_dominate(exits in arb_exits()) {
        let summary = summarize(&exits);
        let worst = exits.iter().filter_map(|e| failure_code(e.status)).max();
        prop_assert_eq!(summary.worst_failure, worst);
        if let Some(code) = worst {
            prop_assert_eq!(summary.exit_code(), code);
        }
    }

    /// Without failures, a run passes only when at least one replica
    /// actually measured; all-skip and empty runs never pass.
    #[test]
    fn runs_pass_only_when_something_measured(exits in arb_exits()) {
        let summary = summarize(&exits);
        if summary.worst_failure.is_none() {
            let expected = if exits.is_empty() {
                ExitCode::FAILURE
            } else if summary.succeeded > 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::SKIPPED
            };
            prop_assert_eq!(summary.exit_code(), expected);
        }
    }

    /// Every replica lands in exactly one bucket.
    #[test]
    fn tally_partitions_the_replicas(exits in arb_exits()) {
        let summary = summarize(&exits);
        let failures = exits
            .iter()
            .filter(|e| failure_code(e.status).is_some())
            .count();
        prop_assert_eq!(summary.succeeded + summary.skipped + failures, summary.total);
        prop_assert_eq!(summary.total, exits.len());
    }

    /// The fold is order-insensitive.
    #[test]
    fn order_never_changes_the_verdict(exits in arb_exits()) {
        let mut reversed = exits.clone();
        reversed.reverse();
        prop_assert_eq!(summarize(&exits), summarize(&reversed));
    }
}

// ============================================================================
// Deterministic spot checks
// ============================================================================

#[test]
fn signal_death_outranks_plain_failure() {
    init_test("signal_death_outranks_plain_failure");
    let exits = vec![
        WorkerExit {
            pid: 1,
            status: WorkerStatus::Exited(1),
        },
        WorkerExit {
            pid: 2,
            status: WorkerStatus::Signaled(11),
        },
    ];
    let summary = summarize(&exits);
    let code = summary.exit_code();
    assert_with_log!(code == 139, "exit code", 139, code);
    test_complete!("signal_death_outranks_plain_failure");
}
