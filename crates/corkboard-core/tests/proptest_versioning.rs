//! Property tests for the optimistic-concurrency protocol.

use corkboard_core::{Priority, TaskDraft, TaskPatch, TaskStore, UpdateOutcome};
use corkboard_hub::BroadcastHub;
use proptest::prelude::*;

/// One writer's attempt, as seen by the store: a patch plus the version
/// the writer believes is current. `Fresh` reads the live version first,
/// `Stale` deliberately reuses version 1, `Blind` supplies none.
#[derive(Debug, Clone)]
enum Attempt {
    Fresh(TaskPatch),
    Stale(TaskPatch),
    Blind(TaskPatch),
}

fn arb_patch() -> impl Strategy<Value = TaskPatch> {
    (
        proptest::option::of("[a-z]{3,20}"),
        proptest::option::of("[a-z ]{0,40}"),
        proptest::option::of(prop_oneof![
            Just(Priority::Low),
            Just(Priority::Medium),
            Just(Priority::High),
        ]),
        proptest::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(title, description, priority, assigned_to)| TaskPatch {
            title,
            description,
            priority,
            assigned_to,
            status: None,
            position: None,
        })
}

fn arb_attempt() -> impl Strategy<Value = Attempt> {
    prop_oneof![
        arb_patch().prop_map(Attempt::Fresh),
        arb_patch().prop_map(Attempt::Stale),
        arb_patch().prop_map(Attempt::Blind),
    ]
}

fn fresh_store() -> (TaskStore, String) {
    let store = TaskStore::in_memory(BroadcastHub::new()).expect("in-memory store");
    let task = store
        .create(&TaskDraft {
            board_id: "b1".to_string(),
            title: "Versioned task".to_string(),
            description: None,
            priority: None,
            assigned_to: None,
            created_by: "u1".to_string(),
        })
        .expect("create");
    (store, task.id)
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(64))]

    /// Accepted writes bump the version by exactly one; rejected writes
    /// never touch it and always leave exactly one more snapshot behind.
    #[test]
    fn version_moves_in_lockstep_with_accepted_writes(attempts in prop::collection::vec(arb_attempt(), 1..20)) {
        let (store, task_id) = fresh_store();
        let mut expected_version = 1i64;
        let mut expected_snapshots = 0usize;

        for attempt in attempts {
            let before = store.get("b1", &task_id).expect("get");
            prop_assert_eq!(before.version, expected_version);

            let (patch, supplied) = match attempt {
                Attempt::Fresh(patch) => (patch, Some(before.version)),
                Attempt::Stale(patch) => (patch, Some(1)),
                Attempt::Blind(patch) => (patch, None),
            };
            let stale = supplied.is_some_and(|v| v != before.version);

            match store.update("b1", &task_id, &patch, supplied, "writer") {
                Ok(UpdateOutcome::Applied(task)) => {
                    prop_assert!(!stale, "stale write must not be accepted");
                    prop_assert_eq!(task.version, expected_version + 1);
                    expected_version += 1;
                }
                Ok(UpdateOutcome::Conflict(task)) => {
                    prop_assert!(stale, "matching write must not conflict");
                    expected_snapshots += 1;
                    prop_assert_eq!(task.version, expected_version);
                    prop_assert!(task.has_conflict);
                    prop_assert_eq!(task.conflicting_versions.len(), expected_snapshots);
                }
                Err(error) => {
                    // Validation rejections leave everything untouched.
                    let after = store.get("b1", &task_id).expect("get");
                    prop_assert_eq!(after.version, expected_version, "failed write mutated version: {}", error);
                    prop_assert_eq!(after.conflicting_versions.len(), expected_snapshots);
                }
            }
        }

        let last = store.get("b1", &task_id).expect("get");
        prop_assert_eq!(last.version, expected_version);
        prop_assert_eq!(last.has_conflict, expected_snapshots > 0);
    }

    /// The conflict flag mirrors snapshot presence through any sequence
    /// of stale writes followed by a resolution.
    #[test]
    fn resolution_clears_every_pending_snapshot(stale_writers in 1usize..6) {
        use corkboard_core::Resolution;

        let (store, task_id) = fresh_store();
        store
            .update("b1", &task_id, &TaskPatch::default(), Some(1), "u1")
            .expect("bump past version 1");

        for n in 0..stale_writers {
            let outcome = store
                .update(
                    "b1",
                    &task_id,
                    &TaskPatch {
                        description: Some(format!("attempt {n}")),
                        ..TaskPatch::default()
                    },
                    Some(1),
                    "writer",
                )
                .expect("stale update");
            prop_assert!(outcome.is_conflict());
        }

        let conflicted = store.get("b1", &task_id).expect("get");
        prop_assert_eq!(conflicted.conflicting_versions.len(), stale_writers);
        prop_assert!(conflicted.has_conflict);

        let resolved = store
            .resolve_conflict("b1", &task_id, Resolution::KeepMine, None, "u1")
            .expect("resolve");
        prop_assert_eq!(resolved.version, 3);
        prop_assert!(!resolved.has_conflict);
        prop_assert!(resolved.conflicting_versions.is_empty());
    }
}
