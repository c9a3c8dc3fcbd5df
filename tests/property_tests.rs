//! Property-based tests for identity, partitioning and the dock occupancy
//! invariant.
//!
//! Command sequences are generated from small index ranges so that most
//! commands hit real tasks and docks; refused commands must leave the board
//! untouched and accepted ones must keep every dock consistent.

use std::collections::HashSet;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use proptest::prelude::*;
use serde_json::{json, Value};

use dockboard::board::{BoardCommand, PoolDestination, WalkIn};
use dockboard::import::{derive_identity, import_rows, RawRecord};
use dockboard::partition::{local_date, partition};
use dockboard::{BoardSnapshot, DockTopology, DuplicatePolicy, Task, TaskStatus};

fn tz() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 10, 13, 0, 0).unwrap()
}

// ─── Arbitrary Strategies ───────────────────────────────────────────────────

fn arb_record() -> impl Strategy<Value = Vec<(String, String)>> {
    (
        "2025-0[1-9]-(0[1-9]|1[0-9]|2[0-8]) [01][0-9]:[0-5][0-9]",
        "[A-Za-z][A-Za-z ]{0,20}",
        "(Import|Export|Transfer)",
        proptest::option::of("[0-9]{4,8}"),
    )
        .prop_map(|(date, client, service, order)| {
            let mut cells = vec![
                ("DATE".to_string(), date),
                ("CLIENT".to_string(), client),
                ("SERVICE".to_string(), service),
            ];
            if let Some(order) = order {
                cells.push(("ORDER_NUMBER".to_string(), order));
            }
            cells
        })
}

fn record(cells: &[(String, String)]) -> RawRecord {
    cells
        .iter()
        .map(|(k, v)| (k.as_str(), Value::String(v.clone())))
        .collect()
}

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(-4i64 * 24 * 60..4 * 24 * 60, 0..40).prop_map(|offsets| {
        offsets
            .into_iter()
            .enumerate()
            .map(|(i, offset_minutes)| {
                Task::new(
                    format!("task-{i}"),
                    now() + Duration::minutes(offset_minutes),
                    "08:00".to_string(),
                    "Acme".to_string(),
                    "Import".to_string(),
                )
            })
            .collect()
    })
}

#[derive(Debug, Clone)]
enum Op {
    Assign(usize, usize, u8),
    Unassign(usize, bool),
    CheckIn(usize),
    NoShow(usize, bool),
    Reopen(usize),
    Start(usize),
    Finish(usize),
    Block(usize, bool),
    Unblock(usize),
    WalkIn,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..8usize, 0..8usize, 6u8..20).prop_map(|(t, d, h)| Op::Assign(t, d, h)),
        2 => (0..8usize, any::<bool>()).prop_map(|(t, yard)| Op::Unassign(t, yard)),
        1 => (0..8usize).prop_map(Op::CheckIn),
        1 => (0..8usize, any::<bool>()).prop_map(|(t, c)| Op::NoShow(t, c)),
        1 => (0..8usize).prop_map(Op::Reopen),
        3 => (0..8usize).prop_map(Op::Start),
        3 => (0..8usize).prop_map(Op::Finish),
        1 => (0..8usize, any::<bool>()).prop_map(|(d, r)| Op::Block(d, r)),
        1 => (0..8usize).prop_map(Op::Unblock),
        1 => Just(Op::WalkIn),
    ]
}

fn command(op: &Op, board: &BoardSnapshot, docks: &[String]) -> BoardCommand {
    // Index one past the end to exercise unknown ids too.
    let task = |i: usize| {
        board
            .tasks
            .get(i)
            .map_or_else(|| "missing".to_string(), |t| t.id.clone())
    };
    let dock = |i: usize| {
        docks
            .get(i)
            .cloned()
            .unwrap_or_else(|| "dock-99".to_string())
    };

    match *op {
        Op::Assign(t, d, hour) => BoardCommand::AssignToDock {
            task_id: task(t),
            dock_id: dock(d),
            time: format!("{hour:02}:00"),
        },
        Op::Unassign(t, yard) => BoardCommand::Unassign {
            task_id: task(t),
            destination: if yard {
                PoolDestination::Yard
            } else {
                PoolDestination::Unassigned
            },
        },
        Op::CheckIn(t) => BoardCommand::CheckInToYard { task_id: task(t) },
        Op::NoShow(t, confirmed) => BoardCommand::MarkNoShow {
            task_id: task(t),
            confirmed,
        },
        Op::Reopen(t) => BoardCommand::ReopenNoShow { task_id: task(t) },
        Op::Start(t) => BoardCommand::StartProcess { task_id: task(t) },
        Op::Finish(t) => BoardCommand::FinishProcess { task_id: task(t) },
        Op::Block(d, with_reason) => BoardCommand::BlockDock {
            dock_id: dock(d),
            reason: if with_reason { "Maintenance" } else { "  " }.to_string(),
        },
        Op::Unblock(d) => BoardCommand::UnblockDock { dock_id: dock(d) },
        Op::WalkIn => BoardCommand::RegisterWalkIn(WalkIn::new("Walk-in Co")),
    }
}

fn starting_board(count: usize) -> BoardSnapshot {
    let tasks = (0..count)
        .map(|i| {
            Task::new(
                format!("task-{i}"),
                now(),
                "09:00".to_string(),
                format!("Client {i}"),
                "Import".to_string(),
            )
        })
        .collect();
    BoardSnapshot::new(tasks, DockTopology::default())
}

// ─── Property Tests: Identity ───────────────────────────────────────────────

proptest! {
    /// Re-deriving from the same content gives the same identity, whatever
    /// the column order or header case.
    #[test]
    fn identity_is_stable(cells in arb_record()) {
        let forward = record(&cells);
        let reversed: RawRecord = cells
            .iter()
            .rev()
            .map(|(k, v)| (k.to_lowercase(), Value::String(v.clone())))
            .collect();

        prop_assert_eq!(derive_identity(&forward), derive_identity(&forward));
        prop_assert_eq!(derive_identity(&forward), derive_identity(&reversed));
    }

    /// Changing any cell changes the identity.
    #[test]
    fn identity_follows_content(cells in arb_record(), which in any::<prop::sample::Index>()) {
        let original = record(&cells);
        let mut changed = cells.clone();
        let slot = which.index(changed.len());
        changed[slot].1.push('x');

        prop_assert_ne!(derive_identity(&original), derive_identity(&record(&changed)));
    }

    /// Dedup keeps one task per distinct row; strict-unique keeps every
    /// valid row, with distinct ids either way.
    #[test]
    fn duplicate_policies_preserve_distinct_rows(
        rows in prop::collection::vec(arb_record(), 1..6),
        repeats in prop::collection::vec(0usize..3, 1..6),
    ) {
        let mut raw = Vec::new();
        for (cells, extra) in rows.iter().zip(repeats.iter().chain(std::iter::repeat(&0))) {
            for _ in 0..=*extra {
                raw.push(record(cells));
            }
        }
        let distinct: HashSet<String> = raw.iter().map(derive_identity).collect();

        let dedup = import_rows(&raw, tz(), DuplicatePolicy::Dedup);
        prop_assert!(dedup.rejected.is_empty());
        prop_assert_eq!(dedup.tasks.len(), distinct.len());
        prop_assert_eq!(dedup.tasks.len() + dedup.collapsed, raw.len());

        let strict = import_rows(&raw, tz(), DuplicatePolicy::StrictUnique);
        let ids: HashSet<&str> = strict.tasks.iter().map(|t| t.id.as_str()).collect();
        prop_assert_eq!(strict.tasks.len(), raw.len());
        prop_assert_eq!(ids.len(), raw.len());
    }
}

// ─── Property Tests: Partitioning ───────────────────────────────────────────

proptest! {
    /// Buckets are pairwise disjoint, drawn from the universe, and hold
    /// exactly the tasks of their calendar day.
    #[test]
    fn partition_is_disjoint_subset(tasks in arb_tasks()) {
        let days = partition(tasks.iter(), now(), tz());
        let today = local_date(now(), tz());

        let ids = |bucket: &[Task]| -> HashSet<String> {
            bucket.iter().map(|t| t.id.clone()).collect()
        };
        let (y, t, m) = (ids(&days.yesterday), ids(&days.today), ids(&days.tomorrow));
        prop_assert!(y.is_disjoint(&t));
        prop_assert!(t.is_disjoint(&m));
        prop_assert!(y.is_disjoint(&m));

        let universe: HashSet<String> = tasks.iter().map(|t| t.id.clone()).collect();
        prop_assert!(y.union(&t).chain(m.iter()).all(|id| universe.contains(id)));

        for task in &days.today {
            prop_assert_eq!(local_date(task.scheduled_at, tz()), today);
        }
        let expected_today = tasks
            .iter()
            .filter(|task| local_date(task.scheduled_at, tz()) == today)
            .count();
        prop_assert_eq!(days.today.len(), expected_today);
    }
}

// ─── Property Tests: Board Transitions ──────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// After any command sequence every dock agrees with the tasks on it,
    /// and refused commands change nothing.
    #[test]
    fn occupancy_invariant_holds(
        task_count in 1usize..6,
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let mut board = starting_board(task_count);
        let docks: Vec<String> = board.dock_topology.docks().map(|d| d.id.clone()).collect();

        for op in &ops {
            let cmd = command(op, &board, &docks);
            let before = board.clone();

            match cmd.apply(&mut board, now(), tz()) {
                Ok(()) => {
                    let violations = board.occupancy_violations();
                    prop_assert!(violations.is_empty(), "{:?} after {:?}", violations, cmd);
                },
                Err(_) => prop_assert_eq!(&board, &before),
            }
        }

        for task in &board.tasks {
            if task.status == TaskStatus::Finished {
                prop_assert!(task.finished_at.is_some());
            }
            if task.status == TaskStatus::InProcess {
                prop_assert!(task.entered_at.is_some());
            }
            if matches!(task.status, TaskStatus::Waiting | TaskStatus::NoShow) {
                prop_assert!(task.assignment.is_none());
            }
        }
    }

    /// Terminal statuses reject every ordinary transition.
    #[test]
    fn terminal_states_reject_all_transitions(
        from in prop::sample::select(vec![TaskStatus::Finished, TaskStatus::NoShow]),
        to in prop::sample::select(TaskStatus::ALL.to_vec()),
    ) {
        prop_assert!(!from.can_transition_to(&to));
        prop_assert!(from.validate_transition("t", &to).is_err());
    }
}

#[test]
fn record_helper_builds_normalized_rows() {
    let row = record(&[("client".to_string(), "Acme".to_string())]);
    assert_eq!(row.get("CLIENT"), Some(&json!("Acme")));
}
