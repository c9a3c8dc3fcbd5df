//! End-to-end board lifecycle through the service.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use dockboard::board::BoardCommand;
use dockboard::clock::{Clock, ManualClock};
use dockboard::import::{import_rows, RawRecord, StaticRowSource};
use dockboard::reconcile::{reconcile, TaskUniverse};
use dockboard::store::InMemoryBackend;
use dockboard::{
    BoardError, BoardService, DockStatus, DuplicatePolicy, TaskStatus, TransitionRejected,
};

fn acme() -> RawRecord {
    RawRecord::from_iter([
        ("DATE", json!("2025-01-10 08:00")),
        ("CLIENT", json!("Acme")),
        ("SERVICE", json!("Import")),
    ])
}

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap())
}

#[tokio::test]
async fn duplicate_row_assign_start_finish() {
    let clock = clock();
    let history = InMemoryBackend::new();
    let service = BoardService::builder()
        .row_source(StaticRowSource::new(vec![acme(), acme()]))
        .history_backend(history.clone())
        .clock(clock.clone())
        .initialize()
        .await;

    // Identical rows collapse into one task.
    assert_eq!(service.known_tasks().len(), 1);
    let board = service.snapshot();
    assert_eq!(board.tasks.len(), 1);
    let id = board.tasks[0].id.clone();

    let board = service
        .apply_command(
            None,
            &BoardCommand::AssignToDock {
                task_id: id.clone(),
                dock_id: "dock-1".to_string(),
                time: "08:00".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(board.task(&id).unwrap().status, TaskStatus::Scheduled);
    assert_eq!(
        board.dock_topology.dock("dock-1").unwrap().status,
        DockStatus::Occupied
    );

    clock.advance(chrono::Duration::minutes(10));
    let started_at = clock.now();
    let board = service
        .apply_command(None, &BoardCommand::StartProcess { task_id: id.clone() })
        .await
        .unwrap();
    let task = board.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::InProcess);
    assert_eq!(task.entered_at, Some(started_at));

    clock.advance(chrono::Duration::minutes(45));
    let board = service
        .apply_command(None, &BoardCommand::FinishProcess { task_id: id.clone() })
        .await
        .unwrap();
    let task = board.task(&id).unwrap();
    assert_eq!(task.status, TaskStatus::Finished);
    assert_eq!(task.finished_at, Some(clock.now()));
    assert_eq!(
        board.dock_topology.dock("dock-1").unwrap().status,
        DockStatus::Free
    );
    assert!(board.occupancy_violations().is_empty());

    // Every accepted change reached history.
    assert_eq!(history.stored()[&id].status, TaskStatus::Finished);
}

#[tokio::test]
async fn finishing_a_waiting_task_is_rejected_without_change() {
    let history = InMemoryBackend::new();
    let service = BoardService::builder()
        .row_source(StaticRowSource::new(vec![acme()]))
        .history_backend(history.clone())
        .clock(clock())
        .initialize()
        .await;
    let before = service.snapshot();
    let saves = history.save_count();
    let mut updates = service.subscribe();

    let id = before.tasks[0].id.clone();
    let err = service
        .apply_command(None, &BoardCommand::FinishProcess { task_id: id.clone() })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BoardError::Transition(TransitionRejected::InvalidTransition {
            from: TaskStatus::Waiting,
            to: TaskStatus::Finished,
            ..
        })
    ));
    assert_eq!(*service.snapshot(), *before);
    assert_eq!(history.save_count(), saves);
    assert!(updates.try_recv().is_err());
}

#[test]
fn reimport_keeps_operator_state() {
    let tz = chrono::FixedOffset::west_opt(3 * 3600).unwrap();
    let entered = Utc.with_ymd_and_hms(2025, 1, 10, 11, 5, 0).unwrap();

    let first = import_rows(&[acme()], tz, DuplicatePolicy::Dedup);
    let mut known = TaskUniverse::new();
    for mut task in first.tasks {
        task.status = TaskStatus::InProcess;
        task.entered_at = Some(entered);
        known.insert(task.id.clone(), task);
    }
    let id = known.keys().next().unwrap().clone();

    // Same identity, different client text: simulate a corrected source by
    // re-keying the fresh task onto the persisted id.
    let mut renamed = RawRecord::from_iter([
        ("DATE", json!("2025-01-10 08:00")),
        ("CLIENT", json!("Acme Logistics")),
        ("SERVICE", json!("Import")),
    ]);
    renamed.insert("ORDER_NUMBER", json!("4711"));
    let mut fresh = import_rows(&[renamed], tz, DuplicatePolicy::Dedup).tasks;
    fresh[0].id = id.clone();

    let merged = reconcile(fresh, &known);
    let task = &merged.universe[&id];
    assert_eq!(task.client, "Acme Logistics");
    assert_eq!(task.order_number.as_deref(), Some("4711"));
    assert_eq!(task.status, TaskStatus::InProcess);
    assert_eq!(task.entered_at, Some(entered));
    assert_eq!(merged.refreshed, 1);
    assert_eq!(merged.created, 0);
}

#[tokio::test]
async fn walk_in_joins_the_yard() {
    let service = BoardService::builder().clock(clock()).initialize().await;

    let board = service
        .apply_command(
            None,
            &BoardCommand::RegisterWalkIn(dockboard::board::WalkIn::new("Initech")),
        )
        .await
        .unwrap();

    assert_eq!(board.tasks.len(), 1);
    let walk_in = &board.tasks[0];
    assert!(walk_in.id.starts_with("walkin-"));
    assert_eq!(walk_in.status, TaskStatus::InYard);
    assert_eq!(walk_in.suggested_time, "08:00");
    assert!(service.known_tasks().contains_key(&walk_in.id));
}
