//! Shared real-time scheduling board for loading-dock operations.
//!
//! The board ingests a schedule of expected client visits, lets operators
//! place tasks on dock slots and move them through their lifecycle, and
//! keeps every connected viewer on the same snapshot.
//!
//! # Overview
//!
//! At startup the schedule rows are validated and tagged with a
//! content-derived identity, merged with the persisted task history, and
//! today's tasks are installed on the board together with the dock
//! topology. At runtime each accepted change replaces the snapshot, is
//! written through to the history and is broadcast to all subscribers.
//!
//! # Module Organization
//!
//! - [`types`] - Wire types: [`Task`], [`Dock`], [`BoardSnapshot`]
//! - [`import`] - Row validation, identity derivation, row sources
//! - [`reconcile`] - Merging imported tasks with known state
//! - [`partition`] - Yesterday / today / tomorrow buckets
//! - [`board`] - The board store and its transitions
//! - [`store`] - Durable task history
//! - [`broadcast`] - Update fan-out
//! - [`report`] - Monthly activity report
//! - [`service`] - Orchestration of all of the above
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use dockboard::board::BoardCommand;
//! use dockboard::clock::ManualClock;
//! use dockboard::import::{RawRecord, StaticRowSource};
//! use dockboard::{BoardService, DockStatus, TaskStatus};
//! use serde_json::json;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let row = RawRecord::from_iter([
//!     ("DATE", json!("2025-01-10 08:00")),
//!     ("CLIENT", json!("Acme")),
//!     ("SERVICE", json!("Import")),
//! ]);
//! let service = BoardService::builder()
//!     .row_source(StaticRowSource::new(vec![row.clone(), row]))
//!     .clock(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 10, 13, 0, 0).unwrap()))
//!     .initialize()
//!     .await;
//!
//! let task_id = service.snapshot().tasks[0].id.clone();
//! let board = service
//!     .apply_command(None, &BoardCommand::AssignToDock {
//!         task_id: task_id.clone(),
//!         dock_id: "dock-1".into(),
//!         time: "08:00".into(),
//!     })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(board.tasks.len(), 1);
//! assert_eq!(board.task(&task_id).unwrap().status, TaskStatus::Scheduled);
//! assert_eq!(board.dock_topology.dock("dock-1").unwrap().status, DockStatus::Occupied);
//! # });
//! ```

pub mod board;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod error;
pub mod import;
pub mod partition;
pub mod reconcile;
pub mod report;
pub mod service;
pub mod store;
pub mod types;

/// Log subscriber setup.
#[cfg(feature = "logging")]
pub mod logging;

// Re-exports for ergonomic access
pub use board::{BoardCommand, BoardStore, ReplacePolicy};
pub use broadcast::{BoardUpdate, ConnectionId, UpdateBroadcaster};
pub use config::BoardConfig;
pub use error::{
    BoardError, ConfigError, ImportError, PersistenceError, RecordRejected, ReportError, Result,
    TransitionRejected,
};
pub use import::DuplicatePolicy;
pub use service::{BoardService, ImportSummary};
pub use types::{
    Assignment, BoardSnapshot, DistributionCenter, Dock, DockModule, DockStatus, DockTopology,
    ManualBlock, Task, TaskStatus,
};
