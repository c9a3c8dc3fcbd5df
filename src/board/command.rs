//! Server-validated operator commands.
//!
//! A [`BoardCommand`] names one transition. Unlike a whole-snapshot
//! submission, the server applies it to its own current board, so two
//! operators racing for the same dock cannot both win.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use super::transitions::{PoolDestination, WalkIn};
use crate::error::TransitionRejected;
use crate::types::BoardSnapshot;

/// A single operator action.
///
/// On the wire the action name travels in an `action` field:
///
/// ```json
/// { "action": "assignToDock", "taskId": "3f2a...", "dockId": "dock-2", "time": "08:30" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BoardCommand {
    /// Place or move a task on a dock slot.
    AssignToDock {
        /// Task to place.
        task_id: String,
        /// Target dock.
        dock_id: String,
        /// Slot start, `HH:MM`.
        time: String,
    },
    /// Take a scheduled task off its dock.
    Unassign {
        /// Task to take off.
        task_id: String,
        /// Pool it goes back to.
        #[serde(default)]
        destination: PoolDestination,
    },
    /// Record the arrival of a waiting task.
    CheckInToYard {
        /// Arriving task.
        task_id: String,
    },
    /// Mark a waiting task as a no-show.
    MarkNoShow {
        /// Absent task.
        task_id: String,
        /// Operator confirmation.
        #[serde(default)]
        confirmed: bool,
    },
    /// Put a no-show task back in the waiting pool.
    ReopenNoShow {
        /// Task to reopen.
        task_id: String,
    },
    /// Start loading or unloading.
    StartProcess {
        /// Task starting.
        task_id: String,
    },
    /// Finish loading or unloading.
    FinishProcess {
        /// Task finishing.
        task_id: String,
    },
    /// Take a free dock out of service.
    BlockDock {
        /// Dock to block.
        dock_id: String,
        /// Reason shown on the board.
        reason: String,
    },
    /// Return a blocked dock to service.
    UnblockDock {
        /// Dock to unblock.
        dock_id: String,
    },
    /// Register an unscheduled arrival.
    RegisterWalkIn(WalkIn),
}

impl BoardCommand {
    /// Applies the command to `board`.
    ///
    /// `now` stamps process timestamps and walk-in times; `tz` renders the
    /// walk-in suggested time.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionRejected`] from the underlying transition;
    /// `board` is unchanged in that case.
    pub fn apply(
        &self,
        board: &mut BoardSnapshot,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<(), TransitionRejected> {
        match self {
            Self::AssignToDock {
                task_id,
                dock_id,
                time,
            } => board.assign_to_dock(task_id, dock_id, time),
            Self::Unassign {
                task_id,
                destination,
            } => board.unassign(task_id, *destination),
            Self::CheckInToYard { task_id } => board.check_in_to_yard(task_id),
            Self::MarkNoShow { task_id, confirmed } => board.mark_no_show(task_id, *confirmed),
            Self::ReopenNoShow { task_id } => board.reopen_no_show(task_id),
            Self::StartProcess { task_id } => board.start_process(task_id, now),
            Self::FinishProcess { task_id } => board.finish_process(task_id, now),
            Self::BlockDock { dock_id, reason } => board.block_dock(dock_id, reason),
            Self::UnblockDock { dock_id } => board.unblock_dock(dock_id),
            Self::RegisterWalkIn(walk_in) => board
                .register_walk_in(walk_in.clone(), now, tz)
                .map(|_| ()),
        }
    }

    /// Short name for log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AssignToDock { .. } => "assignToDock",
            Self::Unassign { .. } => "unassign",
            Self::CheckInToYard { .. } => "checkInToYard",
            Self::MarkNoShow { .. } => "markNoShow",
            Self::ReopenNoShow { .. } => "reopenNoShow",
            Self::StartProcess { .. } => "startProcess",
            Self::FinishProcess { .. } => "finishProcess",
            Self::BlockDock { .. } => "blockDock",
            Self::UnblockDock { .. } => "unblockDock",
            Self::RegisterWalkIn(_) => "registerWalkIn",
        }
    }
}
