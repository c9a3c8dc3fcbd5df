//! Operator transitions on a [`BoardSnapshot`].
//!
//! Every operation validates its preconditions before touching anything:
//! on rejection the snapshot is left exactly as it was. On success the
//! dock occupancy invariant still holds, so callers can broadcast the
//! result without re-checking it.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionRejected;
use crate::types::task::not_applicable;
use crate::types::{Assignment, BoardSnapshot, DockStatus, ManualBlock, Task, TaskStatus};

/// Where an unassigned task goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PoolDestination {
    /// Back to the waiting pool.
    #[default]
    Unassigned,
    /// To the yard: on site, no dock.
    Yard,
}

impl PoolDestination {
    fn status(self) -> TaskStatus {
        match self {
            Self::Unassigned => TaskStatus::Waiting,
            Self::Yard => TaskStatus::InYard,
        }
    }
}

/// An unscheduled arrival registered at the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkIn {
    /// Client name, required.
    pub client: String,
    /// Category label.
    #[serde(default = "not_applicable")]
    pub service_type: String,
    /// Secondary classification.
    #[serde(default = "not_applicable")]
    pub sub_type: String,
    /// Palletized cargo flag.
    #[serde(default)]
    pub is_palletized: bool,
}

impl WalkIn {
    /// A walk-in for `client` with default classification.
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            service_type: not_applicable(),
            sub_type: not_applicable(),
            is_palletized: false,
        }
    }
}

fn validate_slot(time: &str) -> Result<(), TransitionRejected> {
    match NaiveTime::parse_from_str(time, "%H:%M") {
        Ok(_) if time.len() == 5 => Ok(()),
        _ => Err(TransitionRejected::InvalidSlot {
            time: time.to_string(),
        }),
    }
}

fn task_not_found(task_id: &str) -> TransitionRejected {
    TransitionRejected::TaskNotFound {
        task_id: task_id.to_string(),
    }
}

fn dock_not_found(dock_id: &str) -> TransitionRejected {
    TransitionRejected::DockNotFound {
        dock_id: dock_id.to_string(),
    }
}

impl BoardSnapshot {
    /// Places a task on a dock slot, or moves it to another dock.
    ///
    /// Accepts `Waiting`, `InYard` and `Scheduled` tasks. Re-slotting a
    /// scheduled task on the dock it already holds only changes the time.
    ///
    /// # Errors
    ///
    /// - [`TransitionRejected::InvalidSlot`] if `time` is not `HH:MM`.
    /// - [`TransitionRejected::DockUnavailable`] if the dock is occupied
    ///   or blocked.
    /// - [`TransitionRejected::InvalidTransition`] for tasks in process,
    ///   finished or no-show.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use dockboard::{BoardSnapshot, DockStatus, DockTopology, Task, TaskStatus};
    ///
    /// let task = Task::new(
    ///     "t1".into(),
    ///     Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap(),
    ///     "08:00".into(),
    ///     "Acme".into(),
    ///     "Import".into(),
    /// );
    /// let mut board = BoardSnapshot::new(vec![task], DockTopology::default());
    ///
    /// board.assign_to_dock("t1", "dock-1", "08:00").unwrap();
    /// assert_eq!(board.task("t1").unwrap().status, TaskStatus::Scheduled);
    /// assert_eq!(board.dock_topology.dock("dock-1").unwrap().status, DockStatus::Occupied);
    /// ```
    pub fn assign_to_dock(
        &mut self,
        task_id: &str,
        dock_id: &str,
        time: &str,
    ) -> Result<(), TransitionRejected> {
        validate_slot(time)?;

        let task = self.task(task_id).ok_or_else(|| task_not_found(task_id))?;
        let dock = self
            .dock_topology
            .dock(dock_id)
            .ok_or_else(|| dock_not_found(dock_id))?;

        let held = task
            .assignment
            .as_ref()
            .filter(|_| task.status == TaskStatus::Scheduled)
            .map(|a| a.dock_id.clone());

        if held.as_deref() == Some(dock_id) {
            if let Some(assignment) = self.task_mut(task_id).and_then(|t| t.assignment.as_mut()) {
                assignment.time = time.to_string();
            }
            return Ok(());
        }

        if task.status != TaskStatus::Scheduled {
            task.status.validate_transition(task_id, &TaskStatus::Scheduled)?;
        }
        if dock.status != DockStatus::Free {
            return Err(TransitionRejected::DockUnavailable {
                dock_id: dock.id.clone(),
                label: dock.label.clone(),
                status: dock.status,
            });
        }

        if let Some(previous) = held {
            self.release_dock(&previous, task_id);
        }
        if let Some(task) = self.task_mut(task_id) {
            task.status = TaskStatus::Scheduled;
            task.assignment = Some(Assignment {
                dock_id: dock_id.to_string(),
                time: time.to_string(),
            });
        }
        if let Some(dock) = self.dock_topology.dock_mut(dock_id) {
            dock.occupy(task_id);
        }
        Ok(())
    }

    /// Takes a scheduled task off its dock, back to the pool or the yard.
    ///
    /// # Errors
    ///
    /// [`TransitionRejected::NotAssigned`] if the task holds no slot,
    /// [`TransitionRejected::InvalidTransition`] if it is already in process.
    pub fn unassign(
        &mut self,
        task_id: &str,
        destination: PoolDestination,
    ) -> Result<(), TransitionRejected> {
        let task = self.task(task_id).ok_or_else(|| task_not_found(task_id))?;
        let Some(assignment) = task.assignment.clone() else {
            return Err(TransitionRejected::NotAssigned {
                task_id: task_id.to_string(),
            });
        };
        let target = destination.status();
        task.status.validate_transition(task_id, &target)?;

        self.release_dock(&assignment.dock_id, task_id);
        if let Some(task) = self.task_mut(task_id) {
            task.status = target;
            task.assignment = None;
        }
        Ok(())
    }

    /// Records the arrival of a waiting task that has no dock yet.
    pub fn check_in_to_yard(&mut self, task_id: &str) -> Result<(), TransitionRejected> {
        let task = self.task(task_id).ok_or_else(|| task_not_found(task_id))?;
        task.status.validate_transition(task_id, &TaskStatus::InYard)?;
        if task.assignment.is_some() {
            return Err(TransitionRejected::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status,
                to: TaskStatus::InYard,
                guidance: Some("unassign the task to the yard instead".to_string()),
            });
        }

        if let Some(task) = self.task_mut(task_id) {
            task.status = TaskStatus::InYard;
        }
        Ok(())
    }

    /// Marks a waiting, unassigned task as a no-show.
    ///
    /// Destructive from the operator's point of view, so `confirmed` must
    /// be set once the operator has acknowledged it.
    pub fn mark_no_show(
        &mut self,
        task_id: &str,
        confirmed: bool,
    ) -> Result<(), TransitionRejected> {
        let task = self.task(task_id).ok_or_else(|| task_not_found(task_id))?;
        task.status.validate_transition(task_id, &TaskStatus::NoShow)?;
        if task.assignment.is_some() {
            return Err(TransitionRejected::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status,
                to: TaskStatus::NoShow,
                guidance: Some("unassign the task before marking it as no-show".to_string()),
            });
        }
        if !confirmed {
            return Err(TransitionRejected::ConfirmationRequired {
                task_id: task_id.to_string(),
            });
        }

        if let Some(task) = self.task_mut(task_id) {
            task.status = TaskStatus::NoShow;
        }
        Ok(())
    }

    /// Operator override: puts a no-show task back in the waiting pool.
    pub fn reopen_no_show(&mut self, task_id: &str) -> Result<(), TransitionRejected> {
        let task = self.task(task_id).ok_or_else(|| task_not_found(task_id))?;
        if !task.status.can_override_to(&TaskStatus::Waiting) {
            return Err(TransitionRejected::InvalidTransition {
                task_id: task_id.to_string(),
                from: task.status,
                to: TaskStatus::Waiting,
                guidance: Some("only no-show tasks can be reopened".to_string()),
            });
        }

        if let Some(task) = self.task_mut(task_id) {
            task.status = TaskStatus::Waiting;
            task.assignment = None;
        }
        Ok(())
    }

    /// Starts loading or unloading. Stamps `entered_at` with `now`.
    pub fn start_process(
        &mut self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionRejected> {
        let task = self.task(task_id).ok_or_else(|| task_not_found(task_id))?;
        task.status.validate_transition(task_id, &TaskStatus::InProcess)?;

        if let Some(task) = self.task_mut(task_id) {
            task.status = TaskStatus::InProcess;
            task.entered_at = Some(now);
        }
        Ok(())
    }

    /// Finishes an in-process task. Stamps `finished_at` with `now` and
    /// frees its dock; the assignment stays for display.
    pub fn finish_process(
        &mut self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionRejected> {
        let task = self.task(task_id).ok_or_else(|| task_not_found(task_id))?;
        task.status.validate_transition(task_id, &TaskStatus::Finished)?;
        let dock_id = task.assignment.as_ref().map(|a| a.dock_id.clone());

        if let Some(dock_id) = dock_id {
            self.release_dock(&dock_id, task_id);
        }
        if let Some(task) = self.task_mut(task_id) {
            task.status = TaskStatus::Finished;
            task.finished_at = Some(now);
        }
        Ok(())
    }

    /// Takes a free dock out of service.
    pub fn block_dock(&mut self, dock_id: &str, reason: &str) -> Result<(), TransitionRejected> {
        let dock = self
            .dock_topology
            .dock(dock_id)
            .ok_or_else(|| dock_not_found(dock_id))?;
        if dock.status != DockStatus::Free {
            return Err(TransitionRejected::DockUnavailable {
                dock_id: dock.id.clone(),
                label: dock.label.clone(),
                status: dock.status,
            });
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(TransitionRejected::MissingBlockReason {
                dock_id: dock_id.to_string(),
            });
        }

        if let Some(dock) = self.dock_topology.dock_mut(dock_id) {
            dock.status = DockStatus::Blocked;
            dock.current_task_id = None;
            dock.manual_block = ManualBlock {
                active: true,
                reason: reason.to_string(),
            };
        }
        Ok(())
    }

    /// Returns a blocked dock to service.
    pub fn unblock_dock(&mut self, dock_id: &str) -> Result<(), TransitionRejected> {
        let dock = self
            .dock_topology
            .dock_mut(dock_id)
            .ok_or_else(|| dock_not_found(dock_id))?;
        if dock.status != DockStatus::Blocked && !dock.manual_block.active {
            return Err(TransitionRejected::DockNotBlocked {
                dock_id: dock_id.to_string(),
            });
        }

        dock.manual_block = ManualBlock::default();
        dock.release();
        Ok(())
    }

    /// Adds an unscheduled arrival straight into the yard and returns its
    /// generated id.
    ///
    /// The suggested time is `now` in the reference timezone.
    pub fn register_walk_in(
        &mut self,
        walk_in: WalkIn,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> Result<String, TransitionRejected> {
        let client = walk_in.client.trim();
        if client.is_empty() {
            return Err(TransitionRejected::MissingClient);
        }

        let id = format!("walkin-{}", Uuid::new_v4());
        let mut task = Task::new(
            id.clone(),
            now,
            now.with_timezone(&tz).format("%H:%M").to_string(),
            client.to_string(),
            walk_in.service_type,
        );
        task.sub_type = walk_in.sub_type;
        task.is_palletized = walk_in.is_palletized;
        task.status = TaskStatus::InYard;

        self.tasks.push(task);
        Ok(id)
    }

    fn release_dock(&mut self, dock_id: &str, task_id: &str) {
        if let Some(dock) = self.dock_topology.dock_mut(dock_id) {
            let held_by_other = dock
                .current_task_id
                .as_deref()
                .is_some_and(|holder| holder != task_id);
            if !dock.manual_block.active && !held_by_other {
                dock.release();
            }
        }
    }
}
