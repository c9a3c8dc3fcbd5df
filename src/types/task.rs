//! Task wire types for the dock board.
//!
//! This module defines [`Task`], its lifecycle [`TaskStatus`], and the
//! [`Assignment`] that pins a task to a dock slot.
//!
//! # Serialization
//!
//! All types use `#[serde(rename_all = "camelCase")]` so the JSON matches
//! what board viewers and the history file expect. Timestamps round-trip as
//! RFC 3339 strings. Nullable fields serialize as `null`, not omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TransitionRejected;

/// Task lifecycle status.
///
/// # State Machine
///
/// ```text
/// Waiting   -> Scheduled, NoShow, InYard
/// Scheduled -> InProcess, Waiting, InYard
/// InYard    -> InProcess, Scheduled
/// InProcess -> Finished
/// Finished  -> (terminal)
/// NoShow    -> (terminal, operator override back to Waiting)
/// ```
///
/// # Examples
///
/// ```
/// use dockboard::TaskStatus;
///
/// assert!(TaskStatus::Waiting.can_transition_to(&TaskStatus::Scheduled));
/// assert!(!TaskStatus::Waiting.can_transition_to(&TaskStatus::Finished));
/// assert!(TaskStatus::Finished.is_terminal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Expected but not yet placed on the board.
    Waiting,
    /// Holds a dock slot.
    Scheduled,
    /// Being loaded or unloaded.
    InProcess,
    /// Done (terminal).
    Finished,
    /// Never arrived (terminal unless reopened by an operator).
    NoShow,
    /// On site, waiting in the yard without a dock slot.
    InYard,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Scheduled => write!(f, "Scheduled"),
            Self::InProcess => write!(f, "InProcess"),
            Self::Finished => write!(f, "Finished"),
            Self::NoShow => write!(f, "NoShow"),
            Self::InYard => write!(f, "InYard"),
        }
    }
}

impl TaskStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [TaskStatus; 6] = [
        Self::Waiting,
        Self::Scheduled,
        Self::InProcess,
        Self::Finished,
        Self::NoShow,
        Self::InYard,
    ];

    /// Returns `true` if no regular transition leaves this status.
    ///
    /// `NoShow` counts as terminal: leaving it requires
    /// [`can_override_to`](Self::can_override_to).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::NoShow)
    }

    /// Returns `true` if the status keeps a dock busy when the task is
    /// assigned to one.
    pub fn holds_dock(&self) -> bool {
        matches!(self, Self::Scheduled | Self::InProcess)
    }

    /// Returns `true` if transitioning from this status to `next` is valid.
    ///
    /// Self-transitions are rejected.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self == next {
            return false;
        }

        match self {
            Self::Waiting => matches!(next, Self::Scheduled | Self::NoShow | Self::InYard),
            Self::Scheduled => matches!(next, Self::InProcess | Self::Waiting | Self::InYard),
            Self::InYard => matches!(next, Self::InProcess | Self::Scheduled),
            Self::InProcess => matches!(next, Self::Finished),
            Self::Finished | Self::NoShow => false,
        }
    }

    /// Returns `true` if an explicit operator override may move this status
    /// to `next`. The only override is reopening a no-show.
    pub fn can_override_to(&self, next: &Self) -> bool {
        matches!((self, next), (Self::NoShow, Self::Waiting))
    }

    /// Validates a transition from this status to `next`.
    ///
    /// Returns [`TransitionRejected::InvalidTransition`] carrying operator
    /// guidance when the move is not allowed.
    pub fn validate_transition(
        &self,
        task_id: &str,
        next: &Self,
    ) -> Result<(), TransitionRejected> {
        if self.can_transition_to(next) {
            return Ok(());
        }

        let guidance = match (self, next) {
            (Self::Finished, _) => Some("task is finished and cannot change".to_string()),
            (Self::NoShow, _) => {
                Some("task was marked as no-show; reopen it before acting on it".to_string())
            },
            (_, Self::InProcess) => {
                Some("task must be scheduled on a dock or waiting in the yard to start".to_string())
            },
            (_, Self::Finished) => Some("task must be in process to be finished".to_string()),
            (_, Self::NoShow) => {
                Some("only waiting, unassigned tasks can be marked as no-show".to_string())
            },
            _ if self == next => Some(format!("task is already {self}")),
            _ => None,
        };

        Err(TransitionRejected::InvalidTransition {
            task_id: task_id.to_string(),
            from: *self,
            to: *next,
            guidance,
        })
    }
}

/// A dock slot held by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// The dock the task occupies.
    pub dock_id: String,
    /// Slot start, `HH:MM`.
    pub time: String,
}

/// A single scheduled or walk-in visit.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use dockboard::{Task, TaskStatus};
///
/// let task = Task::new(
///     "abc".to_string(),
///     Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap(),
///     "08:00".to_string(),
///     "Acme".to_string(),
///     "Import".to_string(),
/// );
/// assert_eq!(task.status, TaskStatus::Waiting);
///
/// let json = serde_json::to_value(&task).unwrap();
/// assert_eq!(json["suggestedTime"], "08:00");
/// assert_eq!(json["assignment"], serde_json::Value::Null);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Content-derived identity. Immutable once assigned.
    pub id: String,

    /// Suggested visit instant.
    pub scheduled_at: DateTime<Utc>,

    /// Client name, free text.
    pub client: String,

    /// Category label (import/export, ...).
    pub service_type: String,

    /// Secondary classification, `"N/A"` when the source omits it.
    #[serde(default = "not_applicable")]
    pub sub_type: String,

    /// Palletized cargo flag.
    #[serde(default)]
    pub is_palletized: bool,

    /// `HH:MM` in the reference timezone, derived from `scheduled_at`.
    pub suggested_time: String,

    /// Order number from the source row, if any.
    #[serde(default)]
    pub order_number: Option<String>,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Dock slot, `null` when unassigned or in the yard.
    #[serde(default)]
    pub assignment: Option<Assignment>,

    /// Set when processing starts.
    #[serde(default)]
    pub entered_at: Option<DateTime<Utc>>,

    /// Set when processing finishes.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

pub(crate) fn not_applicable() -> String {
    "N/A".to_string()
}

impl Task {
    /// Creates a `Waiting`, unassigned task with default classification.
    pub fn new(
        id: String,
        scheduled_at: DateTime<Utc>,
        suggested_time: String,
        client: String,
        service_type: String,
    ) -> Self {
        Self {
            id,
            scheduled_at,
            client,
            service_type,
            sub_type: not_applicable(),
            is_palletized: false,
            suggested_time,
            order_number: None,
            status: TaskStatus::Waiting,
            assignment: None,
            entered_at: None,
            finished_at: None,
        }
    }

    /// Returns the dock this task keeps busy, if any.
    ///
    /// A finished task keeps its assignment for display but no longer
    /// occupies the dock.
    pub fn occupied_dock(&self) -> Option<&str> {
        if self.status == TaskStatus::Finished {
            return None;
        }
        self.assignment.as_ref().map(|a| a.dock_id.as_str())
    }

    /// Copies the source-owned fields of `fresh` into this task, keeping
    /// every operator-owned field untouched.
    pub fn refresh_source_fields(&mut self, fresh: &Task) {
        self.client.clone_from(&fresh.client);
        self.service_type.clone_from(&fresh.service_type);
        self.sub_type.clone_from(&fresh.sub_type);
        self.is_palletized = fresh.is_palletized;
        self.scheduled_at = fresh.scheduled_at;
        self.suggested_time.clone_from(&fresh.suggested_time);
        self.order_number.clone_from(&fresh.order_number);
    }
}
