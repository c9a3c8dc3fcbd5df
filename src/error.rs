//! Error types for dock board operations.
//!
//! Each concern has its own enum so callers can decide how loud to be:
//! a [`RecordRejected`] row is skipped quietly, a [`TransitionRejected`]
//! goes back to the operator who asked for it, and [`PersistenceError`] or
//! [`ImportError`] are logged while the board keeps running.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{DockStatus, TaskStatus};

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, BoardError>;

/// Top-level error for the dock board.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Schedule import failed.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// An operator transition was refused.
    #[error(transparent)]
    Transition(#[from] TransitionRejected),

    /// History could not be read or written.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Configuration is unreadable or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Monthly report could not be produced.
    #[error(transparent)]
    Report(#[from] ReportError),

    /// A submitted snapshot was based on an outdated version.
    #[error("stale snapshot: submitted version {submitted}, current version {current}")]
    StaleSnapshot {
        /// Version carried by the submission.
        submitted: u64,
        /// Version currently held by the store.
        current: u64,
    },
}

/// Schedule import failures. Non-fatal: the board keeps whatever history
/// was already persisted.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The schedule file does not exist.
    #[error("schedule file not found: {}", .path.display())]
    Missing {
        /// Expected location.
        path: PathBuf,
    },

    /// The schedule file exists but could not be read.
    #[error("failed to read schedule '{}': {source}", .path.display())]
    Read {
        /// File that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The schedule document is not a list of row objects.
    #[error("failed to parse schedule '{}': {message}", .path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Why a single imported row produced no task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRejected {
    /// No date column, or the value is empty.
    #[error("missing date column")]
    MissingDate,

    /// The date value could not be interpreted.
    #[error("unparseable date '{value}'")]
    UnparseableDate {
        /// The raw value as found in the row.
        value: String,
    },

    /// No client column, or the value is empty.
    #[error("missing client column")]
    MissingClient,
}

/// An illegal state-machine transition or dock operation.
///
/// The board is never mutated when one of these is returned. Use
/// [`kind`](TransitionRejected::kind) for a stable wire identifier and the
/// `Display` output for the operator-facing message.
///
/// # Examples
///
/// ```
/// use dockboard::{DockStatus, TransitionRejected};
///
/// let err = TransitionRejected::DockUnavailable {
///     dock_id: "dock-1".to_string(),
///     label: "Dock 01".to_string(),
///     status: DockStatus::Blocked,
/// };
/// assert_eq!(err.kind(), "dock_unavailable");
/// assert_eq!(err.dock_id(), Some("dock-1"));
/// assert!(err.to_string().contains("Dock 01"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionRejected {
    /// No task with this id is on the board.
    #[error("task not found: {task_id}")]
    TaskNotFound {
        /// The missing task id.
        task_id: String,
    },

    /// No dock with this id exists.
    #[error("dock not found: {dock_id}")]
    DockNotFound {
        /// The missing dock id.
        dock_id: String,
    },

    /// The dock is not free.
    #[error("dock {label} is not available (status: {status})")]
    DockUnavailable {
        /// The dock id.
        dock_id: String,
        /// The dock label, for the operator message.
        label: String,
        /// Its current status.
        status: DockStatus,
    },

    /// The task status does not allow this move.
    #[error("invalid transition from {from} to {to} for task {task_id}{}", guidance_suffix(.guidance))]
    InvalidTransition {
        /// The task being moved.
        task_id: String,
        /// Its current status.
        from: TaskStatus,
        /// The rejected target status.
        to: TaskStatus,
        /// What the operator should do instead.
        guidance: Option<String>,
    },

    /// The task holds no dock slot.
    #[error("task {task_id} is not assigned to a dock")]
    NotAssigned {
        /// The task id.
        task_id: String,
    },

    /// A destructive action was requested without operator confirmation.
    #[error("marking task {task_id} as no-show requires confirmation")]
    ConfirmationRequired {
        /// The task id.
        task_id: String,
    },

    /// Blocking needs a non-empty reason.
    #[error("blocking dock {dock_id} requires a reason")]
    MissingBlockReason {
        /// The dock id.
        dock_id: String,
    },

    /// Unblock was requested on a dock that is not blocked.
    #[error("dock {dock_id} is not blocked")]
    DockNotBlocked {
        /// The dock id.
        dock_id: String,
    },

    /// The slot time is not `HH:MM`.
    #[error("invalid slot time '{time}', expected HH:MM")]
    InvalidSlot {
        /// The rejected value.
        time: String,
    },

    /// A walk-in needs a client name.
    #[error("walk-in requires a client name")]
    MissingClient,
}

impl TransitionRejected {
    /// Stable identifier for the rejection, used on the realtime wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TaskNotFound { .. } => "task_not_found",
            Self::DockNotFound { .. } => "dock_not_found",
            Self::DockUnavailable { .. } => "dock_unavailable",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::NotAssigned { .. } => "not_assigned",
            Self::ConfirmationRequired { .. } => "confirmation_required",
            Self::MissingBlockReason { .. } => "missing_block_reason",
            Self::DockNotBlocked { .. } => "dock_not_blocked",
            Self::InvalidSlot { .. } => "invalid_slot",
            Self::MissingClient => "missing_client",
        }
    }

    /// The dock involved in the rejection, if any.
    pub fn dock_id(&self) -> Option<&str> {
        match self {
            Self::DockNotFound { dock_id }
            | Self::DockUnavailable { dock_id, .. }
            | Self::MissingBlockReason { dock_id }
            | Self::DockNotBlocked { dock_id } => Some(dock_id),
            _ => None,
        }
    }
}

fn guidance_suffix(guidance: &Option<String>) -> String {
    guidance
        .as_deref()
        .map(|g| format!(": {g}"))
        .unwrap_or_default()
}

/// History persistence failures. The in-memory board stays authoritative
/// for the running process.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// History file could not be read.
    #[error("failed to read history '{}': {source}", .path.display())]
    Read {
        /// History location.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// History file could not be written.
    #[error("failed to write history '{}': {source}", .path.display())]
    Write {
        /// History location.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// History document is not a task map.
    #[error("corrupt history '{}': {message}", .path.display())]
    Corrupt {
        /// History location.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// History could not be serialized.
    #[error("failed to serialize history: {0}")]
    Serialize(String),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read config '{path}': {error}")]
    Io {
        /// File path.
        path: String,
        /// IO error message.
        error: String,
    },

    /// TOML could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Values parsed but are unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Monthly report failures.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Report file could not be written.
    #[error("failed to write report '{}': {source}", .path.display())]
    Write {
        /// Report location.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_message_includes_guidance() {
        let err = TransitionRejected::InvalidTransition {
            task_id: "t1".to_string(),
            from: TaskStatus::Waiting,
            to: TaskStatus::Finished,
            guidance: Some("task must be in process to be finished".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "invalid transition from Waiting to Finished for task t1: task must be in process to be finished"
        );

        let bare = TransitionRejected::InvalidTransition {
            task_id: "t1".to_string(),
            from: TaskStatus::Waiting,
            to: TaskStatus::Finished,
            guidance: None,
        };
        assert_eq!(
            bare.to_string(),
            "invalid transition from Waiting to Finished for task t1"
        );
    }

    #[test]
    fn rejection_kinds_are_stable() {
        assert_eq!(
            TransitionRejected::TaskNotFound {
                task_id: "x".to_string()
            }
            .kind(),
            "task_not_found"
        );
        assert_eq!(
            TransitionRejected::DockNotBlocked {
                dock_id: "dock-2".to_string()
            }
            .dock_id(),
            Some("dock-2")
        );
        assert_eq!(TransitionRejected::MissingClient.dock_id(), None);
    }

    #[test]
    fn import_error_mentions_path() {
        let err = ImportError::Missing {
            path: PathBuf::from("schedule.json"),
        };
        assert!(err.to_string().contains("schedule.json"));
    }
}
