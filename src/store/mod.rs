//! Durable task history.
//!
//! The [`HistoryBackend`] trait is the storage contract: load the whole
//! task map, save the whole task map. Backends are dumb; merge rules live
//! in [`TaskHistory`], which keeps the working copy in memory and writes
//! through on every accepted board change.
//!
//! Persistence failures never take the board down. [`TaskHistory::load`]
//! falls back to an empty history and [`TaskHistory::flush`] reports the
//! error for the caller to log. Stored history that failed to load is
//! moved aside before anything is written over it; when that is not
//! possible the history says so through
//! [`TaskHistory::holds_unread_history`].

pub mod file;
pub mod memory;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{error, info, warn};

pub use file::JsonFileBackend;
pub use memory::InMemoryBackend;

use crate::error::PersistenceError;
use crate::reconcile::TaskUniverse;
use crate::types::Task;

/// Storage contract for the task history.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Reads every persisted task, keyed by id.
    ///
    /// A backend with nothing stored yet returns an empty map, not an
    /// error.
    async fn load(&self) -> Result<TaskUniverse, PersistenceError>;

    /// Writes the full task map, replacing what was stored.
    async fn save(&self, tasks: &TaskUniverse) -> Result<(), PersistenceError>;

    /// Moves stored history that failed to load out of the way of the next
    /// [`save`](Self::save), returning where it went.
    ///
    /// `Ok(None)` means the backend keeps nothing worth preserving.
    async fn set_aside(&self) -> Result<Option<String>, PersistenceError> {
        Ok(None)
    }

    /// Human-readable location for log lines.
    fn describe(&self) -> String;
}

/// Write-through task history over a [`HistoryBackend`].
///
/// Tasks merge by id: recording a task overwrites its previous entry and
/// never removes anything else.
pub struct TaskHistory {
    backend: Box<dyn HistoryBackend>,
    tasks: Mutex<TaskUniverse>,
    unread: bool,
}

impl std::fmt::Debug for TaskHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHistory")
            .field("backend", &self.backend.describe())
            .field("tasks", &self.tasks.lock().len())
            .field("unread", &self.unread)
            .finish()
    }
}

impl TaskHistory {
    /// Loads the history from `backend`.
    ///
    /// A read or parse failure is logged and treated as an empty history.
    /// The unreadable data is then set aside through the backend so later
    /// writes do not destroy it.
    pub async fn load(backend: Box<dyn HistoryBackend>) -> Self {
        let (tasks, unread) = match backend.load().await {
            Ok(tasks) => {
                info!(
                    location = %backend.describe(),
                    tasks = tasks.len(),
                    "task history loaded"
                );
                (tasks, false)
            },
            Err(e) => {
                warn!(error = %e, "task history unavailable, starting empty");
                let unread = match backend.set_aside().await {
                    Ok(Some(moved_to)) => {
                        warn!(%moved_to, "unreadable task history moved aside");
                        false
                    },
                    Ok(None) => true,
                    Err(e) => {
                        error!(error = %e, "could not move unreadable task history aside");
                        true
                    },
                };
                (TaskUniverse::new(), unread)
            },
        };

        Self {
            backend,
            tasks: Mutex::new(tasks),
            unread,
        }
    }

    /// `true` when the stored history failed to load and could not be moved
    /// aside, so a flush would replace it.
    pub fn holds_unread_history(&self) -> bool {
        self.unread
    }

    /// A copy of every recorded task.
    pub fn tasks(&self) -> TaskUniverse {
        self.tasks.lock().clone()
    }

    /// Number of recorded tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns `true` when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Merges `tasks` into the working copy by id.
    pub fn record<'a, I>(&self, tasks: I)
    where
        I: IntoIterator<Item = &'a Task>,
    {
        let mut history = self.tasks.lock();
        for task in tasks {
            history.insert(task.id.clone(), task.clone());
        }
    }

    /// Writes the working copy to the backend.
    pub async fn flush(&self) -> Result<(), PersistenceError> {
        let tasks = self.tasks();
        self.backend.save(&tasks).await
    }

    /// [`record`](Self::record) followed by [`flush`](Self::flush).
    pub async fn record_and_flush<'a, I>(&self, tasks: I) -> Result<(), PersistenceError>
    where
        I: IntoIterator<Item = &'a Task>,
    {
        self.record(tasks);
        self.flush().await
    }
}
