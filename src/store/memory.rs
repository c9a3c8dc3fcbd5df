//! In-memory history backend.
//!
//! Nothing survives the process. Useful for tests and for running a board
//! without a writable disk. Clones share storage, so a test can keep a
//! handle and inspect what the board saved.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::HistoryBackend;
use crate::error::PersistenceError;
use crate::reconcile::TaskUniverse;

#[derive(Debug, Default)]
struct Shared {
    tasks: Mutex<TaskUniverse>,
    saves: AtomicUsize,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
}

/// Thread-safe in-memory [`HistoryBackend`].
///
/// # Examples
///
/// ```
/// use dockboard::store::InMemoryBackend;
///
/// let backend = InMemoryBackend::new();
/// assert!(backend.stored().is_empty());
/// assert_eq!(backend.save_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    shared: Arc<Shared>,
}

impl InMemoryBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend pre-filled with `tasks`.
    pub fn with_tasks(tasks: TaskUniverse) -> Self {
        let backend = Self::new();
        *backend.shared.tasks.lock() = tasks;
        backend
    }

    /// What the last successful save wrote.
    pub fn stored(&self) -> TaskUniverse {
        self.shared.tasks.lock().clone()
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.shared.saves.load(Ordering::SeqCst)
    }

    /// Makes subsequent loads fail.
    pub fn fail_loads(&self, fail: bool) {
        self.shared.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent saves fail.
    pub fn fail_saves(&self, fail: bool) {
        self.shared.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl HistoryBackend for InMemoryBackend {
    async fn load(&self) -> Result<TaskUniverse, PersistenceError> {
        if self.shared.fail_loads.load(Ordering::SeqCst) {
            return Err(PersistenceError::Serialize(
                "in-memory backend configured to fail loads".to_string(),
            ));
        }
        Ok(self.stored())
    }

    async fn save(&self, tasks: &TaskUniverse) -> Result<(), PersistenceError> {
        if self.shared.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Serialize(
                "in-memory backend configured to fail saves".to_string(),
            ));
        }
        *self.shared.tasks.lock() = tasks.clone();
        self.shared.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
