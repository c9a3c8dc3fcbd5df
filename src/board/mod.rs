//! The authoritative in-memory board.
//!
//! [`BoardStore`] owns the current [`BoardSnapshot`] and hands out cheap
//! `Arc` clones to readers. Writers either replace the whole snapshot
//! ([`BoardStore::replace`]) or run a validated transition against it
//! ([`BoardStore::update`]). Both bump the version; neither publishes,
//! so callers can persist before they broadcast.

pub mod command;
pub mod transitions;

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use command::BoardCommand;
pub use transitions::{PoolDestination, WalkIn};

use crate::error::{BoardError, TransitionRejected};
use crate::types::BoardSnapshot;

/// How a whole-snapshot submission is checked against the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ReplacePolicy {
    /// Any submission wins, regardless of the version it was based on.
    #[default]
    LastWriteWins,
    /// A submission must carry the current version.
    RejectStale,
}

/// Holder of the current board snapshot.
///
/// # Examples
///
/// ```
/// use dockboard::board::{BoardStore, ReplacePolicy};
/// use dockboard::BoardSnapshot;
///
/// let store = BoardStore::new(BoardSnapshot::default(), ReplacePolicy::RejectStale);
/// assert_eq!(store.version(), 1);
///
/// let mut next = (*store.get()).clone();
/// next.dock_topology.centers[0].name = "North".to_string();
/// let accepted = store.replace(next.clone()).unwrap();
/// assert_eq!(accepted.version, 2);
///
/// // `next` still says version 1, which is now stale.
/// assert!(store.replace(next).is_err());
/// ```
#[derive(Debug)]
pub struct BoardStore {
    current: RwLock<Arc<BoardSnapshot>>,
    policy: ReplacePolicy,
}

impl BoardStore {
    /// Installs `initial` as version 1.
    pub fn new(mut initial: BoardSnapshot, policy: ReplacePolicy) -> Self {
        initial.version = 1;
        Self {
            current: RwLock::new(Arc::new(initial)),
            policy,
        }
    }

    /// The current snapshot.
    pub fn get(&self) -> Arc<BoardSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// The current version.
    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// The configured replace policy.
    pub fn policy(&self) -> ReplacePolicy {
        self.policy
    }

    /// Replaces the board with a client-submitted snapshot.
    ///
    /// The submission is accepted as-is; its `version` is only compared,
    /// then overwritten with the next version.
    ///
    /// # Errors
    ///
    /// [`BoardError::StaleSnapshot`] under [`ReplacePolicy::RejectStale`]
    /// when `submitted.version` is not the current version.
    pub fn replace(&self, mut submitted: BoardSnapshot) -> Result<Arc<BoardSnapshot>, BoardError> {
        let mut current = self.current.write();
        if self.policy == ReplacePolicy::RejectStale && submitted.version != current.version {
            return Err(BoardError::StaleSnapshot {
                submitted: submitted.version,
                current: current.version,
            });
        }

        submitted.version = current.version + 1;
        let accepted = Arc::new(submitted);
        *current = Arc::clone(&accepted);
        debug!(version = accepted.version, "board snapshot replaced");
        Ok(accepted)
    }

    /// Installs a server-built snapshot, bypassing the replace policy.
    pub fn install(&self, mut snapshot: BoardSnapshot) -> Arc<BoardSnapshot> {
        let mut current = self.current.write();
        snapshot.version = current.version + 1;
        let installed = Arc::new(snapshot);
        *current = Arc::clone(&installed);
        debug!(version = installed.version, "board snapshot installed");
        installed
    }

    /// Runs `change` against a copy of the current board and installs the
    /// copy only if `change` succeeds.
    ///
    /// Readers never observe a half-applied change, and a rejected change
    /// leaves the board and its version untouched.
    pub fn update<F, T>(&self, change: F) -> Result<(Arc<BoardSnapshot>, T), TransitionRejected>
    where
        F: FnOnce(&mut BoardSnapshot) -> Result<T, TransitionRejected>,
    {
        let mut current = self.current.write();
        let mut next = BoardSnapshot::clone(&current);
        let output = change(&mut next)?;

        next.version = current.version + 1;
        let accepted = Arc::new(next);
        *current = Arc::clone(&accepted);
        Ok((accepted, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DockStatus, Task};
    use chrono::{TimeZone, Utc};

    fn store(policy: ReplacePolicy) -> BoardStore {
        let task = Task::new(
            "a".to_string(),
            Utc.with_ymd_and_hms(2025, 1, 10, 11, 0, 0).unwrap(),
            "08:00".to_string(),
            "Acme".to_string(),
            "Import".to_string(),
        );
        BoardStore::new(
            BoardSnapshot::new(vec![task], Default::default()),
            policy,
        )
    }

    #[test]
    fn last_write_wins_accepts_any_version() {
        let store = store(ReplacePolicy::LastWriteWins);
        let mut old = (*store.get()).clone();
        old.version = 0;
        assert_eq!(store.replace(old.clone()).unwrap().version, 2);
        assert_eq!(store.replace(old).unwrap().version, 3);
    }

    #[test]
    fn reject_stale_reports_both_versions() {
        let store = store(ReplacePolicy::RejectStale);
        let base = (*store.get()).clone();
        store.replace(base.clone()).unwrap();

        match store.replace(base) {
            Err(BoardError::StaleSnapshot { submitted, current }) => {
                assert_eq!(submitted, 1);
                assert_eq!(current, 2);
            },
            other => panic!("expected stale snapshot, got {other:?}"),
        }
        assert_eq!(store.version(), 2);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let store = store(ReplacePolicy::LastWriteWins);
        let before = store.get();
        store
            .update(|board| board.assign_to_dock("a", "dock-1", "08:00"))
            .unwrap();
        assert_eq!(before.version, 1);
        assert_eq!(store.get().version, 2);
    }

    #[test]
    fn rejected_update_changes_nothing() {
        let store = store(ReplacePolicy::LastWriteWins);
        let err = store
            .update(|board| board.assign_to_dock("a", "dock-404", "08:00"))
            .unwrap_err();
        assert_eq!(err.kind(), "dock_not_found");
        assert_eq!(store.version(), 1);
        assert_eq!(
            store.get().dock_topology.dock("dock-1").unwrap().status,
            DockStatus::Free
        );
    }

    #[test]
    fn install_ignores_policy() {
        let store = store(ReplacePolicy::RejectStale);
        let mut fresh = BoardSnapshot::default();
        fresh.version = 99;
        assert_eq!(store.install(fresh).version, 2);
    }
}
