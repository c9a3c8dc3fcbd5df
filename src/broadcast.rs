//! Fan-out of accepted board snapshots to every connected client.
//!
//! Each accepted update is published once on a tokio broadcast channel;
//! every connection task holds its own receiver and forwards updates to
//! its client. An update carries the [`ConnectionId`] of the client that
//! caused it so that client's forwarder can skip it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

use crate::types::BoardSnapshot;

/// Default number of updates a slow receiver may lag behind.
pub const DEFAULT_CAPACITY: usize = 64;

/// Identifies one realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One accepted board state, as seen by subscribers.
#[derive(Debug, Clone)]
pub struct BoardUpdate {
    /// Connection whose submission produced this state. `None` for
    /// server-originated changes, which go to everyone.
    pub origin: Option<ConnectionId>,
    /// The accepted snapshot.
    pub snapshot: Arc<BoardSnapshot>,
}

impl BoardUpdate {
    /// Returns `true` if `connection` should receive this update.
    pub fn is_for(&self, connection: ConnectionId) -> bool {
        self.origin != Some(connection)
    }
}

/// Publishes [`BoardUpdate`]s to any number of subscribers.
///
/// Cloning is cheap; clones share the same channel.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use dockboard::broadcast::{BoardUpdate, ConnectionId, UpdateBroadcaster};
/// use dockboard::BoardSnapshot;
///
/// # tokio_test_block_on(async {
/// let broadcaster = UpdateBroadcaster::new(8);
/// let mut rx = broadcaster.subscribe();
///
/// let sender = ConnectionId::new();
/// broadcaster.publish(BoardUpdate {
///     origin: Some(sender),
///     snapshot: Arc::new(BoardSnapshot::default()),
/// });
///
/// let update = rx.recv().await.unwrap();
/// assert!(!update.is_for(sender));
/// assert!(update.is_for(ConnectionId::new()));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UpdateBroadcaster {
    sender: broadcast::Sender<BoardUpdate>,
}

impl UpdateBroadcaster {
    /// Creates a broadcaster buffering up to `capacity` updates per
    /// receiver. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Registers a new receiver. It sees updates published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardUpdate> {
        self.sender.subscribe()
    }

    /// Publishes `update` and returns how many receivers were listening.
    ///
    /// Having no receivers is not an error.
    pub fn publish(&self, update: BoardUpdate) -> usize {
        let version = update.snapshot.version;
        let delivered = self.sender.send(update).unwrap_or(0);
        trace!(version, receivers = delivered, "board update published");
        delivered
    }

    /// Number of live receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for UpdateBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(origin: Option<ConnectionId>, version: u64) -> BoardUpdate {
        let mut snapshot = BoardSnapshot::default();
        snapshot.version = version;
        BoardUpdate {
            origin,
            snapshot: Arc::new(snapshot),
        }
    }

    #[test]
    fn publish_without_receivers_is_fine() {
        let broadcaster = UpdateBroadcaster::default();
        assert_eq!(broadcaster.publish(update(None, 1)), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_updates_in_order() {
        let broadcaster = UpdateBroadcaster::new(4);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        assert_eq!(broadcaster.publish(update(None, 1)), 2);
        broadcaster.publish(update(None, 2));

        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().snapshot.version, 1);
            assert_eq!(rx.recv().await.unwrap().snapshot.version, 2);
        }
    }

    #[test]
    fn origin_is_excluded() {
        let me = ConnectionId::new();
        let other = ConnectionId::new();
        let mine = update(Some(me), 3);
        assert!(!mine.is_for(me));
        assert!(mine.is_for(other));
        assert!(update(None, 3).is_for(me));
    }

    #[test]
    fn dropped_receivers_are_not_counted() {
        let broadcaster = UpdateBroadcaster::new(1);
        let rx = broadcaster.subscribe();
        assert_eq!(broadcaster.receiver_count(), 1);
        drop(rx);
        assert_eq!(broadcaster.receiver_count(), 0);
    }
}
