//! Presence fan-out.
//!
//! Every join and final disconnect publishes one [`PresenceEvent`] on the
//! [`PresenceBus`]. Each connection reads it through its own
//! [`PresenceFeed`], which drops the connection's own changes and turns
//! the rest into `user:online` / `user:offline` frames.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::{ConnectionId, PresenceEvent, ServerEvent};

/// Broadcast bus for [`PresenceEvent`]s.
///
/// When a feed falls more than `capacity` events behind, the oldest
/// events are dropped for it and the gap is logged.
#[derive(Debug, Clone)]
pub struct PresenceBus {
    sender: broadcast::Sender<PresenceEvent>,
}

impl PresenceBus {
    /// Creates a bus buffering `capacity` events per feed (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes a change. Returns how many feeds were listening.
    pub fn publish(&self, event: PresenceEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Opens the feed for `connection_id`.
    #[must_use]
    pub fn subscribe(&self, connection_id: ConnectionId) -> PresenceFeed {
        PresenceFeed {
            connection_id,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of open feeds.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// One connection's view of the presence bus.
#[derive(Debug)]
pub struct PresenceFeed {
    connection_id: ConnectionId,
    receiver: broadcast::Receiver<PresenceEvent>,
}

impl PresenceFeed {
    /// Waits for the next change made by another connection and returns
    /// its frame. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.is_visible_to(self.connection_id) => {
                    return Some(event.to_server_event());
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => self.log_lag(skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already-buffered change made by another
    /// connection, without waiting.
    pub fn try_next(&mut self) -> Option<PresenceEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if event.is_visible_to(self.connection_id) => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => self.log_lag(skipped),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    fn log_lag(&self, skipped: u64) {
        tracing::warn!(
            connection_id = %self.connection_id,
            skipped,
            "presence feed lagged, some online/offline updates were dropped"
        );
    }
}
