//! Shared connection state: registry, outboxes, and presence fan-out.
//!
//! [`ChatHub`] owns the [`ConnectionRegistry`] together with the outbound
//! channel of every live connection, behind a single
//! [`tokio::sync::RwLock`].
//!
//! # Critical sections
//!
//! - `open`, `join`, and `close` take the write lock, mutate the registry
//!   and outbox table, and publish the resulting presence event before
//!   releasing it. Presence events are therefore published in the same
//!   order as the registry mutations that caused them.
//! - Routing (`send_to`, `route_to_user`) takes the read lock and pushes
//!   into unbounded channels, which never block.
//! - No `.await` happens while either guard is held.

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};

use super::{
    ConnectionId, ConnectionRegistry, PresenceBus, PresenceEvent, PresenceFeed, PresenceStatus,
    ServerEvent, UserId,
};
use crate::error::ChatError;

/// Sending half of a connection's outbound event queue.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// Everything a freshly opened connection needs to receive events.
#[derive(Debug)]
pub struct Session {
    /// Server-assigned connection identifier.
    pub connection_id: ConnectionId,
    /// Events addressed to this connection only.
    pub outbox: mpsc::UnboundedReceiver<ServerEvent>,
    /// Presence changes made by other connections.
    pub presence: PresenceFeed,
}

/// Result of a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// User previously joined on this connection, if it was a different one.
    pub displaced: Option<UserId>,
    /// Whether the displaced user lost their last connection.
    pub displaced_went_offline: bool,
}

/// Result of closing a connection that had joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseOutcome {
    /// User the connection was mapped to.
    pub user_id: UserId,
    /// Whether that was the user's last connection.
    pub went_offline: bool,
}

#[derive(Debug, Default)]
struct HubState {
    registry: ConnectionRegistry,
    outboxes: HashMap<ConnectionId, Outbox>,
}

/// Process-wide connection hub.
#[derive(Debug)]
pub struct ChatHub {
    state: RwLock<HubState>,
    presence: PresenceBus,
}

impl ChatHub {
    /// Creates an empty hub whose presence bus buffers `presence_capacity`
    /// events per subscriber.
    #[must_use]
    pub fn new(presence_capacity: usize) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            presence: PresenceBus::new(presence_capacity),
        }
    }

    /// Returns the presence bus.
    #[must_use]
    pub fn presence_bus(&self) -> &PresenceBus {
        &self.presence
    }

    /// Opens a new anonymous connection and returns its receiving ends.
    pub async fn open(&self) -> Session {
        let connection_id = ConnectionId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let presence = self.presence.subscribe(connection_id);

        let mut state = self.state.write().await;
        state.outboxes.insert(connection_id, tx);
        drop(state);

        Session {
            connection_id,
            outbox: rx,
            presence,
        }
    }

    /// Attaches `user_id` to an open connection and announces it online.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ConnectionClosed`] if the connection was never
    /// opened or has already been closed.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> Result<JoinOutcome, ChatError> {
        let mut state = self.state.write().await;
        if !state.outboxes.contains_key(&connection_id) {
            return Err(ChatError::ConnectionClosed(*connection_id.as_uuid()));
        }

        let displaced = state.registry.register(connection_id, user_id);
        let displaced_went_offline = displaced.is_some_and(|prev| !state.registry.is_online(prev));

        if let (Some(prev), true) = (displaced, displaced_went_offline) {
            self.presence.publish(PresenceEvent::new(
                connection_id,
                prev,
                PresenceStatus::Offline,
            ));
        }
        self.presence.publish(PresenceEvent::new(
            connection_id,
            user_id,
            PresenceStatus::Online,
        ));
        drop(state);

        Ok(JoinOutcome {
            displaced,
            displaced_went_offline,
        })
    }

    /// Closes a connection: drops its outbox and mapping, and announces the
    /// user offline if this was their last connection.
    ///
    /// Returns `None` for connections that never joined or were already
    /// closed; calling this twice is harmless.
    pub async fn close(&self, connection_id: ConnectionId) -> Option<CloseOutcome> {
        let mut state = self.state.write().await;
        state.outboxes.remove(&connection_id);
        let user_id = state.registry.unregister(connection_id)?;

        let went_offline = !state.registry.is_online(user_id);
        if went_offline {
            self.presence.publish(PresenceEvent::new(
                connection_id,
                user_id,
                PresenceStatus::Offline,
            ));
        }
        drop(state);

        Some(CloseOutcome {
            user_id,
            went_offline,
        })
    }

    /// Queues `event` for one connection. Returns `false` if the connection
    /// is gone.
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        let state = self.state.read().await;
        state
            .outboxes
            .get(&connection_id)
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Queues `event` on the user's most recent live connection other than
    /// `exclude`.
    ///
    /// Returns the connection the event was queued on, or `None` if the
    /// user is offline (or only reachable through `exclude`).
    pub async fn route_to_user(
        &self,
        user_id: UserId,
        exclude: Option<ConnectionId>,
        event: ServerEvent,
    ) -> Option<ConnectionId> {
        let state = self.state.read().await;
        let target = state
            .registry
            .find_connection_for_user_except(user_id, exclude)?;
        let tx = state.outboxes.get(&target)?;
        tx.send(event).ok().map(|()| target)
    }

    /// Returns the connection messages for `user_id` would be delivered to.
    pub async fn find_connection_for_user(&self, user_id: UserId) -> Option<ConnectionId> {
        self.state
            .read()
            .await
            .registry
            .find_connection_for_user(user_id)
    }

    /// Returns the user a connection joined as.
    pub async fn user_for(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.state.read().await.registry.user_for(connection_id)
    }

    /// Returns every online user.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.state.read().await.registry.online_users()
    }

    /// Number of open connections, joined or not.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.outboxes.len()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    fn next_presence(session: &mut Session) -> Option<PresenceEvent> {
        session.presence.try_next()
    }

    #[tokio::test]
    async fn join_announces_to_others_only() {
        let hub = ChatHub::new(64);
        let mut a = hub.open().await;
        let mut b = hub.open().await;
        let user = UserId::new();

        let Ok(outcome) = hub.join(a.connection_id, user).await else {
            panic!("join failed");
        };
        assert_eq!(outcome.displaced, None);

        assert_eq!(next_presence(&mut a), None);
        let Some(event) = next_presence(&mut b) else {
            panic!("expected online event");
        };
        assert_eq!(event.to_server_event(), ServerEvent::UserOnline(user));
    }

    #[tokio::test]
    async fn close_after_join_clears_lookup() {
        let hub = ChatHub::new(64);
        let a = hub.open().await;
        let mut b = hub.open().await;
        let user = UserId::new();
        let _ = hub.join(a.connection_id, user).await;
        let _ = next_presence(&mut b);

        let Some(outcome) = hub.close(a.connection_id).await else {
            panic!("expected close outcome");
        };
        assert_eq!(outcome.user_id, user);
        assert!(outcome.went_offline);
        assert_eq!(hub.find_connection_for_user(user).await, None);

        let Some(event) = next_presence(&mut b) else {
            panic!("expected offline event");
        };
        assert_eq!(event.to_server_event(), ServerEvent::UserOffline(user));
    }

    #[tokio::test]
    async fn stray_close_is_silent() {
        let hub = ChatHub::new(64);
        let anonymous = hub.open().await;
        let mut watcher = hub.open().await;

        assert_eq!(hub.close(anonymous.connection_id).await, None);
        assert_eq!(hub.close(anonymous.connection_id).await, None);
        assert_eq!(hub.close(ConnectionId::new()).await, None);
        assert_eq!(next_presence(&mut watcher), None);
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn join_on_closed_connection_is_rejected() {
        let hub = ChatHub::new(64);
        let session = hub.open().await;
        hub.close(session.connection_id).await;

        let result = hub.join(session.connection_id, UserId::new()).await;
        assert!(matches!(result, Err(ChatError::ConnectionClosed(_))));
        assert!(hub.online_users().await.is_empty());
    }

    #[tokio::test]
    async fn rejoin_announces_displaced_user_offline() {
        let hub = ChatHub::new(64);
        let a = hub.open().await;
        let mut watcher = hub.open().await;
        let alice = UserId::new();
        let bob = UserId::new();

        let _ = hub.join(a.connection_id, alice).await;
        let _ = next_presence(&mut watcher);

        let Ok(outcome) = hub.join(a.connection_id, bob).await else {
            panic!("rejoin failed");
        };
        assert_eq!(outcome.displaced, Some(alice));
        assert!(outcome.displaced_went_offline);
        assert_eq!(hub.user_for(a.connection_id).await, Some(bob));

        let first = next_presence(&mut watcher).map(|e| e.to_server_event());
        let second = next_presence(&mut watcher).map(|e| e.to_server_event());
        assert_eq!(first, Some(ServerEvent::UserOffline(alice)));
        assert_eq!(second, Some(ServerEvent::UserOnline(bob)));
    }

    #[tokio::test]
    async fn second_device_keeps_user_online() {
        let hub = ChatHub::new(64);
        let laptop = hub.open().await;
        let phone = hub.open().await;
        let mut watcher = hub.open().await;
        let user = UserId::new();

        let _ = hub.join(laptop.connection_id, user).await;
        let _ = hub.join(phone.connection_id, user).await;
        while next_presence(&mut watcher).is_some() {}

        let Some(outcome) = hub.close(phone.connection_id).await else {
            panic!("expected close outcome");
        };
        assert!(!outcome.went_offline);
        assert_eq!(next_presence(&mut watcher), None);
        assert_eq!(
            hub.find_connection_for_user(user).await,
            Some(laptop.connection_id)
        );
    }

    #[tokio::test]
    async fn route_to_user_respects_exclude() {
        let hub = ChatHub::new(64);
        let mut a = hub.open().await;
        let user = UserId::new();
        let _ = hub.join(a.connection_id, user).await;

        let event = ServerEvent::UserOnline(UserId::new());
        let routed = hub
            .route_to_user(user, Some(a.connection_id), event.clone())
            .await;
        assert_eq!(routed, None);
        assert!(matches!(a.outbox.try_recv(), Err(TryRecvError::Empty)));

        let routed = hub.route_to_user(user, None, event.clone()).await;
        assert_eq!(routed, Some(a.connection_id));
        assert_eq!(a.outbox.try_recv().ok(), Some(event));
    }

    #[tokio::test]
    async fn excluded_newest_connection_falls_back_to_older() {
        let hub = ChatHub::new(64);
        let mut laptop = hub.open().await;
        let mut phone = hub.open().await;
        let user = UserId::new();
        let _ = hub.join(laptop.connection_id, user).await;
        let _ = hub.join(phone.connection_id, user).await;

        let event = ServerEvent::UserOnline(UserId::new());
        let from_phone = hub
            .route_to_user(user, Some(phone.connection_id), event.clone())
            .await;
        assert_eq!(from_phone, Some(laptop.connection_id));
        assert_eq!(laptop.outbox.try_recv().ok(), Some(event.clone()));
        assert!(matches!(phone.outbox.try_recv(), Err(TryRecvError::Empty)));

        let from_laptop = hub
            .route_to_user(user, Some(laptop.connection_id), event.clone())
            .await;
        assert_eq!(from_laptop, Some(phone.connection_id));
        assert_eq!(phone.outbox.try_recv().ok(), Some(event));
    }

    #[tokio::test]
    async fn send_to_closed_connection_returns_false() {
        let hub = ChatHub::new(64);
        let session = hub.open().await;
        hub.close(session.connection_id).await;
        let sent = hub
            .send_to(session.connection_id, ServerEvent::protocol_error(400, "x"))
            .await;
        assert!(!sent);
    }
}
