//! Chat service: joins, message routing, typing relay, and disconnects.

use std::sync::Arc;

use crate::domain::{
    ChatHub, ChatMessage, CloseOutcome, ConnectionId, JoinOutcome, MessageFailure, NewMessage,
    ServerEvent, Session, TypingNotice, UserId,
};
use crate::error::ChatError;
use crate::persistence::{HistoryWindow, MessageStore};

/// Which typing transition a client reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// `typing:start`, relayed as `typing:show`.
    Start,
    /// `typing:stop`, relayed as `typing:hide`.
    Stop,
}

/// Outcome of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// The persisted, resolved message.
    pub message: ChatMessage,
    /// Connection the `message:receive` event was queued on, if the
    /// receiver was online.
    pub delivered_to: Option<ConnectionId>,
    /// Whether the `message:sent` ack reached the sender's connection (it
    /// may have closed while the message was being persisted).
    pub acknowledged: bool,
}

/// Orchestration layer for the realtime chat core.
///
/// Stateless coordinator: the [`ChatHub`] holds all connection state and
/// the [`MessageStore`] holds all durable state. Every send follows the
/// pattern: persist → resolve receiver → deliver → acknowledge.
#[derive(Debug, Clone)]
pub struct ChatService {
    hub: Arc<ChatHub>,
    messages: Arc<dyn MessageStore>,
}

impl ChatService {
    /// Creates a new `ChatService`.
    #[must_use]
    pub fn new(hub: Arc<ChatHub>, messages: Arc<dyn MessageStore>) -> Self {
        Self { hub, messages }
    }

    /// Returns a reference to the inner [`ChatHub`].
    #[must_use]
    pub fn hub(&self) -> &Arc<ChatHub> {
        &self.hub
    }

    /// Opens a new anonymous connection.
    pub async fn connect(&self) -> Session {
        let session = self.hub.open().await;
        tracing::debug!(connection_id = %session.connection_id, "connection opened");
        session
    }

    /// Handles `user:join`: maps the connection to `user_id` and announces
    /// the user online to every other connection.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ConnectionClosed`] if the connection is no
    /// longer open.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        user_id: UserId,
    ) -> Result<JoinOutcome, ChatError> {
        let outcome = self.hub.join(connection_id, user_id).await?;
        if let Some(displaced) = outcome.displaced {
            tracing::info!(%connection_id, %displaced, %user_id, "connection rejoined as another user");
        } else {
            tracing::info!(%connection_id, %user_id, "user joined");
        }
        Ok(outcome)
    }

    /// Handles `message:send` from `connection_id`.
    ///
    /// The message is persisted before anything is delivered. Afterwards
    /// the receiver is resolved against the registry as it is *now*, which
    /// may differ from when the send arrived. The emitting connection
    /// always gets `message:sent`. The receiver's most recent connection
    /// other than the emitting one gets `message:receive`, so a note to
    /// self reaches the sender's other devices.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] for blank content, or the
    /// store's error if persisting or resolving failed. In both cases
    /// `message:error` has already been sent to the emitting connection.
    pub async fn send_message(
        &self,
        connection_id: ConnectionId,
        sender_id: UserId,
        receiver_id: UserId,
        content: String,
    ) -> Result<SendReceipt, ChatError> {
        let message = match self.persist(sender_id, receiver_id, content).await {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(%connection_id, %sender_id, %receiver_id, error = %err, "send message failed");
                self.hub
                    .send_to(
                        connection_id,
                        ServerEvent::MessageError(MessageFailure::send_failed()),
                    )
                    .await;
                return Err(err);
            }
        };

        let delivered_to = self
            .hub
            .route_to_user(
                receiver_id,
                Some(connection_id),
                ServerEvent::MessageReceive(message.clone()),
            )
            .await;
        let acknowledged = self
            .hub
            .send_to(connection_id, ServerEvent::MessageSent(message.clone()))
            .await;

        tracing::debug!(
            message_id = %message.id,
            %connection_id,
            delivered = delivered_to.is_some(),
            acknowledged,
            "message routed"
        );

        Ok(SendReceipt {
            message,
            delivered_to,
            acknowledged,
        })
    }

    /// Handles `typing:start` / `typing:stop`: relays the signal to the
    /// receiver's connection if online. Nothing is persisted and the sender
    /// gets no acknowledgement.
    ///
    /// Returns the connection the signal was queued on.
    pub async fn relay_typing(
        &self,
        connection_id: ConnectionId,
        signal: TypingSignal,
        sender_id: UserId,
        receiver_id: UserId,
    ) -> Option<ConnectionId> {
        let notice = TypingNotice { user_id: sender_id };
        let event = match signal {
            TypingSignal::Start => ServerEvent::TypingShow(notice),
            TypingSignal::Stop => ServerEvent::TypingHide(notice),
        };
        self.hub
            .route_to_user(receiver_id, Some(connection_id), event)
            .await
    }

    /// Handles a disconnect: removes the connection and, if it had joined
    /// and was the user's last connection, announces the user offline.
    ///
    /// Duplicate or stray disconnects return `None` and change nothing.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Option<CloseOutcome> {
        let outcome = self.hub.close(connection_id).await;
        match outcome {
            Some(CloseOutcome {
                user_id,
                went_offline,
            }) => {
                tracing::info!(%connection_id, %user_id, went_offline, "user disconnected");
            }
            None => tracing::debug!(%connection_id, "anonymous connection closed"),
        }
        outcome
    }

    /// Returns one page of the conversation between two users together with
    /// the total number of messages they exchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    pub async fn history(
        &self,
        user: UserId,
        other: UserId,
        window: HistoryWindow,
    ) -> Result<(Vec<ChatMessage>, u64), ChatError> {
        let total = self.messages.count_conversation(user, other).await?;
        let page = self.messages.find_conversation(user, other, window).await?;
        Ok((page, total))
    }

    /// Returns every online user.
    pub async fn online_users(&self) -> Vec<UserId> {
        self.hub.online_users().await
    }

    async fn persist(
        &self,
        sender_id: UserId,
        receiver_id: UserId,
        content: String,
    ) -> Result<ChatMessage, ChatError> {
        let new_message = NewMessage::new(sender_id, receiver_id, content)?;
        let record = self.messages.create(new_message).await?;
        self.messages
            .find_by_id_with_relations(record.id)
            .await?
            .ok_or_else(|| ChatError::MessageNotFound(record.id.into()))
    }
}
