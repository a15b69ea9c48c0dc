//! Events the server pushes to connected clients.
//!
//! [`ServerEvent`] is serialized directly as a WebSocket text frame of the
//! shape `{"event": "<name>", "data": <payload>}`. Event names are the
//! colon-namespaced contract the web client listens on.

use serde::{Deserialize, Serialize};

use super::message::ChatMessage;
use super::{ConnectionId, UserId};

/// Generic failure text sent with `message:error`.
pub const SEND_FAILED: &str = "Failed to send message";

/// Payload of `message:error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFailure {
    /// Human-readable failure indicator.
    pub message: String,
}

impl MessageFailure {
    /// The failure reported whenever a send could not be persisted.
    #[must_use]
    pub fn send_failed() -> Self {
        Self {
            message: SEND_FAILED.to_string(),
        }
    }
}

/// Payload of `typing:show` / `typing:hide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    /// The user who is typing.
    pub user_id: UserId,
}

/// Payload of the `error` frame sent for malformed client input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolError {
    /// HTTP-like status code (400 malformed, 404 unknown event).
    pub code: u16,
    /// Human-readable reason.
    pub message: String,
}

/// An event delivered to one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Another user came online.
    #[serde(rename = "user:online")]
    UserOnline(UserId),
    /// Another user went offline.
    #[serde(rename = "user:offline")]
    UserOffline(UserId),
    /// A message addressed to this connection's user.
    #[serde(rename = "message:receive")]
    MessageReceive(ChatMessage),
    /// Acknowledgement that this connection's send was persisted.
    #[serde(rename = "message:sent")]
    MessageSent(ChatMessage),
    /// This connection's send could not be persisted.
    #[serde(rename = "message:error")]
    MessageError(MessageFailure),
    /// The peer started typing.
    #[serde(rename = "typing:show")]
    TypingShow(TypingNotice),
    /// The peer stopped typing.
    #[serde(rename = "typing:hide")]
    TypingHide(TypingNotice),
    /// The last client frame could not be understood.
    #[serde(rename = "error")]
    Error(ProtocolError),
}

impl ServerEvent {
    /// Returns the wire name of this event.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::UserOnline(_) => "user:online",
            Self::UserOffline(_) => "user:offline",
            Self::MessageReceive(_) => "message:receive",
            Self::MessageSent(_) => "message:sent",
            Self::MessageError(_) => "message:error",
            Self::TypingShow(_) => "typing:show",
            Self::TypingHide(_) => "typing:hide",
            Self::Error(_) => "error",
        }
    }

    /// Builds a protocol `error` frame.
    #[must_use]
    pub fn protocol_error(code: u16, message: impl Into<String>) -> Self {
        Self::Error(ProtocolError {
            code,
            message: message.into(),
        })
    }
}

/// Online/offline transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    /// A connection joined as the user. Sent on every join, including a
    /// second device of a user who is already online.
    Online,
    /// The user lost their last live connection.
    Offline,
}

/// A presence change fanned out through the [`super::PresenceBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceEvent {
    /// Connection whose join or disconnect caused the change.
    pub origin: ConnectionId,
    /// User whose presence changed.
    pub user_id: UserId,
    /// New status.
    pub status: PresenceStatus,
}

impl PresenceEvent {
    /// Creates a presence event.
    #[must_use]
    pub const fn new(origin: ConnectionId, user_id: UserId, status: PresenceStatus) -> Self {
        Self {
            origin,
            user_id,
            status,
        }
    }

    /// The originating connection never sees its own presence change.
    #[must_use]
    pub fn is_visible_to(&self, connection_id: ConnectionId) -> bool {
        self.origin != connection_id
    }

    /// Converts to the frame delivered to other connections.
    #[must_use]
    pub const fn to_server_event(&self) -> ServerEvent {
        match self.status {
            PresenceStatus::Online => ServerEvent::UserOnline(self.user_id),
            PresenceStatus::Offline => ServerEvent::UserOffline(self.user_id),
        }
    }
}
