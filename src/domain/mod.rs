//! Domain layer: identifiers, messages, the connection registry, and the
//! presence system.
//!
//! This module holds the server-side model of the realtime chat core:
//! typed identifiers, direct messages and their resolved form, the
//! registry mapping connections to users, the presence bus, and the
//! [`ChatHub`] that ties registry and outboxes together under one lock.

pub mod chat_event;
pub mod connection_registry;
pub mod hub;
pub mod ids;
pub mod message;
pub mod presence_bus;

pub use chat_event::{
    MessageFailure, PresenceEvent, PresenceStatus, ProtocolError, SEND_FAILED, ServerEvent,
    TypingNotice,
};
pub use connection_registry::ConnectionRegistry;
pub use hub::{ChatHub, CloseOutcome, JoinOutcome, Outbox, Session};
pub use ids::{ConnectionId, MessageId, UserId};
pub use message::{ChatMessage, MessageRecord, NewMessage, UserProfile, UserSummary};
pub use presence_bus::{PresenceBus, PresenceFeed};
