//! Persistence layer: identity lookups and direct-message storage.
//!
//! The realtime core only needs a handful of create/find operations, which
//! are expressed as the object-safe [`UserDirectory`] and [`MessageStore`]
//! traits. [`postgres::PostgresStore`] backs them with `sqlx::PgPool`;
//! [`memory::InMemoryStore`] keeps everything in process for tests and for
//! running with persistence disabled.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::{ChatMessage, MessageId, MessageRecord, NewMessage, UserId, UserProfile};
use crate::error::ChatError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// A window over a conversation, counted from the newest message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    /// Number of newest messages to skip.
    pub offset: u64,
    /// Maximum number of messages to return.
    pub limit: u64,
}

/// Read access to the identity store.
#[async_trait]
pub trait UserDirectory: Send + Sync + Debug {
    /// Looks a user up by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] if the store is unreachable.
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, ChatError>;

    /// Looks a user up by login email (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] if the store is unreachable.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, ChatError>;
}

/// Durable storage for direct messages.
#[async_trait]
pub trait MessageStore: Send + Sync + Debug {
    /// Persists a new message and returns the stored row.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::UserNotFound`] if sender or receiver is unknown,
    /// or [`ChatError::Persistence`] on storage failure.
    async fn create(&self, message: NewMessage) -> Result<MessageRecord, ChatError>;

    /// Loads a message with sender and receiver display fields resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn find_by_id_with_relations(
        &self,
        id: MessageId,
    ) -> Result<Option<ChatMessage>, ChatError>;

    /// Returns messages exchanged between two users in either direction,
    /// oldest first within the requested window.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn find_conversation(
        &self,
        user: UserId,
        other: UserId,
        window: HistoryWindow,
    ) -> Result<Vec<ChatMessage>, ChatError>;

    /// Counts messages exchanged between two users in either direction.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] on storage failure.
    async fn count_conversation(&self, user: UserId, other: UserId) -> Result<u64, ChatError>;
}
