//! PostgreSQL implementation of the persistence layer.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{MessageRow, ResolvedMessageRow, UserRow};
use super::{HistoryWindow, MessageStore, UserDirectory};
use crate::config::RealtimeConfig;
use crate::domain::{ChatMessage, MessageId, MessageRecord, NewMessage, UserId, UserProfile};
use crate::error::ChatError;

/// Select list shared by every query returning resolved messages.
const RESOLVED_MESSAGE_SELECT: &str = "SELECT m.id, m.content, m.created_at, \
     s.id AS sender_id, s.name AS sender_name, s.username AS sender_username, s.avatar AS sender_avatar, \
     r.id AS receiver_id, r.name AS receiver_name, r.username AS receiver_username, r.avatar AS receiver_avatar \
     FROM messages m \
     JOIN users s ON s.id = m.sender_id \
     JOIN users r ON r.id = m.receiver_id";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool sized according to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] if the database is unreachable.
    pub async fn connect(config: &RealtimeConfig) -> Result<Self, ChatError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Persistence`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), ChatError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ChatError::Persistence(e.to_string()))
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, ChatError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, username, email, avatar, created_at FROM users WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserProfile::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, ChatError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, username, email, avatar, created_at FROM users \
             WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserProfile::from))
    }
}

#[async_trait]
impl MessageStore for PostgresStore {
    async fn create(&self, message: NewMessage) -> Result<MessageRecord, ChatError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (id, sender_id, receiver_id, content) VALUES ($1, $2, $3, $4) \
             RETURNING id, sender_id, receiver_id, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(Uuid::from(message.sender_id))
        .bind(Uuid::from(message.receiver_id))
        .bind(&message.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                let missing = if db.constraint() == Some("messages_receiver_id_fkey") {
                    message.receiver_id
                } else {
                    message.sender_id
                };
                ChatError::UserNotFound(missing.into())
            }
            _ => ChatError::from(e),
        })?;
        Ok(row.into())
    }

    async fn find_by_id_with_relations(
        &self,
        id: MessageId,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let sql = format!("{RESOLVED_MESSAGE_SELECT} WHERE m.id = $1");
        let row = sqlx::query_as::<_, ResolvedMessageRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ChatMessage::from))
    }

    async fn find_conversation(
        &self,
        user: UserId,
        other: UserId,
        window: HistoryWindow,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let sql = format!(
            "{RESOLVED_MESSAGE_SELECT} \
             WHERE (m.sender_id = $1 AND m.receiver_id = $2) \
                OR (m.sender_id = $2 AND m.receiver_id = $1) \
             ORDER BY m.created_at DESC, m.id DESC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, ResolvedMessageRow>(&sql)
            .bind(Uuid::from(user))
            .bind(Uuid::from(other))
            .bind(i64::try_from(window.limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(window.offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        let mut messages: Vec<ChatMessage> = rows.into_iter().map(ChatMessage::from).collect();
        messages.reverse();
        Ok(messages)
    }

    async fn count_conversation(&self, user: UserId, other: UserId) -> Result<u64, ChatError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages \
             WHERE (sender_id = $1 AND receiver_id = $2) \
                OR (sender_id = $2 AND receiver_id = $1)",
        )
        .bind(Uuid::from(user))
        .bind(Uuid::from(other))
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
