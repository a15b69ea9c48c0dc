//! Database row types and their conversion into domain types.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{ChatMessage, MessageId, MessageRecord, UserId, UserProfile, UserSummary};

/// A row of the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    /// Primary key.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Unique handle.
    pub username: String,
    /// Login email.
    pub email: String,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserProfile {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            name: row.name,
            username: row.username,
            email: row.email,
            avatar: row.avatar,
            created_at: row.created_at,
        }
    }
}

/// A row of the `messages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    /// Primary key.
    pub id: Uuid,
    /// Author.
    pub sender_id: Uuid,
    /// Recipient.
    pub receiver_id: Uuid,
    /// Message body.
    pub content: String,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for MessageRecord {
    fn from(row: MessageRow) -> Self {
        Self {
            id: MessageId::from_uuid(row.id),
            sender_id: UserId::from_uuid(row.sender_id),
            receiver_id: UserId::from_uuid(row.receiver_id),
            content: row.content,
            created_at: row.created_at,
        }
    }
}

/// A message joined with the display columns of both participants.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResolvedMessageRow {
    /// Message primary key.
    pub id: Uuid,
    /// Message body.
    pub content: String,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Sender ID.
    pub sender_id: Uuid,
    /// Sender display name.
    pub sender_name: String,
    /// Sender handle.
    pub sender_username: String,
    /// Sender avatar.
    pub sender_avatar: Option<String>,
    /// Receiver ID.
    pub receiver_id: Uuid,
    /// Receiver display name.
    pub receiver_name: String,
    /// Receiver handle.
    pub receiver_username: String,
    /// Receiver avatar.
    pub receiver_avatar: Option<String>,
}

impl From<ResolvedMessageRow> for ChatMessage {
    fn from(row: ResolvedMessageRow) -> Self {
        Self {
            id: MessageId::from_uuid(row.id),
            sender: UserSummary {
                id: UserId::from_uuid(row.sender_id),
                name: row.sender_name,
                username: row.sender_username,
                avatar: row.sender_avatar,
            },
            receiver: UserSummary {
                id: UserId::from_uuid(row.receiver_id),
                name: row.receiver_name,
                username: row.receiver_username,
                avatar: row.receiver_avatar,
            },
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_row_maps_both_participants() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let row = ResolvedMessageRow {
            id: Uuid::new_v4(),
            content: "hi".to_string(),
            created_at: Utc::now(),
            sender_id: sender,
            sender_name: "Ada".to_string(),
            sender_username: "ada".to_string(),
            sender_avatar: None,
            receiver_id: receiver,
            receiver_name: "Linus".to_string(),
            receiver_username: "linus".to_string(),
            receiver_avatar: Some("https://example.com/l.png".to_string()),
        };
        let msg = ChatMessage::from(row);
        assert_eq!(*msg.sender.id.as_uuid(), sender);
        assert_eq!(*msg.receiver.id.as_uuid(), receiver);
        assert_eq!(msg.receiver.username, "linus");
    }
}
