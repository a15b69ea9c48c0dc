//! Direct messages and the user metadata they are resolved against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MessageId, UserId};
use crate::error::ChatError;

/// Public display fields of a user, embedded in resolved messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    /// User identifier. Serialized as `_id`, the key web clients match on.
    #[serde(rename = "_id", alias = "id")]
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Unique handle.
    pub username: String,
    /// Avatar URL, if the user set one.
    pub avatar: Option<String>,
}

/// A user as stored by the identity store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Unique handle.
    pub username: String,
    /// Login email. Never sent over the wire.
    pub email: String,
    /// Avatar URL.
    pub avatar: Option<String>,
    /// Registration timestamp.
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Returns the wire-safe subset of this profile.
    #[must_use]
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            username: self.username.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// A validated request to persist a direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Author of the message.
    pub sender_id: UserId,
    /// Intended recipient.
    pub receiver_id: UserId,
    /// Message body, never blank.
    pub content: String,
}

impl NewMessage {
    /// Builds a message, rejecting blank content.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidRequest`] if `content` is empty or only
    /// whitespace.
    pub fn new(
        sender_id: UserId,
        receiver_id: UserId,
        content: impl Into<String>,
    ) -> Result<Self, ChatError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(ChatError::InvalidRequest(
                "message content must not be empty".to_string(),
            ));
        }
        Ok(Self {
            sender_id,
            receiver_id,
            content,
        })
    }
}

/// A persisted message row, before sender/receiver are resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Message identifier assigned at creation.
    pub id: MessageId,
    /// Author of the message.
    pub sender_id: UserId,
    /// Recipient of the message.
    pub receiver_id: UserId,
    /// Message body.
    pub content: String,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A persisted message with sender and receiver display metadata joined in.
///
/// This is the payload of `message:receive`, `message:sent`, and the
/// history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message identifier, serialized as `_id`.
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,
    /// Resolved author.
    pub sender: UserSummary,
    /// Resolved recipient.
    pub receiver: UserSummary,
    /// Message body.
    pub content: String,
    /// Server-side creation timestamp.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_is_rejected() {
        assert!(NewMessage::new(UserId::new(), UserId::new(), "").is_err());
        assert!(NewMessage::new(UserId::new(), UserId::new(), "  \n\t").is_err());
    }

    #[test]
    fn content_is_kept_verbatim() {
        let Ok(msg) = NewMessage::new(UserId::new(), UserId::new(), "  hi  ") else {
            panic!("valid message rejected");
        };
        assert_eq!(msg.content, "  hi  ");
    }

    #[test]
    fn chat_message_serializes_camel_case() {
        let sender = UserSummary {
            id: UserId::new(),
            name: "Ada".to_string(),
            username: "ada".to_string(),
            avatar: None,
        };
        let msg = ChatMessage {
            id: MessageId::new(),
            receiver: sender.clone(),
            sender,
            content: "hi".to_string(),
            created_at: Utc::now(),
        };
        let Ok(json) = serde_json::to_value(&msg) else {
            panic!("serialization failed");
        };
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["sender"]["username"], "ada");
    }

    #[test]
    fn ids_use_underscore_key() {
        let user = UserId::new();
        let summary = UserSummary {
            id: user,
            name: "Ada".to_string(),
            username: "ada".to_string(),
            avatar: None,
        };
        let msg = ChatMessage {
            id: MessageId::new(),
            receiver: summary.clone(),
            sender: summary,
            content: "hi".to_string(),
            created_at: Utc::now(),
        };
        let Ok(json) = serde_json::to_value(&msg) else {
            panic!("serialization failed");
        };
        assert_eq!(json["_id"], msg.id.to_string());
        assert_eq!(json["sender"]["_id"], user.to_string());
        assert_eq!(json["receiver"]["_id"], user.to_string());
        assert!(json["sender"].get("id").is_none());
    }

    #[test]
    fn summary_accepts_plain_id_key() {
        let user = UserId::new();
        let raw = serde_json::json!({ "id": user, "name": "Ada", "username": "ada", "avatar": null });
        let Ok(summary) = serde_json::from_value::<UserSummary>(raw) else {
            panic!("deserialization failed");
        };
        assert_eq!(summary.id, user);
    }

    #[test]
    fn summary_drops_email() {
        let profile = UserProfile {
            id: UserId::new(),
            name: "Grace".to_string(),
            username: "grace".to_string(),
            email: "grace@example.com".to_string(),
            avatar: Some("https://example.com/g.png".to_string()),
            created_at: Utc::now(),
        };
        let summary = profile.summary();
        assert_eq!(summary.id, profile.id);
        let Ok(json) = serde_json::to_string(&summary) else {
            panic!("serialization failed");
        };
        assert!(!json.contains("grace@example.com"));
    }
}
