//! In-process store used for tests and for running without a database.
//!
//! By default it mirrors the foreign-key behavior of the PostgreSQL schema:
//! a message can only be created between two known users. A store built
//! with [`InMemoryStore::provisioning`] instead creates a placeholder
//! profile the first time it sees an unknown user, since there is no
//! identity store to register users in when persistence is disabled.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{HistoryWindow, MessageStore, UserDirectory};
use crate::domain::{ChatMessage, MessageId, MessageRecord, NewMessage, UserId, UserProfile};
use crate::error::ChatError;

/// Users and messages held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, UserProfile>>,
    /// Append-only, in insertion order.
    messages: RwLock<Vec<MessageRecord>>,
    provision_unknown_users: bool,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that provisions placeholder profiles for
    /// unknown senders and receivers instead of rejecting the message.
    #[must_use]
    pub fn provisioning() -> Self {
        Self {
            provision_unknown_users: true,
            ..Self::default()
        }
    }

    /// Adds or replaces a user profile.
    pub async fn insert_user(&self, profile: UserProfile) {
        self.users.write().await.insert(profile.id, profile);
    }

    /// Number of stored messages.
    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }

    fn resolve(
        users: &HashMap<UserId, UserProfile>,
        record: &MessageRecord,
    ) -> Option<ChatMessage> {
        let sender = users.get(&record.sender_id)?.summary();
        let receiver = users.get(&record.receiver_id)?.summary();
        Some(ChatMessage {
            id: record.id,
            sender,
            receiver,
            content: record.content.clone(),
            created_at: record.created_at,
        })
    }
}

/// Profile for a user first seen in a message, named after its id.
fn placeholder_profile(id: UserId) -> UserProfile {
    let handle = format!("user-{}", id.as_uuid().simple());
    UserProfile {
        id,
        name: handle.clone(),
        email: format!("{handle}@localhost"),
        username: handle,
        avatar: None,
        created_at: Utc::now(),
    }
}

fn between(record: &MessageRecord, user: UserId, other: UserId) -> bool {
    (record.sender_id == user && record.receiver_id == other)
        || (record.sender_id == other && record.receiver_id == user)
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserProfile>, ChatError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, ChatError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn create(&self, message: NewMessage) -> Result<MessageRecord, ChatError> {
        {
            let mut users = self.users.write().await;
            for id in [message.sender_id, message.receiver_id] {
                if users.contains_key(&id) {
                    continue;
                }
                if !self.provision_unknown_users {
                    return Err(ChatError::UserNotFound(id.into()));
                }
                tracing::debug!(user_id = %id, "provisioned placeholder profile");
                users.insert(id, placeholder_profile(id));
            }
        }

        let record = MessageRecord {
            id: MessageId::new(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            created_at: Utc::now(),
        };
        self.messages.write().await.push(record.clone());
        Ok(record)
    }

    async fn find_by_id_with_relations(
        &self,
        id: MessageId,
    ) -> Result<Option<ChatMessage>, ChatError> {
        let messages = self.messages.read().await;
        let Some(record) = messages.iter().find(|m| m.id == id) else {
            return Ok(None);
        };
        let users = self.users.read().await;
        Ok(Self::resolve(&users, record))
    }

    async fn find_conversation(
        &self,
        user: UserId,
        other: UserId,
        window: HistoryWindow,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let messages = self.messages.read().await;
        let users = self.users.read().await;
        let skip = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let take = usize::try_from(window.limit).unwrap_or(usize::MAX);

        let mut page: Vec<ChatMessage> = messages
            .iter()
            .rev()
            .filter(|m| between(m, user, other))
            .skip(skip)
            .take(take)
            .filter_map(|m| Self::resolve(&users, m))
            .collect();
        page.reverse();
        Ok(page)
    }

    async fn count_conversation(&self, user: UserId, other: UserId) -> Result<u64, ChatError> {
        let messages = self.messages.read().await;
        let count = messages.iter().filter(|m| between(m, user, other)).count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }
}
