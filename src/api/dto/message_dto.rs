//! Conversation history DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::ChatMessage;

/// Response body for `GET /messages/{user_id}/{other_id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationResponse {
    /// Messages in this page, oldest first.
    pub data: Vec<ChatMessage>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
