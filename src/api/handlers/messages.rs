//! Conversation history handler.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ConversationResponse, PaginationParams};
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::{ChatError, ErrorResponse};

/// `GET /messages/{user_id}/{other_id}` — Paginated direct-message history.
///
/// Page 1 holds the newest messages; each page is ordered oldest first.
/// This is how clients catch up on messages sent while they were offline.
///
/// # Errors
///
/// Returns [`ChatError::Persistence`] if the message store fails.
#[utoipa::path(
    get,
    path = "/api/v1/messages/{user_id}/{other_id}",
    tag = "Messages",
    summary = "Get conversation history",
    params(
        ("user_id" = uuid::Uuid, Path, description = "One participant"),
        ("other_id" = uuid::Uuid, Path, description = "The other participant"),
        PaginationParams,
    ),
    responses(
        (status = 200, description = "One page of the conversation", body = ConversationResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn conversation_history(
    State(state): State<AppState>,
    Path((user_id, other_id)): Path<(UserId, UserId)>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ConversationResponse>, ChatError> {
    let params = params.clamped(state.history_max_page_size);
    let (data, total) = state
        .chat_service
        .history(user_id, other_id, params.window())
        .await?;

    Ok(Json(ConversationResponse {
        data,
        pagination: params.meta(total),
    }))
}

/// Message history routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/messages/{user_id}/{other_id}", get(conversation_history))
}
