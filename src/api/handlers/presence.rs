//! Presence and profile handlers.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{PresenceResponse, UserProfileResponse};
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::{ChatError, ErrorResponse};

/// `GET /presence` — List online users.
#[utoipa::path(
    get,
    path = "/api/v1/presence",
    tag = "Presence",
    summary = "List online users",
    description = "Returns every user that currently has at least one joined WebSocket connection.",
    responses(
        (status = 200, description = "Online users", body = PresenceResponse),
    )
)]
pub async fn list_online(State(state): State<AppState>) -> Json<PresenceResponse> {
    let online = state.chat_service.online_users().await;
    Json(PresenceResponse {
        count: online.len(),
        online,
    })
}

/// `GET /users/{id}` — Public profile with live presence.
///
/// # Errors
///
/// Returns [`ChatError::UserNotFound`] if the identity store has no such
/// user.
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Presence",
    summary = "Get a user's public profile",
    params(
        ("id" = uuid::Uuid, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "User profile", body = UserProfileResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<UserProfileResponse>, ChatError> {
    let profile = state
        .users
        .find_by_id(id)
        .await?
        .ok_or(ChatError::UserNotFound(*id.as_uuid()))?;
    let online = state
        .chat_service
        .hub()
        .find_connection_for_user(id)
        .await
        .is_some();

    Ok(Json(UserProfileResponse {
        user: profile.summary(),
        online,
    }))
}

/// Presence routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/presence", get(list_online))
        .route("/users/{id}", get(get_user))
}
