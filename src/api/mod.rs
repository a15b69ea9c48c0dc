//! REST API layer: route handlers, DTOs, router composition, and the
//! OpenAPI document.
//!
//! Resource endpoints are mounted under `/api/v1`; system endpoints live
//! at the root.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI document for the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "devconnect-realtime",
        description = "Presence and direct-message history for DevConnect. The realtime protocol itself runs over `GET /ws`."
    ),
    paths(
        handlers::system::health_handler,
        handlers::presence::list_online,
        handlers::presence::get_user,
        handlers::messages::conversation_history,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        crate::domain::ChatMessage,
        crate::domain::UserSummary,
        dto::PaginationMeta,
        dto::ConversationResponse,
        dto::PresenceResponse,
        dto::UserProfileResponse,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Presence", description = "Who is online"),
        (name = "Messages", description = "Direct-message history"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
