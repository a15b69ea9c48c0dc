//! Presence and profile DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{UserId, UserSummary};

/// Response body for `GET /presence`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PresenceResponse {
    /// Users with at least one live connection.
    pub online: Vec<UserId>,
    /// Number of online users.
    pub count: usize,
}

/// Response body for `GET /users/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserProfileResponse {
    /// Public profile fields.
    #[serde(flatten)]
    pub user: UserSummary,
    /// Whether the user currently has a live connection.
    pub online: bool,
}
