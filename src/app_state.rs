//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::UserDirectory;
use crate::service::ChatService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Chat service for all realtime logic.
    pub chat_service: Arc<ChatService>,
    /// Identity store for profile lookups.
    pub users: Arc<dyn UserDirectory>,
    /// Upper bound for `per_page` on the history endpoint.
    pub history_max_page_size: u32,
}
