//! Application assembly: store selection, router layering, shutdown.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::AppState;
use crate::config::RealtimeConfig;
use crate::domain::ChatHub;
use crate::error::ChatError;
use crate::persistence::{InMemoryStore, MessageStore, PostgresStore, UserDirectory};
use crate::service::ChatService;
use crate::ws::handler::ws_handler;

/// Builds the shared state from explicit stores.
pub fn build_state(
    config: &RealtimeConfig,
    users: Arc<dyn UserDirectory>,
    messages: Arc<dyn MessageStore>,
) -> AppState {
    let hub = Arc::new(ChatHub::new(config.presence_bus_capacity));
    AppState {
        chat_service: Arc::new(ChatService::new(hub, messages)),
        users,
        history_max_page_size: config.history_max_page_size,
    }
}

/// Connects the configured store and builds the shared state.
///
/// With persistence disabled the service runs on an
/// [`InMemoryStore::provisioning`] store, so any joined user can message
/// any other user id.
///
/// # Errors
///
/// Returns [`ChatError::Persistence`] if the database is unreachable or a
/// migration fails.
pub async fn connect_state(config: &RealtimeConfig) -> Result<AppState, ChatError> {
    if !config.persistence_enabled {
        tracing::warn!("persistence disabled, messages are kept in memory only");
        let store = Arc::new(InMemoryStore::provisioning());
        return Ok(build_state(config, Arc::clone(&store) as _, store));
    }

    let store = Arc::new(PostgresStore::connect(config).await?);
    if config.run_migrations {
        store.migrate().await?;
        tracing::info!("database migrations applied");
    }
    Ok(build_state(config, Arc::clone(&store) as _, store))
}

/// Builds the full application router.
///
/// REST routes get the request timeout; `/ws` is exempt since upgraded
/// connections are long-lived.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let rest = api::build_router().layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        request_timeout,
    ));

    let router = Router::new().merge(rest).route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
