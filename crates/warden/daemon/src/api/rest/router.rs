//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health and metrics
        .route("/healthz", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Tokens
        .route("/tokens", post(handlers::mint_token))
        .route("/tokens/:id", get(handlers::get_token))
        .route("/tokens/:id/revoke", post(handlers::revoke_token))
        // Agents
        .route("/agents", post(handlers::spawn_agent))
        .route("/agents", get(handlers::list_agents))
        .route("/agents/cleanup-orphans", post(handlers::cleanup_orphans))
        .route("/agents/:id", get(handlers::get_agent))
        .route("/agents/:id/terminate", post(handlers::terminate_agent))
        .route("/agents/:id/suspend", post(handlers::suspend_agent))
        .route("/agents/:id/resume", post(handlers::resume_agent))
        // Audit
        .route("/audit/verify", get(handlers::verify_audit))
        .route("/audit/export", get(handlers::export_audit))
        .with_state(state);

    let mut router = Router::new()
        .merge(api_routes)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}
