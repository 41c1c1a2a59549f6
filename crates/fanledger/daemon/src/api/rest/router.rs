//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Views
        .route("/home", get(handlers::home))
        .route("/playground", get(handlers::playground))
        .route("/participants/:id", get(handlers::participant_detail))
        // Actions
        .route("/accounts/:id/votes", post(handlers::submit_vote))
        .route("/accounts/:id/alliances", post(handlers::submit_alliance))
        .route("/accounts/:id/donations", post(handlers::submit_donation))
        // Administration
        .route("/admin/accounts", post(handlers::open_account))
        .route("/admin/accounts/:id/credits", post(handlers::credit_points))
        .route("/admin/participants", post(handlers::add_participant))
        .route(
            "/admin/participants/:id/removed",
            put(handlers::set_participant_removed),
        )
        .route("/admin/objectives", post(handlers::add_objective))
        .route("/admin/videos", post(handlers::add_video))
        .route("/admin/challenges", post(handlers::add_challenge))
        .route("/admin/reconcile", get(handlers::reconcile));

    // Build router with middleware
    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
