pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod ids;
pub mod inbox;
pub mod kv;
pub mod requests;
pub mod sessions;
pub mod shares;
pub mod state;
pub mod storage;
pub mod token_coordinator;
pub mod validate;

use axum::extract::{DefaultBodyLimit, State};
use axum::middleware;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;

pub use crate::state::AppState;

/// Assembles the full router: every channel's routes, the landing page,
/// CORS echo middleware wrapping all of it, and a rate limiter over the
/// mutating endpoints.
pub fn build_router(state: AppState) -> Router {
    let governor_conf = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_second(state.config.rate_limit.per_second)
        .burst_size(state.config.rate_limit.burst_size)
        .finish()
        .expect("failed to build rate limiter config");

    let mutating_routes = Router::new()
        .route("/v1/users/{username}", post(identity::handler::register_or_rotate))
        .route("/v1/shares", post(shares::handler::create_share))
        .route("/v1/shares/{token}/consume", post(shares::handler::consume_share))
        .route("/v1/inbox", post(inbox::handler::create_inbox_item))
        .route("/v1/inbox/ack", post(inbox::handler::ack_inbox))
        .route("/v1/sessions/{id}/revoke", post(sessions::handler::revoke_session))
        .route("/v1/sessions/{id}/restore", post(sessions::handler::restore_session))
        .route("/v1/sessions/{id}/accepted", post(sessions::handler::accept_session))
        .route("/v1/sessions/{id}/delete", post(sessions::handler::delete_session))
        .route("/v1/requests", post(requests::handler::create_request))
        .route("/v1/requests/ack", post(requests::handler::ack_requests))
        .layer(DefaultBodyLimit::max(
            state.config.shares.max_payload_bytes.saturating_mul(2),
        ))
        .layer(GovernorLayer::new(governor_conf));

    let read_routes = Router::new()
        .route("/v1/users/{username}", get(identity::handler::get_user))
        .route("/v1/shares/{token}", get(shares::handler::get_share))
        .route("/v1/inbox/poll", get(inbox::handler::poll_inbox))
        .route("/v1/sessions", get(sessions::handler::list_sessions))
        .route("/v1/requests/poll", get(requests::handler::poll_requests));

    let misc_routes = Router::new()
        .route("/health", get(health))
        .route("/session/{token}", get(http::session_landing_page));

    Router::new()
        .merge(mutating_routes)
        .merge(read_routes)
        .merge(misc_routes)
        .fallback(http::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            http::cors_middleware,
        ))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    db_ok: bool,
}

/// `GET /health` — probes the pool with a bare `SELECT 1`, grounded on the
/// teacher's `query::handler::health`.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_ok = match state.kv.pool().get().await {
        Ok(conn) => conn
            .interact(|conn| conn.execute_batch("SELECT 1"))
            .await
            .is_ok(),
        Err(_) => false,
    };

    Json(HealthResponse {
        status: if db_ok { "ok".into() } else { "degraded".into() },
        db_ok,
    })
}
