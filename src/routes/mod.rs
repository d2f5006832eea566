//! Router assembly: HTTP endpoints, WebSocket upgrade, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (requests + pushed progress notices)
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) for a separately served front end
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/progress", get(http::http_get_progress))
        .route("/api/v1/assessment/start", post(http::http_start_assessment))
        .route("/api/v1/assessment/skip", post(http::http_skip_assessment))
        .route("/api/v1/quiz/start", post(http::http_start_quiz))
        .route("/api/v1/quiz/:id", get(http::http_get_quiz).delete(http::http_close_quiz))
        .route("/api/v1/quiz/:id/select", post(http::http_select_option))
        .route("/api/v1/quiz/:id/check", post(http::http_check_answer))
        .route("/api/v1/quiz/:id/next", post(http::http_next_question))
        .route("/api/v1/quiz/:id/restart", post(http::http_restart_quiz))
        .route("/api/v1/modules/:module/enter", post(http::http_enter_module))
        .route("/api/v1/lab/challenge", post(http::http_next_challenge))
        .route("/api/v1/lab/draft", post(http::http_draft_edited))
        .route("/api/v1/lab/submit", post(http::http_submit_answer))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
