//! Router assembly: WebSocket gateway, HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket gateway at `/ws`
/// - read-only API under `/api/v1/...`
/// - CORS (allow any origin/method/headers)
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/certs", get(http::http_get_certs))
        .route("/api/v1/achievements", get(http::http_get_achievements))
        .route("/api/v1/leaderboard", get(http::http_get_leaderboard))
        .route("/api/v1/users/:id/stats", get(http::http_get_stats))
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

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::BotConfig;
    use crate::store::memory::MemoryStore;

    fn app() -> Router {
        let state = AppState::new(BotConfig::default(), Arc::new(MemoryStore::new()), None);
        build_router(Arc::new(state))
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let res = app().oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ai_disabled() {
        let (status, body) = get_json("/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["ai_enabled"], false);
        assert_eq!(body["live_questions"], 0);
    }

    #[tokio::test]
    async fn certs_list_the_catalog() {
        let (_, body) = get_json("/api/v1/certs").await;
        assert_eq!(body["kind"], "certifications");
        assert!(body["certifications"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn stats_for_new_user_start_at_beginner() {
        let (status, body) = get_json("/api/v1/users/9/stats?name=sam").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "stats");
        assert_eq!(body["username"], "sam");
        assert_eq!(body["skill_tier"], "BEGINNER");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let res = app().oneshot(Request::get("/api/v1/nope").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
