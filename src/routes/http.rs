//! HTTP endpoint handlers: read-only views for dashboards and health checks.
//! Interactive commands (practice, answers, timers) go through the WebSocket gateway.

use std::sync::Arc;

use axum::{
  extract::{Path, Query, State},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::achievements::CATALOG;
use crate::commands::{self, Caller};
use crate::domain::UserId;
use crate::protocol::{HealthOut, StatsQuery};
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut {
    ok: true,
    ai_enabled: state.generator.is_some(),
    live_questions: state.sessions.live_sessions().await,
  })
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_certs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(commands::certs(&state))
}

#[instrument(level = "info")]
pub async fn http_get_achievements() -> impl IntoResponse {
  Json(CATALOG.to_vec())
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_leaderboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(commands::leaderboard(&state).await)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(
  State(state): State<Arc<AppState>>,
  Path(user): Path<UserId>,
  Query(q): Query<StatsQuery>,
) -> impl IntoResponse {
  let caller = Caller { id: user, name: q.name };
  let view = commands::study_stats(&state, &caller).await;
  info!(target: "study_bot", %user, ephemeral = view.is_ephemeral(), "HTTP stats served");
  Json(view)
}
