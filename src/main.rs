//! CompTIA study bot server.
//!
//! - Axum WebSocket gateway + HTTP API
//! - SQLite persistence when DATABASE_URL is set, in-memory otherwise
//! - Optional OpenAI integration (via environment variables)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   DATABASE_URL        : sqlx SQLite URL, e.g. "sqlite://study.db?mode=rwc"
//!   BOT_CONFIG_PATH     : path to TOML config (prompts, certifications, quotes)
//!   OPENAI_API_KEY      : enables question generation if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_FAST_MODEL   : default "gpt-4o-mini"
//!   OPENAI_STRONG_MODEL : default "gpt-4o"
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

use cert_study_bot::config::{load_bot_config, Settings};
use cert_study_bot::openai::OpenAI;
use cert_study_bot::routes::build_router;
use cert_study_bot::state::AppState;
use cert_study_bot::{store, telemetry};

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let settings = Settings::from_env();
  let bot = load_bot_config(settings.bot_config_path.as_deref());
  let store = store::open(settings.database_url.as_deref()).await?;

  let state = Arc::new(AppState::new(bot, store, OpenAI::from_env()));
  let app = build_router(state);

  let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
  let listener = TcpListener::bind(addr).await?;
  info!(target: "study_bot", %addr, "HTTP server listening");
  axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
  info!(target: "study_bot", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    warn!(target: "study_bot", error = %e, "Could not listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "study_bot", "Shutdown requested");
}
