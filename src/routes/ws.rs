//! WebSocket gateway. Each client frame is one bot command; replies and
//! asynchronous bot messages (quiz questions, countdown edits, timer notices)
//! share one outbound channel per connection.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::commands::{self, Caller};
use crate::error::PresentationError;
use crate::ports::PresentationSink;
use crate::protocol::{ClientCommand, ClientEnvelope, ServerWsMessage};
use crate::state::AppState;
use crate::view::{MessageHandle, View};

/// Presentation sink bound to one WebSocket connection.
#[derive(Clone)]
pub struct WsSink {
  tx: mpsc::UnboundedSender<ServerWsMessage>,
}

impl WsSink {
  pub fn new(tx: mpsc::UnboundedSender<ServerWsMessage>) -> Self {
    Self { tx }
  }
}

#[async_trait]
impl PresentationSink for WsSink {
  async fn send(&self, view: View) -> Result<MessageHandle, PresentationError> {
    let handle = MessageHandle::new();
    self
      .tx
      .send(ServerWsMessage::Message { message_id: handle, view })
      .map_err(|_| PresentationError::Transport("connection closed".into()))?;
    Ok(handle)
  }

  async fn edit(&self, handle: &MessageHandle, view: View) -> Result<(), PresentationError> {
    // Once the client is gone its messages are gone too.
    self
      .tx
      .send(ServerWsMessage::Edit { message_id: *handle, view })
      .map_err(|_| PresentationError::MessageGone)
  }
}

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "study_bot", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "study_bot", "WebSocket connected");
  let (tx, mut rx) = mpsc::unbounded_channel::<ServerWsMessage>();
  let sink = Arc::new(WsSink::new(tx.clone()));

  loop {
    tokio::select! {
      inbound = socket.recv() => {
        let Some(Ok(msg)) = inbound else { break };
        match msg {
          Message::Text(txt) => match serde_json::from_str::<ClientEnvelope>(&txt) {
            Ok(envelope) => {
              debug!(target: "study_bot", "WS received: {:?}", &envelope);
              // Commands may wait on the model; keep the socket pumping meanwhile.
              let state = state.clone();
              let sink = sink.clone();
              let tx = tx.clone();
              tokio::spawn(async move {
                if let Some(view) = handle_client_ws(&state, envelope, sink).await {
                  let _ = tx.send(ServerWsMessage::Reply { view });
                }
              });
            }
            Err(e) => {
              let _ = tx.send(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) });
            }
          },
          Message::Ping(payload) => {
            let _ = socket.send(Message::Pong(payload)).await;
          }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(outbound) = rx.recv() => {
        let out = serde_json::to_string(&outbound).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });
        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "study_bot", error = %e, "WS send error");
          break;
        }
      }
    }
  }
  info!(target: "study_bot", "WebSocket disconnected");
}

/// Run one command. `None` means nothing to reply (an accepted answer edits its question instead).
#[instrument(level = "info", skip(state, sink), fields(user = envelope.user.id))]
pub async fn handle_client_ws(state: &AppState, envelope: ClientEnvelope, sink: Arc<dyn PresentationSink>) -> Option<View> {
  let ClientEnvelope { user, command } = envelope;
  let caller: &Caller = &user;
  let view = match command {
    ClientCommand::Ping => commands::ping(),
    ClientCommand::Help => commands::help(),
    ClientCommand::Certs => commands::certs(state),
    ClientCommand::SelectCert { certification } => commands::select_cert(state, caller, &certification).await,
    ClientCommand::StudyStats => commands::study_stats(state, caller).await,
    ClientCommand::Practice { difficulty, count } => commands::practice(state, caller, difficulty, count, sink).await,
    ClientCommand::Answer { message_id, choice } => {
      return commands::submit_answer(state, caller, &message_id, &choice).await;
    }
    ClientCommand::Leaderboard => commands::leaderboard(state).await,
    ClientCommand::Analysis => commands::analysis(state, caller).await,
    ClientCommand::Flashcards { topic, count } => commands::flashcards(state, caller, topic, count).await,
    ClientCommand::Explain { topic } => commands::explain(state, caller, &topic).await,
    ClientCommand::Pomodoro { kind } => commands::pomodoro(state, caller, kind, sink).await,
    ClientCommand::StopPomodoro => commands::stop_pomodoro(state, caller).await,
    ClientCommand::CyberQuote => commands::cyber_quote(state),
    ClientCommand::Hash { text } => commands::hash(&text),
    ClientCommand::PasswordCheck { password } => commands::password_check(&password.0),
  };
  if view.is_ephemeral() {
    warn!(target: "study_bot", user = caller.id, ?view, "Command rejected");
  }
  Some(view)
}
