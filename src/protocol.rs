//! Public protocol structs for the WebSocket gateway and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and chat frontends independently.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::commands::Caller;
use crate::domain::Difficulty;
use crate::pomodoro::PomodoroKind;
use crate::view::{MessageHandle, View};

/// One inbound WebSocket frame: who is asking, and which command.
#[derive(Debug, Deserialize)]
pub struct ClientEnvelope {
    pub user: Caller,
    #[serde(flatten)]
    pub command: ClientCommand,
}

/// Bot commands, one per slash command plus answer button presses.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Ping,
    Help,
    Certs,
    SelectCert {
        certification: String,
    },
    StudyStats,
    Practice {
        difficulty: Option<Difficulty>,
        count: Option<i64>,
    },
    Answer {
        #[serde(rename = "messageId")]
        message_id: MessageHandle,
        choice: String,
    },
    Leaderboard,
    Analysis,
    Flashcards {
        topic: Option<String>,
        count: Option<i64>,
    },
    Explain {
        topic: String,
    },
    Pomodoro {
        kind: Option<PomodoroKind>,
    },
    StopPomodoro,
    CyberQuote,
    Hash {
        text: String,
    },
    PasswordCheck {
        password: Redacted,
    },
}

/// Secret text from the client; `Debug` never shows it, so request logs stay clean.
#[derive(Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Redacted(pub String);

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Frames the server pushes over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    /// Direct reply to the command that was just received.
    Reply {
        view: View,
    },
    /// A new bot message that may later be edited (quiz questions, timer notices).
    Message {
        #[serde(rename = "messageId")]
        message_id: MessageHandle,
        view: View,
    },
    Edit {
        #[serde(rename = "messageId")]
        message_id: MessageHandle,
        view: View,
    },
    Error {
        message: String,
    },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthOut {
    pub ok: bool,
    pub ai_enabled: bool,
    pub live_questions: usize,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub name: Option<String>,
}
