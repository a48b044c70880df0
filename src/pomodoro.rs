//! Pomodoro timers: at most one per user, study minutes credited to progress.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::{sleep, Instant};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::UserId;
use crate::error::BestEffort;
use crate::ports::PresentationSink;
use crate::store::Store;
use crate::view::View;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PomodoroKind {
  #[default]
  Study,
  ShortBreak,
  LongBreak,
}

impl PomodoroKind {
  pub fn minutes(&self) -> u64 {
    match self {
      PomodoroKind::Study => 25,
      PomodoroKind::ShortBreak => 5,
      PomodoroKind::LongBreak => 15,
    }
  }

  pub fn duration(&self) -> Duration {
    Duration::from_secs(self.minutes() * 60)
  }
}

#[derive(Clone, Debug)]
pub struct PomodoroSession {
  pub id: Uuid,
  pub kind: PomodoroKind,
  pub started: Instant,
}

impl PomodoroSession {
  pub fn remaining(&self) -> Duration {
    self.kind.duration().saturating_sub(self.started.elapsed())
  }

  pub fn elapsed_minutes(&self) -> u64 {
    self.started.elapsed().as_secs() / 60
  }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StartError {
  /// A timer is already running; carries the whole minutes left.
  AlreadyActive { remaining_minutes: u64 },
}

#[derive(Clone)]
pub struct PomodoroManager {
  store: Arc<dyn Store>,
  sessions: Arc<RwLock<HashMap<UserId, PomodoroSession>>>,
}

impl PomodoroManager {
  pub fn new(store: Arc<dyn Store>) -> Self {
    Self { store, sessions: Arc::new(RwLock::new(HashMap::new())) }
  }

  pub async fn active(&self, user: UserId) -> Option<PomodoroSession> {
    self.sessions.read().await.get(&user).cloned()
  }

  /// Register a timer and spawn its completion task. The finish notice goes to `sink`.
  #[instrument(level = "info", skip(self, sink), fields(%user, ?kind))]
  pub async fn start(
    &self,
    user: UserId,
    kind: PomodoroKind,
    sink: Arc<dyn PresentationSink>,
  ) -> Result<PomodoroSession, StartError> {
    let session = {
      let mut sessions = self.sessions.write().await;
      if let Some(existing) = sessions.get(&user) {
        let remaining = existing.remaining();
        if !remaining.is_zero() {
          return Err(StartError::AlreadyActive { remaining_minutes: remaining.as_secs() / 60 });
        }
      }
      let session = PomodoroSession { id: Uuid::new_v4(), kind, started: Instant::now() };
      sessions.insert(user, session.clone());
      session
    };

    let this = self.clone();
    let id = session.id;
    tokio::spawn(async move {
      sleep(kind.duration()).await;
      this.finish(user, id, sink.as_ref()).await;
    });

    info!(target: "study_bot", %user, minutes = kind.minutes(), "Pomodoro started");
    Ok(session)
  }

  async fn finish(&self, user: UserId, id: Uuid, sink: &dyn PresentationSink) {
    let finished = {
      let mut sessions = self.sessions.write().await;
      match sessions.get(&user) {
        Some(s) if s.id == id => sessions.remove(&user),
        _ => None,
      }
    };
    // Stopped or replaced in the meantime.
    let Some(session) = finished else { return };

    if session.kind == PomodoroKind::Study {
      self.credit(user, session.kind.minutes()).await;
    }
    info!(target: "study_bot", %user, kind = ?session.kind, "Pomodoro finished");
    let view = View::PomodoroFinished { pomodoro: session.kind, minutes: session.kind.minutes() };
    BestEffort::settle("pomodoro_notice", sink.send(view).await);
  }

  /// Stop the user's timer. Returns the stopped session and its elapsed minutes.
  #[instrument(level = "info", skip(self), fields(%user))]
  pub async fn stop(&self, user: UserId) -> Option<(PomodoroSession, u64)> {
    let session = self.sessions.write().await.remove(&user)?;
    let elapsed = session.elapsed_minutes();
    if session.kind == PomodoroKind::Study && elapsed > 0 {
      self.credit(user, elapsed).await;
    }
    Some((session, elapsed))
  }

  async fn credit(&self, user: UserId, minutes: u64) {
    let Some(mut progress) = BestEffort::settle("load_progress", self.store.get(user, None).await) else {
      return;
    };
    progress.study_time_minutes += i64::try_from(minutes).unwrap_or(0);
    BestEffort::settle("save_progress", self.store.put(user, &progress).await);
  }
}
