//! Countdown re-render task. Purely cosmetic: the authoritative timeout lives
//! in the run driver.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

use super::{QuizSession, COUNTDOWN_STEP, QUESTION_TIMEOUT};
use crate::error::PresentationError;
use crate::ports::PresentationSink;

/// Remaining-seconds checkpoints: 60, 55, ..., 5.
pub fn checkpoints() -> impl Iterator<Item = u64> {
  let step = COUNTDOWN_STEP.as_secs();
  (1..=QUESTION_TIMEOUT.as_secs() / step).rev().map(move |k| k * step)
}

pub fn spawn_countdown(session: Arc<QuizSession>, sink: Arc<dyn PresentationSink>) -> JoinHandle<()> {
  tokio::spawn(run_countdown(session, sink))
}

async fn run_countdown(session: Arc<QuizSession>, sink: Arc<dyn PresentationSink>) {
  for remaining in checkpoints() {
    if !session.is_awaiting() {
      return;
    }
    match sink.edit(&session.handle, session.question_view(remaining)).await {
      Ok(()) => {}
      Err(PresentationError::MessageGone) => {
        debug!(target: "quiz", handle = %session.handle, "Question message gone; countdown stopped");
        return;
      }
      Err(e) => debug!(target: "quiz", handle = %session.handle, error = %e, "Countdown edit failed"),
    }
    if !session.is_awaiting() {
      return;
    }
    sleep(COUNTDOWN_STEP).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;
  use crate::quiz::testing::{question, RecordingSink};
  use crate::view::{MessageHandle, Urgency, View};

  fn urgencies(views: &[View]) -> Vec<(u64, Urgency)> {
    views
      .iter()
      .filter_map(|v| match v {
        View::Question { remaining_secs, urgency, .. } => Some((*remaining_secs, *urgency)),
        _ => None,
      })
      .collect()
  }

  #[test]
  fn checkpoints_step_down_by_five() {
    let c: Vec<u64> = checkpoints().collect();
    assert_eq!(c.first(), Some(&60));
    assert_eq!(c.last(), Some(&5));
    assert_eq!(c.len(), 12);
  }

  #[tokio::test(start_paused = true)]
  async fn renders_every_checkpoint_with_bands() {
    let sink = Arc::new(RecordingSink::default());
    let (s, _rx) = QuizSession::new(MessageHandle::new(), 1, 1, 1, "A+", Difficulty::Beginner, question(1, "A"));
    spawn_countdown(s.clone(), sink.clone()).await.unwrap();

    let seen = urgencies(&sink.edits_of(&s.handle));
    assert_eq!(seen.len(), 12);
    assert_eq!(seen[0], (60, Urgency::Calm));
    assert_eq!(seen[5], (35, Urgency::Calm));
    assert_eq!(seen[6], (30, Urgency::Warning));
    assert_eq!(seen[9], (15, Urgency::Warning));
    assert_eq!(seen[10], (10, Urgency::Critical));
    assert_eq!(seen[11], (5, Urgency::Critical));
  }

  #[tokio::test(start_paused = true)]
  async fn stops_once_the_question_is_answered() {
    let sink = Arc::new(RecordingSink::default());
    let (s, _rx) = QuizSession::new(MessageHandle::new(), 1, 1, 1, "A+", Difficulty::Beginner, question(1, "A"));
    let task = spawn_countdown(s.clone(), sink.clone());

    sleep(std::time::Duration::from_secs(12)).await;
    s.try_submit(1, crate::domain::Choice::A);
    task.await.unwrap();

    // 60, 55, 50 rendered before the answer landed.
    assert_eq!(sink.edits_of(&s.handle).len(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn message_gone_ends_the_loop_but_transport_errors_do_not() {
    let sink = Arc::new(RecordingSink::default());
    sink.fail_edits_with(PresentationError::MessageGone);
    let (s, _rx) = QuizSession::new(MessageHandle::new(), 1, 1, 1, "A+", Difficulty::Beginner, question(1, "A"));
    let start = tokio::time::Instant::now();
    spawn_countdown(s.clone(), sink.clone()).await.unwrap();
    assert!(start.elapsed() < COUNTDOWN_STEP);

    let sink = Arc::new(RecordingSink::default());
    sink.fail_edits_with(PresentationError::Transport("503".into()));
    let start = tokio::time::Instant::now();
    spawn_countdown(s.clone(), sink.clone()).await.unwrap();
    assert!(start.elapsed() >= QUESTION_TIMEOUT);
  }
}
