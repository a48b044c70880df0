//! One live question: its owner, the record being asked and the phase word
//! that decides who gets to move it forward.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

use super::SubmitOutcome;
use crate::domain::{Choice, Difficulty, QuestionRecord, UserId};
use crate::view::{MessageHandle, Urgency, View};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
  AwaitingAnswer = 0,
  Scoring = 1,
  TimedOut = 2,
}

impl Phase {
  fn from_u8(v: u8) -> Self {
    match v {
      0 => Phase::AwaitingAnswer,
      1 => Phase::Scoring,
      _ => Phase::TimedOut,
    }
  }
}

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct QuizSession {
  pub handle: MessageHandle,
  pub owner: UserId,
  /// 1-based position in the run.
  pub index: usize,
  pub total: usize,
  pub certification: String,
  pub difficulty: Difficulty,
  pub question: QuestionRecord,
  phase: AtomicU8,
  answer_tx: Mutex<Option<oneshot::Sender<Choice>>>,
  countdown: Mutex<Option<JoinHandle<()>>>,
}

impl QuizSession {
  /// Build a session in `AwaitingAnswer`. The receiver yields the winning choice.
  pub fn new(
    handle: MessageHandle,
    owner: UserId,
    index: usize,
    total: usize,
    certification: impl Into<String>,
    difficulty: Difficulty,
    question: QuestionRecord,
  ) -> (Arc<Self>, oneshot::Receiver<Choice>) {
    let (tx, rx) = oneshot::channel();
    let session = Self {
      handle,
      owner,
      index,
      total,
      certification: certification.into(),
      difficulty,
      question,
      phase: AtomicU8::new(Phase::AwaitingAnswer as u8),
      answer_tx: Mutex::new(Some(tx)),
      countdown: Mutex::new(None),
    };
    (Arc::new(session), rx)
  }

  pub fn phase(&self) -> Phase {
    Phase::from_u8(self.phase.load(Ordering::Acquire))
  }

  pub fn is_awaiting(&self) -> bool {
    self.phase() == Phase::AwaitingAnswer
  }

  fn transition(&self, to: Phase) -> Result<(), Phase> {
    self
      .phase
      .compare_exchange(Phase::AwaitingAnswer as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
      .map(|_| ())
      .map_err(Phase::from_u8)
  }

  /// Try to claim this question for `user`. At most one call ever returns `Accepted`.
  pub fn try_submit(&self, user: UserId, choice: Choice) -> SubmitOutcome {
    match self.phase() {
      Phase::Scoring => return SubmitOutcome::AlreadyAnswered,
      Phase::TimedOut if user == self.owner => return SubmitOutcome::Expired,
      _ => {}
    }
    if user != self.owner {
      return SubmitOutcome::NotYourQuestion;
    }

    match self.transition(Phase::Scoring) {
      Ok(()) => {
        if let Some(tx) = locked(&self.answer_tx).take() {
          if tx.send(choice).is_err() {
            debug!(target: "quiz", handle = %self.handle, "Answer accepted after the driver stopped listening");
          }
        }
        SubmitOutcome::Accepted
      }
      Err(Phase::Scoring) => SubmitOutcome::AlreadyAnswered,
      Err(_) => SubmitOutcome::Expired,
    }
  }

  /// Move to `TimedOut`; false if an answer got there first.
  pub fn try_expire(&self) -> bool {
    self.transition(Phase::TimedOut).is_ok()
  }

  pub fn set_countdown(&self, task: JoinHandle<()>) {
    *locked(&self.countdown) = Some(task);
  }

  pub fn cancel_countdown(&self) {
    if let Some(task) = locked(&self.countdown).take() {
      task.abort();
    }
  }

  pub fn question_view(&self, remaining_secs: u64) -> View {
    question_view(
      self.index,
      self.total,
      &self.certification,
      self.difficulty,
      &self.question,
      remaining_secs,
    )
  }
}

impl Drop for QuizSession {
  fn drop(&mut self) {
    self.cancel_countdown();
  }
}

pub fn question_view(
  index: usize,
  total: usize,
  certification: &str,
  difficulty: Difficulty,
  q: &QuestionRecord,
  remaining_secs: u64,
) -> View {
  View::Question {
    index,
    total,
    certification: certification.to_string(),
    difficulty,
    question: q.question.clone(),
    options: q.options.clone(),
    remaining_secs,
    urgency: Urgency::for_remaining(remaining_secs),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::quiz::testing::question;

  fn session(owner: UserId) -> (Arc<QuizSession>, oneshot::Receiver<Choice>) {
    QuizSession::new(MessageHandle::new(), owner, 1, 1, "A+", Difficulty::Intermediate, question(1, "B"))
  }

  #[test]
  fn first_submit_wins_and_second_is_rejected() {
    let (s, mut rx) = session(7);
    assert_eq!(s.try_submit(7, Choice::B), SubmitOutcome::Accepted);
    assert_eq!(s.phase(), Phase::Scoring);
    assert_eq!(rx.try_recv().unwrap(), Choice::B);

    assert_eq!(s.try_submit(7, Choice::C), SubmitOutcome::AlreadyAnswered);
    assert_eq!(s.try_submit(8, Choice::C), SubmitOutcome::AlreadyAnswered);
  }

  #[test]
  fn non_owner_is_rejected_without_moving_phase() {
    let (s, mut rx) = session(7);
    assert_eq!(s.try_submit(8, Choice::A), SubmitOutcome::NotYourQuestion);
    assert!(s.is_awaiting());
    assert!(rx.try_recv().is_err());
  }

  #[test]
  fn expire_and_submit_are_exclusive() {
    let (s, _rx) = session(7);
    assert!(s.try_expire());
    assert!(!s.try_expire());
    assert_eq!(s.try_submit(7, Choice::B), SubmitOutcome::Expired);

    let (s, _rx) = session(7);
    assert_eq!(s.try_submit(7, Choice::D), SubmitOutcome::Accepted);
    assert!(!s.try_expire());
    assert_eq!(s.phase(), Phase::Scoring);
  }

  #[test]
  fn question_view_carries_urgency() {
    let (s, _rx) = session(1);
    match s.question_view(10) {
      View::Question { urgency, remaining_secs, options, .. } => {
        assert_eq!(urgency, Urgency::Critical);
        assert_eq!(remaining_secs, 10);
        assert_eq!(options.len(), 4);
      }
      other => panic!("unexpected view {:?}", other),
    }
  }
}
