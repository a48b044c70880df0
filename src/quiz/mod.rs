//! Timed practice-quiz engine.
//!
//! A run is an ordered list of questions for one user. One driver task walks
//! the run: deliver a question, race the first valid answer against the
//! 60-second timeout, score (or disclose), pause, then advance. A separate
//! countdown task per question re-renders the remaining time.
//!
//! Phases of a live question (`session::Phase`):
//!
//! ```text
//!   AwaitingAnswer --submit (CAS)--> Scoring  --> advance | complete
//!   AwaitingAnswer --timeout (CAS)-> TimedOut --> advance | complete
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::domain::{Certification, Difficulty, QuestionRecord, UserId};

pub mod countdown;
pub mod engine;
pub mod session;

pub use engine::SessionManager;
pub use session::{Phase, QuizSession};

/// How long a question accepts answers.
pub const QUESTION_TIMEOUT: Duration = Duration::from_secs(60);
/// Interval between countdown checkpoints.
pub const COUNTDOWN_STEP: Duration = Duration::from_secs(5);
/// Pause after the announcement before the first question.
pub const RUN_START_DELAY: Duration = Duration::from_secs(1);
/// Pause after a scored answer before the next question.
pub const ANSWER_ADVANCE_DELAY: Duration = Duration::from_secs(2);
/// Pause after a timeout before the next question.
pub const TIMEOUT_ADVANCE_DELAY: Duration = Duration::from_secs(3);

/// One practice run, ready to drive.
#[derive(Clone, Debug)]
pub struct QuizRun {
  pub user: UserId,
  pub certification: Certification,
  pub difficulty: Difficulty,
  pub questions: Vec<QuestionRecord>,
}

/// Result of an answer submission. Everything except `Accepted` is a rejection
/// with no side effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
  Accepted,
  AlreadyAnswered,
  NotYourQuestion,
  Expired,
  Unknown,
}

impl SubmitOutcome {
  /// User-facing rejection text.
  pub fn rejection(&self) -> Option<&'static str> {
    match self {
      SubmitOutcome::Accepted => None,
      SubmitOutcome::AlreadyAnswered => Some("You already answered this question!"),
      SubmitOutcome::NotYourQuestion => Some("This isn't your question!"),
      SubmitOutcome::Expired => Some("Time's up! This question has expired."),
      SubmitOutcome::Unknown => Some("This question is no longer active."),
    }
  }
}

#[cfg(test)]
pub(crate) mod testing {
  //! Recording sink and fixed classifier shared by the engine tests.

  use std::sync::Mutex;

  use async_trait::async_trait;

  use crate::domain::{Certification, QuestionRecord};
  use crate::error::PresentationError;
  use crate::ports::{PresentationSink, TopicClassifier};
  use crate::view::{MessageHandle, View};

  #[derive(Clone, Debug)]
  pub enum Event {
    Sent(MessageHandle, View),
    Edited(MessageHandle, View),
  }

  #[derive(Default)]
  pub struct RecordingSink {
    pub events: Mutex<Vec<Event>>,
    pub edit_error: Mutex<Option<PresentationError>>,
  }

  impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
      self.events.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(MessageHandle, View)> {
      self
        .events()
        .into_iter()
        .filter_map(|e| match e {
          Event::Sent(h, v) => Some((h, v)),
          Event::Edited(..) => None,
        })
        .collect()
    }

    pub fn edits_of(&self, handle: &MessageHandle) -> Vec<View> {
      self
        .events()
        .into_iter()
        .filter_map(|e| match e {
          Event::Edited(h, v) if &h == handle => Some(v),
          _ => None,
        })
        .collect()
    }

    pub fn fail_edits_with(&self, err: PresentationError) {
      *self.edit_error.lock().unwrap() = Some(err);
    }
  }

  #[async_trait]
  impl PresentationSink for RecordingSink {
    async fn send(&self, view: View) -> Result<MessageHandle, PresentationError> {
      let h = MessageHandle::new();
      self.events.lock().unwrap().push(Event::Sent(h, view));
      Ok(h)
    }

    async fn edit(&self, handle: &MessageHandle, view: View) -> Result<(), PresentationError> {
      if let Some(e) = self.edit_error.lock().unwrap().clone() {
        return Err(e);
      }
      self.events.lock().unwrap().push(Event::Edited(*handle, view));
      Ok(())
    }
  }

  pub struct FixedClassifier(pub &'static str);

  #[async_trait]
  impl TopicClassifier for FixedClassifier {
    async fn classify(&self, _question: &str, _cert: &Certification) -> String {
      self.0.to_string()
    }
  }

  pub fn cert() -> Certification {
    Certification {
      code: "Network+".into(),
      name: "CompTIA Network+".into(),
      description: "Networking".into(),
      domains: vec!["Networking Fundamentals".into(), "Network Security".into()],
    }
  }

  /// Question whose correct answer is `answer`.
  pub fn question(n: usize, answer: &str) -> QuestionRecord {
    QuestionRecord::new(
      format!("Question {}?", n),
      vec![("A", "alpha"), ("B", "bravo"), ("C", "charlie"), ("D", "delta")],
      answer,
      format!("Because of reason {}.", n),
    )
    .unwrap()
  }
}
