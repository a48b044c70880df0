//! End-to-end practice run through the command layer with paused time:
//! answer correctly, let one question expire, answer incorrectly.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use cert_study_bot::commands::{self, Caller};
use cert_study_bot::config::BotConfig;
use cert_study_bot::domain::{Certification, Choice, Difficulty, Flashcard, QuestionRecord};
use cert_study_bot::error::{AiError, PresentationError};
use cert_study_bot::ports::{PresentationSink, QuestionGenerator, TopicClassifier};
use cert_study_bot::state::AppState;
use cert_study_bot::store::memory::MemoryStore;
use cert_study_bot::store::{PerformanceStore, ProgressStore};
use cert_study_bot::view::{MessageHandle, View};

struct ThreeQuestions;

#[async_trait]
impl QuestionGenerator for ThreeQuestions {
  async fn generate_questions(&self, _: &Certification, _: Difficulty, count: usize) -> Result<Vec<QuestionRecord>, AiError> {
    (1..=count)
      .map(|n| {
        QuestionRecord::new(
          format!("Which port does service {} use?", n),
          vec![("A", "22"), ("B", "53"), ("C", "80"), ("D", "443")],
          "A",
          "SSH listens on 22.",
        )
        .map_err(|e| AiError::Invalid(e.to_string()))
      })
      .collect()
  }

  async fn generate_flashcards(&self, _: &Certification, _: &str, _: usize) -> Result<Vec<Flashcard>, AiError> {
    Ok(Vec::new())
  }

  async fn explain_topic(&self, _: &Certification, _: &str) -> Result<String, AiError> {
    Ok(String::new())
  }

  async fn study_recommendations(&self, _: &Certification, _: &[String]) -> Result<String, AiError> {
    Ok(String::new())
  }
}

struct Ports;

#[async_trait]
impl TopicClassifier for Ports {
  async fn classify(&self, _: &str, _: &Certification) -> String {
    "Networking Fundamentals".into()
  }
}

#[derive(Default)]
struct Transcript {
  sent: Mutex<Vec<(MessageHandle, View)>>,
  edits: Mutex<Vec<(MessageHandle, View)>>,
}

#[async_trait]
impl PresentationSink for Transcript {
  async fn send(&self, view: View) -> Result<MessageHandle, PresentationError> {
    let handle = MessageHandle::new();
    self.sent.lock().unwrap().push((handle, view));
    Ok(handle)
  }

  async fn edit(&self, handle: &MessageHandle, view: View) -> Result<(), PresentationError> {
    self.edits.lock().unwrap().push((*handle, view));
    Ok(())
  }
}

impl Transcript {
  fn question(&self, nth: usize) -> Option<MessageHandle> {
    self
      .sent
      .lock()
      .unwrap()
      .iter()
      .filter(|(_, v)| matches!(v, View::Question { .. }))
      .nth(nth)
      .map(|(h, _)| *h)
  }

  fn completion(&self) -> Option<View> {
    self.sent.lock().unwrap().iter().map(|(_, v)| v.clone()).find(|v| matches!(v, View::Completion { .. }))
  }

  fn edits_of(&self, handle: &MessageHandle) -> Vec<View> {
    self.edits.lock().unwrap().iter().filter(|(h, _)| h == handle).map(|(_, v)| v.clone()).collect()
  }
}

async fn wait_for<T>(mut poll: impl FnMut() -> Option<T>) -> T {
  for _ in 0..2_000 {
    if let Some(v) = poll() {
      return v;
    }
    sleep(Duration::from_millis(100)).await;
  }
  panic!("condition never reached");
}

/// Press a button on the `nth` question once it accepts answers.
async fn answer(state: &AppState, sink: &Transcript, caller: &Caller, nth: usize, choice: &str) -> MessageHandle {
  let handle = wait_for(|| sink.question(nth)).await;
  for _ in 0..50 {
    if commands::submit_answer(state, caller, &handle, choice).await.is_none() {
      return handle;
    }
    sleep(Duration::from_millis(100)).await;
  }
  panic!("question {} never accepted an answer", nth + 1);
}

#[tokio::test(start_paused = true)]
async fn correct_timeout_incorrect_nets_zero() {
  let store = Arc::new(MemoryStore::new());
  let generator: Arc<dyn QuestionGenerator> = Arc::new(ThreeQuestions);
  let state = AppState::with_collaborators(BotConfig::default(), store.clone(), Some(generator), Arc::new(Ports));
  let sink = Arc::new(Transcript::default());
  let ana = Caller::new(11, "ana");

  assert!(matches!(commands::select_cert(&state, &ana, "Network+").await, View::CertSelected { .. }));
  let ready = commands::practice(&state, &ana, Some(Difficulty::Beginner), Some(3), sink.clone()).await;
  assert!(matches!(ready, View::PracticeReady { count: 3, .. }));

  let first = answer(&state, &sink, &ana, 0, "a").await;
  let second = wait_for(|| sink.question(1)).await;
  let third = answer(&state, &sink, &ana, 2, "C").await;

  let summary = wait_for(|| sink.completion()).await;
  match summary {
    View::Completion { questions, study_score, total_questions, accuracy, .. } => {
      assert_eq!((questions, study_score, total_questions), (3, 0, 3));
      assert_eq!(accuracy, 33.3);
    }
    other => panic!("unexpected summary {:?}", other),
  }

  assert!(sink.edits_of(&first).iter().any(|v| matches!(v, View::Result { is_correct: true, score_change: 1, .. })));
  assert!(sink.edits_of(&second).iter().any(|v| matches!(v, View::Timeout { correct_answer: Choice::A, .. })));
  assert!(sink
    .edits_of(&third)
    .iter()
    .any(|v| matches!(v, View::Result { chosen: Choice::C, score_change: -1, study_score: Some(0), .. })));

  let progress = store.get(11, None).await.unwrap();
  assert_eq!((progress.correct_answers, progress.study_score), (1, 0));
  let topic = store.topic(11, "Network+", "Networking Fundamentals").await.unwrap().unwrap();
  assert_eq!((topic.questions_attempted, topic.questions_correct), (2, 1));

  // Late presses on the expired question find nothing live.
  sleep(Duration::from_secs(5)).await;
  assert!(commands::submit_answer(&state, &ana, &second, "A").await.is_some());
  assert!(!state.sessions.has_active_run(11).await);
}
