//! Run driver and live-session registry.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::countdown::spawn_countdown;
use super::session::question_view;
use super::{
  QuizRun, QuizSession, SubmitOutcome, ANSWER_ADVANCE_DELAY, QUESTION_TIMEOUT, RUN_START_DELAY, TIMEOUT_ADVANCE_DELAY,
};
use crate::domain::{Certification, Choice, QuestionHistoryEntry, UserId};
use crate::error::BestEffort;
use crate::ports::{PresentationSink, TopicClassifier};
use crate::store::Store;
use crate::tracker::NOMINAL_RESPONSE_SECS;
use crate::view::{MessageHandle, View};

#[derive(Clone)]
pub struct SessionManager {
  store: Arc<dyn Store>,
  classifier: Arc<dyn TopicClassifier>,
  live: Arc<RwLock<HashMap<MessageHandle, Arc<QuizSession>>>>,
  runs: Arc<RwLock<HashSet<UserId>>>,
}

impl SessionManager {
  pub fn new(store: Arc<dyn Store>, classifier: Arc<dyn TopicClassifier>) -> Self {
    Self {
      store,
      classifier,
      live: Arc::new(RwLock::new(HashMap::new())),
      runs: Arc::new(RwLock::new(HashSet::new())),
    }
  }

  /// Reserve the single run slot of `user`. False if a run is already active.
  pub async fn try_reserve(&self, user: UserId) -> bool {
    self.runs.write().await.insert(user)
  }

  pub async fn release(&self, user: UserId) {
    self.runs.write().await.remove(&user);
  }

  pub async fn has_active_run(&self, user: UserId) -> bool {
    self.runs.read().await.contains(&user)
  }

  pub async fn live_sessions(&self) -> usize {
    self.live.read().await.len()
  }

  /// Route an answer button press to the question it belongs to.
  #[instrument(level = "debug", skip(self), fields(%handle, %user, %choice))]
  pub async fn submit_answer(&self, handle: &MessageHandle, user: UserId, choice: Choice) -> SubmitOutcome {
    let session = { self.live.read().await.get(handle).cloned() };
    let outcome = match session {
      Some(s) => s.try_submit(user, choice),
      None => SubmitOutcome::Unknown,
    };
    debug!(target: "quiz", ?outcome, "Answer submission");
    outcome
  }

  /// Spawn the driver for a run. The caller must hold the user's reservation;
  /// it is released when the driver finishes.
  pub fn start_run(&self, run: QuizRun, sink: Arc<dyn PresentationSink>) -> JoinHandle<()> {
    let this = self.clone();
    tokio::spawn(async move {
      let user = run.user;
      this.drive(run, sink).await;
      this.release(user).await;
    })
  }

  #[instrument(level = "info", skip(self, run, sink), fields(user = run.user, cert = %run.certification.code, questions = run.questions.len()))]
  async fn drive(&self, run: QuizRun, sink: Arc<dyn PresentationSink>) {
    let QuizRun { user, certification, difficulty, questions } = run;
    let total = questions.len();
    let mut queue: VecDeque<_> = questions.into();
    let mut index = 0;

    sleep(RUN_START_DELAY).await;

    while let Some(question) = queue.pop_front() {
      index += 1;
      let first = question_view(index, total, &certification.code, difficulty, &question, QUESTION_TIMEOUT.as_secs());
      let handle = match sink.send(first).await {
        Ok(h) => h,
        Err(e) => {
          warn!(target: "quiz", %user, index, error = %e, "Could not deliver question; abandoning run");
          return;
        }
      };

      if index == 1 {
        self.count_started(user, total).await;
      }

      let (session, mut rx) = QuizSession::new(handle, user, index, total, &certification.code, difficulty, question);
      self.live.write().await.insert(handle, session.clone());
      session.set_countdown(spawn_countdown(session.clone(), sink.clone()));
      debug!(target: "quiz", %user, index, %handle, "Question live");

      let answered = tokio::select! {
        res = &mut rx => res.ok(),
        _ = sleep(QUESTION_TIMEOUT) => {
          if session.try_expire() {
            None
          } else {
            // An answer won the race; its choice is already in flight.
            (&mut rx).await.ok()
          }
        }
      };
      session.cancel_countdown();

      match answered {
        Some(choice) => {
          self.score(&session, &certification, choice, sink.as_ref()).await;
          sleep(ANSWER_ADVANCE_DELAY).await;
        }
        None => {
          self.disclose(&session, sink.as_ref()).await;
          sleep(TIMEOUT_ADVANCE_DELAY).await;
        }
      }

      self.live.write().await.remove(&handle);
    }

    self.complete(user, &certification, total, sink.as_ref()).await;
  }

  /// Lifetime counter: every requested question counts once the run is visibly under way.
  async fn count_started(&self, user: UserId, total: usize) {
    if let Some(mut progress) = BestEffort::settle("load_progress", self.store.get(user, None).await) {
      progress.total_questions += i64::try_from(total).unwrap_or(0);
      BestEffort::settle("save_progress", self.store.put(user, &progress).await);
    }
  }

  async fn score(&self, session: &QuizSession, certification: &Certification, choice: Choice, sink: &dyn PresentationSink) {
    let user = session.owner;
    let correct = choice == session.question.answer;

    let (score_change, study_score) = match BestEffort::settle("load_progress", self.store.get(user, None).await) {
      Some(mut progress) => {
        let delta = progress.record_outcome(correct);
        BestEffort::settle("save_progress", self.store.put(user, &progress).await);
        (delta, Some(progress.study_score))
      }
      // Without a loaded record a write would clobber the stored one.
      None => (if correct { 1 } else { -1 }, None),
    };

    let topic = self.classifier.classify(&session.question.question, certification).await;
    BestEffort::settle(
      "record_attempt",
      self
        .store
        .record_attempt(user, &certification.code, &topic, correct, NOMINAL_RESPONSE_SECS)
        .await,
    );

    let entry = QuestionHistoryEntry {
      user_id: user,
      certification: certification.code.clone(),
      difficulty: session.difficulty,
      question_text: session.question.question.clone(),
      user_answer: choice,
      correct_answer: session.question.answer,
      is_correct: correct,
      response_time_seconds: NOMINAL_RESPONSE_SECS as i64,
      created_at: Utc::now(),
    };
    BestEffort::settle("append_history", self.store.append_history(&entry).await);

    info!(target: "quiz", %user, index = session.index, %choice, %correct, %topic, score_change, "Answer scored");

    let view = View::Result {
      index: session.index,
      total: session.total,
      chosen: choice,
      correct_answer: session.question.answer,
      is_correct: correct,
      explanation: session.question.explanation.clone(),
      score_change,
      study_score,
    };
    if let Err(e) = sink.edit(&session.handle, view).await {
      debug!(target: "quiz", handle = %session.handle, error = %e, "Result edit failed");
    }
  }

  async fn disclose(&self, session: &QuizSession, sink: &dyn PresentationSink) {
    info!(target: "quiz", user = session.owner, index = session.index, "Question timed out");
    let answer = session.question.answer;
    let view = View::Timeout {
      index: session.index,
      total: session.total,
      correct_answer: answer,
      correct_text: session.question.options.get(&answer).cloned().unwrap_or_default(),
      explanation: session.question.explanation.clone(),
    };
    if let Err(e) = sink.edit(&session.handle, view).await {
      debug!(target: "quiz", handle = %session.handle, error = %e, "Timeout edit failed");
    }
  }

  async fn complete(&self, user: UserId, certification: &Certification, questions: usize, sink: &dyn PresentationSink) {
    let Some(progress) = BestEffort::settle("load_progress", self.store.get(user, None).await) else {
      return;
    };
    info!(target: "quiz", %user, study_score = progress.study_score, total_questions = progress.total_questions, "Run complete");
    let view = View::Completion {
      certification: certification.code.clone(),
      questions,
      study_score: progress.study_score,
      total_questions: progress.total_questions,
      accuracy: crate::util::percent_1dp(progress.correct_answers, progress.total_questions),
    };
    if let Err(e) = sink.send(view).await {
      debug!(target: "quiz", %user, error = %e, "Completion summary not delivered");
    }
  }
}
