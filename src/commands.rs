//! Bot command handlers shared by the WebSocket gateway and the HTTP API.
//!
//! Every handler takes the calling user and returns a `View`. Rejections are
//! ephemeral notices, never errors; collaborator failures become error notices.

use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::achievements::check_achievements;
use crate::domain::{display_name, Certification, Choice, Difficulty, SkillTier, UserId, UserProgress};
use crate::error::BestEffort;
use crate::flashcards::MAX_FLASHCARDS_PER_REQUEST;
use crate::pomodoro::{PomodoroKind, StartError};
use crate::ports::{PresentationSink, QuestionGenerator, GENERAL_TOPIC};
use crate::quiz::{QuizRun, SubmitOutcome};
use crate::state::AppState;
use crate::toolkit::{analyze_password, sha256_hex};
use crate::util::{clamp_count, percent_1dp};
use crate::view::{CommandHelp, MessageHandle, View};

pub const MAX_PRACTICE_QUESTIONS: usize = 5;
pub const DEFAULT_FLASHCARDS: i64 = 3;
pub const WEAK_SPOT_LIMIT: usize = 5;
pub const STRENGTH_LIMIT: usize = 3;
pub const BOARD_LIMIT: usize = 5;

pub const NO_RECOMMENDATIONS: &str = "Continue practicing with `/practice` to unlock AI recommendations!";
pub const RECOMMENDATIONS_FAILED: &str = "Focus on your identified weak spots with targeted practice sessions.";

const AI_UNAVAILABLE: &str = "AI features are currently unavailable. Please check the OpenAI API configuration.";
const STORE_UNAVAILABLE: &str = "Your study data is unavailable right now. Please try again shortly.";

/// The user invoking a command.
#[derive(Clone, Debug, Deserialize)]
pub struct Caller {
  pub id: UserId,
  #[serde(default)]
  pub name: Option<String>,
}

impl Caller {
  pub fn new(id: UserId, name: impl Into<String>) -> Self {
    Self { id, name: Some(name.into()) }
  }
}

async fn load_progress(state: &AppState, caller: &Caller) -> Result<UserProgress, View> {
  state.store.get(caller.id, caller.name.as_deref()).await.map_err(|e| {
    error!(target: "study_bot", user = caller.id, error = %e, "Could not load progress");
    View::ephemeral(STORE_UNAVAILABLE)
  })
}

fn selected_certification<'a>(state: &'a AppState, progress: &UserProgress) -> Result<&'a Certification, View> {
  progress
    .selected_certification
    .as_deref()
    .and_then(|code| state.bot.certification(code))
    .ok_or_else(|| View::ephemeral("Please select a certification first using `/selectcert`!"))
}

fn generator(state: &AppState) -> Result<&Arc<dyn QuestionGenerator>, View> {
  state.generator.as_ref().ok_or_else(|| View::ephemeral(AI_UNAVAILABLE))
}

#[instrument(level = "info", skip(state))]
pub fn certs(state: &AppState) -> View {
  View::Certifications { certifications: state.bot.certifications.clone() }
}

#[instrument(level = "info", skip(state), fields(user = caller.id))]
pub async fn select_cert(state: &AppState, caller: &Caller, code: &str) -> View {
  let Some(cert) = state.bot.certification(code) else {
    return View::ephemeral(format!("Unknown certification `{}`. Use `/certs` to see the available tracks.", code));
  };
  let mut progress = match load_progress(state, caller).await {
    Ok(p) => p,
    Err(v) => return v,
  };
  progress.selected_certification = Some(cert.code.clone());
  if let Err(e) = state.store.put(caller.id, &progress).await {
    error!(target: "study_bot", user = caller.id, error = %e, "Could not save certification choice");
    return View::ephemeral(STORE_UNAVAILABLE);
  }
  info!(target: "study_bot", user = caller.id, cert = %cert.code, "Certification selected");
  View::CertSelected { certification: cert.clone() }
}

#[instrument(level = "info", skip(state), fields(user = caller.id))]
pub async fn study_stats(state: &AppState, caller: &Caller) -> View {
  let progress = match load_progress(state, caller).await {
    Ok(p) => p,
    Err(v) => return v,
  };
  if progress.selected_certification.is_none() {
    return View::ephemeral("No study data found. Start studying with `/selectcert` to track your progress!");
  }
  let achievements = BestEffort::settle("load_achievements", state.store.achievements(caller.id).await).unwrap_or_default();
  View::Stats {
    username: display_name(caller.id, progress.username.as_deref().or(caller.name.as_deref())),
    certification: progress.selected_certification.clone(),
    total_questions: progress.total_questions,
    correct_answers: progress.correct_answers,
    accuracy: percent_1dp(progress.correct_answers, progress.total_questions),
    study_score: progress.study_score,
    study_streak: progress.study_streak,
    study_time_minutes: progress.study_time_minutes,
    flashcards: state.flashcards.count(caller.id).await,
    skill_tier: SkillTier::for_progress(&progress),
    achievements,
  }
}

/// Difficulty served when the caller did not pick one: driven by the weakest topic.
async fn adaptive_for(state: &AppState, user: UserId, certification: &str) -> Difficulty {
  let weakest = BestEffort::settle("weak_spots", state.store.weak_spots(user, certification, 1).await)
    .and_then(|mut rows| rows.pop());
  match weakest {
    Some(row) => BestEffort::settle("adaptive_difficulty", state.store.adaptive_difficulty(user, certification, &row.topic).await)
      .unwrap_or_default(),
    None => Difficulty::default(),
  }
}

/// Generate questions and start a timed run. Questions are delivered through `sink`.
#[instrument(level = "info", skip(state, sink), fields(user = caller.id))]
pub async fn practice(
  state: &AppState,
  caller: &Caller,
  difficulty: Option<Difficulty>,
  count: Option<i64>,
  sink: Arc<dyn PresentationSink>,
) -> View {
  let progress = match load_progress(state, caller).await {
    Ok(p) => p,
    Err(v) => return v,
  };
  let cert = match selected_certification(state, &progress) {
    Ok(c) => c.clone(),
    Err(v) => return v,
  };
  let generator = match generator(state) {
    Ok(g) => g.clone(),
    Err(v) => return v,
  };
  let count = clamp_count(count.unwrap_or(1), MAX_PRACTICE_QUESTIONS);

  if !state.sessions.try_reserve(caller.id).await {
    return View::ephemeral("You already have a practice session running. Finish it before starting another.");
  }

  let difficulty = match difficulty {
    Some(d) => d,
    None => adaptive_for(state, caller.id, &cert.code).await,
  };
  let unlocked =
    BestEffort::settle("check_achievements", check_achievements(state.store.as_ref(), caller.id, &cert.code).await)
      .unwrap_or_default();

  let questions = match generator.generate_questions(&cert, difficulty, count).await {
    Ok(qs) => qs,
    Err(e) => {
      state.sessions.release(caller.id).await;
      warn!(target: "study_bot", user = caller.id, error = %e, "Practice generation failed");
      return View::ephemeral(format!("Failed to generate questions: {}", e));
    }
  };

  info!(target: "study_bot", user = caller.id, cert = %cert.code, %difficulty, count, "Practice run starting");
  let run = QuizRun { user: caller.id, certification: cert.clone(), difficulty, questions };
  state.sessions.start_run(run, sink);

  View::PracticeReady { certification: cert.code, difficulty, count, unlocked }
}

/// Route an answer press. `None` means accepted; the question message itself is updated.
#[instrument(level = "info", skip(state), fields(user = caller.id))]
pub async fn submit_answer(state: &AppState, caller: &Caller, handle: &MessageHandle, choice: &str) -> Option<View> {
  let Some(choice) = Choice::parse(choice) else {
    return Some(View::ephemeral("Answer must be one of A, B, C or D."));
  };
  let outcome = state.sessions.submit_answer(handle, caller.id, choice).await;
  match outcome {
    SubmitOutcome::Accepted => None,
    other => other.rejection().map(View::ephemeral),
  }
}

#[instrument(level = "info", skip(state))]
pub async fn leaderboard(state: &AppState) -> View {
  let boards = async {
    Ok::<_, crate::error::StoreError>((
      state.store.daily_champions(BOARD_LIMIT).await?,
      state.store.accuracy_masters(BOARD_LIMIT).await?,
      state.store.study_legends(BOARD_LIMIT).await?,
    ))
  };
  match boards.await {
    Ok((daily_champions, accuracy_masters, study_legends)) => {
      View::Leaderboard { daily_champions, accuracy_masters, study_legends }
    }
    Err(e) => {
      error!(target: "study_bot", error = %e, "Leaderboard query failed");
      View::ephemeral("Unable to load leaderboard data. Please try again later.")
    }
  }
}

#[instrument(level = "info", skip(state), fields(user = caller.id))]
pub async fn analysis(state: &AppState, caller: &Caller) -> View {
  let progress = match load_progress(state, caller).await {
    Ok(p) => p,
    Err(v) => return v,
  };
  let cert = match selected_certification(state, &progress) {
    Ok(c) => c,
    Err(v) => return v,
  };

  let ranked = async {
    Ok::<_, crate::error::StoreError>((
      state.store.weak_spots(caller.id, &cert.code, WEAK_SPOT_LIMIT).await?,
      state.store.strengths(caller.id, &cert.code, STRENGTH_LIMIT).await?,
    ))
  };
  let (weak_spots, strengths) = match ranked.await {
    Ok(r) => r,
    Err(e) => {
      error!(target: "study_bot", user = caller.id, error = %e, "Analysis query failed");
      return View::ephemeral("Unable to generate your study analysis right now.");
    }
  };

  let recommendations = match (&state.generator, weak_spots.is_empty()) {
    (Some(g), false) => {
      let topics: Vec<String> = weak_spots.iter().take(3).map(|w| w.topic.clone()).collect();
      match g.study_recommendations(cert, &topics).await {
        Ok(text) => text,
        Err(e) => {
          warn!(target: "study_bot", user = caller.id, error = %e, "Recommendations failed");
          RECOMMENDATIONS_FAILED.to_string()
        }
      }
    }
    _ => NO_RECOMMENDATIONS.to_string(),
  };

  View::Analysis {
    certification: cert.code.clone(),
    total_questions: progress.total_questions,
    accuracy: percent_1dp(progress.correct_answers, progress.total_questions),
    weak_spots,
    strengths,
    recommendations,
  }
}

fn random_domain(cert: &Certification) -> String {
  cert.domains.choose(&mut rand::thread_rng()).cloned().unwrap_or_else(|| GENERAL_TOPIC.to_string())
}

#[instrument(level = "info", skip(state), fields(user = caller.id))]
pub async fn flashcards(state: &AppState, caller: &Caller, topic: Option<String>, count: Option<i64>) -> View {
  let progress = match load_progress(state, caller).await {
    Ok(p) => p,
    Err(v) => return v,
  };
  let cert = match selected_certification(state, &progress) {
    Ok(c) => c,
    Err(v) => return v,
  };
  let generator = match generator(state) {
    Ok(g) => g,
    Err(v) => return v,
  };
  let count = clamp_count(count.unwrap_or(DEFAULT_FLASHCARDS), MAX_FLASHCARDS_PER_REQUEST);
  let topic = topic.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| random_domain(cert));

  match generator.generate_flashcards(cert, &topic, count).await {
    Ok(cards) => {
      let collection_size = state.flashcards.add(caller.id, &cards).await;
      info!(target: "study_bot", user = caller.id, %topic, generated = cards.len(), collection_size, "Flashcards created");
      View::Flashcards { certification: cert.code.clone(), topic, cards, collection_size }
    }
    Err(e) => {
      warn!(target: "study_bot", user = caller.id, error = %e, "Flashcard generation failed");
      View::ephemeral(format!("Error generating flashcards: {}", e))
    }
  }
}

#[instrument(level = "info", skip(state), fields(user = caller.id))]
pub async fn explain(state: &AppState, caller: &Caller, topic: &str) -> View {
  if topic.trim().is_empty() {
    return View::ephemeral("Tell me which topic to explain.");
  }
  let progress = match load_progress(state, caller).await {
    Ok(p) => p,
    Err(v) => return v,
  };
  let cert = match selected_certification(state, &progress) {
    Ok(c) => c,
    Err(v) => return v,
  };
  let generator = match generator(state) {
    Ok(g) => g,
    Err(v) => return v,
  };
  match generator.explain_topic(cert, topic).await {
    Ok(text) => View::Explanation { certification: cert.code.clone(), topic: topic.to_string(), text },
    Err(e) => {
      warn!(target: "study_bot", user = caller.id, error = %e, "Explanation failed");
      View::ephemeral(format!("Error generating explanation: {}", e))
    }
  }
}

#[instrument(level = "info", skip(state, sink), fields(user = caller.id))]
pub async fn pomodoro(state: &AppState, caller: &Caller, kind: Option<PomodoroKind>, sink: Arc<dyn PresentationSink>) -> View {
  let kind = kind.unwrap_or_default();
  match state.pomodoros.start(caller.id, kind, sink).await {
    Ok(session) => View::PomodoroStarted { pomodoro: session.kind, minutes: session.kind.minutes() },
    Err(StartError::AlreadyActive { remaining_minutes }) => View::ephemeral(format!(
      "You already have an active Pomodoro session! Time remaining: {} minutes. Use `/stoppomodoro` to end it early.",
      remaining_minutes
    )),
  }
}

#[instrument(level = "info", skip(state), fields(user = caller.id))]
pub async fn stop_pomodoro(state: &AppState, caller: &Caller) -> View {
  match state.pomodoros.stop(caller.id).await {
    Some((session, elapsed_minutes)) => View::PomodoroStopped { pomodoro: session.kind, elapsed_minutes },
    None => View::ephemeral("You don't have an active Pomodoro session!"),
  }
}

pub fn cyber_quote(state: &AppState) -> View {
  let text = state
    .bot
    .quotes
    .choose(&mut rand::thread_rng())
    .cloned()
    .unwrap_or_else(|| "Stay curious, stay secure.".to_string());
  View::Quote { text }
}

pub fn help() -> View {
  let c = |name, usage, description| CommandHelp { name, usage, description };
  View::Help {
    commands: vec![
      c("certs", "/certs", "View certifications"),
      c("select_cert", "/selectcert <code>", "Choose track"),
      c("study_stats", "/studystats", "Progress dashboard"),
      c("practice", "/practice [difficulty] [count]", "Timed practice questions (1-5)"),
      c("analysis", "/analysis", "Weak spots, strengths and recommendations"),
      c("flashcards", "/flashcards [topic] [count]", "Create cards (1-10)"),
      c("explain", "/explain <topic>", "Get explanations"),
      c("pomodoro", "/pomodoro [study|short_break|long_break]", "Study sessions"),
      c("stop_pomodoro", "/stoppomodoro", "End session"),
      c("leaderboard", "/leaderboard", "Rankings"),
      c("cyber_quote", "/cyberquote", "Wisdom"),
      c("hash", "/hash <text>", "SHA-256 hash"),
      c("password_check", "/passwordcheck <password>", "Password analyzer"),
      c("ping", "/ping", "Bot status"),
    ],
  }
}

#[instrument(level = "info", skip(text), fields(len = text.len()))]
pub fn hash(text: &str) -> View {
  if text.is_empty() {
    return View::ephemeral("Give me some text to hash.");
  }
  View::Hash { input_length: text.chars().count(), digest: sha256_hex(text) }
}

/// The password is analyzed in memory and never logged or echoed.
#[instrument(level = "info", skip_all)]
pub fn password_check(password: &str) -> View {
  if password.is_empty() {
    return View::ephemeral("Give me a password to analyze.");
  }
  let report = analyze_password(password);
  info!(target: "study_bot", strength = ?report.strength, "Password analyzed");
  View::PasswordReport { report }
}

pub fn ping() -> View {
  View::Pong
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use async_trait::async_trait;

  use super::*;
  use crate::config::BotConfig;
  use crate::domain::{Flashcard, QuestionRecord};
  use crate::error::AiError;
  use crate::ports::GeneralClassifier;
  use crate::quiz::testing::RecordingSink;
  use crate::store::memory::MemoryStore;
  use crate::store::{PerformanceStore, ProgressStore};

  #[derive(Default)]
  struct ScriptedGenerator {
    fail: bool,
    asked: Mutex<Vec<(Difficulty, usize)>>,
  }

  #[async_trait]
  impl QuestionGenerator for ScriptedGenerator {
    async fn generate_questions(
      &self,
      _cert: &Certification,
      difficulty: Difficulty,
      count: usize,
    ) -> Result<Vec<QuestionRecord>, AiError> {
      self.asked.lock().unwrap().push((difficulty, count));
      if self.fail {
        return Err(AiError::Invalid("expected 2 questions, got 1".into()));
      }
      Ok((0..count).map(|i| crate::quiz::testing::question(i + 1, "A")).collect())
    }

    async fn generate_flashcards(&self, _cert: &Certification, topic: &str, count: usize) -> Result<Vec<Flashcard>, AiError> {
      Ok((0..count).map(|i| Flashcard { front: format!("{} #{}", topic, i), back: "answer".into() }).collect())
    }

    async fn explain_topic(&self, _cert: &Certification, topic: &str) -> Result<String, AiError> {
      Ok(format!("{} explained", topic))
    }

    async fn study_recommendations(&self, _cert: &Certification, weak: &[String]) -> Result<String, AiError> {
      Ok(format!("• Review {}", weak.join(", ")))
    }
  }

  fn state_with(generator: Option<Arc<ScriptedGenerator>>) -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let generator = generator.map(|g| g as Arc<dyn QuestionGenerator>);
    let state = AppState::with_collaborators(BotConfig::default(), store.clone(), generator, Arc::new(GeneralClassifier));
    (state, store)
  }

  fn ana() -> Caller {
    Caller::new(1, "ana")
  }

  #[tokio::test]
  async fn select_cert_validates_and_persists() {
    let (state, store) = state_with(None);
    assert!(select_cert(&state, &ana(), "Linux+").await.is_ephemeral());
    assert!(matches!(select_cert(&state, &ana(), "security+").await, View::CertSelected { .. }));
    assert_eq!(store.get(1, None).await.unwrap().selected_certification.as_deref(), Some("Security+"));
  }

  #[tokio::test]
  async fn practice_without_ai_is_rejected() {
    let (state, store) = state_with(None);
    let view = practice(&state, &ana(), None, Some(3), Arc::new(RecordingSink::default())).await;
    assert!(view.is_ephemeral());
    assert_eq!(store.get(1, None).await.unwrap().total_questions, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn practice_clamps_count_and_counts_requested_questions() {
    let generator = Arc::new(ScriptedGenerator::default());
    let (state, store) = state_with(Some(generator.clone()));
    let view = practice(&state, &ana(), Some(Difficulty::Advanced), Some(9), Arc::new(RecordingSink::default())).await;

    assert!(matches!(view, View::PracticeReady { count: 5, difficulty: Difficulty::Advanced, .. }));
    assert_eq!(generator.asked.lock().unwrap().clone(), vec![(Difficulty::Advanced, 5)]);
    // Counted once the first question is out, after the start pause.
    assert_eq!(store.get(1, None).await.unwrap().total_questions, 0);

    let again = practice(&state, &ana(), None, Some(1), Arc::new(RecordingSink::default())).await;
    assert!(again.is_ephemeral());

    tokio::time::sleep(crate::quiz::RUN_START_DELAY * 2).await;
    assert_eq!(store.get(1, None).await.unwrap().total_questions, 5);
  }

  #[tokio::test]
  async fn practice_generation_failure_leaves_no_run() {
    let generator = Arc::new(ScriptedGenerator { fail: true, ..Default::default() });
    let (state, store) = state_with(Some(generator));
    let view = practice(&state, &ana(), None, Some(2), Arc::new(RecordingSink::default())).await;
    assert!(view.is_ephemeral());
    assert!(!state.sessions.has_active_run(1).await);
    assert_eq!(store.get(1, None).await.unwrap().total_questions, 0);
  }

  #[tokio::test(start_paused = true)]
  async fn practice_without_difficulty_adapts_to_weakest_topic() {
    let generator = Arc::new(ScriptedGenerator::default());
    let (state, store) = state_with(Some(generator.clone()));
    store.get(1, Some("ana")).await.unwrap();
    for _ in 0..5 {
      store.record_attempt(1, "A+", "Hardware", false, 30.0).await.unwrap();
    }
    practice(&state, &ana(), None, None, Arc::new(RecordingSink::default())).await;
    assert_eq!(generator.asked.lock().unwrap()[0], (Difficulty::Beginner, 1));
  }

  #[tokio::test]
  async fn analysis_falls_back_without_weak_spots() {
    let generator = Arc::new(ScriptedGenerator::default());
    let (state, store) = state_with(Some(generator));
    match analysis(&state, &ana()).await {
      View::Analysis { recommendations, .. } => assert_eq!(recommendations, NO_RECOMMENDATIONS),
      other => panic!("unexpected {:?}", other),
    }

    for _ in 0..3 {
      store.record_attempt(1, "A+", "Networking", false, 30.0).await.unwrap();
    }
    match analysis(&state, &ana()).await {
      View::Analysis { recommendations, weak_spots, .. } => {
        assert_eq!(weak_spots.len(), 1);
        assert_eq!(recommendations, "• Review Networking");
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn flashcards_clamp_and_collect() {
    let (state, _store) = state_with(Some(Arc::new(ScriptedGenerator::default())));
    match flashcards(&state, &ana(), Some("Subnetting".into()), Some(50)).await {
      View::Flashcards { cards, collection_size, topic, .. } => {
        assert_eq!((cards.len(), collection_size), (10, 10));
        assert_eq!(topic, "Subnetting");
      }
      other => panic!("unexpected {:?}", other),
    }
    match flashcards(&state, &ana(), None, None).await {
      View::Flashcards { cards, collection_size, topic, .. } => {
        assert_eq!((cards.len(), collection_size), (3, 13));
        assert!(state.bot.certification("A+").unwrap().domains.contains(&topic));
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[tokio::test]
  async fn unknown_answer_target_and_bad_letter_are_rejected() {
    let (state, _store) = state_with(None);
    let h = MessageHandle::new();
    assert_eq!(submit_answer(&state, &ana(), &h, "Z").await, Some(View::ephemeral("Answer must be one of A, B, C or D.")));
    assert_eq!(
      submit_answer(&state, &ana(), &h, "a").await,
      Some(View::ephemeral("This question is no longer active."))
    );
  }

  #[tokio::test]
  async fn stats_report_tier_and_flashcards() {
    let (state, store) = state_with(None);
    let mut p = store.get(1, Some("ana")).await.unwrap();
    p.total_questions = 30;
    p.correct_answers = 27;
    p.study_score = 55;
    store.put(1, &p).await.unwrap();
    match study_stats(&state, &ana()).await {
      View::Stats { skill_tier, accuracy, flashcards, .. } => {
        assert_eq!(skill_tier, SkillTier::Expert);
        assert_eq!(accuracy, 90.0);
        assert_eq!(flashcards, 0);
      }
      other => panic!("unexpected {:?}", other),
    }
  }
}
