//! Application state: bot config, store, optional AI tutor and the live registries.
//!
//! This module owns:
//!   - the certification catalog, prompts and quotes (from TOML or defaults)
//!   - the persistence backend (`Arc<dyn Store>`)
//!   - the optional question generator (None without OPENAI_API_KEY)
//!   - quiz sessions, Pomodoro timers and flashcard collections

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::BotConfig;
use crate::flashcards::FlashcardRegistry;
use crate::openai::{AiTutor, OpenAI};
use crate::pomodoro::PomodoroManager;
use crate::ports::{GeneralClassifier, QuestionGenerator, TopicClassifier};
use crate::quiz::SessionManager;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
  pub bot: Arc<BotConfig>,
  pub store: Arc<dyn Store>,
  pub generator: Option<Arc<dyn QuestionGenerator>>,
  pub sessions: SessionManager,
  pub pomodoros: PomodoroManager,
  pub flashcards: FlashcardRegistry,
}

impl AppState {
  /// Wire the OpenAI tutor as both generator and classifier when a client is configured.
  #[instrument(level = "info", skip_all)]
  pub fn new(bot: BotConfig, store: Arc<dyn Store>, openai: Option<OpenAI>) -> Self {
    match openai {
      Some(oa) => {
        info!(target: "study_bot", base_url = %oa.base_url, fast_model = %oa.fast_model, strong_model = %oa.strong_model, "OpenAI enabled.");
        let tutor = Arc::new(AiTutor::new(oa, bot.prompts.clone()));
        let generator: Arc<dyn QuestionGenerator> = tutor.clone();
        Self::with_collaborators(bot, store, Some(generator), tutor)
      }
      None => {
        info!(target: "study_bot", "OpenAI disabled (no OPENAI_API_KEY). Practice, flashcards and explanations are unavailable.");
        Self::with_collaborators(bot, store, None, Arc::new(GeneralClassifier))
      }
    }
  }

  pub fn with_collaborators(
    bot: BotConfig,
    store: Arc<dyn Store>,
    generator: Option<Arc<dyn QuestionGenerator>>,
    classifier: Arc<dyn TopicClassifier>,
  ) -> Self {
    Self {
      bot: Arc::new(bot),
      sessions: SessionManager::new(store.clone(), classifier),
      pomodoros: PomodoroManager::new(store.clone()),
      flashcards: FlashcardRegistry::new(),
      generator,
      store,
    }
  }
}
