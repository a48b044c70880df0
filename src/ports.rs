//! Collaborator seams used by the quiz engine and the command handlers.

use async_trait::async_trait;

use crate::domain::{Certification, Difficulty, Flashcard, QuestionRecord};
use crate::error::{AiError, PresentationError};
use crate::view::{MessageHandle, View};

/// Topic recorded when classification is unavailable.
pub const GENERAL_TOPIC: &str = "General";

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
  /// Exactly `count` validated questions, or an error.
  async fn generate_questions(
    &self,
    cert: &Certification,
    difficulty: Difficulty,
    count: usize,
  ) -> Result<Vec<QuestionRecord>, AiError>;

  async fn generate_flashcards(&self, cert: &Certification, topic: &str, count: usize) -> Result<Vec<Flashcard>, AiError>;

  async fn explain_topic(&self, cert: &Certification, topic: &str) -> Result<String, AiError>;

  async fn study_recommendations(&self, cert: &Certification, weak_topics: &[String]) -> Result<String, AiError>;
}

#[async_trait]
pub trait TopicClassifier: Send + Sync {
  /// Never fails; falls back to a domain of `cert` or `GENERAL_TOPIC`.
  async fn classify(&self, question: &str, cert: &Certification) -> String;
}

/// Classifier used when no model is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneralClassifier;

#[async_trait]
impl TopicClassifier for GeneralClassifier {
  async fn classify(&self, _question: &str, _cert: &Certification) -> String {
    GENERAL_TOPIC.to_string()
  }
}

/// Outbound side of a chat channel.
#[async_trait]
pub trait PresentationSink: Send + Sync {
  async fn send(&self, view: View) -> Result<MessageHandle, PresentationError>;

  async fn edit(&self, handle: &MessageHandle, view: View) -> Result<(), PresentationError>;
}
