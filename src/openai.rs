//! Minimal OpenAI client for the study bot.
//!
//! We only call chat.completions and ask for plain text. Structured replies
//! (questions, flashcards) are JSON arrays inside the text, optionally wrapped
//! in a Markdown fence, and are validated before anything else sees them.
//!
//! NOTE: We never log the API key and we keep payload truncations short.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Prompts;
use crate::domain::{Certification, Difficulty, Flashcard, QuestionRecord};
use crate::error::AiError;
use crate::ports::{QuestionGenerator, TopicClassifier, GENERAL_TOPIC};
use crate::util::{fill_template, strip_code_fence, trunc_for_log};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub fast_model: String,
  pub strong_model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let fast_model = std::env::var("OPENAI_FAST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let strong_model = std::env::var("OPENAI_STRONG_MODEL").unwrap_or_else(|_| "gpt-4o".into());

    let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build().ok()?;

    Some(Self { client, api_key, base_url, fast_model, strong_model })
  }

  /// Plain-text chat completion. `system` is omitted when empty.
  #[instrument(level = "info", target = "ai", skip(self, system, user), fields(model = %model))]
  async fn chat_plain(
    &self,
    model: &str,
    system: &str,
    user: &str,
    temperature: f32,
    max_tokens: Option<u32>,
  ) -> Result<String, AiError> {
    let url = format!("{}/chat/completions", self.base_url);
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
      messages.push(ChatMessageReq { role: "system".into(), content: system.into() });
    }
    messages.push(ChatMessageReq { role: "user".into(), content: user.into() });
    let req = ChatCompletionRequest { model: model.to_string(), messages, temperature, max_tokens };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "cert-study-bot/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await
      .map_err(|e| AiError::Http(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      return Err(AiError::Http(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res.json().await.map_err(|e| AiError::Parse(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(target: "ai", elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body
      .choices
      .first()
      .and_then(|c| c.message.content.clone())
      .unwrap_or_default()
      .trim()
      .to_string();

    if text.is_empty() {
      return Err(AiError::Invalid("empty completion".into()));
    }
    Ok(text)
  }
}

/// The model-backed tutor: question and flashcard generation, explanations,
/// recommendations and topic classification.
#[derive(Clone)]
pub struct AiTutor {
  pub openai: OpenAI,
  pub prompts: Prompts,
}

impl AiTutor {
  pub fn new(openai: OpenAI, prompts: Prompts) -> Self {
    Self { openai, prompts }
  }
}

#[async_trait]
impl QuestionGenerator for AiTutor {
  #[instrument(level = "info", target = "ai", skip(self, cert), fields(cert = %cert.code, %difficulty))]
  async fn generate_questions(
    &self,
    cert: &Certification,
    difficulty: Difficulty,
    count: usize,
  ) -> Result<Vec<QuestionRecord>, AiError> {
    let count_s = count.to_string();
    // Prompt focuses on the leading exam domains.
    let domains = cert.domains.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
    let vars = [
      ("count", count_s.as_str()),
      ("difficulty", difficulty.as_str()),
      ("cert", cert.code.as_str()),
      ("domains", domains.as_str()),
    ];
    let system = fill_template(&self.prompts.questions_system, &vars);
    let user = fill_template(&self.prompts.questions_user_template, &vars);

    let raw = self.openai.chat_plain(&self.openai.strong_model, &system, &user, 0.7, Some(2000)).await?;
    match parse_questions(&raw, count) {
      Ok(qs) => {
        info!(target: "ai", generated = qs.len(), "Questions generated");
        Ok(qs)
      }
      Err(e) => {
        error!(target: "ai", error = %e, reply = %trunc_for_log(&raw, 200), "Question generation produced unusable output");
        Err(e)
      }
    }
  }

  #[instrument(level = "info", target = "ai", skip(self, cert), fields(cert = %cert.code, %topic))]
  async fn generate_flashcards(&self, cert: &Certification, topic: &str, count: usize) -> Result<Vec<Flashcard>, AiError> {
    let count_s = count.to_string();
    let vars = [("count", count_s.as_str()), ("cert", cert.code.as_str()), ("topic", topic)];
    let system = fill_template(&self.prompts.flashcards_system, &vars);
    let user = fill_template(&self.prompts.flashcards_user_template, &vars);

    let raw = self.openai.chat_plain(&self.openai.fast_model, &system, &user, 0.7, Some(1500)).await?;
    let cards: Vec<Flashcard> = parse_json_reply(&raw)?;
    if cards.is_empty() {
      return Err(AiError::Invalid("no flashcards in reply".into()));
    }
    Ok(cards)
  }

  #[instrument(level = "info", target = "ai", skip(self, cert), fields(cert = %cert.code, %topic))]
  async fn explain_topic(&self, cert: &Certification, topic: &str) -> Result<String, AiError> {
    let vars = [("cert", cert.code.as_str()), ("topic", topic)];
    let system = fill_template(&self.prompts.explain_system, &vars);
    let user = fill_template(&self.prompts.explain_user_template, &vars);
    self.openai.chat_plain(&self.openai.fast_model, &system, &user, 0.3, Some(1000)).await
  }

  #[instrument(level = "info", target = "ai", skip(self, cert, weak_topics), fields(cert = %cert.code, weak = weak_topics.len()))]
  async fn study_recommendations(&self, cert: &Certification, weak_topics: &[String]) -> Result<String, AiError> {
    let weak = weak_topics.join(", ");
    let user = fill_template(
      &self.prompts.recommendations_user_template,
      &[("cert", cert.code.as_str()), ("weak_topics", weak.as_str())],
    );
    self.openai.chat_plain(&self.openai.fast_model, "", &user, 0.2, Some(80)).await
  }
}

#[async_trait]
impl TopicClassifier for AiTutor {
  #[instrument(level = "debug", target = "ai", skip(self, question, cert), fields(cert = %cert.code))]
  async fn classify(&self, question: &str, cert: &Certification) -> String {
    let domains = cert.domains.join(", ");
    let user = fill_template(
      &self.prompts.classify_user_template,
      &[("question", question), ("cert", cert.code.as_str()), ("domains", domains.as_str())],
    );
    match self.openai.chat_plain(&self.openai.fast_model, "", &user, 0.1, Some(50)).await {
      Ok(reply) => {
        let topic = match_domain(&reply, &cert.domains);
        debug!(target: "ai", %reply, %topic, "Topic classified");
        topic
      }
      Err(e) => {
        warn!(target: "ai", error = %e, "Topic classification failed; using General");
        GENERAL_TOPIC.to_string()
      }
    }
  }
}

/// Map a free-text model reply onto one of `domains`: exact match, else the
/// first domain with a word contained in the reply, else the first domain.
pub fn match_domain(reply: &str, domains: &[String]) -> String {
  let reply = reply.trim();
  if let Some(d) = domains.iter().find(|d| d.as_str() == reply) {
    return d.clone();
  }
  let lower = reply.to_lowercase();
  domains
    .iter()
    .find(|d| d.split_whitespace().any(|w| lower.contains(&w.to_lowercase())))
    .or_else(|| domains.first())
    .cloned()
    .unwrap_or_else(|| GENERAL_TOPIC.to_string())
}

#[derive(Deserialize)]
struct RawQuestion {
  question: String,
  options: std::collections::BTreeMap<String, String>,
  answer: String,
  #[serde(default)]
  explanation: String,
}

/// Models asked for one question often reply with a bare object.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
  Many(Vec<RawQuestion>),
  One(RawQuestion),
}

impl From<OneOrMany> for Vec<RawQuestion> {
  fn from(v: OneOrMany) -> Self {
    match v {
      OneOrMany::Many(items) => items,
      OneOrMany::One(item) => vec![item],
    }
  }
}

/// Parse and validate a question-generation reply. The count must match.
pub fn parse_questions(raw: &str, expected: usize) -> Result<Vec<QuestionRecord>, AiError> {
  let items: Vec<RawQuestion> = parse_json_reply::<OneOrMany>(raw)?.into();
  if items.len() != expected {
    return Err(AiError::Invalid(format!("expected {} questions, got {}", expected, items.len())));
  }
  items
    .into_iter()
    .map(|q| {
      QuestionRecord::new(q.question, q.options, &q.answer, q.explanation).map_err(|e| AiError::Invalid(e.to_string()))
    })
    .collect()
}

/// Parse a JSON reply that may be wrapped in a ```json fence.
fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T, AiError> {
  serde_json::from_str::<T>(strip_code_fence(raw)).map_err(|e| AiError::Parse(e.to_string()))
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Choice;

  fn domains() -> Vec<String> {
    vec!["Networking Fundamentals".into(), "Network Implementations".into(), "Network Security".into()]
  }

  #[test]
  fn exact_domain_wins() {
    assert_eq!(match_domain(" Network Security ", &domains()), "Network Security");
  }

  #[test]
  fn shared_word_picks_first_matching_domain() {
    assert_eq!(match_domain("securing wireless networks", &domains()), "Network Implementations");
    assert_eq!(match_domain("Implementations", &domains()), "Network Implementations");
  }

  #[test]
  fn unmatched_reply_falls_back_to_first_domain_or_general() {
    assert_eq!(match_domain("cryptography", &["Hardware".to_string(), "Mobile".to_string()]), "Hardware");
    assert_eq!(match_domain("anything", &[]), GENERAL_TOPIC);
  }

  #[test]
  fn parses_fenced_question_array() {
    let raw = r#"```json
[{"question": "Which port does HTTPS use?",
  "options": {"A": "80", "B": "443", "C": "22", "D": "25"},
  "answer": "B",
  "explanation": "HTTPS listens on 443."}]
```"#;
    let qs = parse_questions(raw, 1).unwrap();
    assert_eq!(qs[0].answer, Choice::B);
    assert_eq!(qs[0].options[&Choice::C], "22");
  }

  #[test]
  fn parses_single_object_reply() {
    let raw = r#"{"question": "Which protocol resolves names?",
  "options": {"A": "ARP", "B": "DNS", "C": "NTP", "D": "SNMP"},
  "answer": "B",
  "explanation": "DNS maps names to addresses."}"#;
    let qs = parse_questions(raw, 1).unwrap();
    assert_eq!(qs.len(), 1);
    assert_eq!(qs[0].answer, Choice::B);
    assert!(matches!(parse_questions(raw, 2), Err(AiError::Invalid(_))));
  }

  #[test]
  fn count_mismatch_is_rejected() {
    let raw = r#"[{"question": "q", "options": {"A": "1", "B": "2", "C": "3", "D": "4"}, "answer": "A", "explanation": ""}]"#;
    assert!(matches!(parse_questions(raw, 2), Err(AiError::Invalid(_))));
  }

  #[test]
  fn malformed_questions_are_rejected() {
    assert!(matches!(parse_questions("not json", 1), Err(AiError::Parse(_))));
    let bad_answer = r#"[{"question": "q", "options": {"A": "1", "B": "2", "C": "3", "D": "4"}, "answer": "E"}]"#;
    assert!(matches!(parse_questions(bad_answer, 1), Err(AiError::Invalid(_))));
  }

  #[test]
  fn openai_error_body_is_unwrapped() {
    let body = r#"{"error": {"message": "Rate limit reached", "type": "requests"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_openai_error("<html>"), None);
  }
}
