//! Runtime configuration: environment settings plus an optional TOML bot config
//! (prompts, certification catalog, quotes).
//!
//! See `BotConfig` and `Prompts` for the expected TOML schema.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Certification;
use crate::seeds::{seed_certifications, seed_quotes};

/// Process settings read from the environment.
#[derive(Clone, Debug)]
pub struct Settings {
  pub port: u16,
  /// sqlx SQLite URL; in-memory stores are used when absent.
  pub database_url: Option<String>,
  pub bot_config_path: Option<String>,
}

impl Settings {
  pub fn from_env() -> Self {
    let port = std::env::var("PORT")
      .ok()
      .and_then(|p| p.parse::<u16>().ok())
      .unwrap_or(3000);
    let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
    let bot_config_path = std::env::var("BOT_CONFIG_PATH").ok();
    Self { port, database_url, bot_config_path }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BotConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default = "seed_certifications")]
  pub certifications: Vec<Certification>,
  #[serde(default = "seed_quotes")]
  pub quotes: Vec<String>,
}

impl Default for BotConfig {
  fn default() -> Self {
    Self { prompts: Prompts::default(), certifications: seed_certifications(), quotes: seed_quotes() }
  }
}

impl BotConfig {
  pub fn certification(&self, code: &str) -> Option<&Certification> {
    self.certifications.iter().find(|c| c.code.eq_ignore_ascii_case(code))
  }
}

/// Prompts used by the OpenAI client. `{placeholders}` are filled per call.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub questions_system: String,
  pub questions_user_template: String,
  pub flashcards_system: String,
  pub flashcards_user_template: String,
  pub explain_system: String,
  pub explain_user_template: String,
  pub classify_user_template: String,
  pub recommendations_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      questions_system: "You are an expert CompTIA certification instructor creating practice questions.".into(),
      questions_user_template: "Generate {count} {difficulty}-level multiple choice practice question(s) for CompTIA {cert} certification.\n\nFor each question:\n- Focus on domains: {domains}\n- Create 4 answer choices (A, B, C, D)\n- Provide detailed explanations for correct answers\n- Use realistic exam-style scenarios\n- Include technical depth appropriate for {difficulty} level\n\nFormat as JSON array with objects containing:\n- \"question\": \"Question text\"\n- \"options\": {\"A\": \"option text\", \"B\": \"option text\", \"C\": \"option text\", \"D\": \"option text\"}\n- \"answer\": \"A\" (correct letter)\n- \"explanation\": \"Detailed explanation of why this is correct\"\n\nReturn valid JSON only.".into(),
      flashcards_system: "You are a CompTIA {cert} instructor creating study flashcards.".into(),
      flashcards_user_template: "Create {count} study flashcard(s) for CompTIA {cert} on the topic: {topic}\n\nFor each flashcard, provide:\n- A clear, concise question or term\n- A comprehensive answer with key details\n- Make them exam-relevant and practical\n\nFormat as JSON array:\n[{\"front\": \"Question/Term\", \"back\": \"Answer/Explanation\"}]\n\nFocus on important concepts students need to memorize for the exam.".into(),
      explain_system: "You are an expert CompTIA {cert} instructor.".into(),
      explain_user_template: "Explain this CompTIA {cert} topic in detail: {topic}\n\nProvide:\n- Clear definition and overview\n- Key concepts and components\n- Real-world applications\n- Common exam questions about this topic\n- Important details students should memorize\n\nMake it educational and exam-focused.".into(),
      classify_user_template: "Question: {question}\n\nFrom this CompTIA {cert} question, identify which domain/topic it belongs to.\nAvailable domains: {domains}\n\nRespond with just the domain name, nothing else.".into(),
      recommendations_user_template: "CompTIA {cert} study focus needed: {weak_topics}\n\nGenerate exactly 3 bullet points. Each bullet point must be:\n- Maximum 8 words\n- Start with action verb\n- No explanations\n\nFormat:\n• [action verb] [topic] [method/resource]\n• [action verb] [topic] [method/resource]\n• [action verb] [topic] [method/resource]".into(),
    }
  }
}

/// Parse a bot config from TOML text.
pub fn parse_bot_config(s: &str) -> Result<BotConfig, toml::de::Error> {
  toml::from_str::<BotConfig>(s)
}

/// Load `BotConfig` from `path`. On any parsing/IO error, falls back to built-in defaults.
pub fn load_bot_config(path: Option<&str>) -> BotConfig {
  let Some(path) = path else {
    info!(target: "study_bot", "No BOT_CONFIG_PATH; using built-in prompts and catalog");
    return BotConfig::default();
  };
  match std::fs::read_to_string(path) {
    Ok(s) => match parse_bot_config(&s) {
      Ok(cfg) => {
        info!(target: "study_bot", %path, certifications = cfg.certifications.len(), "Loaded bot config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "study_bot", %path, error = %e, "Failed to parse TOML config; using defaults");
        BotConfig::default()
      }
    },
    Err(e) => {
      error!(target: "study_bot", %path, error = %e, "Failed to read TOML config file; using defaults");
      BotConfig::default()
    }
  }
}
