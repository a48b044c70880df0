//! Domain models: answer letters, difficulty, question records, user progress,
//! topic performance, leaderboard rows, flashcards.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::percent_1dp;

/// Chat-platform user id (Discord snowflakes fit in a u64).
pub type UserId = u64;

/// Certification every new user starts on.
pub const DEFAULT_CERTIFICATION: &str = "A+";

/// One of the four answer buttons.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Choice {
  A,
  B,
  C,
  D,
}

impl Choice {
  pub const ALL: [Choice; 4] = [Choice::A, Choice::B, Choice::C, Choice::D];

  /// Case-insensitive parse of a single letter, surrounding whitespace ignored.
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "A" => Some(Choice::A),
      "B" => Some(Choice::B),
      "C" => Some(Choice::C),
      "D" => Some(Choice::D),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Choice::A => "A",
      Choice::B => "B",
      Choice::C => "C",
      Choice::D => "D",
    }
  }
}

impl fmt::Display for Choice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Question difficulty requested from the generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Beginner,
  #[default]
  Intermediate,
  Advanced,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Beginner => "beginner",
      Difficulty::Intermediate => "intermediate",
      Difficulty::Advanced => "advanced",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "beginner" => Some(Difficulty::Beginner),
      "intermediate" => Some(Difficulty::Intermediate),
      "advanced" => Some(Difficulty::Advanced),
      _ => None,
    }
  }
}

impl fmt::Display for Difficulty {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionError {
  #[error("question text is empty")]
  EmptyQuestion,
  #[error("option key '{0}' is not one of A-D")]
  BadOptionKey(String),
  #[error("duplicate option '{0}'")]
  DuplicateOption(Choice),
  #[error("expected 4 options, got {0}")]
  OptionCount(usize),
  #[error("answer '{0}' is not one of the options")]
  BadAnswer(String),
}

/// A generated multiple-choice question. Immutable once validated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuestionRecord {
  pub question: String,
  pub options: BTreeMap<Choice, String>,
  pub answer: Choice,
  pub explanation: String,
}

impl QuestionRecord {
  /// Validate raw generator output: four unique A-D options and an answer among them.
  pub fn new<I, K, V>(
    question: impl Into<String>,
    options: I,
    answer: &str,
    explanation: impl Into<String>,
  ) -> Result<Self, QuestionError>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
  {
    let question = question.into();
    if question.trim().is_empty() {
      return Err(QuestionError::EmptyQuestion);
    }

    let mut map = BTreeMap::new();
    for (k, v) in options {
      let key = Choice::parse(k.as_ref()).ok_or_else(|| QuestionError::BadOptionKey(k.as_ref().to_string()))?;
      if map.insert(key, v.into()).is_some() {
        return Err(QuestionError::DuplicateOption(key));
      }
    }
    if map.len() != Choice::ALL.len() {
      return Err(QuestionError::OptionCount(map.len()));
    }

    let answer = Choice::parse(answer)
      .filter(|c| map.contains_key(c))
      .ok_or_else(|| QuestionError::BadAnswer(answer.to_string()))?;

    Ok(Self { question, options: map, answer, explanation: explanation.into() })
  }
}

/// Aggregate per-user stats. Replaced as a whole on every update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
  pub username: Option<String>,
  pub selected_certification: Option<String>,
  pub total_questions: i64,
  pub correct_answers: i64,
  pub study_score: i64,
  pub study_time_minutes: i64,
  pub study_streak: i64,
  pub last_study_date: Option<DateTime<Utc>>,
}

impl Default for UserProgress {
  fn default() -> Self {
    Self::new(None)
  }
}

impl UserProgress {
  /// Fresh record for a first-contact user.
  pub fn new(username: Option<String>) -> Self {
    Self {
      username,
      selected_certification: Some(DEFAULT_CERTIFICATION.to_string()),
      total_questions: 0,
      correct_answers: 0,
      study_score: 0,
      study_time_minutes: 0,
      study_streak: 0,
      last_study_date: Some(Utc::now()),
    }
  }

  /// Apply one scored answer and return the score change (+1 / -1).
  /// The score has no floor.
  pub fn record_outcome(&mut self, correct: bool) -> i64 {
    if correct {
      self.correct_answers += 1;
      self.study_score += 1;
      1
    } else {
      self.study_score -= 1;
      -1
    }
  }

  /// Lifetime accuracy in percent (correct / total questions requested).
  pub fn accuracy(&self) -> f64 {
    if self.total_questions <= 0 {
      0.0
    } else {
      (self.correct_answers as f64) * 100.0 / (self.total_questions as f64)
    }
  }
}

/// Per (user, certification, topic) performance row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopicPerformance {
  pub user_id: UserId,
  pub certification: String,
  pub topic: String,
  pub questions_attempted: i64,
  pub questions_correct: i64,
  pub mastery_level: f64,
  pub avg_response_time: f64,
  pub last_practiced: DateTime<Utc>,
}

impl TopicPerformance {
  /// Accuracy in percent, rounded to one decimal.
  pub fn accuracy(&self) -> f64 {
    percent_1dp(self.questions_correct, self.questions_attempted)
  }
}

/// One scored answer, kept for daily activity boards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuestionHistoryEntry {
  pub user_id: UserId,
  pub certification: String,
  pub difficulty: Difficulty,
  pub question_text: String,
  pub user_answer: Choice,
  pub correct_answer: Choice,
  pub is_correct: bool,
  pub response_time_seconds: i64,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyChampion {
  pub user_id: UserId,
  pub username: String,
  pub questions_today: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccuracyMaster {
  pub user_id: UserId,
  pub username: String,
  pub total_questions: i64,
  pub correct_answers: i64,
  pub accuracy: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StudyLegend {
  pub user_id: UserId,
  pub username: String,
  pub study_score: i64,
  pub total_questions: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
  pub front: String,
  pub back: String,
}

/// A certification track and its exam domains (used as topics).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Certification {
  pub code: String,
  pub name: String,
  pub description: String,
  pub domains: Vec<String>,
}

/// Rank shown on the stats card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkillTier {
  Beginner,
  Intermediate,
  Advanced,
  Expert,
  Legend,
}

impl SkillTier {
  /// Score tiers take precedence; INTERMEDIATE is earned by volume alone.
  pub fn for_progress(p: &UserProgress) -> Self {
    if p.study_score >= 100 {
      SkillTier::Legend
    } else if p.study_score >= 50 {
      SkillTier::Expert
    } else if p.study_score >= 25 {
      SkillTier::Advanced
    } else if p.total_questions >= 20 {
      SkillTier::Intermediate
    } else {
      SkillTier::Beginner
    }
  }
}

/// Display name used on boards when a user never told us theirs.
pub fn display_name(user_id: UserId, username: Option<&str>) -> String {
  match username {
    Some(n) if !n.trim().is_empty() => n.to_string(),
    _ => format!("user-{}", user_id),
  }
}
