//! Structured presentation payloads. A chat gateway renders these however it
//! likes (embeds, buttons); the bot itself never formats platform markup.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::achievements::{Achievement, EarnedAchievement};
use crate::domain::{
  AccuracyMaster, Certification, Choice, DailyChampion, Difficulty, Flashcard, SkillTier, StudyLegend, TopicPerformance,
};
use crate::pomodoro::PomodoroKind;
use crate::toolkit::PasswordReport;

/// Opaque id of a delivered message; the target of later edits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageHandle(pub Uuid);

impl MessageHandle {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl Default for MessageHandle {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for MessageHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Countdown severity band.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
  Calm,
  Warning,
  Critical,
}

impl Urgency {
  pub fn for_remaining(secs: u64) -> Self {
    if secs > 30 {
      Urgency::Calm
    } else if secs > 10 {
      Urgency::Warning
    } else {
      Urgency::Critical
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandHelp {
  pub name: &'static str,
  pub usage: &'static str,
  pub description: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum View {
  Question {
    index: usize,
    total: usize,
    certification: String,
    difficulty: Difficulty,
    question: String,
    options: BTreeMap<Choice, String>,
    remaining_secs: u64,
    urgency: Urgency,
  },
  Result {
    index: usize,
    total: usize,
    chosen: Choice,
    correct_answer: Choice,
    is_correct: bool,
    explanation: String,
    score_change: i64,
    /// `None` when the progress record could not be read.
    study_score: Option<i64>,
  },
  Timeout {
    index: usize,
    total: usize,
    correct_answer: Choice,
    correct_text: String,
    explanation: String,
  },
  Completion {
    certification: String,
    questions: usize,
    study_score: i64,
    total_questions: i64,
    accuracy: f64,
  },
  Notice {
    text: String,
    ephemeral: bool,
  },
  Certifications {
    certifications: Vec<Certification>,
  },
  CertSelected {
    certification: Certification,
  },
  PracticeReady {
    certification: String,
    difficulty: Difficulty,
    count: usize,
    unlocked: Vec<Achievement>,
  },
  Stats {
    username: String,
    certification: Option<String>,
    total_questions: i64,
    correct_answers: i64,
    accuracy: f64,
    study_score: i64,
    study_streak: i64,
    study_time_minutes: i64,
    flashcards: usize,
    skill_tier: SkillTier,
    achievements: Vec<EarnedAchievement>,
  },
  Leaderboard {
    daily_champions: Vec<DailyChampion>,
    accuracy_masters: Vec<AccuracyMaster>,
    study_legends: Vec<StudyLegend>,
  },
  Analysis {
    certification: String,
    total_questions: i64,
    accuracy: f64,
    weak_spots: Vec<TopicPerformance>,
    strengths: Vec<TopicPerformance>,
    recommendations: String,
  },
  Flashcards {
    certification: String,
    topic: String,
    cards: Vec<Flashcard>,
    collection_size: usize,
  },
  Explanation {
    certification: String,
    topic: String,
    text: String,
  },
  PomodoroStarted {
    pomodoro: PomodoroKind,
    minutes: u64,
  },
  PomodoroFinished {
    pomodoro: PomodoroKind,
    minutes: u64,
  },
  PomodoroStopped {
    pomodoro: PomodoroKind,
    elapsed_minutes: u64,
  },
  Quote {
    text: String,
  },
  Hash {
    input_length: usize,
    digest: String,
  },
  PasswordReport {
    report: PasswordReport,
  },
  Help {
    commands: Vec<CommandHelp>,
  },
  Pong,
}

impl View {
  /// A rejection or error visible only to the caller.
  pub fn ephemeral(text: impl Into<String>) -> Self {
    View::Notice { text: text.into(), ephemeral: true }
  }

  pub fn notice(text: impl Into<String>) -> Self {
    View::Notice { text: text.into(), ephemeral: false }
  }

  pub fn is_ephemeral(&self) -> bool {
    matches!(self, View::Notice { ephemeral: true, .. })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn urgency_bands() {
    assert_eq!(Urgency::for_remaining(60), Urgency::Calm);
    assert_eq!(Urgency::for_remaining(35), Urgency::Calm);
    assert_eq!(Urgency::for_remaining(30), Urgency::Warning);
    assert_eq!(Urgency::for_remaining(15), Urgency::Warning);
    assert_eq!(Urgency::for_remaining(10), Urgency::Critical);
    assert_eq!(Urgency::for_remaining(5), Urgency::Critical);
  }

  #[test]
  fn views_serialize_with_kind_tag() {
    let v = serde_json::to_value(View::ephemeral("nope")).unwrap();
    assert_eq!(v["kind"], "notice");
    assert_eq!(v["ephemeral"], true);

    let v = serde_json::to_value(View::Pong).unwrap();
    assert_eq!(v, serde_json::json!({ "kind": "pong" }));
  }

  #[test]
  fn handle_serializes_as_bare_uuid() {
    let h = MessageHandle::new();
    let s = serde_json::to_string(&h).unwrap();
    assert_eq!(s, format!("\"{}\"", h.0));
  }
}
