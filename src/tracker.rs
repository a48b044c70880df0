//! Performance tracker rules: attempt blending, cold-start mastery guard,
//! adaptive difficulty and weak/strong topic ranking.
//!
//! These are pure functions over `TopicPerformance`; the store backends apply
//! them (memory) or mirror them in SQL (sqlite).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::domain::{Difficulty, TopicPerformance, UserId};

/// Mastery is only recomputed once a topic has this many attempts.
pub const MASTERY_MIN_ATTEMPTS: i64 = 5;
/// Below this many attempts a topic is neither ranked nor used for difficulty.
pub const RANKING_MIN_ATTEMPTS: i64 = 3;

pub const ADVANCED_MASTERY: f64 = 0.85;
pub const INTERMEDIATE_MASTERY: f64 = 0.65;

/// Response time fed to `record_attempt` by the quiz engine (seconds).
/// The engine does not measure per-question latency.
pub const NOMINAL_RESPONSE_SECS: f64 = 30.0;

/// Apply one attempt to an existing row, or create the row on the first attempt.
pub fn apply_attempt(
  existing: Option<TopicPerformance>,
  user_id: UserId,
  certification: &str,
  topic: &str,
  correct: bool,
  response_time: f64,
  now: DateTime<Utc>,
) -> TopicPerformance {
  let hit = i64::from(correct);
  match existing {
    None => TopicPerformance {
      user_id,
      certification: certification.to_string(),
      topic: topic.to_string(),
      questions_attempted: 1,
      questions_correct: hit,
      mastery_level: 0.0,
      avg_response_time: response_time,
      last_practiced: now,
    },
    Some(mut row) => {
      row.questions_attempted += 1;
      row.questions_correct += hit;
      row.avg_response_time = (row.avg_response_time + response_time) / 2.0;
      row.last_practiced = now;
      if row.questions_attempted >= MASTERY_MIN_ATTEMPTS {
        row.mastery_level = row.questions_correct as f64 / row.questions_attempted as f64;
      }
      row
    }
  }
}

/// Difficulty to serve for a topic given its stored row.
pub fn difficulty_for(row: Option<&TopicPerformance>) -> Difficulty {
  match row {
    Some(r) if r.questions_attempted >= RANKING_MIN_ATTEMPTS => {
      if r.mastery_level >= ADVANCED_MASTERY {
        Difficulty::Advanced
      } else if r.mastery_level >= INTERMEDIATE_MASTERY {
        Difficulty::Intermediate
      } else {
        Difficulty::Beginner
      }
    }
    _ => Difficulty::Intermediate,
  }
}

fn by_mastery_then_accuracy(a: &TopicPerformance, b: &TopicPerformance) -> Ordering {
  a.mastery_level
    .partial_cmp(&b.mastery_level)
    .unwrap_or(Ordering::Equal)
    .then_with(|| a.accuracy().partial_cmp(&b.accuracy()).unwrap_or(Ordering::Equal))
}

/// Eligible rows ordered weakest first (mastery asc, then accuracy asc).
pub fn rank_weak(rows: impl IntoIterator<Item = TopicPerformance>, limit: usize) -> Vec<TopicPerformance> {
  let mut eligible: Vec<_> = rows.into_iter().filter(|r| r.questions_attempted >= RANKING_MIN_ATTEMPTS).collect();
  eligible.sort_by(by_mastery_then_accuracy);
  eligible.truncate(limit);
  eligible
}

/// Eligible rows ordered strongest first (mastery desc, then accuracy desc).
pub fn rank_strong(rows: impl IntoIterator<Item = TopicPerformance>, limit: usize) -> Vec<TopicPerformance> {
  let mut eligible: Vec<_> = rows.into_iter().filter(|r| r.questions_attempted >= RANKING_MIN_ATTEMPTS).collect();
  eligible.sort_by(|a, b| by_mastery_then_accuracy(b, a));
  eligible.truncate(limit);
  eligible
}
