//! Achievement catalog and award checks.
//!
//! Checks run when a practice run is requested, against the stats as they were
//! before the run. Each achievement is awarded at most once per user.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::domain::UserId;
use crate::error::StoreError;
use crate::store::{AchievementStore, PerformanceStore, ProgressStore, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Achievement {
  pub id: &'static str,
  pub name: &'static str,
  pub description: &'static str,
  pub category: &'static str,
  pub points: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EarnedAchievement {
  pub achievement_id: String,
  pub name: String,
  pub description: String,
  pub category: String,
  pub points: i64,
  pub earned_at: DateTime<Utc>,
}

pub const ACCURACY_MASTER: Achievement = Achievement {
  id: "accuracy_master",
  name: "Accuracy Master",
  description: "Maintain 90%+ accuracy over 50+ questions",
  category: "accuracy",
  points: 200,
};

/// Listed for display; nothing tracks consecutive correct answers yet.
pub const PERFECT_STREAK: Achievement = Achievement {
  id: "perfect_streak",
  name: "Perfect Streak",
  description: "Answer 10 questions correctly in a row",
  category: "accuracy",
  points: 150,
};

pub const QUESTION_WARRIOR: Achievement = Achievement {
  id: "question_warrior",
  name: "Question Warrior",
  description: "Answer 100+ practice questions",
  category: "volume",
  points: 150,
};

pub const STUDY_LEGEND: Achievement = Achievement {
  id: "study_legend",
  name: "Study Legend",
  description: "Answer 500+ practice questions",
  category: "volume",
  points: 500,
};

pub const TOPIC_EXPERT: Achievement = Achievement {
  id: "topic_expert",
  name: "Topic Expert",
  description: "Achieve 85%+ mastery in any topic",
  category: "mastery",
  points: 250,
};

pub const CATALOG: [Achievement; 5] = [ACCURACY_MASTER, PERFECT_STREAK, QUESTION_WARRIOR, STUDY_LEGEND, TOPIC_EXPERT];

const TOPIC_EXPERT_MASTERY: f64 = 0.85;

/// Award every newly-earned achievement and return them in catalog order.
#[instrument(level = "debug", skip(store), fields(%user, %certification))]
pub async fn check_achievements(store: &dyn Store, user: UserId, certification: &str) -> Result<Vec<Achievement>, StoreError> {
  let stats = store.get(user, None).await?;
  let held = store.achievement_ids(user).await?;
  let has = |a: &Achievement| held.iter().any(|id| id == a.id);

  let mut earned = Vec::new();

  if !has(&ACCURACY_MASTER) && stats.total_questions >= 50 {
    let accuracy = stats.correct_answers as f64 / stats.total_questions as f64;
    if accuracy >= 0.9 {
      earned.push(ACCURACY_MASTER);
    }
  }
  if !has(&QUESTION_WARRIOR) && stats.total_questions >= 100 {
    earned.push(QUESTION_WARRIOR);
  }
  if !has(&STUDY_LEGEND) && stats.total_questions >= 500 {
    earned.push(STUDY_LEGEND);
  }
  if !has(&TOPIC_EXPERT) && store.count_mastered(user, certification, TOPIC_EXPERT_MASTERY).await? > 0 {
    earned.push(TOPIC_EXPERT);
  }

  let mut awarded = Vec::with_capacity(earned.len());
  for a in earned {
    if store.award_achievement(user, &a).await? {
      info!(target: "study_bot", %user, achievement = a.id, points = a.points, "Achievement unlocked");
      awarded.push(a);
    }
  }
  Ok(awarded)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::memory::MemoryStore;

  #[tokio::test]
  async fn volume_and_accuracy_awards_fire_once() {
    let store = MemoryStore::new();
    let mut p = store.get(1, Some("ana")).await.unwrap();
    p.total_questions = 120;
    p.correct_answers = 110;
    store.put(1, &p).await.unwrap();

    let first = check_achievements(&store, 1, "A+").await.unwrap();
    let ids: Vec<_> = first.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["accuracy_master", "question_warrior"]);

    let second = check_achievements(&store, 1, "A+").await.unwrap();
    assert!(second.is_empty());
    assert_eq!(store.achievements(1).await.unwrap().len(), 2);
  }

  #[tokio::test]
  async fn topic_expert_needs_mastered_topic_in_current_cert() {
    let store = MemoryStore::new();
    store.get(2, None).await.unwrap();
    for _ in 0..5 {
      store.record_attempt(2, "Network+", "Network Security", true, 30.0).await.unwrap();
    }

    assert!(check_achievements(&store, 2, "A+").await.unwrap().is_empty());
    let got = check_achievements(&store, 2, "Network+").await.unwrap();
    assert_eq!(got, vec![TOPIC_EXPERT]);
  }
}
