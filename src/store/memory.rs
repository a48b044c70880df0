//! In-memory store. Mirrors the SQLite semantics closely enough for tests and
//! for running without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{AchievementStore, HistoryStore, PerformanceStore, ProgressStore, ACCURACY_BOARD_MIN_QUESTIONS};
use crate::achievements::{Achievement, EarnedAchievement};
use crate::domain::{
  display_name, AccuracyMaster, DailyChampion, QuestionHistoryEntry, StudyLegend, TopicPerformance, UserId, UserProgress,
};
use crate::error::StoreError;
use crate::tracker::{apply_attempt, rank_strong, rank_weak};
use crate::util::percent_1dp;

type TopicKey = (UserId, String, String);

#[derive(Clone, Default)]
pub struct MemoryStore {
  users: Arc<RwLock<BTreeMap<UserId, UserProgress>>>,
  topics: Arc<RwLock<BTreeMap<TopicKey, TopicPerformance>>>,
  history: Arc<RwLock<Vec<QuestionHistoryEntry>>>,
  achievements: Arc<RwLock<HashMap<UserId, Vec<EarnedAchievement>>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  async fn topics_for(&self, user: UserId, certification: &str) -> Vec<TopicPerformance> {
    self
      .topics
      .read()
      .await
      .values()
      .filter(|r| r.user_id == user && r.certification == certification)
      .cloned()
      .collect()
  }
}

#[async_trait]
impl ProgressStore for MemoryStore {
  async fn get(&self, user: UserId, username: Option<&str>) -> Result<UserProgress, StoreError> {
    let mut users = self.users.write().await;
    Ok(users
      .entry(user)
      .or_insert_with(|| UserProgress::new(username.map(str::to_string)))
      .clone())
  }

  async fn put(&self, user: UserId, progress: &UserProgress) -> Result<(), StoreError> {
    let mut users = self.users.write().await;
    match users.get_mut(&user) {
      Some(slot) => {
        *slot = progress.clone();
        Ok(())
      }
      None => Err(StoreError::NotFound),
    }
  }

  async fn accuracy_masters(&self, limit: usize) -> Result<Vec<AccuracyMaster>, StoreError> {
    let users = self.users.read().await;
    let mut rows: Vec<AccuracyMaster> = users
      .iter()
      .filter(|(_, p)| p.total_questions >= ACCURACY_BOARD_MIN_QUESTIONS)
      .map(|(id, p)| AccuracyMaster {
        user_id: *id,
        username: display_name(*id, p.username.as_deref()),
        total_questions: p.total_questions,
        correct_answers: p.correct_answers,
        accuracy: percent_1dp(p.correct_answers, p.total_questions),
      })
      .collect();
    rows.sort_by(|a, b| b.accuracy.partial_cmp(&a.accuracy).unwrap_or(std::cmp::Ordering::Equal));
    rows.truncate(limit);
    Ok(rows)
  }

  async fn study_legends(&self, limit: usize) -> Result<Vec<StudyLegend>, StoreError> {
    let users = self.users.read().await;
    let mut rows: Vec<StudyLegend> = users
      .iter()
      .filter(|(_, p)| p.total_questions > 0)
      .map(|(id, p)| StudyLegend {
        user_id: *id,
        username: display_name(*id, p.username.as_deref()),
        study_score: p.study_score,
        total_questions: p.total_questions,
      })
      .collect();
    rows.sort_by(|a, b| b.study_score.cmp(&a.study_score));
    rows.truncate(limit);
    Ok(rows)
  }
}

#[async_trait]
impl PerformanceStore for MemoryStore {
  async fn record_attempt(
    &self,
    user: UserId,
    certification: &str,
    topic: &str,
    correct: bool,
    response_time: f64,
  ) -> Result<TopicPerformance, StoreError> {
    let key = (user, certification.to_string(), topic.to_string());
    // Held for the whole read-modify-write, like the single SQL upsert.
    let mut topics = self.topics.write().await;
    let existing = topics.remove(&key);
    let row = apply_attempt(existing, user, certification, topic, correct, response_time, Utc::now());
    topics.insert(key, row.clone());
    Ok(row)
  }

  async fn topic(&self, user: UserId, certification: &str, topic: &str) -> Result<Option<TopicPerformance>, StoreError> {
    let key = (user, certification.to_string(), topic.to_string());
    Ok(self.topics.read().await.get(&key).cloned())
  }

  async fn weak_spots(&self, user: UserId, certification: &str, limit: usize) -> Result<Vec<TopicPerformance>, StoreError> {
    Ok(rank_weak(self.topics_for(user, certification).await, limit))
  }

  async fn strengths(&self, user: UserId, certification: &str, limit: usize) -> Result<Vec<TopicPerformance>, StoreError> {
    Ok(rank_strong(self.topics_for(user, certification).await, limit))
  }

  async fn count_mastered(&self, user: UserId, certification: &str, threshold: f64) -> Result<i64, StoreError> {
    let n = self
      .topics_for(user, certification)
      .await
      .iter()
      .filter(|r| r.mastery_level >= threshold)
      .count();
    Ok(n as i64)
  }
}

#[async_trait]
impl HistoryStore for MemoryStore {
  async fn append_history(&self, entry: &QuestionHistoryEntry) -> Result<(), StoreError> {
    if !self.users.read().await.contains_key(&entry.user_id) {
      return Err(StoreError::NotFound);
    }
    self.history.write().await.push(entry.clone());
    Ok(())
  }

  async fn daily_champions(&self, limit: usize) -> Result<Vec<DailyChampion>, StoreError> {
    let today = Utc::now().date_naive();
    let mut counts: BTreeMap<UserId, i64> = BTreeMap::new();
    for h in self.history.read().await.iter().filter(|h| h.created_at.date_naive() == today) {
      *counts.entry(h.user_id).or_default() += 1;
    }

    let users = self.users.read().await;
    let mut rows: Vec<DailyChampion> = counts
      .into_iter()
      .map(|(id, n)| DailyChampion {
        user_id: id,
        username: display_name(id, users.get(&id).and_then(|p| p.username.as_deref())),
        questions_today: n,
      })
      .collect();
    rows.sort_by(|a, b| b.questions_today.cmp(&a.questions_today));
    rows.truncate(limit);
    Ok(rows)
  }
}

#[async_trait]
impl AchievementStore for MemoryStore {
  async fn achievement_ids(&self, user: UserId) -> Result<Vec<String>, StoreError> {
    let all = self.achievements.read().await;
    Ok(all
      .get(&user)
      .map(|v| v.iter().map(|a| a.achievement_id.clone()).collect())
      .unwrap_or_default())
  }

  async fn award_achievement(&self, user: UserId, achievement: &Achievement) -> Result<bool, StoreError> {
    let mut all = self.achievements.write().await;
    let held = all.entry(user).or_default();
    if held.iter().any(|a| a.achievement_id == achievement.id) {
      return Ok(false);
    }
    held.push(EarnedAchievement {
      achievement_id: achievement.id.to_string(),
      name: achievement.name.to_string(),
      description: achievement.description.to_string(),
      category: achievement.category.to_string(),
      points: achievement.points,
      earned_at: Utc::now(),
    });
    Ok(true)
  }

  async fn achievements(&self, user: UserId) -> Result<Vec<EarnedAchievement>, StoreError> {
    let all = self.achievements.read().await;
    let mut earned = all.get(&user).cloned().unwrap_or_default();
    earned.reverse();
    Ok(earned)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Choice, Difficulty, DEFAULT_CERTIFICATION};

  #[tokio::test]
  async fn get_creates_once_and_put_replaces() {
    let store = MemoryStore::new();
    let mut p = store.get(9, Some("ana")).await.unwrap();
    assert_eq!(p.selected_certification.as_deref(), Some(DEFAULT_CERTIFICATION));
    p.study_score = -3;
    store.put(9, &p).await.unwrap();

    let again = store.get(9, Some("other-name")).await.unwrap();
    assert_eq!(again.study_score, -3);
    assert_eq!(again.username.as_deref(), Some("ana"));
  }

  #[tokio::test]
  async fn put_for_unknown_user_is_not_found() {
    let store = MemoryStore::new();
    let err = store.put(1, &UserProgress::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound));
  }

  #[tokio::test]
  async fn adaptive_difficulty_reads_stored_mastery() {
    let store = MemoryStore::new();
    assert_eq!(store.adaptive_difficulty(1, "A+", "Hardware").await.unwrap(), Difficulty::Intermediate);
    for _ in 0..6 {
      store.record_attempt(1, "A+", "Hardware", true, 30.0).await.unwrap();
    }
    assert_eq!(store.adaptive_difficulty(1, "A+", "Hardware").await.unwrap(), Difficulty::Advanced);
    for _ in 0..2 {
      store.record_attempt(1, "A+", "Security", false, 30.0).await.unwrap();
    }
    assert_eq!(store.adaptive_difficulty(1, "A+", "Security").await.unwrap(), Difficulty::Intermediate);
  }

  #[tokio::test]
  async fn weak_spots_scoped_to_user_and_certification() {
    let store = MemoryStore::new();
    for _ in 0..3 {
      store.record_attempt(1, "A+", "Networking", false, 30.0).await.unwrap();
      store.record_attempt(2, "A+", "Hardware", false, 30.0).await.unwrap();
      store.record_attempt(1, "Security+", "Implementation", false, 30.0).await.unwrap();
    }
    store.record_attempt(1, "A+", "Security", false, 30.0).await.unwrap();

    let weak = store.weak_spots(1, "A+", 5).await.unwrap();
    assert_eq!(weak.len(), 1);
    assert_eq!(weak[0].topic, "Networking");
  }

  #[tokio::test]
  async fn boards_rank_and_filter() {
    let store = MemoryStore::new();
    for (id, name, total, correct, score) in [(1, "a", 12, 6, 4), (2, "b", 20, 18, 10), (3, "c", 5, 5, 5), (4, "d", 0, 0, 0)] {
      let mut p = store.get(id, Some(name)).await.unwrap();
      p.total_questions = total;
      p.correct_answers = correct;
      p.study_score = score;
      store.put(id, &p).await.unwrap();
    }

    let masters = store.accuracy_masters(5).await.unwrap();
    let names: Vec<_> = masters.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["b", "a"]);
    assert_eq!(masters[0].accuracy, 90.0);

    let legends = store.study_legends(5).await.unwrap();
    let names: Vec<_> = legends.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["b", "c", "a"]);
  }

  #[tokio::test]
  async fn daily_champions_count_todays_history() {
    let store = MemoryStore::new();
    store.get(1, Some("ana")).await.unwrap();
    store.get(2, Some("bo")).await.unwrap();
    let entry = |user: UserId, days_ago: i64| QuestionHistoryEntry {
      user_id: user,
      certification: "A+".into(),
      difficulty: Difficulty::Intermediate,
      question_text: "q".into(),
      user_answer: Choice::A,
      correct_answer: Choice::B,
      is_correct: false,
      response_time_seconds: 30,
      created_at: Utc::now() - chrono::Duration::days(days_ago),
    };
    store.append_history(&entry(1, 0)).await.unwrap();
    store.append_history(&entry(2, 0)).await.unwrap();
    store.append_history(&entry(2, 0)).await.unwrap();
    store.append_history(&entry(1, 3)).await.unwrap();

    let champs = store.daily_champions(5).await.unwrap();
    assert_eq!(champs.len(), 2);
    assert_eq!((champs[0].username.as_str(), champs[0].questions_today), ("bo", 2));
    assert_eq!((champs[1].username.as_str(), champs[1].questions_today), ("ana", 1));
  }
}
