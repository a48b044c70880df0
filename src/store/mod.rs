//! Persistence seams: user progress, topic performance, question history and achievements.
//!
//! Two backends implement every trait:
//!   - `memory::MemoryStore`: in-process maps, used when no DATABASE_URL is set and in tests
//!   - `sqlite::SqliteStore`: sqlx/SQLite with a versioned migration
//!
//! User progress is replace-on-update with no concurrency control (last writer wins).
//! Topic performance is a single upsert so the backend provides per-row atomicity.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::achievements::{Achievement, EarnedAchievement};
use crate::domain::{
  AccuracyMaster, DailyChampion, Difficulty, QuestionHistoryEntry, StudyLegend, TopicPerformance, UserId, UserProgress,
};
use crate::error::StoreError;
use crate::tracker::difficulty_for;

pub mod memory;
pub mod sqlite;

/// Minimum lifetime questions to appear on the accuracy board.
pub const ACCURACY_BOARD_MIN_QUESTIONS: i64 = 10;

#[async_trait]
pub trait ProgressStore: Send + Sync {
  /// Fetch a user's record, creating it (default certification) on first contact.
  async fn get(&self, user: UserId, username: Option<&str>) -> Result<UserProgress, StoreError>;

  /// Replace the whole record.
  async fn put(&self, user: UserId, progress: &UserProgress) -> Result<(), StoreError>;

  /// Users with at least `ACCURACY_BOARD_MIN_QUESTIONS`, best accuracy first.
  async fn accuracy_masters(&self, limit: usize) -> Result<Vec<AccuracyMaster>, StoreError>;

  /// Users with any questions, highest study score first.
  async fn study_legends(&self, limit: usize) -> Result<Vec<StudyLegend>, StoreError>;
}

#[async_trait]
pub trait PerformanceStore: Send + Sync {
  /// Upsert one attempt; mastery only moves once the topic has enough attempts.
  async fn record_attempt(
    &self,
    user: UserId,
    certification: &str,
    topic: &str,
    correct: bool,
    response_time: f64,
  ) -> Result<TopicPerformance, StoreError>;

  async fn topic(&self, user: UserId, certification: &str, topic: &str) -> Result<Option<TopicPerformance>, StoreError>;

  async fn adaptive_difficulty(&self, user: UserId, certification: &str, topic: &str) -> Result<Difficulty, StoreError> {
    Ok(difficulty_for(self.topic(user, certification, topic).await?.as_ref()))
  }

  async fn weak_spots(&self, user: UserId, certification: &str, limit: usize) -> Result<Vec<TopicPerformance>, StoreError>;

  async fn strengths(&self, user: UserId, certification: &str, limit: usize) -> Result<Vec<TopicPerformance>, StoreError>;

  /// Number of topics in `certification` with mastery at or above `threshold`.
  async fn count_mastered(&self, user: UserId, certification: &str, threshold: f64) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
  async fn append_history(&self, entry: &QuestionHistoryEntry) -> Result<(), StoreError>;

  /// Users ranked by scored answers recorded today (UTC).
  async fn daily_champions(&self, limit: usize) -> Result<Vec<DailyChampion>, StoreError>;
}

#[async_trait]
pub trait AchievementStore: Send + Sync {
  async fn achievement_ids(&self, user: UserId) -> Result<Vec<String>, StoreError>;

  /// Returns false if the user already holds it.
  async fn award_achievement(&self, user: UserId, achievement: &Achievement) -> Result<bool, StoreError>;

  /// Earned achievements, newest first.
  async fn achievements(&self, user: UserId) -> Result<Vec<EarnedAchievement>, StoreError>;
}

/// Everything the bot persists.
pub trait Store: ProgressStore + PerformanceStore + HistoryStore + AchievementStore {}

impl<T> Store for T where T: ProgressStore + PerformanceStore + HistoryStore + AchievementStore {}

/// Open the configured backend: SQLite when a URL is given, otherwise in-memory.
pub async fn open(database_url: Option<&str>) -> Result<Arc<dyn Store>, StoreError> {
  match database_url {
    Some(url) => {
      let store = sqlite::SqliteStore::connect(url).await?;
      store.migrate().await?;
      info!(target: "store", "SQLite store ready");
      Ok(Arc::new(store))
    }
    None => {
      warn!(target: "store", "DATABASE_URL not set; progress is kept in memory and lost on restart");
      Ok(Arc::new(memory::MemoryStore::new()))
    }
  }
}

pub(crate) fn to_db_id(user: UserId) -> Result<i64, StoreError> {
  i64::try_from(user).map_err(|_| StoreError::Serialization(format!("user id {} overflows i64", user)))
}

pub(crate) fn from_db_id(id: i64) -> Result<UserId, StoreError> {
  UserId::try_from(id).map_err(|_| StoreError::Serialization(format!("negative user id {}", id)))
}
