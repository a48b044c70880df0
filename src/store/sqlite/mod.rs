//! SQLite backend (sqlx). Progress rows are replaced whole; topic performance is
//! a single upsert so concurrent answers for one topic never lose a count.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use super::{
  from_db_id, to_db_id, AchievementStore, HistoryStore, PerformanceStore, ProgressStore, ACCURACY_BOARD_MIN_QUESTIONS,
};
use crate::achievements::{Achievement, EarnedAchievement};
use crate::domain::{
  display_name, AccuracyMaster, DailyChampion, QuestionHistoryEntry, StudyLegend, TopicPerformance, UserId, UserProgress,
  DEFAULT_CERTIFICATION,
};
use crate::error::StoreError;
use crate::tracker::{rank_strong, rank_weak, MASTERY_MIN_ATTEMPTS, RANKING_MIN_ATTEMPTS};

mod migrate;

fn ser<E: std::fmt::Display>(e: E) -> StoreError {
  StoreError::Serialization(e.to_string())
}

fn limit_param(limit: usize) -> i64 {
  i64::try_from(limit).unwrap_or(i64::MAX)
}

#[derive(Clone)]
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
    let pool = SqlitePoolOptions::new()
      .max_connections(5)
      .acquire_timeout(Duration::from_secs(5))
      .after_connect(|conn, _meta| {
        Box::pin(async move {
          sqlx::query("PRAGMA foreign_keys = ON;").execute(&mut *conn).await?;
          sqlx::query("PRAGMA journal_mode = WAL;").execute(&mut *conn).await?;
          sqlx::query("PRAGMA busy_timeout = 5000;").execute(&mut *conn).await?;
          Ok(())
        })
      })
      .connect(database_url)
      .await?;
    Ok(Self { pool })
  }

  pub async fn migrate(&self) -> Result<(), StoreError> {
    migrate::run_migrations(&self.pool).await
  }

  async fn topics_for(&self, user: UserId, certification: &str) -> Result<Vec<TopicPerformance>, StoreError> {
    let rows = sqlx::query(
      "SELECT * FROM topic_performance WHERE user_id = ?1 AND certification = ?2 AND questions_attempted >= ?3",
    )
    .bind(to_db_id(user)?)
    .bind(certification)
    .bind(RANKING_MIN_ATTEMPTS)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(map_topic_row).collect()
  }
}

fn map_progress_row(row: &SqliteRow) -> Result<UserProgress, StoreError> {
  Ok(UserProgress {
    username: row.try_get("username").map_err(ser)?,
    selected_certification: row.try_get("selected_certification").map_err(ser)?,
    total_questions: row.try_get("total_questions").map_err(ser)?,
    correct_answers: row.try_get("correct_answers").map_err(ser)?,
    study_score: row.try_get("study_score").map_err(ser)?,
    study_time_minutes: row.try_get("study_time_minutes").map_err(ser)?,
    study_streak: row.try_get("study_streak").map_err(ser)?,
    last_study_date: row.try_get::<Option<DateTime<Utc>>, _>("last_study_date").map_err(ser)?,
  })
}

fn map_topic_row(row: &SqliteRow) -> Result<TopicPerformance, StoreError> {
  Ok(TopicPerformance {
    user_id: from_db_id(row.try_get("user_id").map_err(ser)?)?,
    certification: row.try_get("certification").map_err(ser)?,
    topic: row.try_get("topic").map_err(ser)?,
    questions_attempted: row.try_get("questions_attempted").map_err(ser)?,
    questions_correct: row.try_get("questions_correct").map_err(ser)?,
    mastery_level: row.try_get("mastery_level").map_err(ser)?,
    avg_response_time: row.try_get("avg_response_time").map_err(ser)?,
    last_practiced: row.try_get("last_practiced").map_err(ser)?,
  })
}

fn map_earned_row(row: &SqliteRow) -> Result<EarnedAchievement, StoreError> {
  Ok(EarnedAchievement {
    achievement_id: row.try_get("achievement_id").map_err(ser)?,
    name: row.try_get("name").map_err(ser)?,
    description: row.try_get("description").map_err(ser)?,
    category: row.try_get("category").map_err(ser)?,
    points: row.try_get("points").map_err(ser)?,
    earned_at: row.try_get("earned_at").map_err(ser)?,
  })
}

#[async_trait]
impl ProgressStore for SqliteStore {
  async fn get(&self, user: UserId, username: Option<&str>) -> Result<UserProgress, StoreError> {
    let id = to_db_id(user)?;
    sqlx::query(
      "INSERT OR IGNORE INTO users (user_id, username, selected_certification, last_study_date) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(id)
    .bind(username)
    .bind(DEFAULT_CERTIFICATION)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    let row = sqlx::query("SELECT * FROM users WHERE user_id = ?1")
      .bind(id)
      .fetch_one(&self.pool)
      .await?;
    map_progress_row(&row)
  }

  async fn put(&self, user: UserId, progress: &UserProgress) -> Result<(), StoreError> {
    let res = sqlx::query(
      r"
        UPDATE users SET
          username = ?2,
          selected_certification = ?3,
          total_questions = ?4,
          correct_answers = ?5,
          study_score = ?6,
          study_time_minutes = ?7,
          study_streak = ?8,
          last_study_date = ?9
        WHERE user_id = ?1
      ",
    )
    .bind(to_db_id(user)?)
    .bind(progress.username.as_deref())
    .bind(progress.selected_certification.as_deref())
    .bind(progress.total_questions)
    .bind(progress.correct_answers)
    .bind(progress.study_score)
    .bind(progress.study_time_minutes)
    .bind(progress.study_streak)
    .bind(progress.last_study_date)
    .execute(&self.pool)
    .await?;

    if res.rows_affected() == 0 {
      return Err(StoreError::NotFound);
    }
    Ok(())
  }

  async fn accuracy_masters(&self, limit: usize) -> Result<Vec<AccuracyMaster>, StoreError> {
    let rows = sqlx::query(
      r"
        SELECT user_id, username, total_questions, correct_answers,
               ROUND(correct_answers * 100.0 / total_questions, 1) AS accuracy
        FROM users
        WHERE total_questions >= ?1
        ORDER BY accuracy DESC, user_id ASC
        LIMIT ?2
      ",
    )
    .bind(ACCURACY_BOARD_MIN_QUESTIONS)
    .bind(limit_param(limit))
    .fetch_all(&self.pool)
    .await?;

    rows
      .iter()
      .map(|row| {
        let user_id = from_db_id(row.try_get("user_id").map_err(ser)?)?;
        let username: Option<String> = row.try_get("username").map_err(ser)?;
        Ok(AccuracyMaster {
          user_id,
          username: display_name(user_id, username.as_deref()),
          total_questions: row.try_get("total_questions").map_err(ser)?,
          correct_answers: row.try_get("correct_answers").map_err(ser)?,
          accuracy: row.try_get("accuracy").map_err(ser)?,
        })
      })
      .collect()
  }

  async fn study_legends(&self, limit: usize) -> Result<Vec<StudyLegend>, StoreError> {
    let rows = sqlx::query(
      r"
        SELECT user_id, username, study_score, total_questions
        FROM users
        WHERE total_questions > 0
        ORDER BY study_score DESC, user_id ASC
        LIMIT ?1
      ",
    )
    .bind(limit_param(limit))
    .fetch_all(&self.pool)
    .await?;

    rows
      .iter()
      .map(|row| {
        let user_id = from_db_id(row.try_get("user_id").map_err(ser)?)?;
        let username: Option<String> = row.try_get("username").map_err(ser)?;
        Ok(StudyLegend {
          user_id,
          username: display_name(user_id, username.as_deref()),
          study_score: row.try_get("study_score").map_err(ser)?,
          total_questions: row.try_get("total_questions").map_err(ser)?,
        })
      })
      .collect()
  }
}

#[async_trait]
impl PerformanceStore for SqliteStore {
  async fn record_attempt(
    &self,
    user: UserId,
    certification: &str,
    topic: &str,
    correct: bool,
    response_time: f64,
  ) -> Result<TopicPerformance, StoreError> {
    let row = sqlx::query(
      r"
        INSERT INTO topic_performance
          (user_id, certification, topic, questions_attempted, questions_correct,
           mastery_level, avg_response_time, last_practiced)
        VALUES (?1, ?2, ?3, 1, ?4, 0.0, ?5, ?6)
        ON CONFLICT (user_id, certification, topic) DO UPDATE SET
          questions_attempted = topic_performance.questions_attempted + 1,
          questions_correct = topic_performance.questions_correct + ?4,
          avg_response_time = (topic_performance.avg_response_time + ?5) / 2.0,
          last_practiced = ?6,
          mastery_level = CASE
            WHEN topic_performance.questions_attempted + 1 >= ?7
              THEN CAST(topic_performance.questions_correct + ?4 AS REAL) / (topic_performance.questions_attempted + 1)
            ELSE topic_performance.mastery_level
          END
        RETURNING *
      ",
    )
    .bind(to_db_id(user)?)
    .bind(certification)
    .bind(topic)
    .bind(i64::from(correct))
    .bind(response_time)
    .bind(Utc::now())
    .bind(MASTERY_MIN_ATTEMPTS)
    .fetch_one(&self.pool)
    .await?;
    map_topic_row(&row)
  }

  async fn topic(&self, user: UserId, certification: &str, topic: &str) -> Result<Option<TopicPerformance>, StoreError> {
    let row = sqlx::query("SELECT * FROM topic_performance WHERE user_id = ?1 AND certification = ?2 AND topic = ?3")
      .bind(to_db_id(user)?)
      .bind(certification)
      .bind(topic)
      .fetch_optional(&self.pool)
      .await?;
    row.as_ref().map(map_topic_row).transpose()
  }

  async fn weak_spots(&self, user: UserId, certification: &str, limit: usize) -> Result<Vec<TopicPerformance>, StoreError> {
    Ok(rank_weak(self.topics_for(user, certification).await?, limit))
  }

  async fn strengths(&self, user: UserId, certification: &str, limit: usize) -> Result<Vec<TopicPerformance>, StoreError> {
    Ok(rank_strong(self.topics_for(user, certification).await?, limit))
  }

  async fn count_mastered(&self, user: UserId, certification: &str, threshold: f64) -> Result<i64, StoreError> {
    let row = sqlx::query(
      "SELECT COUNT(*) AS n FROM topic_performance WHERE user_id = ?1 AND certification = ?2 AND mastery_level >= ?3",
    )
    .bind(to_db_id(user)?)
    .bind(certification)
    .bind(threshold)
    .fetch_one(&self.pool)
    .await?;
    row.try_get("n").map_err(ser)
  }
}

#[async_trait]
impl HistoryStore for SqliteStore {
  async fn append_history(&self, entry: &QuestionHistoryEntry) -> Result<(), StoreError> {
    sqlx::query(
      r"
        INSERT INTO question_history
          (user_id, certification, difficulty, question_text, user_answer, correct_answer,
           is_correct, response_time_seconds, created_at, created_on)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
      ",
    )
    .bind(to_db_id(entry.user_id)?)
    .bind(&entry.certification)
    .bind(entry.difficulty.as_str())
    .bind(&entry.question_text)
    .bind(entry.user_answer.as_str())
    .bind(entry.correct_answer.as_str())
    .bind(entry.is_correct)
    .bind(entry.response_time_seconds)
    .bind(entry.created_at)
    .bind(entry.created_at.date_naive().to_string())
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn daily_champions(&self, limit: usize) -> Result<Vec<DailyChampion>, StoreError> {
    let today = Utc::now().date_naive().to_string();
    let rows = sqlx::query(
      r"
        SELECT h.user_id AS user_id, u.username AS username, COUNT(*) AS questions_today
        FROM question_history h
        JOIN users u ON u.user_id = h.user_id
        WHERE h.created_on = ?1
        GROUP BY h.user_id, u.username
        ORDER BY questions_today DESC, h.user_id ASC
        LIMIT ?2
      ",
    )
    .bind(today)
    .bind(limit_param(limit))
    .fetch_all(&self.pool)
    .await?;

    rows
      .iter()
      .map(|row| {
        let user_id = from_db_id(row.try_get("user_id").map_err(ser)?)?;
        let username: Option<String> = row.try_get("username").map_err(ser)?;
        Ok(DailyChampion {
          user_id,
          username: display_name(user_id, username.as_deref()),
          questions_today: row.try_get("questions_today").map_err(ser)?,
        })
      })
      .collect()
  }
}

#[async_trait]
impl AchievementStore for SqliteStore {
  async fn achievement_ids(&self, user: UserId) -> Result<Vec<String>, StoreError> {
    let rows = sqlx::query("SELECT achievement_id FROM user_achievements WHERE user_id = ?1")
      .bind(to_db_id(user)?)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(|r| r.try_get("achievement_id").map_err(ser)).collect()
  }

  async fn award_achievement(&self, user: UserId, achievement: &Achievement) -> Result<bool, StoreError> {
    let res = sqlx::query(
      r"
        INSERT INTO user_achievements (user_id, achievement_id, name, description, category, points, earned_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT (user_id, achievement_id) DO NOTHING
      ",
    )
    .bind(to_db_id(user)?)
    .bind(achievement.id)
    .bind(achievement.name)
    .bind(achievement.description)
    .bind(achievement.category)
    .bind(achievement.points)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;
    Ok(res.rows_affected() == 1)
  }

  async fn achievements(&self, user: UserId) -> Result<Vec<EarnedAchievement>, StoreError> {
    let rows = sqlx::query("SELECT * FROM user_achievements WHERE user_id = ?1 ORDER BY earned_at DESC, id DESC")
      .bind(to_db_id(user)?)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(map_earned_row).collect()
  }
}
