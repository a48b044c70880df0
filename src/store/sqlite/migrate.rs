use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::StoreError;

async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
  let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
    .bind(version)
    .fetch_optional(pool)
    .await?;
  Ok(row.is_some())
}

/// Versioned schema migrations. Each version runs once, inside a transaction.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
  sqlx::query(
    r"
      CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TEXT NOT NULL
      );
    ",
  )
  .execute(pool)
  .await?;

  // Version 1: users, question history, topic performance, achievements.
  if !is_applied(pool, 1).await? {
    let mut tx = pool.begin().await?;

    sqlx::query(
      r"
        CREATE TABLE IF NOT EXISTS users (
          user_id INTEGER PRIMARY KEY,
          username TEXT,
          selected_certification TEXT,
          total_questions INTEGER NOT NULL DEFAULT 0,
          correct_answers INTEGER NOT NULL DEFAULT 0,
          study_score INTEGER NOT NULL DEFAULT 0,
          study_time_minutes INTEGER NOT NULL DEFAULT 0,
          study_streak INTEGER NOT NULL DEFAULT 0,
          last_study_date TEXT
        );
      ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
      r"
        CREATE TABLE IF NOT EXISTS question_history (
          id INTEGER PRIMARY KEY,
          user_id INTEGER NOT NULL,
          certification TEXT NOT NULL,
          difficulty TEXT NOT NULL,
          question_text TEXT NOT NULL,
          user_answer TEXT NOT NULL CHECK (user_answer IN ('A', 'B', 'C', 'D')),
          correct_answer TEXT NOT NULL CHECK (correct_answer IN ('A', 'B', 'C', 'D')),
          is_correct INTEGER NOT NULL,
          response_time_seconds INTEGER NOT NULL,
          created_at TEXT NOT NULL,
          created_on TEXT NOT NULL,
          FOREIGN KEY (user_id) REFERENCES users(user_id) ON DELETE CASCADE
        );
      ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
      r"
        CREATE TABLE IF NOT EXISTS topic_performance (
          id INTEGER PRIMARY KEY,
          user_id INTEGER NOT NULL,
          certification TEXT NOT NULL,
          topic TEXT NOT NULL,
          questions_attempted INTEGER NOT NULL CHECK (questions_attempted >= 0),
          questions_correct INTEGER NOT NULL CHECK (questions_correct >= 0),
          mastery_level REAL NOT NULL DEFAULT 0.0,
          avg_response_time REAL NOT NULL DEFAULT 0.0,
          last_practiced TEXT NOT NULL,
          UNIQUE (user_id, certification, topic)
        );
      ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
      r"
        CREATE TABLE IF NOT EXISTS user_achievements (
          id INTEGER PRIMARY KEY,
          user_id INTEGER NOT NULL,
          achievement_id TEXT NOT NULL,
          name TEXT NOT NULL,
          description TEXT NOT NULL,
          category TEXT NOT NULL,
          points INTEGER NOT NULL,
          earned_at TEXT NOT NULL,
          UNIQUE (user_id, achievement_id)
        );
      ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_history_day ON question_history(created_on, user_id);")
      .execute(&mut *tx)
      .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_topic_user_cert ON topic_performance(user_id, certification);")
      .execute(&mut *tx)
      .await?;

    sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
      .bind(1_i64)
      .bind(Utc::now().to_rfc3339())
      .execute(&mut *tx)
      .await?;

    tx.commit().await?;
  }

  Ok(())
}
