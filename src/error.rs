//! Error types per concern, plus the log-and-continue policy used by the quiz engine.

use std::fmt::Display;

use thiserror::Error;
use tracing::warn;

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
  #[error("not found")]
  NotFound,

  #[error("connection error: {0}")]
  Connection(String),

  #[error("serialization error: {0}")]
  Serialization(String),
}

impl From<sqlx::Error> for StoreError {
  fn from(e: sqlx::Error) -> Self {
    match e {
      sqlx::Error::RowNotFound => StoreError::NotFound,
      sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => StoreError::Serialization(e.to_string()),
      other => StoreError::Connection(other.to_string()),
    }
  }
}

/// Errors from the language-model collaborators.
#[derive(Debug, Error)]
pub enum AiError {
  #[error("OpenAI HTTP error: {0}")]
  Http(String),

  #[error("JSON parse error: {0}")]
  Parse(String),

  #[error("invalid model output: {0}")]
  Invalid(String),
}

/// Errors from the presentation sink (chat message send/edit).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresentationError {
  /// The message no longer exists (deleted, or the channel went away).
  #[error("message is gone")]
  MessageGone,

  #[error("transport error: {0}")]
  Transport(String),
}

/// Policy for side effects that must never abort a quiz run:
/// failures are logged and the caller continues with `None`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BestEffort;

impl BestEffort {
  pub fn settle<T, E: Display>(step: &'static str, result: Result<T, E>) -> Option<T> {
    match result {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(target: "quiz", %step, error = %e, "Best-effort step failed; continuing");
        None
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn best_effort_passes_values_and_swallows_errors() {
    assert_eq!(BestEffort::settle::<_, StoreError>("ok", Ok(3)), Some(3));
    assert_eq!(BestEffort::settle::<i32, _>("fail", Err(StoreError::Connection("down".into()))), None);
  }

  #[test]
  fn row_not_found_maps_to_not_found() {
    assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound));
  }
}
