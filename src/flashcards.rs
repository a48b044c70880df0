//! Per-user flashcard collections (process lifetime only).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::{Flashcard, UserId};

pub const MAX_FLASHCARDS_PER_REQUEST: usize = 10;

#[derive(Clone, Default)]
pub struct FlashcardRegistry {
  cards: Arc<RwLock<HashMap<UserId, Vec<Flashcard>>>>,
}

impl FlashcardRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append to the user's collection; returns the new collection size.
  pub async fn add(&self, user: UserId, cards: &[Flashcard]) -> usize {
    let mut all = self.cards.write().await;
    let mine = all.entry(user).or_default();
    mine.extend_from_slice(cards);
    mine.len()
  }

  pub async fn count(&self, user: UserId) -> usize {
    self.cards.read().await.get(&user).map_or(0, Vec::len)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn collections_grow_per_user() {
    let r = FlashcardRegistry::new();
    let card = Flashcard { front: "What is DHCP?".into(), back: "Dynamic host configuration".into() };
    assert_eq!(r.add(1, &[card.clone(), card.clone()]).await, 2);
    assert_eq!(r.add(1, &[card.clone()]).await, 3);
    assert_eq!(r.count(1).await, 3);
    assert_eq!(r.count(2).await, 0);
  }
}
