//! Session-scoped rolling history of recently served prompt ids.

use std::collections::{HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::domain::PromptId;

/// History capacity for a corpus of `corpus_size` prompts: half the corpus,
/// rounded up, never below one. `None` for an empty corpus.
pub fn capacity_for(corpus_size: usize) -> Option<usize> {
  if corpus_size == 0 {
    None
  } else {
    Some(corpus_size.div_ceil(2).max(1))
  }
}

/// Bounded FIFO of prompt ids, oldest first.
///
/// The capacity is not stored: it is recomputed from the live corpus size on
/// every selection and applied when the next id is pushed. A history read
/// between a corpus shrink and the next push may therefore be longer than the
/// new capacity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentHistory {
  ids: VecDeque<PromptId>,
}

impl RecentHistory {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `id`, then evict from the front while longer than `capacity`.
  pub fn push(&mut self, id: PromptId, capacity: usize) {
    self.ids.push_back(id);
    while self.ids.len() > capacity {
      self.ids.pop_front();
    }
  }

  pub fn contains(&self, id: PromptId) -> bool {
    self.ids.contains(&id)
  }

  /// Snapshot used as the exclusion set for the next selection.
  pub fn exclusion_set(&self) -> HashSet<PromptId> {
    self.ids.iter().copied().collect()
  }

  pub fn ids(&self) -> impl Iterator<Item = PromptId> + '_ {
    self.ids.iter().copied()
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }
}
