//! Content store: the corpus of trivia prompts.
//!
//! The selector only needs a live count, the ids not in an exclusion set,
//! and lookup by id. `MemoryStore` is the in-process implementation, built
//! from the TOML corpus and the built-in seeds.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::domain::{Prompt, PromptId};
use crate::error::StoreError;

#[async_trait]
pub trait ContentStore: Send + Sync {
  /// Current corpus size. May change between calls.
  async fn count(&self) -> Result<usize, StoreError>;

  /// Ids of every prompt not in `excluded`.
  async fn ids_excluding(&self, excluded: &HashSet<PromptId>) -> Result<Vec<PromptId>, StoreError>;

  async fn get(&self, id: PromptId) -> Result<Option<Prompt>, StoreError>;

  /// One random prompt outside `excluded`, or `None` when all are excluded.
  async fn fetch_one_excluding(&self, excluded: &HashSet<PromptId>) -> Result<Option<Prompt>, StoreError> {
    let ids = self.ids_excluding(excluded).await?;
    match pick_random(&ids) {
      Some(id) => self.get(id).await,
      None => Ok(None),
    }
  }
}

fn pick_random(ids: &[PromptId]) -> Option<PromptId> {
  ids.choose(&mut rand::thread_rng()).copied()
}

/// In-memory corpus keyed by prompt id.
#[derive(Debug, Default)]
pub struct MemoryStore {
  prompts: RwLock<BTreeMap<PromptId, Prompt>>,
}

impl MemoryStore {
  /// Build from a list of prompts. Later duplicates of an id are ignored.
  pub fn from_prompts(prompts: impl IntoIterator<Item = Prompt>) -> Self {
    let mut map = BTreeMap::new();
    for p in prompts {
      map.entry(p.id).or_insert(p);
    }
    Self { prompts: RwLock::new(map) }
  }

  /// Insert or replace a prompt.
  #[instrument(level = "debug", skip(self, prompt), fields(id = %prompt.id))]
  pub async fn insert(&self, prompt: Prompt) {
    self.prompts.write().await.insert(prompt.id, prompt);
  }

  #[instrument(level = "debug", skip(self))]
  pub async fn remove(&self, id: PromptId) -> Option<Prompt> {
    let removed = self.prompts.write().await.remove(&id);
    if removed.is_some() {
      info!(target: "delivery", %id, "Prompt removed from corpus");
    }
    removed
  }
}

#[async_trait]
impl ContentStore for MemoryStore {
  async fn count(&self) -> Result<usize, StoreError> {
    Ok(self.prompts.read().await.len())
  }

  async fn ids_excluding(&self, excluded: &HashSet<PromptId>) -> Result<Vec<PromptId>, StoreError> {
    let prompts = self.prompts.read().await;
    Ok(prompts.keys().filter(|id| !excluded.contains(id)).copied().collect())
  }

  async fn get(&self, id: PromptId) -> Result<Option<Prompt>, StoreError> {
    Ok(self.prompts.read().await.get(&id).cloned())
  }
}
