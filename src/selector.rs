//! Non-repeating random prompt selection.
//!
//! `QuestionSelector` picks uniformly among prompts not in a recent history
//! and records the pick. `SessionSelector` wraps it with the per-session
//! load/select/save cycle, holding that session's lock for the whole cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Prompt, PromptId};
use crate::error::DeliveryError;
use crate::history::{capacity_for, RecentHistory};
use crate::session::{SessionId, SessionStore};
use crate::store::ContentStore;

pub struct QuestionSelector {
  rng: StdMutex<StdRng>,
}

impl QuestionSelector {
  pub fn new(seed: Option<u64>) -> Self {
    let rng = match seed {
      Some(s) => StdRng::seed_from_u64(s),
      None => StdRng::from_entropy(),
    };
    Self { rng: StdMutex::new(rng) }
  }

  fn choose(&self, available: &[PromptId]) -> Option<PromptId> {
    let mut rng = match self.rng.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    available.choose(&mut *rng).copied()
  }

  /// Pick one unseen prompt and record it in `history`.
  ///
  /// The history is only touched once the prompt has been fetched, so any
  /// error leaves it exactly as it was. Not idempotent: two calls advance
  /// the history twice.
  #[instrument(level = "debug", skip(self, store, history), fields(history_len = history.len()))]
  pub async fn select(
    &self,
    store: &dyn ContentStore,
    history: &mut RecentHistory,
  ) -> Result<Prompt, DeliveryError> {
    let corpus_size = store.count().await?;
    let capacity = capacity_for(corpus_size).ok_or(DeliveryError::EmptyCorpus)?;

    let available = store.ids_excluding(&history.exclusion_set()).await?;
    let chosen = self.choose(&available).ok_or_else(|| {
      warn!(target: "delivery", corpus_size, history_len = history.len(), "Every prompt is in recent history");
      DeliveryError::NoAvailablePrompts
    })?;

    // The corpus may have lost the chosen prompt since the id listing.
    let prompt = store.get(chosen).await?.ok_or(DeliveryError::NoAvailablePrompts)?;

    history.push(chosen, capacity);
    debug!(target: "delivery", id = %chosen, corpus_size, capacity, unseen = available.len(), "Selected prompt");
    Ok(prompt)
  }
}

/// Selection against per-session histories kept in a `SessionStore`.
pub struct SessionSelector {
  selector: QuestionSelector,
  store: Arc<dyn ContentStore>,
  sessions: Arc<dyn SessionStore>,
  locks: StdMutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl SessionSelector {
  pub fn new(
    selector: QuestionSelector,
    store: Arc<dyn ContentStore>,
    sessions: Arc<dyn SessionStore>,
  ) -> Self {
    Self { selector, store, sessions, locks: StdMutex::new(HashMap::new()) }
  }

  pub fn store(&self) -> &Arc<dyn ContentStore> {
    &self.store
  }

  fn session_lock(&self, session: &SessionId) -> Arc<Mutex<()>> {
    let mut locks = match self.locks.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    // Drop locks nobody holds or waits on.
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    locks.entry(session.clone()).or_default().clone()
  }

  /// Select the next prompt for `session`, committing the history only on
  /// success. Concurrent calls for the same session run one at a time.
  #[instrument(level = "info", skip(self), fields(%session))]
  pub async fn select_for(&self, session: &SessionId) -> Result<Prompt, DeliveryError> {
    let lock = self.session_lock(session);
    let _guard = lock.lock().await;

    let mut history = self.sessions.load(session).await?.unwrap_or_default();
    let prompt = self.selector.select(self.store.as_ref(), &mut history).await?;
    self.sessions.save(session, &history).await?;

    info!(target: "delivery", %session, id = %prompt.id, history_len = history.len(), "Prompt served");
    Ok(prompt)
  }

  /// Read-only view of a session's history for display.
  pub async fn history_of(&self, session: &SessionId) -> Result<RecentHistory, DeliveryError> {
    Ok(self.sessions.load(session).await?.unwrap_or_default())
  }

  /// End a session: drop its history and its lock.
  ///
  /// Waits for an in-flight `select_for` on the same session, so its save
  /// cannot land after the history is gone.
  #[instrument(level = "debug", skip(self), fields(%session))]
  pub async fn end_session(&self, session: &SessionId) {
    let lock = self.session_lock(session);
    let _guard = lock.lock().await;
    self.sessions.forget(session).await;

    let mut locks = match self.locks.lock() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    // Held by the map and by us only; a queued caller keeps it alive.
    if locks.get(session).is_some_and(|l| Arc::strong_count(l) <= 2) {
      locks.remove(session);
    }
  }
}
