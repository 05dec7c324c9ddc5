//! Per-visitor session slots holding the serialized recent history.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::SessionStoreError;
use crate::history::RecentHistory;

/// Opaque visitor session identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
  pub fn generate() -> Self {
    SessionId(Uuid::new_v4().to_string())
  }

  /// Use the supplied id when it is non-blank, otherwise mint a new one.
  pub fn or_generate(raw: Option<String>) -> Self {
    match raw {
      Some(s) if !s.trim().is_empty() => SessionId(s.trim().to_string()),
      _ => Self::generate(),
    }
  }
}

impl fmt::Display for SessionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Durable key/value slot per session. Read-your-own-writes is assumed;
/// atomicity across concurrent requests is not, callers serialize access.
#[async_trait]
pub trait SessionStore: Send + Sync {
  async fn load(&self, session: &SessionId) -> Result<Option<RecentHistory>, SessionStoreError>;
  async fn save(&self, session: &SessionId, history: &RecentHistory) -> Result<(), SessionStoreError>;
  async fn forget(&self, session: &SessionId);
}

struct Slot {
  payload: String,
  last_seen: Instant,
}

/// In-process session store. Histories are kept as JSON, the way a cookie
/// or server-side session slot would hold them.
#[derive(Default)]
pub struct MemorySessionStore {
  slots: Mutex<HashMap<SessionId, Slot>>,
}

impl MemorySessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Drop every session idle for longer than `ttl`. Returns how many went.
  #[instrument(level = "debug", skip(self))]
  pub async fn sweep_idle(&self, ttl: Duration) -> usize {
    let mut slots = self.slots.lock().await;
    let before = slots.len();
    slots.retain(|_, slot| slot.last_seen.elapsed() <= ttl);
    let dropped = before - slots.len();
    if dropped > 0 {
      info!(target: "session", dropped, remaining = slots.len(), "Expired idle sessions");
    }
    dropped
  }

  pub async fn len(&self) -> usize {
    self.slots.lock().await.len()
  }

  #[cfg(test)]
  pub(crate) async fn put_raw(&self, session: &SessionId, payload: &str) {
    self.slots.lock().await.insert(
      session.clone(),
      Slot { payload: payload.to_string(), last_seen: Instant::now() },
    );
  }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
  async fn load(&self, session: &SessionId) -> Result<Option<RecentHistory>, SessionStoreError> {
    let mut slots = self.slots.lock().await;
    match slots.get_mut(session) {
      Some(slot) => {
        slot.last_seen = Instant::now();
        let history = serde_json::from_str::<RecentHistory>(&slot.payload)?;
        Ok(Some(history))
      }
      None => Ok(None),
    }
  }

  async fn save(&self, session: &SessionId, history: &RecentHistory) -> Result<(), SessionStoreError> {
    let payload = serde_json::to_string(history)?;
    debug!(target: "session", %session, len = history.len(), "Saving recent history");
    self.slots.lock().await.insert(session.clone(), Slot { payload, last_seen: Instant::now() });
    Ok(())
  }

  async fn forget(&self, session: &SessionId) {
    self.slots.lock().await.remove(session);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::PromptId;

  #[tokio::test]
  async fn save_then_load_round_trips() {
    let store = MemorySessionStore::new();
    let sid = SessionId::generate();
    assert!(store.load(&sid).await.expect("load").is_none());

    let mut h = RecentHistory::new();
    h.push(PromptId(3), 2);
    store.save(&sid, &h).await.expect("save");
    assert_eq!(store.load(&sid).await.expect("load"), Some(h));
  }

  #[tokio::test]
  async fn corrupt_slot_is_an_error_not_an_empty_history() {
    let store = MemorySessionStore::new();
    let sid = SessionId("broken".into());
    store.put_raw(&sid, "{not json").await;
    assert!(matches!(store.load(&sid).await, Err(SessionStoreError::Corrupt(_))));
  }

  #[tokio::test]
  async fn sweep_drops_idle_sessions() {
    let store = MemorySessionStore::new();
    store.save(&SessionId("a".into()), &RecentHistory::new()).await.expect("save");
    assert_eq!(store.sweep_idle(Duration::from_secs(3600)).await, 0);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(store.sweep_idle(Duration::ZERO).await, 1);
    assert_eq!(store.len().await, 0);
  }

  #[test]
  fn blank_ids_are_replaced() {
    assert_eq!(SessionId::or_generate(Some(" abc ".into())), SessionId("abc".into()));
    let minted = SessionId::or_generate(Some("   ".into()));
    assert!(!minted.0.trim().is_empty());
  }
}
