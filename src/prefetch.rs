//! Double-buffered prompt delivery.
//!
//! The pipeline always keeps the next prompt in flight while the current
//! one is being typed. The in-flight fetch is an explicit task handle in a
//! single slot, so "at most one outstanding fetch" is a property of the
//! field itself. `next` holds the slot lock for its whole duration, which
//! serializes concurrent callers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::Prompt;
use crate::error::DeliveryError;
use crate::selector::SessionSelector;
use crate::session::SessionId;

/// Anything that can produce one prompt asynchronously.
#[async_trait]
pub trait PromptSource: Send + Sync {
  async fn fetch_prompt(&self) -> Result<Prompt, DeliveryError>;
}

type PendingFetch = JoinHandle<Result<Prompt, DeliveryError>>;

pub struct PrefetchPipeline {
  source: Arc<dyn PromptSource>,
  pending: Mutex<Option<PendingFetch>>,
}

impl PrefetchPipeline {
  /// Create the pipeline and immediately put the first fetch in flight.
  /// Must be called inside a tokio runtime.
  pub fn start(source: Arc<dyn PromptSource>) -> Self {
    let first = Self::issue(&source);
    debug!(target: "delivery", "Prefetch pipeline started");
    Self { source, pending: Mutex::new(Some(first)) }
  }

  fn issue(source: &Arc<dyn PromptSource>) -> PendingFetch {
    let source = source.clone();
    tokio::spawn(async move { source.fetch_prompt().await })
  }

  /// Wait for the pending prompt, put the following one in flight, and
  /// return the one that resolved.
  ///
  /// A failed fetch is returned as-is and the pipeline is left idle; call
  /// `restart` to try again. Calling `next` on an idle pipeline returns
  /// `DeliveryError::Idle`. Dropping this future mid-wait keeps the
  /// pending fetch in place.
  #[instrument(level = "debug", skip(self))]
  pub async fn next(&self) -> Result<Prompt, DeliveryError> {
    let mut slot = self.pending.lock().await;
    let handle = slot.as_mut().ok_or(DeliveryError::Idle)?;

    let resolved = match handle.await {
      Ok(result) => result,
      Err(e) => Err(DeliveryError::TransportFailure(format!("prefetch task failed: {e}"))),
    };
    *slot = None;

    match &resolved {
      Ok(prompt) => {
        *slot = Some(Self::issue(&self.source));
        debug!(target: "delivery", id = %prompt.id, "Prompt handed out; next fetch in flight");
      }
      Err(e) => {
        warn!(target: "delivery", error = %e, "Prefetch failed; pipeline idle until restarted");
      }
    }
    resolved
  }

  /// Re-arm an idle pipeline. Returns false if a fetch was already pending.
  pub async fn restart(&self) -> bool {
    let mut slot = self.pending.lock().await;
    if slot.is_some() {
      return false;
    }
    *slot = Some(Self::issue(&self.source));
    info!(target: "delivery", "Prefetch pipeline restarted");
    true
  }

  /// Number of fetches in flight or resolved-but-unclaimed: 0 or 1.
  pub async fn outstanding(&self) -> usize {
    usize::from(self.pending.lock().await.is_some())
  }
}

impl Drop for PrefetchPipeline {
  fn drop(&mut self) {
    if let Some(handle) = self.pending.get_mut().take() {
      handle.abort();
    }
  }
}

/// In-process source: selects for one session through the shared selector.
pub struct SessionPromptSource {
  selector: Arc<SessionSelector>,
  session: SessionId,
}

impl SessionPromptSource {
  pub fn new(selector: Arc<SessionSelector>, session: SessionId) -> Self {
    Self { selector, session }
  }
}

#[async_trait]
impl PromptSource for SessionPromptSource {
  async fn fetch_prompt(&self) -> Result<Prompt, DeliveryError> {
    self.selector.select_for(&self.session).await
  }
}
