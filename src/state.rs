//! Application state: corpus, session histories, selector and config.
//!
//! The corpus is the TOML trivia list plus the built-in seeds (config ids win
//! on collision). Session histories live in memory and expire after the
//! configured idle TTL.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::config::{load_config_from_env, TriviaConfig};
use crate::domain::Prompt;
use crate::prefetch::{PrefetchPipeline, SessionPromptSource};
use crate::score::ScoreEngine;
use crate::seeds::seed_prompts;
use crate::selector::{QuestionSelector, SessionSelector};
use crate::session::{MemorySessionStore, SessionId};
use crate::store::MemoryStore;

#[derive(Clone)]
pub struct AppState {
  pub store: Arc<MemoryStore>,
  pub sessions: Arc<MemorySessionStore>,
  pub selector: Arc<SessionSelector>,
  pub config: TriviaConfig,
}

impl AppState {
  /// Build state from env: load config, merge corpus, build selector.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    Self::from_config(load_config_from_env().unwrap_or_default())
  }

  pub fn from_config(config: TriviaConfig) -> Self {
    let mut prompts: Vec<Prompt> = Vec::new();
    for t in &config.trivia {
      match t.to_prompt() {
        Some(p) => prompts.push(p),
        None => warn!(target: "delivery", id = t.id, "Skipping trivia entry: blank odai or yomi."),
      }
    }
    let configured = prompts.len();
    prompts.extend(seed_prompts());
    Self::with_prompts(config, prompts, configured)
  }

  /// State over exactly `prompts`, without seeds.
  pub fn with_corpus(config: TriviaConfig, prompts: Vec<Prompt>) -> Self {
    let n = prompts.len();
    Self::with_prompts(config, prompts, n)
  }

  fn with_prompts(config: TriviaConfig, prompts: Vec<Prompt>, configured: usize) -> Self {
    let store = Arc::new(MemoryStore::from_prompts(prompts));
    let sessions = Arc::new(MemorySessionStore::new());
    let selector = Arc::new(SessionSelector::new(
      QuestionSelector::new(config.delivery.rng_seed),
      store.clone(),
      sessions.clone(),
    ));
    info!(target: "delivery", configured, seeded = config.delivery.rng_seed.is_some(), "Startup trivia inventory");
    Self { store, sessions, selector, config }
  }

  /// Start a prefetching pipeline for one session.
  pub fn pipeline_for(&self, session: &SessionId) -> PrefetchPipeline {
    let source = SessionPromptSource::new(self.selector.clone(), session.clone());
    PrefetchPipeline::start(Arc::new(source))
  }

  /// A score engine using the configured window and history length.
  pub fn score_engine(&self) -> ScoreEngine {
    ScoreEngine::with_clock(
      Default::default(),
      self.config.scoring.window_ms,
      self.config.scoring.history_len,
    )
  }

  /// Periodically expire idle sessions.
  pub fn spawn_session_sweeper(&self) -> JoinHandle<()> {
    let sessions = self.sessions.clone();
    let ttl = Duration::from_secs(self.config.session.idle_ttl_secs);
    let period = (ttl / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(period);
      loop {
        interval.tick().await;
        sessions.sweep_idle(ttl).await;
      }
    })
  }
}

impl Default for AppState {
  fn default() -> Self {
    Self::new()
  }
}
