//! One player's game: prompt delivery, key matching and scoring glued together.
//!
//! Scoring runs only while a prompt is active. A failed delivery stops it
//! until `retry` brings a prompt back.

use tracing::{info, instrument, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::domain::{KeyOutcome, Prompt, ScoreSample};
use crate::error::DeliveryError;
use crate::prefetch::PrefetchPipeline;
use crate::score::{ScoreEngine, ScoreHistory};
use crate::typing::{is_valid_input_key, MatcherFactory, TypingMatcher};

/// Result of feeding one key into the game.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyFeedback {
  pub outcome: KeyOutcome,
  pub typed: String,
  pub remaining: String,
}

pub struct GameSession<C: Clock = MonotonicClock> {
  pipeline: PrefetchPipeline,
  score: ScoreEngine<C>,
  make_matcher: MatcherFactory,
  current: Option<(Prompt, Box<dyn TypingMatcher>)>,
  completed: Vec<Prompt>,
  scoring: bool,
}

impl<C: Clock> GameSession<C> {
  pub fn new(pipeline: PrefetchPipeline, score: ScoreEngine<C>, make_matcher: MatcherFactory) -> Self {
    Self {
      pipeline,
      score,
      make_matcher,
      current: None,
      completed: Vec::new(),
      scoring: true,
    }
  }

  /// Swap in the next prompt. On failure the current prompt is cleared and
  /// scoring stops.
  #[instrument(level = "debug", skip(self))]
  pub async fn load_next(&mut self) -> Result<Prompt, DeliveryError> {
    match self.pipeline.next().await {
      Ok(prompt) => {
        let matcher = (self.make_matcher)(&prompt.reading);
        self.current = Some((prompt.clone(), matcher));
        self.scoring = true;
        Ok(prompt)
      }
      Err(e) => {
        warn!(target: "scoring", error = %e, "Delivery failed; scoring stopped");
        self.current = None;
        self.scoring = false;
        Err(e)
      }
    }
  }

  /// Re-arm delivery after a failure and load a prompt.
  pub async fn retry(&mut self) -> Result<Prompt, DeliveryError> {
    self.pipeline.restart().await;
    self.load_next().await
  }

  /// Feed one raw key. Returns `None` when the key is ignored: no active
  /// prompt, or not a typing key.
  pub fn input_key(&mut self, key: &str) -> Option<KeyFeedback> {
    if !is_valid_input_key(key) {
      return None;
    }
    let ch = key.chars().next()?;
    let (prompt, matcher) = self.current.as_mut()?;

    let outcome = matcher.advance(ch);
    self.score.record_keystroke(outcome.is_correct());
    let feedback = KeyFeedback {
      outcome,
      typed: matcher.typed().to_string(),
      remaining: matcher.remaining().to_string(),
    };

    if outcome == KeyOutcome::Complete {
      info!(target: "scoring", id = %prompt.id, "Prompt completed");
      if let Some((prompt, _)) = self.current.take() {
        self.completed.push(prompt);
      }
    }
    Some(feedback)
  }

  /// Scoring tick; `None` while scoring is stopped.
  pub fn tick(&mut self) -> Option<ScoreSample> {
    self.scoring.then(|| self.score.tick())
  }

  pub fn is_scoring(&self) -> bool {
    self.scoring
  }

  pub fn current_prompt(&self) -> Option<&Prompt> {
    self.current.as_ref().map(|(p, _)| p)
  }

  /// Prompts finished in this game, oldest first.
  pub fn completed(&self) -> &[Prompt] {
    &self.completed
  }

  pub fn score_history(&self) -> &ScoreHistory {
    self.score.history()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::domain::PromptId;
  use crate::prefetch::PromptSource;
  use crate::typing::ExactMatcher;
  use async_trait::async_trait;
  use std::sync::atomic::{AtomicU64, Ordering};
  use std::sync::Arc;

  struct Counting {
    n: AtomicU64,
    fail_from: u64,
  }

  #[async_trait]
  impl PromptSource for Counting {
    async fn fetch_prompt(&self) -> Result<Prompt, DeliveryError> {
      let n = self.n.fetch_add(1, Ordering::SeqCst) + 1;
      if n >= self.fail_from {
        return Err(DeliveryError::TransportFailure("offline".into()));
      }
      Ok(Prompt { id: PromptId(n), text: format!("t{n}"), reading: "ab".into(), source: None })
    }
  }

  fn game(fail_from: u64, clock: &ManualClock) -> GameSession<ManualClock> {
    let source = Arc::new(Counting { n: AtomicU64::new(0), fail_from });
    GameSession::new(
      PrefetchPipeline::start(source),
      ScoreEngine::with_clock(clock.clone(), 60_000, 300),
      ExactMatcher::boxed,
    )
  }

  #[tokio::test]
  async fn keys_are_scored_and_completion_is_recorded() {
    let clock = ManualClock::at(1_000);
    let mut g = game(u64::MAX, &clock);
    assert!(g.input_key("a").is_none(), "no prompt yet");

    g.load_next().await.expect("prompt");
    assert_eq!(g.input_key("x").map(|f| f.outcome), Some(KeyOutcome::Unmatch));
    assert_eq!(g.input_key("Shift"), None);
    assert_eq!(g.input_key("a").map(|f| f.outcome), Some(KeyOutcome::Match));
    let done = g.input_key("b").expect("feedback");
    assert_eq!(done.outcome, KeyOutcome::Complete);
    assert_eq!(done.remaining, "");
    assert!(g.current_prompt().is_none());
    assert_eq!(g.completed().len(), 1);

    let s = g.tick().expect("scoring");
    assert!((s.accuracy - 200.0 / 3.0).abs() < 1e-9);
    assert!((s.kps - 3.0 / 60.0).abs() < 1e-9);
  }

  #[tokio::test]
  async fn failed_delivery_stops_scoring_until_retry() {
    let clock = ManualClock::at(0);
    let mut g = game(2, &clock);
    g.load_next().await.expect("first prompt");
    assert!(g.tick().is_some());

    let err = g.load_next().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(!g.is_scoring());
    assert!(g.tick().is_none());
    assert!(g.input_key("a").is_none());
    assert_eq!(g.score_history().len(), 1);

    assert!(g.retry().await.is_err(), "source is still offline");
    assert!(!g.is_scoring());
  }
}
