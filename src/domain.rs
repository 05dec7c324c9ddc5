//! Domain models: prompts, keystroke events and score samples.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a prompt inside the corpus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptId(pub u64);

impl fmt::Display for PromptId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// One trivia prompt. Immutable once it leaves the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
  pub id: PromptId,
  /// Text shown to the player.
  #[serde(rename = "odai")]
  pub text: String,
  /// Reading fed to the typing matcher.
  #[serde(rename = "yomi")]
  pub reading: String,
  #[serde(default)]
  pub source: Option<String>,
}

/// Outcome of feeding one key into a typing matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOutcome {
  Match,
  Unmatch,
  Complete,
}

impl KeyOutcome {
  /// Anything but a miss counts as a correct keystroke.
  pub fn is_correct(self) -> bool {
    !matches!(self, KeyOutcome::Unmatch)
  }
}

/// One accepted keystroke, stamped with the monotonic clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeystrokeEvent {
  pub at_ms: u64,
  pub correct: bool,
}

/// Metrics produced by one scoring tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreSample {
  pub kps: f64,
  pub accuracy: f64,
}
