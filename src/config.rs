//! Loading server configuration (scoring, delivery, sessions, trivia corpus) from TOML.
//!
//! See `TriviaConfig` for the expected schema. Every section is optional.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Prompt, PromptId};
use crate::score::{DEFAULT_HISTORY_LEN, DEFAULT_WINDOW_MS};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TriviaConfig {
  #[serde(default)]
  pub scoring: ScoringCfg,
  #[serde(default)]
  pub delivery: DeliveryCfg,
  #[serde(default)]
  pub session: SessionCfg,
  #[serde(default)]
  pub trivia: Vec<TriviaCfg>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScoringCfg {
  pub window_ms: u64,
  pub history_len: usize,
  pub tick_ms: u64,
}

impl Default for ScoringCfg {
  fn default() -> Self {
    Self { window_ms: DEFAULT_WINDOW_MS, history_len: DEFAULT_HISTORY_LEN, tick_ms: 1_000 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DeliveryCfg {
  /// Pause between finishing a prompt and showing the next one.
  pub advance_delay_ms: u64,
  /// Fixed RNG seed for reproducible selection; random when absent.
  pub rng_seed: Option<u64>,
}

impl Default for DeliveryCfg {
  fn default() -> Self {
    Self { advance_delay_ms: 500, rng_seed: None }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
  pub idle_ttl_secs: u64,
}

impl Default for SessionCfg {
  fn default() -> Self {
    Self { idle_ttl_secs: 3_600 }
  }
}

/// Trivia entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct TriviaCfg {
  pub id: u64,
  pub odai: String,
  pub yomi: String,
  #[serde(default)]
  pub source: Option<String>,
}

impl TriviaCfg {
  /// Entries with a blank text or reading are rejected.
  pub fn to_prompt(&self) -> Option<Prompt> {
    if self.odai.trim().is_empty() || self.yomi.trim().is_empty() {
      return None;
    }
    Some(Prompt {
      id: PromptId(self.id),
      text: self.odai.clone(),
      reading: self.yomi.trim().to_string(),
      source: self.source.clone().filter(|s| !s.trim().is_empty()),
    })
  }
}

pub fn parse_config(s: &str) -> Result<TriviaConfig, toml::de::Error> {
  toml::from_str::<TriviaConfig>(s)
}

/// Attempt to load `TriviaConfig` from TRIVIA_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<TriviaConfig> {
  let path = std::env::var("TRIVIA_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "trivia_backend", %path, trivia = cfg.trivia.len(), "Loaded config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "trivia_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "trivia_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_file_gives_defaults() {
    let cfg = parse_config("").expect("parse");
    assert_eq!(cfg.scoring.window_ms, 60_000);
    assert_eq!(cfg.scoring.history_len, 300);
    assert_eq!(cfg.delivery.advance_delay_ms, 500);
    assert!(cfg.trivia.is_empty());
  }

  #[test]
  fn parses_sections_and_trivia() {
    let cfg = parse_config(
      r#"
      [scoring]
      window_ms = 30000

      [delivery]
      rng_seed = 7

      [[trivia]]
      id = 1
      odai = "猫は一日に十四時間眠る"
      yomi = "nekohaitinitinijuuyojikannnemuru"
      source = "https://example.org/neko"

      [[trivia]]
      id = 2
      odai = "   "
      yomi = "x"
      "#,
    )
    .expect("parse");
    assert_eq!(cfg.scoring.window_ms, 30_000);
    assert_eq!(cfg.scoring.tick_ms, 1_000);
    assert_eq!(cfg.delivery.rng_seed, Some(7));
    let prompts: Vec<_> = cfg.trivia.iter().filter_map(TriviaCfg::to_prompt).collect();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0].source.as_deref(), Some("https://example.org/neko"));
  }
}
