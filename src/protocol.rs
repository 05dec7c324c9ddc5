//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{KeyOutcome, Prompt, PromptId, ScoreSample};
use crate::session::SessionId;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  /// One raw key as reported by the browser (`KeyboardEvent.key`).
  Key { key: String },
  /// Ask for the next prompt without finishing the current one.
  Next,
  /// Re-arm delivery after a failed fetch.
  Retry,
  ScoreHistory,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Session {
    session: SessionId,
  },
  Prompt {
    prompt: Prompt,
  },
  KeyResult {
    outcome: KeyOutcome,
    typed: String,
    remaining: String,
  },
  Complete {
    prompt: Prompt,
  },
  Score {
    kps: f64,
    accuracy: f64,
  },
  ScoreHistory {
    samples: Vec<ScoreSample>,
  },
  Error {
    message: String,
    retryable: bool,
  },
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
  pub session: Option<String>,
}

/// One trivia prompt plus the session it was selected for.
#[derive(Debug, Serialize, Deserialize)]
pub struct TriviaOut {
  pub session: SessionId,
  #[serde(flatten)]
  pub prompt: Prompt,
}

#[derive(Serialize, Deserialize)]
pub struct CountOut {
  pub count: usize,
}

#[derive(Serialize, Deserialize)]
pub struct RecentHistoryOut {
  pub session: SessionId,
  pub capacity: usize,
  pub ids: Vec<PromptId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
  pub error: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
  #[serde(default)]
  pub retryable: bool,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}
