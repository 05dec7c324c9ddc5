//! WebSocket game loop. One `GameSession` per socket; keystrokes, scoring
//! ticks and prompt completions are all handled on this one task, so a
//! keystroke is always counted by exactly the ticks that follow it.

use std::sync::Arc;
use std::time::Duration;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::domain::KeyOutcome;
use crate::error::DeliveryError;
use crate::game::GameSession;
use crate::protocol::{ClientWsMessage, ServerWsMessage, SessionQuery};
use crate::session::SessionId;
use crate::state::AppState;
use crate::typing::ExactMatcher;

#[instrument(level = "info", skip(ws, state, q), fields(session = ?q.session))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<SessionQuery>,
) -> impl IntoResponse {
  let session = SessionId::or_generate(q.session);
  info!(target: "trivia_backend", %session, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, session))
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e), "retryable": false }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "trivia_backend", error = %e, "WS send error");
      false
    }
  }
}

fn delivery_error(e: &DeliveryError) -> ServerWsMessage {
  let message = if e.is_retryable() {
    format!("Failed to load the next trivia ({e}). Press retry.")
  } else {
    format!("Failed to load the next trivia ({e}). Please reload the page.")
  };
  ServerWsMessage::Error { message, retryable: e.is_retryable() }
}

async fn load_into(game: &mut GameSession, retry: bool) -> ServerWsMessage {
  let loaded = if retry { game.retry().await } else { game.load_next().await };
  match loaded {
    Ok(prompt) => ServerWsMessage::Prompt { prompt },
    Err(e) => delivery_error(&e),
  }
}

#[instrument(level = "info", skip(socket, state), fields(%session))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, session: SessionId) {
  info!(target: "trivia_backend", "WebSocket connected");
  let mut game = GameSession::new(state.pipeline_for(&session), state.score_engine(), ExactMatcher::boxed);
  let advance_delay = Duration::from_millis(state.config.delivery.advance_delay_ms);

  let mut ticker = tokio::time::interval(Duration::from_millis(state.config.scoring.tick_ms.max(1)));
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

  if !send(&mut socket, &ServerWsMessage::Session { session: session.clone() }).await {
    return;
  }
  let first = load_into(&mut game, false).await;
  if !send(&mut socket, &first).await {
    return;
  }

  // Pending advance to the next prompt after a completion.
  let advance = tokio::time::sleep(Duration::ZERO);
  tokio::pin!(advance);
  let mut advancing = false;

  loop {
    tokio::select! {
      () = &mut advance, if advancing => {
        advancing = false;
        let next = load_into(&mut game, false).await;
        if !send(&mut socket, &next).await {
          break;
        }
      }
      _ = ticker.tick() => {
        if let Some(sample) = game.tick() {
          if !send(&mut socket, &ServerWsMessage::Score { kps: sample.kps, accuracy: sample.accuracy }).await {
            break;
          }
        }
      }
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        let txt = match msg {
          Message::Text(txt) => txt,
          Message::Ping(payload) => {
            let _ = socket.send(Message::Pong(payload)).await;
            continue;
          }
          Message::Close(_) => break,
          _ => continue,
        };

        let parsed = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(m) => m,
          Err(e) => {
            let reply = ServerWsMessage::Error { message: format!("Invalid JSON: {}", e), retryable: false };
            if !send(&mut socket, &reply).await { break; }
            continue;
          }
        };
        debug!(target: "trivia_backend", "WS received: {:?}", &parsed);

        if matches!(parsed, ClientWsMessage::Next | ClientWsMessage::Retry) {
          advancing = false;
        }
        let replies = handle_client_ws(parsed, &mut game).await;
        if completes_prompt(&replies) {
          // Let the client fade the finished prompt out first.
          advance.as_mut().reset(Instant::now() + advance_delay);
          advancing = true;
        }
        let mut open = true;
        for reply in &replies {
          if !send(&mut socket, reply).await {
            open = false;
            break;
          }
        }
        if !open { break; }
      }
    }
  }

  info!(target: "trivia_backend", completed = game.completed().len(), "WebSocket disconnected");
  // Abort the pending prefetch before the session's history goes.
  drop(game);
  state.selector.end_session(&session).await;
}

fn completes_prompt(replies: &[ServerWsMessage]) -> bool {
  replies.iter().any(|r| matches!(r, ServerWsMessage::Complete { .. }))
}

async fn handle_client_ws(msg: ClientWsMessage, game: &mut GameSession) -> Vec<ServerWsMessage> {
  match msg {
    ClientWsMessage::Ping => vec![ServerWsMessage::Pong],

    ClientWsMessage::Key { key } => {
      let Some(feedback) = game.input_key(&key) else { return vec![] };
      let completed = feedback.outcome == KeyOutcome::Complete;
      let mut out = vec![ServerWsMessage::KeyResult {
        outcome: feedback.outcome,
        typed: feedback.typed,
        remaining: feedback.remaining,
      }];
      if completed {
        if let Some(prompt) = game.completed().last().cloned() {
          out.push(ServerWsMessage::Complete { prompt });
        }
      }
      out
    }

    ClientWsMessage::Next => vec![load_into(game, false).await],

    ClientWsMessage::Retry => vec![load_into(game, true).await],

    ClientWsMessage::ScoreHistory => vec![ServerWsMessage::ScoreHistory { samples: game.score_history().to_vec() }],
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Prompt, PromptId};
  use crate::prefetch::{PrefetchPipeline, PromptSource};
  use crate::score::ScoreEngine;
  use async_trait::async_trait;

  struct One;

  #[async_trait]
  impl PromptSource for One {
    async fn fetch_prompt(&self) -> Result<Prompt, DeliveryError> {
      Ok(Prompt { id: PromptId(1), text: "x".into(), reading: "a".into(), source: None })
    }
  }

  #[tokio::test]
  async fn completing_a_prompt_schedules_the_next() {
    let mut game = GameSession::new(PrefetchPipeline::start(Arc::new(One)), ScoreEngine::new(), ExactMatcher::boxed);
    game.load_next().await.expect("prompt");

    let replies = handle_client_ws(ClientWsMessage::Key { key: "a".into() }, &mut game).await;
    assert_eq!(replies.len(), 2);
    assert!(matches!(replies[1], ServerWsMessage::Complete { .. }));
    assert!(completes_prompt(&replies));
    assert!(game.current_prompt().is_none(), "next prompt waits for the advance delay");

    assert!(matches!(load_into(&mut game, false).await, ServerWsMessage::Prompt { .. }));
    assert!(game.current_prompt().is_some());
  }

  #[tokio::test]
  async fn plain_keystrokes_do_not_advance() {
    let mut game = GameSession::new(PrefetchPipeline::start(Arc::new(One)), ScoreEngine::new(), ExactMatcher::boxed);
    game.load_next().await.expect("prompt");
    let replies = handle_client_ws(ClientWsMessage::Key { key: "z".into() }, &mut game).await;
    assert_eq!(replies.len(), 1);
    assert!(!completes_prompt(&replies));
  }

  #[tokio::test]
  async fn ignored_keys_produce_no_reply() {
    let mut game = GameSession::new(PrefetchPipeline::start(Arc::new(One)), ScoreEngine::new(), ExactMatcher::boxed);
    let replies = handle_client_ws(ClientWsMessage::Key { key: "a".into() }, &mut game).await;
    assert!(replies.is_empty(), "no prompt loaded yet");
  }

  #[test]
  fn fatal_errors_ask_for_reload() {
    match delivery_error(&DeliveryError::EmptyCorpus) {
      ServerWsMessage::Error { message, retryable } => {
        assert!(!retryable);
        assert!(message.contains("reload"));
      }
      other => panic!("unexpected {other:?}"),
    }
  }
}
