//! HTTP endpoint handlers. These are thin wrappers that forward to the selector.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::header::{CACHE_CONTROL, EXPIRES, PRAGMA},
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::DeliveryError;
use crate::history::capacity_for;
use crate::protocol::*;
use crate::session::SessionId;
use crate::state::AppState;
use crate::store::ContentStore;

const NO_STORE: [(axum::http::HeaderName, &str); 3] = [
  (CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
  (PRAGMA, "no-cache"),
  (EXPIRES, "-1"),
];

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

/// Select one unseen trivia prompt for the session, minting a session when
/// none was given. Responses are never cacheable.
#[instrument(level = "info", skip(state), fields(session = ?q.session))]
pub async fn http_get_trivia(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SessionQuery>,
) -> impl IntoResponse {
  let session = SessionId::or_generate(q.session);
  match state.selector.select_for(&session).await {
    Ok(prompt) => {
      info!(target: "delivery", %session, id = %prompt.id, "HTTP trivia served");
      (NO_STORE, Json(TriviaOut { session, prompt })).into_response()
    }
    Err(e) => {
      info!(target: "delivery", %session, error = %e, "HTTP trivia failed");
      (NO_STORE, e).into_response()
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_count(State(state): State<Arc<AppState>>) -> Result<Json<CountOut>, DeliveryError> {
  let count = state.store.count().await?;
  Ok(Json(CountOut { count }))
}

#[instrument(level = "info", skip(state), fields(session = ?q.session))]
pub async fn http_get_session_history(
  State(state): State<Arc<AppState>>,
  Query(q): Query<SessionQuery>,
) -> Result<Json<RecentHistoryOut>, DeliveryError> {
  let session = SessionId::or_generate(q.session);
  let history = state.selector.history_of(&session).await?;
  let count = state.store.count().await?;
  Ok(Json(RecentHistoryOut {
    session,
    capacity: capacity_for(count).unwrap_or(0),
    ids: history.ids().collect(),
  }))
}
