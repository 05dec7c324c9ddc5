//! HTTP prompt source: pulls prompts from a running trivia server.
//!
//! Every request is made unique with a `t=<millis>` query parameter and
//! sent with `Cache-Control: no-store`, so no cache along the way can hand
//! back a previous prompt. The session id issued by the server on the first
//! response is reused for every later request.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, PRAGMA, USER_AGENT};
use reqwest::StatusCode;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::domain::Prompt;
use crate::error::DeliveryError;
use crate::prefetch::PromptSource;
use crate::protocol::{ErrorOut, TriviaOut};
use crate::session::SessionId;

#[derive(Debug)]
pub struct HttpPromptSource {
  client: reqwest::Client,
  base_url: String,
  session: Mutex<Option<SessionId>>,
}

impl HttpPromptSource {
  pub fn new(base_url: impl Into<String>) -> Result<Self, DeliveryError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| DeliveryError::TransportFailure(e.to_string()))?;
    Ok(Self {
      client,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      session: Mutex::new(None),
    })
  }

  pub async fn session(&self) -> Option<SessionId> {
    self.session.lock().await.clone()
  }
}

fn cache_buster() -> u128 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis())
    .unwrap_or_default()
}

/// Map a non-2xx response onto the delivery taxonomy.
fn error_from_status(status: StatusCode, body: &str) -> DeliveryError {
  match status {
    StatusCode::NOT_FOUND => DeliveryError::EmptyCorpus,
    StatusCode::CONFLICT => DeliveryError::NoAvailablePrompts,
    StatusCode::SERVICE_UNAVAILABLE => {
      DeliveryError::SessionStoreUnavailable(format!("server reported HTTP {status}"))
    }
    _ => {
      let message = match serde_json::from_str::<ErrorOut>(body) {
        Ok(e) => match e.details {
          Some(d) => format!("{} ({})", e.error, d),
          None => e.error,
        },
        Err(_) => format!("server error: {status}"),
      };
      DeliveryError::TransportFailure(message)
    }
  }
}

#[async_trait]
impl PromptSource for HttpPromptSource {
  #[instrument(level = "debug", skip(self), fields(base_url = %self.base_url))]
  async fn fetch_prompt(&self) -> Result<Prompt, DeliveryError> {
    let mut session = self.session.lock().await;
    let url = format!("{}/api/v1/trivia", self.base_url);
    let t = cache_buster().to_string();
    let mut query: Vec<(&str, &str)> = vec![("t", t.as_str())];
    if let Some(s) = session.as_ref() {
      query.push(("session", s.0.as_str()));
    }

    let started = std::time::Instant::now();
    let res = self
      .client
      .get(&url)
      .query(&query)
      .header(USER_AGENT, "trivia-typing-backend/0.1")
      .header(CACHE_CONTROL, "no-store")
      .header(PRAGMA, "no-cache")
      .send()
      .await
      .map_err(|e| DeliveryError::TransportFailure(e.to_string()))?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let err = error_from_status(status, &body);
      error!(target: "delivery", %status, error = %err, elapsed = ?started.elapsed(), "Trivia request failed");
      return Err(err);
    }

    let out: TriviaOut = res
      .json()
      .await
      .map_err(|e| DeliveryError::TransportFailure(format!("malformed trivia response: {e}")))?;
    if session.as_ref() != Some(&out.session) {
      info!(target: "session", session = %out.session, "Adopted server session");
      *session = Some(out.session);
    }
    info!(target: "delivery", id = %out.prompt.id, elapsed = ?started.elapsed(), "Trivia fetched");
    Ok(out.prompt)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_map_onto_the_taxonomy() {
    assert_eq!(error_from_status(StatusCode::NOT_FOUND, ""), DeliveryError::EmptyCorpus);
    assert_eq!(error_from_status(StatusCode::CONFLICT, ""), DeliveryError::NoAvailablePrompts);
    assert!(matches!(
      error_from_status(StatusCode::SERVICE_UNAVAILABLE, ""),
      DeliveryError::SessionStoreUnavailable(_)
    ));
  }

  #[test]
  fn error_body_details_are_kept() {
    let body = r#"{"error":"db down","details":"timeout"}"#;
    assert_eq!(
      error_from_status(StatusCode::INTERNAL_SERVER_ERROR, body),
      DeliveryError::TransportFailure("db down (timeout)".into())
    );
    assert_eq!(
      error_from_status(StatusCode::BAD_GATEWAY, "<html>"),
      DeliveryError::TransportFailure("server error: 502 Bad Gateway".into())
    );
  }

  async fn serve(state: crate::state::AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = crate::routes::build_router(std::sync::Arc::new(state));
    tokio::spawn(async move {
      let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
  }

  #[tokio::test]
  async fn pipeline_over_http_keeps_one_session_and_never_repeats() {
    use crate::config::TriviaConfig;
    use crate::domain::PromptId;
    use crate::prefetch::PrefetchPipeline;
    use crate::state::AppState;
    use std::sync::Arc;

    let prompts = (1..=6)
      .map(|i| Prompt { id: PromptId(i), text: format!("t{i}"), reading: format!("r{i}"), source: None })
      .collect();
    let base = serve(AppState::with_corpus(TriviaConfig::default(), prompts)).await;

    let source = Arc::new(HttpPromptSource::new(base).expect("client"));
    let pipeline = PrefetchPipeline::start(source.clone());
    let mut seen: Vec<PromptId> = Vec::new();
    for _ in 0..12 {
      let p = pipeline.next().await.expect("prompt");
      // Capacity for six prompts is three.
      assert!(!seen.iter().rev().take(3).any(|id| *id == p.id), "{} repeated", p.id);
      seen.push(p.id);
    }
    assert!(source.session().await.is_some());
    assert_eq!(pipeline.outstanding().await, 1);
  }

  #[tokio::test]
  async fn empty_corpus_over_http_is_reported_as_such() {
    use crate::config::TriviaConfig;
    use crate::prefetch::PrefetchPipeline;
    use crate::state::AppState;
    use std::sync::Arc;

    let base = serve(AppState::with_corpus(TriviaConfig::default(), vec![])).await;
    let pipeline = PrefetchPipeline::start(Arc::new(HttpPromptSource::new(base).expect("client")));
    assert_eq!(pipeline.next().await.unwrap_err(), DeliveryError::EmptyCorpus);
    assert_eq!(pipeline.outstanding().await, 0);
  }

  #[tokio::test]
  async fn unreachable_server_is_a_transport_failure() {
    let source = HttpPromptSource::new("http://127.0.0.1:9/").expect("client");
    let err = source.fetch_prompt().await.unwrap_err();
    assert!(matches!(err, DeliveryError::TransportFailure(_)));
    assert!(source.session().await.is_none());
  }
}
