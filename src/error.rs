//! Error types for prompt delivery, the content store and session storage.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

use crate::protocol::ErrorOut;

/// Failures of the content store collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
  #[error("content store unavailable: {0}")]
  Unavailable(String),
}

/// Failures reading or writing a session's history slot.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionStoreError {
  #[error("session slot is corrupt: {0}")]
  Corrupt(#[from] serde_json::Error),
  #[error("session store unavailable: {0}")]
  Unavailable(String),
}

/// Everything that can go wrong while delivering a prompt.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeliveryError {
  #[error("the corpus is empty")]
  EmptyCorpus,
  #[error("no unseen prompts are available")]
  NoAvailablePrompts,
  #[error("failed to fetch prompt: {0}")]
  TransportFailure(String),
  #[error("session history unavailable: {0}")]
  SessionStoreUnavailable(String),
  #[error("no fetch is pending; restart the pipeline")]
  Idle,
}

impl DeliveryError {
  /// Whether a caller may reasonably try again.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      DeliveryError::NoAvailablePrompts | DeliveryError::TransportFailure(_) | DeliveryError::Idle
    )
  }

  pub fn status(&self) -> StatusCode {
    match self {
      DeliveryError::EmptyCorpus => StatusCode::NOT_FOUND,
      DeliveryError::NoAvailablePrompts => StatusCode::CONFLICT,
      DeliveryError::TransportFailure(_) => StatusCode::BAD_GATEWAY,
      DeliveryError::SessionStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      DeliveryError::Idle => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<StoreError> for DeliveryError {
  fn from(e: StoreError) -> Self {
    DeliveryError::TransportFailure(e.to_string())
  }
}

impl From<SessionStoreError> for DeliveryError {
  fn from(e: SessionStoreError) -> Self {
    DeliveryError::SessionStoreUnavailable(e.to_string())
  }
}

impl IntoResponse for DeliveryError {
  fn into_response(self) -> Response {
    let body = ErrorOut {
      error: self.to_string(),
      details: None,
      retryable: self.is_retryable(),
    };
    (self.status(), Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_corpus_is_fatal_and_maps_to_404() {
    assert!(!DeliveryError::EmptyCorpus.is_retryable());
    assert_eq!(DeliveryError::EmptyCorpus.status(), StatusCode::NOT_FOUND);
    assert!(!DeliveryError::SessionStoreUnavailable("down".into()).is_retryable());
  }

  #[test]
  fn store_errors_become_transport_failures() {
    let e: DeliveryError = StoreError::Unavailable("db gone".into()).into();
    assert!(matches!(e, DeliveryError::TransportFailure(ref m) if m.contains("db gone")));
    assert!(e.is_retryable());
  }
}
