//! Trivia typing game backend
//!
//! - Axum HTTP + WebSocket API
//! - Static typing page fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   TRIVIA_CONFIG_PATH  : path to TOML config (scoring, delivery, session, trivia corpus)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use trivia_backend::routes::build_router;
use trivia_backend::state::AppState;
use trivia_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Corpus, session histories and selector.
  let state = Arc::new(AppState::new());
  let _sweeper = state.spawn_session_sweeper();

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "trivia_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "trivia_backend", "Shutdown requested");
    })
    .await?;
  Ok(())
}
