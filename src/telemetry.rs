//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! Behavior:
//! - LOG_LEVEL controls the filter (e.g. "debug" or detailed directives like
//!   "info,delivery=debug,scoring=trace,tower_http=info").
//! - LOG_FORMAT selects "pretty" (default) or "json" structured logs.
//!
//! Targets in use: `trivia_backend` (lifecycle), `delivery` (selection and
//! prefetch), `scoring` (ticks), `session` (history slots).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,delivery=debug,scoring=info,session=info,trivia_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // Targets stay on so delivery and scoring lines can be told apart.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // Unset or unknown LOG_FORMAT means pretty.
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => {
            builder.json().init();
        }
        _ => {
            builder.init();
        }
    }
}
