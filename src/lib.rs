//! Trivia typing backend.
//!
//! - `selector`: non-repeating random selection over a session's recent history
//! - `prefetch`: double-buffered prompt delivery
//! - `score`: windowed keystrokes-per-second and accuracy
//! - `game` + `routes`: the per-player loop and its HTTP/WebSocket surface

pub mod client;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod game;
pub mod history;
pub mod prefetch;
pub mod protocol;
pub mod routes;
pub mod score;
pub mod seeds;
pub mod selector;
pub mod session;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod typing;

pub use domain::{KeyOutcome, KeystrokeEvent, Prompt, PromptId, ScoreSample};
pub use error::DeliveryError;
pub use prefetch::{PrefetchPipeline, PromptSource};
pub use score::{ScoreEngine, ScoreHistory};
pub use selector::{QuestionSelector, SessionSelector};
