//! Millisecond clocks used by the score engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
  fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
  origin: Instant,
}

impl MonotonicClock {
  pub fn new() -> Self {
    Self { origin: Instant::now() }
  }
}

impl Default for MonotonicClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for MonotonicClock {
  fn now_ms(&self) -> u64 {
    self.origin.elapsed().as_millis() as u64
  }
}

/// Hand-driven clock for tests and replays. Clones share the same reading.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
  now: Arc<AtomicU64>,
}

impl ManualClock {
  pub fn at(ms: u64) -> Self {
    Self { now: Arc::new(AtomicU64::new(ms)) }
  }

  pub fn set(&self, ms: u64) {
    self.now.store(ms, Ordering::SeqCst);
  }

  pub fn advance(&self, ms: u64) {
    self.now.fetch_add(ms, Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now_ms(&self) -> u64 {
    self.now.load(Ordering::SeqCst)
  }
}
