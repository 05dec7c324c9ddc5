//! Windowed keystroke scoring.
//!
//! Keystrokes are appended as they arrive; pruning and metric computation
//! happen only on `tick`, which the game loop calls once per second. KPS is
//! `events in window / window seconds`, so tick jitter cannot bias it.

use std::collections::VecDeque;

use tracing::trace;

use crate::clock::{Clock, MonotonicClock};
use crate::domain::{KeystrokeEvent, ScoreSample};

pub const DEFAULT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_HISTORY_LEN: usize = 300;

/// Bounded FIFO of score samples for charting.
#[derive(Clone, Debug)]
pub struct ScoreHistory {
  samples: VecDeque<ScoreSample>,
  capacity: usize,
}

impl ScoreHistory {
  pub fn with_capacity(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self { samples: VecDeque::with_capacity(capacity), capacity }
  }

  pub fn push(&mut self, sample: ScoreSample) {
    self.samples.push_back(sample);
    while self.samples.len() > self.capacity {
      self.samples.pop_front();
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = &ScoreSample> {
    self.samples.iter()
  }

  pub fn to_vec(&self) -> Vec<ScoreSample> {
    self.samples.iter().copied().collect()
  }

  pub fn latest(&self) -> Option<ScoreSample> {
    self.samples.back().copied()
  }

  pub fn len(&self) -> usize {
    self.samples.len()
  }

  pub fn is_empty(&self) -> bool {
    self.samples.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}

impl Default for ScoreHistory {
  fn default() -> Self {
    Self::with_capacity(DEFAULT_HISTORY_LEN)
  }
}

pub struct ScoreEngine<C: Clock = MonotonicClock> {
  clock: C,
  window_ms: u64,
  events: VecDeque<KeystrokeEvent>,
  history: ScoreHistory,
}

impl ScoreEngine<MonotonicClock> {
  pub fn new() -> Self {
    Self::with_clock(MonotonicClock::new(), DEFAULT_WINDOW_MS, DEFAULT_HISTORY_LEN)
  }
}

impl Default for ScoreEngine<MonotonicClock> {
  fn default() -> Self {
    Self::new()
  }
}

impl<C: Clock> ScoreEngine<C> {
  /// A zero window is bumped to one millisecond.
  pub fn with_clock(clock: C, window_ms: u64, history_len: usize) -> Self {
    Self {
      clock,
      window_ms: window_ms.max(1),
      events: VecDeque::new(),
      history: ScoreHistory::with_capacity(history_len),
    }
  }

  /// Log one keystroke at the current time. Never prunes.
  pub fn record_keystroke(&mut self, correct: bool) {
    let at_ms = self.clock.now_ms();
    self.events.push_back(KeystrokeEvent { at_ms, correct });
  }

  /// Prune the window, compute a sample and append it to the history.
  pub fn tick(&mut self) -> ScoreSample {
    // Before the first full window has elapsed nothing can be stale.
    if let Some(cutoff) = self.clock.now_ms().checked_sub(self.window_ms) {
      while self.events.front().is_some_and(|e| e.at_ms <= cutoff) {
        self.events.pop_front();
      }
    }

    let total = self.events.len();
    let correct = self.events.iter().filter(|e| e.correct).count();
    let kps = total as f64 / (self.window_ms as f64 / 1000.0);
    let accuracy = if total > 0 {
      correct as f64 / total as f64 * 100.0
    } else {
      100.0
    };

    let sample = ScoreSample { kps, accuracy };
    self.history.push(sample);
    trace!(target: "scoring", total, correct, kps, accuracy, "Tick");
    sample
  }

  pub fn history(&self) -> &ScoreHistory {
    &self.history
  }

  pub fn latest(&self) -> Option<ScoreSample> {
    self.history.latest()
  }

  /// Events currently held, including any not yet pruned.
  pub fn event_count(&self) -> usize {
    self.events.len()
  }

  pub fn window_ms(&self) -> u64 {
    self.window_ms
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;

  fn engine(clock: &ManualClock) -> ScoreEngine<ManualClock> {
    ScoreEngine::with_clock(clock.clone(), DEFAULT_WINDOW_MS, DEFAULT_HISTORY_LEN)
  }

  #[test]
  fn empty_log_scores_zero_kps_and_perfect_accuracy() {
    let clock = ManualClock::at(5_000);
    let mut e = engine(&clock);
    assert_eq!(e.tick(), ScoreSample { kps: 0.0, accuracy: 100.0 });
  }

  #[test]
  fn events_at_or_before_cutoff_are_pruned() {
    let clock = ManualClock::at(0);
    let mut e = engine(&clock);
    e.record_keystroke(true);
    clock.set(10_000);
    e.record_keystroke(true);
    clock.set(70_000);
    e.record_keystroke(true);
    assert_eq!(e.event_count(), 3);

    clock.set(71_000);
    let s = e.tick();
    assert_eq!(e.event_count(), 1);
    assert!((s.kps - 1.0 / 60.0).abs() < 1e-9);
    assert_eq!(s.accuracy, 100.0);
  }

  #[test]
  fn event_exactly_on_cutoff_is_dropped() {
    let clock = ManualClock::at(1_000);
    let mut e = engine(&clock);
    e.record_keystroke(false);
    clock.set(61_000);
    e.tick();
    assert_eq!(e.event_count(), 0);
  }

  #[test]
  fn early_ticks_keep_events_from_time_zero() {
    let clock = ManualClock::at(0);
    let mut e = engine(&clock);
    e.record_keystroke(true);
    clock.set(500);
    let s = e.tick();
    assert_eq!(e.event_count(), 1);
    assert!(s.kps > 0.0);
  }

  #[test]
  fn accuracy_counts_misses() {
    let clock = ManualClock::at(1_000);
    let mut e = engine(&clock);
    for correct in [true, true, true, false] {
      e.record_keystroke(correct);
    }
    let s = e.tick();
    assert_eq!(s.accuracy, 75.0);
    assert!((s.kps - 4.0 / 60.0).abs() < 1e-9);
  }

  #[test]
  fn kps_depends_on_count_not_tick_cadence() {
    let clock = ManualClock::at(100_000);
    let mut e = engine(&clock);
    for _ in 0..30 {
      e.record_keystroke(true);
    }
    let first = e.tick();
    clock.advance(1);
    let second = e.tick();
    clock.advance(2_500);
    let third = e.tick();
    assert_eq!(first.kps, 0.5);
    assert_eq!(second.kps, 0.5);
    assert_eq!(third.kps, 0.5);
  }

  #[test]
  fn window_drains_to_zero() {
    let clock = ManualClock::at(0);
    let mut e = engine(&clock);
    e.record_keystroke(false);
    clock.set(60_001);
    let s = e.tick();
    assert_eq!(s, ScoreSample { kps: 0.0, accuracy: 100.0 });
  }

  #[test]
  fn history_keeps_the_latest_300_samples() {
    let mut h = ScoreHistory::default();
    for i in 1..=301 {
      h.push(ScoreSample { kps: i as f64, accuracy: 100.0 });
    }
    assert_eq!(h.len(), 300);
    let kps: Vec<f64> = h.iter().map(|s| s.kps).collect();
    let expected: Vec<f64> = (2..=301).map(|i| i as f64).collect();
    assert_eq!(kps, expected);
  }

  #[test]
  fn every_tick_lands_in_history() {
    let clock = ManualClock::at(0);
    let mut e = ScoreEngine::with_clock(clock.clone(), 1_000, 3);
    for _ in 0..5 {
      e.record_keystroke(true);
      clock.advance(1_000);
      e.tick();
    }
    assert_eq!(e.history().len(), 3);
    assert_eq!(e.latest(), Some(ScoreSample { kps: 0.0, accuracy: 100.0 }));
  }
}
