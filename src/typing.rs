//! Typing-match capability.
//!
//! The game only needs to know, per key, whether it matched, missed or
//! finished the prompt. Romanization rules belong to the matcher; the
//! default `ExactMatcher` just walks the reading character by character.

use crate::domain::KeyOutcome;

pub trait TypingMatcher: Send {
  fn advance(&mut self, key: char) -> KeyOutcome;
  fn typed(&self) -> &str;
  fn remaining(&self) -> &str;
  fn is_complete(&self) -> bool {
    self.remaining().is_empty()
  }
}

/// Builds a matcher for a prompt reading.
pub type MatcherFactory = fn(&str) -> Box<dyn TypingMatcher>;

/// Keys the game accepts at all. Everything else (modifiers, arrows,
/// function keys arriving as names) is ignored before matching.
pub fn is_valid_input_key(key: &str) -> bool {
  let mut chars = key.chars();
  match (chars.next(), chars.next()) {
    (Some(c), None) => !c.is_control() && !c.is_whitespace(),
    _ => false,
  }
}

/// Matches keys against the reading verbatim, ignoring ASCII case.
#[derive(Clone, Debug)]
pub struct ExactMatcher {
  reading: String,
  pos: usize,
}

impl ExactMatcher {
  pub fn new(reading: &str) -> Self {
    Self { reading: reading.to_string(), pos: 0 }
  }

  pub fn boxed(reading: &str) -> Box<dyn TypingMatcher> {
    Box::new(Self::new(reading))
  }
}

impl TypingMatcher for ExactMatcher {
  fn advance(&mut self, key: char) -> KeyOutcome {
    let Some(expected) = self.reading[self.pos..].chars().next() else {
      return KeyOutcome::Unmatch;
    };
    if !expected.eq_ignore_ascii_case(&key) {
      return KeyOutcome::Unmatch;
    }
    self.pos += expected.len_utf8();
    if self.pos == self.reading.len() {
      KeyOutcome::Complete
    } else {
      KeyOutcome::Match
    }
  }

  fn typed(&self) -> &str {
    &self.reading[..self.pos]
  }

  fn remaining(&self) -> &str {
    &self.reading[self.pos..]
  }
}
