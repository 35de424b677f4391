use std::fmt;

/// Identifies one render request. Later requests always get larger values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
  pub const fn new(value: u64) -> Self {
    Self(value)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Decides which render completions may become visible.
///
/// Execution hosts can finish loads out of order and cannot always be
/// cancelled. Instead of cancelling, every load is tagged with a generation
/// from [`GenerationGate::issue`] and its completion is passed through
/// [`GenerationGate::accept`], which only lets the most recently issued
/// generation through, and only once. A completion for an older generation
/// is dropped even when it arrives before the newer one, so stale content
/// never flashes on screen.
#[derive(Debug, Clone, Default)]
pub struct GenerationGate {
  issued: u64,
  shown:  Option<u64>,
}

impl GenerationGate {
  pub fn issue(&mut self) -> Generation {
    self.issued = self.issued.saturating_add(1);
    Generation(self.issued)
  }

  /// The most recently issued generation, if any.
  pub fn latest(&self) -> Option<Generation> {
    (self.issued != 0).then_some(Generation(self.issued))
  }

  /// The generation currently on screen.
  pub fn shown(&self) -> Option<Generation> {
    self.shown.map(Generation)
  }

  pub fn accept(&mut self, generation: Generation) -> bool {
    if generation.0 == 0 || generation.0 != self.issued {
      return false;
    }
    if self.shown == Some(generation.0) {
      return false;
    }
    self.shown = Some(generation.0);
    true
  }

  /// Stop accepting anything that is currently in flight. Generations keep
  /// increasing afterwards.
  pub fn invalidate(&mut self) {
    self.issued = self.issued.saturating_add(1);
  }
}
