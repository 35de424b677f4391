use serde::{
  Deserialize,
  Serialize,
};

pub const MIN_PANE_WIDTH: u16 = 20;
pub const MAX_PANE_WIDTH: u16 = 80;
pub const DEFAULT_PANE_WIDTH: u16 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaneState {
  #[default]
  Closed,
  Open,
}

/// Visibility and width of the preview pane next to the lesson content.
///
/// Width is a percentage of the space shared with the lesson and is clamped
/// to `MIN_PANE_WIDTH..=MAX_PANE_WIDTH`. It survives closing the pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneLayout {
  state: PaneState,
  width: u16,
}

impl Default for PaneLayout {
  fn default() -> Self {
    Self::new(DEFAULT_PANE_WIDTH)
  }
}

impl PaneLayout {
  pub fn new(width: u16) -> Self {
    Self {
      state: PaneState::Closed,
      width: clamp_width(width),
    }
  }

  pub fn state(&self) -> PaneState {
    self.state
  }

  pub fn is_open(&self) -> bool {
    self.state == PaneState::Open
  }

  pub fn width(&self) -> u16 {
    self.width
  }

  /// Width the lesson content gets: everything when closed.
  pub fn content_width(&self) -> u16 {
    if self.is_open() { 100 - self.width } else { 100 }
  }

  pub fn set_width(&mut self, width: u16) -> u16 {
    self.width = clamp_width(width);
    self.width
  }

  /// Returns true if the state changed.
  pub fn show(&mut self) -> bool {
    let changed = !self.is_open();
    self.state = PaneState::Open;
    changed
  }

  /// Returns true if the state changed.
  pub fn hide(&mut self) -> bool {
    let changed = self.is_open();
    self.state = PaneState::Closed;
    changed
  }
}

fn clamp_width(width: u16) -> u16 {
  width.clamp(MIN_PANE_WIDTH, MAX_PANE_WIDTH)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn width_is_clamped() {
    let mut layout = PaneLayout::new(5);
    assert_eq!(layout.width(), MIN_PANE_WIDTH);
    assert_eq!(layout.set_width(99), MAX_PANE_WIDTH);
  }

  #[test]
  fn content_takes_the_rest() {
    let mut layout = PaneLayout::new(30);
    assert_eq!(layout.content_width(), 100);
    layout.show();
    assert_eq!(layout.content_width(), 70);
  }

  #[test]
  fn hide_twice_changes_once() {
    let mut layout = PaneLayout::default();
    assert!(layout.show());
    assert!(!layout.show());
    assert!(layout.hide());
    assert!(!layout.hide());
    assert_eq!(layout.state(), PaneState::Closed);
  }
}
