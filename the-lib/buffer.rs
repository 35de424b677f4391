//! Source buffers for the live preview.
//!
//! A [`SourceBuffers`] owns the three independent texts a preview is built
//! from (markup, style and script). Edits are accepted verbatim: nothing here
//! parses or validates the code, broken input only shows up once it runs.
//!
//! Each buffer keeps a bounded undo/redo history of whole-text revisions.
//! Seeding replaces all three buffers at once and starts a fresh history.

use std::{
  collections::VecDeque,
  fmt,
  str::FromStr,
  sync::Arc,
};

use serde::{
  Deserialize,
  Serialize,
};
use thiserror::Error;

pub const DEFAULT_HISTORY_LIMIT: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
  Markup,
  Style,
  Script,
}

impl BufferKind {
  pub const ALL: [BufferKind; 3] = [BufferKind::Markup, BufferKind::Style, BufferKind::Script];

  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Markup => "markup",
      Self::Style => "style",
      Self::Script => "script",
    }
  }

  pub const fn index(self) -> usize {
    match self {
      Self::Markup => 0,
      Self::Style => 1,
      Self::Script => 2,
    }
  }
}

impl fmt::Display for BufferKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown buffer '{0}', expected one of markup, style, script")]
pub struct UnknownBufferKind(pub String);

impl FromStr for BufferKind {
  type Err = UnknownBufferKind;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "markup" | "html" => Ok(Self::Markup),
      "style" | "css" => Ok(Self::Style),
      "script" | "js" => Ok(Self::Script),
      _ => Err(UnknownBufferKind(s.to_string())),
    }
  }
}

/// Where the current text of a buffer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
  #[default]
  Seeded,
  UserEdited,
}

/// Initial content for all three buffers, usually a lesson's example code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
  pub markup: String,
  pub style:  String,
  pub script: String,
}

impl Seed {
  pub fn new(
    markup: impl Into<String>,
    style: impl Into<String>,
    script: impl Into<String>,
  ) -> Self {
    Self {
      markup: markup.into(),
      style:  style.into(),
      script: script.into(),
    }
  }
}

/// An immutable view of all three buffers at a single revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
  revision: u64,
  texts:    [Arc<str>; 3],
}

impl Snapshot {
  pub fn new(seed: &Seed) -> Self {
    Self {
      revision: 0,
      texts:    [
        Arc::from(seed.markup.as_str()),
        Arc::from(seed.style.as_str()),
        Arc::from(seed.script.as_str()),
      ],
    }
  }

  pub fn revision(&self) -> u64 {
    self.revision
  }

  pub fn get(&self, kind: BufferKind) -> &str {
    &self.texts[kind.index()]
  }

  pub fn markup(&self) -> &str {
    self.get(BufferKind::Markup)
  }

  pub fn style(&self) -> &str {
    self.get(BufferKind::Style)
  }

  pub fn script(&self) -> &str {
    self.get(BufferKind::Script)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Revision {
  text:   Arc<str>,
  origin: Origin,
}

#[derive(Debug, Clone)]
struct Buffer {
  current: Revision,
  undo:    VecDeque<Revision>,
  redo:    Vec<Revision>,
}

impl Buffer {
  fn seeded(text: &str) -> Self {
    Self {
      current: Revision {
        text:   Arc::from(text),
        origin: Origin::Seeded,
      },
      undo:    VecDeque::new(),
      redo:    Vec::new(),
    }
  }

  fn replace(&mut self, text: Arc<str>, limit: usize) {
    let previous = std::mem::replace(&mut self.current, Revision {
      text,
      origin: Origin::UserEdited,
    });
    self.undo.push_back(previous);
    while self.undo.len() > limit {
      self.undo.pop_front();
    }
    self.redo.clear();
  }

  fn undo(&mut self) -> bool {
    let Some(previous) = self.undo.pop_back() else {
      return false;
    };
    let current = std::mem::replace(&mut self.current, previous);
    self.redo.push(current);
    true
  }

  fn redo(&mut self) -> bool {
    let Some(next) = self.redo.pop() else {
      return false;
    };
    let current = std::mem::replace(&mut self.current, next);
    self.undo.push_back(current);
    true
  }
}

/// The three editable sources of one preview pane.
#[derive(Debug, Clone)]
pub struct SourceBuffers {
  buffers:       [Buffer; 3],
  revision:      u64,
  history_limit: usize,
}

impl Default for SourceBuffers {
  fn default() -> Self {
    Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
  }
}

impl SourceBuffers {
  pub fn with_history_limit(history_limit: usize) -> Self {
    Self {
      buffers: [Buffer::seeded(""), Buffer::seeded(""), Buffer::seeded("")],
      revision: 0,
      history_limit: history_limit.max(1),
    }
  }

  pub fn from_seed(seed: &Seed) -> Self {
    let mut buffers = Self::default();
    buffers.seed(seed);
    buffers
  }

  /// Replace all three buffers with `seed` and forget their history.
  pub fn seed(&mut self, seed: &Seed) {
    self.buffers = [
      Buffer::seeded(&seed.markup),
      Buffer::seeded(&seed.style),
      Buffer::seeded(&seed.script),
    ];
    self.bump();
  }

  /// Reset every buffer to empty text.
  pub fn clear(&mut self) {
    self.seed(&Seed::default());
  }

  /// Replace the text of one buffer and mark it user-edited. Returns false
  /// when the text is identical: the buffer is still marked, but nothing
  /// needs rendering and no history entry is recorded.
  pub fn update(&mut self, kind: BufferKind, text: impl Into<Arc<str>>) -> bool {
    let text = text.into();
    let buffer = &mut self.buffers[kind.index()];
    if buffer.current.text == text {
      buffer.current.origin = Origin::UserEdited;
      return false;
    }
    buffer.replace(text, self.history_limit);
    self.bump();
    true
  }

  pub fn undo(&mut self, kind: BufferKind) -> bool {
    let changed = self.buffers[kind.index()].undo();
    if changed {
      self.bump();
    }
    changed
  }

  pub fn redo(&mut self, kind: BufferKind) -> bool {
    let changed = self.buffers[kind.index()].redo();
    if changed {
      self.bump();
    }
    changed
  }

  pub fn get(&self, kind: BufferKind) -> &str {
    &self.buffers[kind.index()].current.text
  }

  pub fn origin(&self, kind: BufferKind) -> Origin {
    self.buffers[kind.index()].current.origin
  }

  pub fn can_undo(&self, kind: BufferKind) -> bool {
    !self.buffers[kind.index()].undo.is_empty()
  }

  pub fn can_redo(&self, kind: BufferKind) -> bool {
    !self.buffers[kind.index()].redo.is_empty()
  }

  pub fn revision(&self) -> u64 {
    self.revision
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      revision: self.revision,
      texts:    [
        self.buffers[0].current.text.clone(),
        self.buffers[1].current.text.clone(),
        self.buffers[2].current.text.clone(),
      ],
    }
  }

  fn bump(&mut self) {
    self.revision = self.revision.saturating_add(1);
  }
}
