//! Core state for the live code preview.
//!
//! Everything in this crate is deterministic and free of IO: buffers go in,
//! documents and decisions come out. Running documents, timers and channels
//! live in `the-preview-sandbox` and `the-preview`.

pub mod assemble;
pub mod buffer;
pub mod generation;
pub mod layout;

pub use assemble::{
  AssembleOptions,
  AssembledDocument,
  assemble,
  assemble_with,
};
pub use buffer::{
  BufferKind,
  Origin,
  Seed,
  Snapshot,
  SourceBuffers,
};
pub use generation::{
  Generation,
  GenerationGate,
};
pub use layout::{
  PaneLayout,
  PaneState,
};
