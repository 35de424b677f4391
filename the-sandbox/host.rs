use std::{
  fmt,
  io,
  sync::Arc,
};

use the_preview_lib::{
  AssembledDocument,
  Generation,
};
use thiserror::Error;

/// Faults of the host itself. Errors raised by the previewed code are never
/// represented here, they only show up in a [`RenderOutcome::Rendered`].
#[derive(Debug, Error)]
pub enum HostError {
  #[error("sandbox command is empty")]
  EmptyCommand,
  #[error("failed to stage document: {0}")]
  Stage(#[source] io::Error),
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source:  io::Error,
  },
  #[error("failed to wait for renderer: {0}")]
  Wait(#[source] io::Error),
  #[error("no async runtime available to run the sandbox")]
  NoRuntime,
}

/// What became of one load.
#[derive(Debug)]
pub enum RenderOutcome {
  /// The renderer ran to completion. Script errors and non-zero exit codes
  /// from the previewed document end up in here, not in an error.
  Rendered {
    stdout: String,
    stderr: String,
    status: Option<i32>,
  },
  /// A long-lived instance is up and displaying the document.
  Running,
  /// The renderer did not finish in time and was killed.
  TimedOut,
  Failed(HostError),
}

impl RenderOutcome {
  pub fn is_success(&self) -> bool {
    match self {
      Self::Rendered { status, .. } => *status == Some(0),
      Self::Running => true,
      Self::TimedOut | Self::Failed(_) => false,
    }
  }
}

#[derive(Debug)]
pub struct LoadCompletion {
  pub generation: Generation,
  pub outcome:    RenderOutcome,
}

type Report = dyn Fn(LoadCompletion) + Send + Sync + 'static;

/// Where hosts deliver completions. Cloned into every instance.
#[derive(Clone)]
pub struct CompletionSink(Arc<Report>);

impl CompletionSink {
  pub fn new<F>(report: F) -> Self
  where
    F: Fn(LoadCompletion) + Send + Sync + 'static,
  {
    Self(Arc::new(report))
  }

  pub fn report(&self, completion: LoadCompletion) {
    (self.0)(completion)
  }
}

impl fmt::Debug for CompletionSink {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompletionSink").finish_non_exhaustive()
  }
}

/// An isolated context that displays assembled documents.
///
/// `load` never fails from the caller's point of view: whatever happens while
/// the document runs is reported later through the host's [`CompletionSink`]
/// as a [`LoadCompletion`] tagged with the generation it was loaded with.
/// Loading again supersedes the previous instance. Hosts may stop superseded
/// work, but callers must still drop completions for anything other than the
/// latest generation.
pub trait ExecutionHost: Send + 'static {
  fn load(&mut self, document: Arc<AssembledDocument>, generation: Generation);

  /// Tear down the live instance. Background activity of the previewed code
  /// stops, and nothing more is reported for it.
  fn release(&mut self);

  /// Generation of the instance that is currently live.
  fn live(&self) -> Option<Generation>;
}

