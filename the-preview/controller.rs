//! Opens and closes the preview pane and owns everything that lives while it
//! is open: the source buffers and the render scheduler (which in turn owns
//! the execution host).

use std::sync::Arc;

use the_preview_event::HookHandle;
use the_preview_lib::{
  BufferKind,
  PaneLayout,
  PaneState,
  Seed,
  Snapshot,
  SourceBuffers,
  buffer::DEFAULT_HISTORY_LIMIT,
  layout::DEFAULT_PANE_WIDTH,
};
use the_preview_sandbox::{
  CompletionSink,
  ExecutionHost,
  ProcessHost,
  SandboxConfig,
};

use crate::scheduler::{
  FrameReceiver,
  FrameSender,
  RenderEvent,
  RenderScheduler,
  SchedulerOptions,
  SourceSlot,
  begin_epoch,
  frame_channel,
};

/// Creates a fresh execution host for every preview session.
pub trait HostFactory: Send + 'static {
  type Host: ExecutionHost;

  fn create(&mut self, sink: CompletionSink) -> Self::Host;
}

impl<F, H> HostFactory for F
where
  F: FnMut(CompletionSink) -> H + Send + 'static,
  H: ExecutionHost,
{
  type Host = H;

  fn create(&mut self, sink: CompletionSink) -> H {
    self(sink)
  }
}

/// Sandboxed subprocess hosts sharing one configuration.
#[derive(Debug, Clone, Default)]
pub struct SandboxHosts(pub SandboxConfig);

impl HostFactory for SandboxHosts {
  type Host = ProcessHost;

  fn create(&mut self, sink: CompletionSink) -> ProcessHost {
    ProcessHost::new(self.0.clone(), sink)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerOptions {
  pub scheduler:     SchedulerOptions,
  pub width:         u16,
  pub history_limit: usize,
}

impl Default for ControllerOptions {
  fn default() -> Self {
    Self {
      scheduler:     SchedulerOptions::default(),
      width:         DEFAULT_PANE_WIDTH,
      history_limit: DEFAULT_HISTORY_LIMIT,
    }
  }
}

struct Session {
  buffers:   SourceBuffers,
  sources:   Arc<SourceSlot>,
  scheduler: HookHandle<RenderEvent>,
}

impl Session {
  /// Hand the current buffers to the scheduler, rendering right away when
  /// `run` is set.
  fn submit(&self, run: bool) {
    if self.sources.offer(self.buffers.snapshot(), run)
      && !self.scheduler.send(RenderEvent::Sources)
    {
      self.sources.unqueue();
    }
  }
}

pub struct PreviewController<F: HostFactory> {
  factory: F,
  options: ControllerOptions,
  layout:  PaneLayout,
  session: Option<Session>,
  frames:  FrameSender,
  // keeps the channel open while nobody is listening
  _frames: FrameReceiver,
}

impl<F: HostFactory> PreviewController<F> {
  pub fn new(factory: F, options: ControllerOptions) -> Self {
    let (frames, rx) = frame_channel();
    Self {
      factory,
      options,
      layout: PaneLayout::new(options.width),
      session: None,
      frames,
      _frames: rx,
    }
  }

  /// Open the pane seeded with `seed` and render it right away.
  ///
  /// Opening an already open pane loads the new seed into the same session,
  /// the way picking another lesson example does.
  pub fn open(&mut self, seed: &Seed) {
    if let Some(session) = &mut self.session {
      log::debug!("reseeding open preview");
      session.buffers.seed(seed);
      session.submit(true);
      return;
    }

    let mut buffers = SourceBuffers::with_history_limit(self.options.history_limit);
    buffers.seed(seed);
    let epoch = begin_epoch(&self.frames);
    let sources = Arc::new(SourceSlot::default());
    let factory = &mut self.factory;
    let scheduler = RenderScheduler::spawn_session(
      |sink| factory.create(sink),
      self.options.scheduler,
      sources.clone(),
      self.frames.clone(),
      epoch,
    );
    if !scheduler.is_running() {
      log::warn!("preview opened without an async runtime, nothing will render");
    }
    let session = Session {
      buffers,
      sources,
      scheduler,
    };
    session.submit(true);
    self.session = Some(session);
    self.layout.show();
    log::info!("preview opened");
  }

  /// Close the pane, stop the host and discard the buffers. Closing a closed
  /// pane does nothing.
  pub fn close(&mut self) -> bool {
    let Some(session) = self.session.take() else {
      return false;
    };
    session.scheduler.send(RenderEvent::Release);
    drop(session);
    begin_epoch(&self.frames);
    self.layout.hide();
    log::info!("preview closed");
    true
  }

  /// Open with `seed` when closed, close when open. Returns the new state.
  pub fn toggle(&mut self, seed: &Seed) -> PaneState {
    if self.is_open() {
      self.close();
    } else {
      self.open(seed);
    }
    self.state()
  }

  pub fn open_preview(
    &mut self,
    markup: impl Into<String>,
    style: impl Into<String>,
    script: impl Into<String>,
  ) {
    self.open(&Seed::new(markup, style, script));
  }

  pub fn close_preview(&mut self) {
    self.close();
  }

  /// Replace the text of one buffer. Returns whether anything changed.
  pub fn update(&mut self, kind: BufferKind, text: impl Into<String>) -> bool {
    let text: String = text.into();
    self.edit(kind, "update", |buffers| buffers.update(kind, text))
  }

  pub fn undo(&mut self, kind: BufferKind) -> bool {
    self.edit(kind, "undo", |buffers| buffers.undo(kind))
  }

  pub fn redo(&mut self, kind: BufferKind) -> bool {
    self.edit(kind, "redo", |buffers| buffers.redo(kind))
  }

  /// Render the current sources now, skipping the debounce window.
  pub fn run(&mut self) -> bool {
    let Some(session) = &self.session else {
      log::debug!("ignoring run, preview is closed");
      return false;
    };
    session.submit(true);
    true
  }

  fn edit(
    &mut self,
    kind: BufferKind,
    action: &str,
    apply: impl FnOnce(&mut SourceBuffers) -> bool,
  ) -> bool {
    let Some(session) = &mut self.session else {
      log::debug!("ignoring {action} of {kind}, preview is closed");
      return false;
    };
    if !apply(&mut session.buffers) {
      return false;
    }
    session.submit(false);
    true
  }

  pub fn set_width(&mut self, percent: u16) -> u16 {
    self.layout.set_width(percent)
  }

  pub fn state(&self) -> PaneState {
    self.layout.state()
  }

  pub fn is_open(&self) -> bool {
    self.session.is_some()
  }

  pub fn layout(&self) -> &PaneLayout {
    &self.layout
  }

  pub fn buffers(&self) -> Option<&SourceBuffers> {
    self.session.as_ref().map(|session| &session.buffers)
  }

  pub fn snapshot(&self) -> Option<Snapshot> {
    self.buffers().map(SourceBuffers::snapshot)
  }

  /// Receiver for the frames shown in the pane. Stays valid across sessions.
  pub fn frames(&self) -> FrameReceiver {
    self.frames.subscribe()
  }
}

impl<F: HostFactory> Drop for PreviewController<F> {
  fn drop(&mut self) {
    self.close();
  }
}
