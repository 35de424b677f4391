//! Decides when the previewed document is assembled and loaded.
//!
//! The scheduler is an [`AsyncHook`]: edits re-arm a debounce deadline and
//! only the newest snapshot is rendered once the sources settle. An explicit
//! run skips the wait. The controller hands sources over through a
//! [`SourceSlot`] that keeps only the newest snapshot. Completions from the host come back through the hook's
//! own channel and pass a [`GenerationGate`], so an older render finishing
//! late can never replace a newer one.

use std::{
  sync::Arc,
  time::Duration,
};

use parking_lot::Mutex;
use the_preview_event::{
  AsyncHook,
  HookHandle,
  send_weak,
};
use the_preview_lib::{
  AssembleOptions,
  AssembledDocument,
  Generation,
  GenerationGate,
  Snapshot,
  assemble_with,
};
use the_preview_sandbox::{
  CompletionSink,
  ExecutionHost,
  LoadCompletion,
  RenderOutcome,
};
use tokio::{
  sync::watch,
  time::Instant,
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug)]
pub enum RenderEvent {
  /// New sources are waiting in the [`SourceSlot`]. Rendered once the
  /// debounce window passes, or right away when a run was requested.
  Sources,
  /// A host finished loading a document.
  Loaded(LoadCompletion),
  /// The pane is closing. Nothing is rendered or published afterwards.
  Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
  pub debounce:    Duration,
  /// Render on edits. When off, only explicit runs render.
  pub auto_render: bool,
  pub assemble:    AssembleOptions,
}

impl Default for SchedulerOptions {
  fn default() -> Self {
    Self {
      debounce:    DEFAULT_DEBOUNCE,
      auto_render: true,
      assemble:    AssembleOptions::default(),
    }
  }
}

/// A render that made it to the screen.
#[derive(Debug)]
pub struct RenderedFrame {
  pub generation: Generation,
  pub document:   Arc<AssembledDocument>,
  pub outcome:    RenderOutcome,
}

/// Value carried by the frame channel.
///
/// `epoch` changes whenever a preview session starts or ends; a scheduler
/// only publishes while the epoch it was started with is current, so a
/// closed session cannot leave a frame behind.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
  epoch: u64,
  frame: Option<Arc<RenderedFrame>>,
}

impl FrameSlot {
  pub fn frame(&self) -> Option<&Arc<RenderedFrame>> {
    self.frame.as_ref()
  }

  pub fn epoch(&self) -> u64 {
    self.epoch
  }
}

pub type FrameSender = watch::Sender<FrameSlot>;
pub type FrameReceiver = watch::Receiver<FrameSlot>;

pub fn frame_channel() -> (FrameSender, FrameReceiver) {
  watch::channel(FrameSlot::default())
}

/// Start a new session: bump the epoch and clear the visible frame.
pub(crate) fn begin_epoch(frames: &FrameSender) -> u64 {
  let mut epoch = 0;
  frames.send_modify(|slot| {
    slot.epoch = slot.epoch.wrapping_add(1);
    slot.frame = None;
    epoch = slot.epoch;
  });
  epoch
}

/// Latest sources handed from the controller to the scheduler.
///
/// Edits replace the stored snapshot instead of queueing an event each, so at
/// most one [`RenderEvent::Sources`] is in the hook channel at a time however
/// fast the buffers change.
#[derive(Debug, Default)]
pub struct SourceSlot {
  state: Mutex<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
  snapshot: Option<Snapshot>,
  run:      bool,
  queued:   bool,
}

#[derive(Debug)]
pub struct PendingSources {
  pub snapshot: Snapshot,
  /// Some offer since the last take asked to skip the debounce window.
  pub run:      bool,
}

impl SourceSlot {
  /// Store `snapshot`, replacing anything not taken yet. Returns true when
  /// the scheduler has to be woken with [`RenderEvent::Sources`].
  pub fn offer(&self, snapshot: Snapshot, run: bool) -> bool {
    let mut state = self.state.lock();
    state.snapshot = Some(snapshot);
    state.run |= run;
    !std::mem::replace(&mut state.queued, true)
  }

  /// The wake-up for the last offer never reached the scheduler.
  pub fn unqueue(&self) {
    self.state.lock().queued = false;
  }

  pub fn take(&self) -> Option<PendingSources> {
    let mut state = self.state.lock();
    state.queued = false;
    let run = std::mem::take(&mut state.run);
    state
      .snapshot
      .take()
      .map(|snapshot| PendingSources { snapshot, run })
  }
}

pub struct RenderScheduler<H> {
  host:     H,
  options:  SchedulerOptions,
  sources:  Arc<SourceSlot>,
  gate:     GenerationGate,
  /// Newest snapshot not rendered yet.
  pending:  Option<Snapshot>,
  /// Document of the latest issued generation, kept until it is shown.
  loading:  Option<(Generation, Arc<AssembledDocument>)>,
  frames:   FrameSender,
  epoch:    u64,
  released: bool,
}

impl<H: ExecutionHost> RenderScheduler<H> {
  pub fn new(
    host: H,
    options: SchedulerOptions,
    sources: Arc<SourceSlot>,
    frames: FrameSender,
    epoch: u64,
  ) -> Self {
    Self {
      host,
      options,
      sources,
      gate: GenerationGate::default(),
      pending: None,
      loading: None,
      frames,
      epoch,
      released: false,
    }
  }

  /// Spawn a scheduler whose host reports back into the scheduler's channel.
  ///
  /// The host only gets a weak sender: once the returned handle is dropped
  /// the task ends even if a load is still in flight.
  pub fn spawn_session<F>(
    make_host: F,
    options: SchedulerOptions,
    sources: Arc<SourceSlot>,
    frames: FrameSender,
    epoch: u64,
  ) -> HookHandle<RenderEvent>
  where
    F: FnOnce(CompletionSink) -> H,
  {
    Self::spawn_with(move |tx| {
      let sink = CompletionSink::new(move |completion: LoadCompletion| {
        let generation = completion.generation;
        if !send_weak(&tx, RenderEvent::Loaded(completion)) {
          log::trace!("dropping completion of {generation}, preview is closed");
        }
      });
      Self::new(make_host(sink), options, sources, frames, epoch)
    })
  }

  fn render(&mut self) {
    let Some(snapshot) = self.pending.take() else {
      return;
    };
    let document = Arc::new(assemble_with(&snapshot, &self.options.assemble));
    let generation = self.gate.issue();
    log::debug!(
      "loading {generation} (revision {}, {} bytes)",
      snapshot.revision(),
      document.len()
    );
    self.loading = Some((generation, document.clone()));
    self.host.load(document, generation);
  }

  fn complete(&mut self, completion: LoadCompletion) {
    let LoadCompletion {
      generation,
      outcome,
    } = completion;
    if !self.gate.accept(generation) {
      log::trace!("discarding stale completion of {generation}");
      return;
    }
    let document = match self.loading.take() {
      Some((loaded, document)) if loaded == generation => document,
      other => {
        self.loading = other;
        log::warn!("completion of {generation} without a matching load");
        return;
      },
    };

    let frame = Arc::new(RenderedFrame {
      generation,
      document,
      outcome,
    });
    let epoch = self.epoch;
    let published = self.frames.send_if_modified(|slot| {
      if slot.epoch != epoch {
        return false;
      }
      slot.frame = Some(frame);
      true
    });
    if published {
      log::debug!("showing {generation}");
    }
  }

  fn release(&mut self) {
    if self.released {
      return;
    }
    self.released = true;
    self.pending = None;
    self.loading = None;
    self.gate.invalidate();
    self.host.release();
    log::debug!("render scheduler released");
  }
}

impl<H: ExecutionHost> AsyncHook for RenderScheduler<H> {
  type Event = RenderEvent;

  fn handle_event(&mut self, event: RenderEvent, timeout: Option<Instant>) -> Option<Instant> {
    if self.released {
      return None;
    }
    match event {
      RenderEvent::Sources => {
        let Some(PendingSources { snapshot, run }) = self.sources.take() else {
          return timeout;
        };
        self.pending = Some(snapshot);
        if run {
          self.render();
          None
        } else if self.options.auto_render {
          Some(Instant::now() + self.options.debounce)
        } else {
          None
        }
      },
      RenderEvent::Loaded(completion) => {
        self.complete(completion);
        timeout
      },
      RenderEvent::Release => {
        self.release();
        None
      },
    }
  }

  fn finish_debounce(&mut self) {
    if !self.released {
      self.render();
    }
  }
}

#[cfg(test)]
mod tests {
  use the_preview_lib::Seed;

  use super::*;

  #[derive(Default)]
  struct Recorder {
    loads:    Vec<Generation>,
    released: bool,
  }

  impl ExecutionHost for Recorder {
    fn load(&mut self, _document: Arc<AssembledDocument>, generation: Generation) {
      self.loads.push(generation);
    }

    fn release(&mut self) {
      self.released = true;
    }

    fn live(&self) -> Option<Generation> {
      self.loads.last().copied()
    }
  }

  fn scheduler(auto_render: bool) -> (RenderScheduler<Recorder>, FrameReceiver) {
    let (tx, rx) = frame_channel();
    let epoch = begin_epoch(&tx);
    let options = SchedulerOptions {
      auto_render,
      ..SchedulerOptions::default()
    };
    let sources = Arc::new(SourceSlot::default());
    (
      RenderScheduler::new(Recorder::default(), options, sources, tx, epoch),
      rx,
    )
  }

  fn offer(
    scheduler: &mut RenderScheduler<Recorder>,
    markup: &str,
    run: bool,
    timeout: Option<Instant>,
  ) -> Option<Instant> {
    scheduler.sources.offer(snapshot(markup), run);
    scheduler.handle_event(RenderEvent::Sources, timeout)
  }

  fn snapshot(markup: &str) -> Snapshot {
    Snapshot::new(&Seed::new(markup, "", ""))
  }

  fn loaded(generation: u64) -> RenderEvent {
    RenderEvent::Loaded(LoadCompletion {
      generation: Generation::new(generation),
      outcome:    RenderOutcome::Running,
    })
  }

  #[test]
  fn slot_keeps_the_newest_snapshot_and_wakes_once() {
    let slot = SourceSlot::default();
    assert!(slot.offer(snapshot("a"), false));
    assert!(!slot.offer(snapshot("b"), true));
    assert!(!slot.offer(snapshot("c"), false));

    let pending = slot.take().expect("sources");
    assert_eq!(pending.snapshot.markup(), "c");
    assert!(pending.run);
    assert!(slot.take().is_none());
    // taken, so the next offer needs a new wake-up
    assert!(slot.offer(snapshot("d"), false));
    slot.unqueue();
    assert!(slot.offer(snapshot("e"), false));
  }

  #[test]
  fn wake_without_sources_keeps_the_deadline() {
    let (mut scheduler, _rx) = scheduler(true);
    let deadline = offer(&mut scheduler, "a", false, None);
    assert_eq!(
      scheduler.handle_event(RenderEvent::Sources, deadline),
      deadline
    );
  }

  #[test]
  fn edits_arm_the_deadline_and_render_the_newest_snapshot() {
    let (mut scheduler, _rx) = scheduler(true);
    let deadline = offer(&mut scheduler, "a", false, None);
    assert!(deadline.is_some());
    offer(&mut scheduler, "b", false, deadline);
    assert!(scheduler.host.loads.is_empty());

    scheduler.finish_debounce();
    assert_eq!(scheduler.host.loads, vec![Generation::new(1)]);
    // nothing pending, nothing to render
    scheduler.finish_debounce();
    assert_eq!(scheduler.host.loads.len(), 1);
  }

  #[test]
  fn manual_mode_never_arms_the_deadline() {
    let (mut scheduler, _rx) = scheduler(false);
    assert!(offer(&mut scheduler, "a", false, None).is_none());
    assert!(offer(&mut scheduler, "a", true, None).is_none());
    assert_eq!(scheduler.host.loads, vec![Generation::new(1)]);
  }

  #[test]
  fn completions_keep_the_current_deadline() {
    let (mut scheduler, rx) = scheduler(true);
    offer(&mut scheduler, "a", true, None);
    let deadline = offer(&mut scheduler, "b", false, None);
    assert_eq!(scheduler.handle_event(loaded(1), deadline), deadline);
    assert_eq!(
      rx.borrow().frame().map(|frame| frame.generation),
      Some(Generation::new(1))
    );
  }

  #[test]
  fn release_stops_everything() {
    let (mut scheduler, rx) = scheduler(true);
    offer(&mut scheduler, "a", true, None);
    offer(&mut scheduler, "b", false, None);
    scheduler.handle_event(RenderEvent::Release, None);
    assert!(scheduler.host.released);

    scheduler.finish_debounce();
    scheduler.handle_event(loaded(1), None);
    offer(&mut scheduler, "c", true, None);
    assert_eq!(scheduler.host.loads.len(), 1);
    assert!(rx.borrow().frame().is_none());
  }

  #[test]
  fn frames_from_an_old_epoch_are_not_published() {
    let (tx, rx) = frame_channel();
    let epoch = begin_epoch(&tx);
    let mut scheduler = RenderScheduler::new(
      Recorder::default(),
      SchedulerOptions::default(),
      Arc::new(SourceSlot::default()),
      tx.clone(),
      epoch,
    );
    offer(&mut scheduler, "a", true, None);
    begin_epoch(&tx);
    scheduler.handle_event(loaded(1), None);
    assert!(rx.borrow().frame().is_none());
  }
}
