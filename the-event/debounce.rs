//! Utilities for declaring an async (usually debounced) hook

use tokio::{
  sync::mpsc::{
    self,
    Sender,
    WeakSender,
    error::TrySendError,
  },
  task::JoinHandle,
  time::Instant,
};

/// Capacity of the hook channel. Senders are expected to coalesce bursts
/// (see the preview scheduler's source slot), so this is only headroom.
const CHANNEL_CAPACITY: usize = 256;

/// Async hooks run as a background tokio task that waits for events (usually
/// an enum) on a channel. Each event may be consumed immediately or debounced;
/// when the debounce deadline passes without a newer deadline being set,
/// [`AsyncHook::finish_debounce`] runs.
pub trait AsyncHook: Send + 'static + Sized {
  type Event: Send + 'static;

  /// Called immediately whenever an event is received. Returning `Some`
  /// (re)arms the debounce deadline, returning `timeout` keeps the current
  /// one, and returning `None` cancels it.
  fn handle_event(&mut self, event: Self::Event, timeout: Option<Instant>) -> Option<Instant>;

  /// Called whenever the debounce deadline is reached.
  fn finish_debounce(&mut self);

  /// Spawn the hook on the current tokio runtime.
  fn spawn(self) -> HookHandle<Self::Event> {
    Self::spawn_with(|_| self)
  }

  /// Spawn a hook that needs a way to feed events back into its own channel
  /// (for example completions from work it started).
  ///
  /// The builder only sees a [`WeakSender`], so the hook never keeps its own
  /// channel open: once every [`HookHandle`] is gone the task exits.
  fn spawn_with<F>(build: F) -> HookHandle<Self::Event>
  where
    F: FnOnce(WeakSender<Self::Event>) -> Self,
  {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let hook = build(tx.downgrade());
    // only spawn worker if we are inside runtime to avoid having to spawn a runtime
    // for unrelated unit tests
    let task = if tokio::runtime::Handle::try_current().is_ok() {
      Some(tokio::spawn(run(hook, rx)))
    } else {
      log::debug!("no tokio runtime, async hook not started");
      None
    };
    HookHandle { tx, task }
  }
}

async fn run<Hook: AsyncHook>(mut hook: Hook, mut rx: mpsc::Receiver<Hook::Event>) {
  let mut deadline = None;
  loop {
    let event = match deadline {
      Some(deadline_) => {
        match tokio::time::timeout_at(deadline_, rx.recv()).await {
          Ok(event) => event,
          Err(_) => {
            hook.finish_debounce();
            deadline = None;
            continue;
          },
        }
      },
      None => rx.recv().await,
    };
    let Some(event) = event else {
      break;
    };
    deadline = hook.handle_event(event, deadline);
  }
}

/// Owning handle to a spawned hook.
///
/// Dropping the handle closes the channel; the hook task finishes after it
/// has drained whatever was already queued.
#[derive(Debug)]
pub struct HookHandle<E> {
  tx:   Sender<E>,
  task: Option<JoinHandle<()>>,
}

impl<E: Send + 'static> HookHandle<E> {
  pub fn sender(&self) -> &Sender<E> {
    &self.tx
  }

  /// Whether a background task was actually started.
  pub fn is_running(&self) -> bool {
    self.task.as_ref().is_some_and(|task| !task.is_finished())
  }

  /// Send from synchronous code, see [`try_send`].
  pub fn send(&self, event: E) -> bool {
    try_send(&self.tx, event)
  }

  /// Close the channel and wait for the hook task to finish.
  pub async fn join(self) {
    let Self { tx, task } = self;
    drop(tx);
    if let Some(task) = task
      && let Err(err) = task.await
    {
      log::error!("async hook task failed: {err}");
    }
  }
}

/// Send an event without ever blocking the caller.
///
/// Callers may run on a runtime thread (a current-thread runtime has no other
/// thread to drain the channel), so a full channel drops the event instead of
/// waiting. Returns false if the event was dropped.
pub fn try_send<T>(tx: &Sender<T>, data: T) -> bool {
  match tx.try_send(data) {
    Ok(()) => true,
    Err(TrySendError::Full(_)) => {
      log::warn!("async hook channel full, dropping event");
      false
    },
    Err(TrySendError::Closed(_)) => {
      log::warn!("Attempted to send to closed channel");
      false
    },
  }
}

/// Like [`try_send`], but through a weak sender. Returns false when the
/// receiving hook is already gone.
pub fn send_weak<T>(tx: &WeakSender<T>, data: T) -> bool {
  match tx.upgrade() {
    Some(tx) => try_send(&tx, data),
    None => false,
  }
}
