//! Live preview of a markup, style and script triple.
//!
//! [`controller::PreviewController`] is the entry point: it opens and closes
//! the pane, owns the source buffers and drives a
//! [`scheduler::RenderScheduler`], which renders the sources in an isolated
//! execution host and publishes what is visible as
//! [`scheduler::RenderedFrame`]s.

pub mod application;
pub mod cli;
pub mod command;
pub mod config;
pub mod controller;
pub mod lesson;
pub mod logging;
pub mod scheduler;
pub mod watch;

pub use controller::{
  ControllerOptions,
  HostFactory,
  PreviewController,
  SandboxHosts,
};
pub use scheduler::{
  FrameReceiver,
  FrameSlot,
  RenderEvent,
  RenderScheduler,
  RenderedFrame,
  SchedulerOptions,
  SourceSlot,
};
