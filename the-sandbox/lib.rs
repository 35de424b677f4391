//! Isolated execution hosts for assembled preview documents.
//!
//! The previewed code is untrusted. Hosts run it somewhere it cannot reach
//! the application: [`ProcessHost`] uses a restricted child process per
//! load. Nothing the document does is reported as an error to the caller of
//! [`ExecutionHost::load`]; results arrive later as [`LoadCompletion`]s.

mod config;
mod host;
mod limits;
mod process;

pub use config::{
  DOCUMENT_PLACEHOLDER,
  HostMode,
  ResourceLimits,
  SandboxConfig,
};
pub use host::{
  CompletionSink,
  ExecutionHost,
  HostError,
  LoadCompletion,
  RenderOutcome,
};
pub use process::{
  DOCUMENT_FILE_NAME,
  ProcessHost,
};
