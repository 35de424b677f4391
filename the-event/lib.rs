//! Event plumbing shared by the preview crates.

mod debounce;

pub use debounce::{
  AsyncHook,
  HookHandle,
  send_weak,
  try_send,
};
