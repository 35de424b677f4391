use std::time::Duration;

use serde::Deserialize;

/// Argument placeholder replaced with the path of the staged document.
pub const DOCUMENT_PLACEHOLDER: &str = "{document}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostMode {
  /// Run the renderer to completion and report what it printed.
  #[default]
  Capture,
  /// Keep the renderer running until the next load or release.
  Persistent,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SandboxConfig {
  /// Program and arguments. [`DOCUMENT_PLACEHOLDER`] is substituted, and the
  /// document path is appended when no argument mentions it.
  pub command:     Vec<String>,
  pub mode:        HostMode,
  /// Only applies to [`HostMode::Capture`].
  pub timeout_ms:  u64,
  pub cpu_seconds: Option<u64>,
  pub memory_mb:   Option<u64>,
  /// Variables copied from our environment; everything else is cleared.
  pub inherit_env: Vec<String>,
}

impl Default for SandboxConfig {
  fn default() -> Self {
    Self {
      command:     vec![
        "chromium".to_string(),
        "--headless".to_string(),
        "--disable-gpu".to_string(),
        "--dump-dom".to_string(),
        DOCUMENT_PLACEHOLDER.to_string(),
      ],
      mode:        HostMode::Capture,
      timeout_ms:  5000,
      cpu_seconds: Some(10),
      memory_mb:   None,
      inherit_env: vec!["PATH".to_string()],
    }
  }
}

impl SandboxConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_millis(self.timeout_ms.max(1))
  }

  pub fn limits(&self) -> ResourceLimits {
    ResourceLimits {
      cpu_seconds:   self.cpu_seconds.filter(|secs| *secs > 0),
      address_space: self
        .memory_mb
        .filter(|mb| *mb > 0)
        .map(|mb| mb.saturating_mul(1024 * 1024)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceLimits {
  pub cpu_seconds:   Option<u64>,
  /// Bytes.
  pub address_space: Option<u64>,
}

impl ResourceLimits {
  pub fn is_unlimited(&self) -> bool {
    self.cpu_seconds.is_none() && self.address_space.is_none()
  }
}
