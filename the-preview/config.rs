use std::{
  path::Path,
  time::Duration,
};

use serde::Deserialize;
use the_preview_lib::{
  AssembleOptions,
  buffer::DEFAULT_HISTORY_LIMIT,
  layout::DEFAULT_PANE_WIDTH,
};
use the_preview_loader::config::LoadError;
use the_preview_sandbox::SandboxConfig;
use thiserror::Error;

use crate::{
  controller::ControllerOptions,
  scheduler::SchedulerOptions,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
  pub preview: PreviewConfig,
  pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PreviewConfig {
  /// Quiet time after the last edit before rendering.
  pub debounce_ms:   u64,
  /// Render while typing. When off, only explicit runs render.
  pub auto_render:   bool,
  /// Show uncaught script errors inside the previewed page.
  pub error_overlay: bool,
  /// Pane width as a percentage.
  pub width:         u16,
  /// Undo steps kept per buffer.
  pub history_limit: usize,
}

impl Default for PreviewConfig {
  fn default() -> Self {
    Self {
      debounce_ms:   300,
      auto_render:   true,
      error_overlay: false,
      width:         DEFAULT_PANE_WIDTH,
      history_limit: DEFAULT_HISTORY_LIMIT,
    }
  }
}

impl PreviewConfig {
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms)
  }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
  #[error(transparent)]
  Load(#[from] LoadError),
  #[error("invalid configuration: {0}")]
  BadConfig(#[source] toml::de::Error),
}

impl Config {
  /// Built-in defaults with the user file at `path` merged on top.
  pub fn load(path: &Path) -> Result<Config, ConfigLoadError> {
    the_preview_loader::config::user_config(path)?
      .try_into()
      .map_err(ConfigLoadError::BadConfig)
  }

  /// Load the file chosen by [`the_preview_loader::initialize_config_file`].
  pub fn load_user() -> Result<Config, ConfigLoadError> {
    Self::load(&the_preview_loader::config_file())
  }

  pub fn controller_options(&self) -> ControllerOptions {
    ControllerOptions {
      scheduler:     SchedulerOptions {
        debounce:    self.preview.debounce(),
        auto_render: self.preview.auto_render,
        assemble:    AssembleOptions {
          error_overlay: self.preview.error_overlay,
        },
      },
      width:         self.preview.width,
      history_limit: self.preview.history_limit,
    }
  }
}

#[cfg(test)]
mod tests {
  use the_preview_sandbox::HostMode;

  use super::*;

  #[test]
  fn built_in_file_matches_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(config, Config::default());
  }

  #[test]
  fn user_values_override_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
      &path,
      r#"
        [preview]
        debounce-ms = 0
        auto-render = false

        [sandbox]
        mode = "persistent"
        memory-mb = 512
      "#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.preview.debounce(), Duration::ZERO);
    assert!(!config.preview.auto_render);
    assert_eq!(config.preview.width, DEFAULT_PANE_WIDTH);
    assert_eq!(config.sandbox.mode, HostMode::Persistent);
    assert_eq!(config.sandbox.memory_mb, Some(512));
    assert_eq!(config.sandbox.command, SandboxConfig::default().command);

    let options = config.controller_options();
    assert!(!options.scheduler.auto_render);
    assert_eq!(options.scheduler.debounce, Duration::ZERO);
  }

  #[test]
  fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[preview]\ndebounce = 10\n").unwrap();

    assert!(matches!(
      Config::load(&path),
      Err(ConfigLoadError::BadConfig(_))
    ));
  }
}
