use std::{
  io,
  path::{
    Path,
    PathBuf,
  },
};

use thiserror::Error;

/// Depth passed to [`crate::merge_toml_values`]: sections, then their keys.
const MERGE_DEPTH: usize = 2;

#[derive(Debug, Error)]
pub enum LoadError {
  #[error("built-in config.toml is invalid: {0}")]
  BuiltIn(#[source] toml::de::Error),
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path:   PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// Default built-in config.toml.
pub fn default_config() -> Result<toml::Value, LoadError> {
  toml::from_str(include_str!("default-config.toml")).map_err(LoadError::BuiltIn)
}

/// User config.toml merged over the built-in one.
///
/// A missing user file is not an error: the defaults are returned as is.
pub fn user_config(path: &Path) -> Result<toml::Value, LoadError> {
  let default = default_config()?;
  let text = match std::fs::read_to_string(path) {
    Ok(text) => text,
    Err(err) if err.kind() == io::ErrorKind::NotFound => {
      log::debug!("no user config at {}", path.display());
      return Ok(default);
    },
    Err(source) => {
      return Err(LoadError::Read {
        path: path.to_path_buf(),
        source,
      });
    },
  };
  let user = toml::from_str(&text).map_err(|source| {
    LoadError::Parse {
      path: path.to_path_buf(),
      source,
    }
  })?;
  Ok(crate::merge_toml_values(default, user, MERGE_DEPTH))
}
