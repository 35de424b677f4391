pub mod config;

use std::{
  path::{
    Path,
    PathBuf,
  },
  sync::OnceLock,
};

use etcetera::base_strategy::{
  BaseStrategy,
  choose_base_strategy,
};

const APP_DIR: &str = "the-preview";

static CONFIG_FILE: OnceLock<PathBuf> = OnceLock::new();

static LOG_FILE: OnceLock<PathBuf> = OnceLock::new();

pub fn initialize_config_file(specified_file: Option<PathBuf>) {
  let config_file = specified_file.unwrap_or_else(default_config_file);
  ensure_parent_dir(&config_file);
  CONFIG_FILE.set(config_file).ok();
}

pub fn initialize_log_file(specified_file: Option<PathBuf>) {
  let log_file = specified_file.unwrap_or_else(default_log_file);
  ensure_parent_dir(&log_file);
  LOG_FILE.set(log_file).ok();
}

pub fn config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("THE_PREVIEW_CONFIG_DIR") {
    return expand_tilde(Path::new(&dir));
  }
  let mut path = match choose_base_strategy() {
    Ok(strategy) => strategy.config_dir(),
    Err(err) => {
      log::warn!("unable to find the config directory: {err}");
      std::env::temp_dir()
    },
  };
  path.push(APP_DIR);
  path
}

pub fn cache_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("THE_PREVIEW_CACHE_DIR") {
    return expand_tilde(Path::new(&dir));
  }
  let mut path = match choose_base_strategy() {
    Ok(strategy) => strategy.cache_dir(),
    Err(err) => {
      log::warn!("unable to find the cache directory: {err}");
      std::env::temp_dir()
    },
  };
  path.push(APP_DIR);
  path
}

pub fn config_file() -> PathBuf {
  CONFIG_FILE
    .get_or_init(|| {
      let path = default_config_file();
      ensure_parent_dir(&path);
      path
    })
    .clone()
}

pub fn log_file() -> PathBuf {
  LOG_FILE
    .get_or_init(|| {
      let path = default_log_file();
      ensure_parent_dir(&path);
      path
    })
    .clone()
}

pub fn default_log_file() -> PathBuf {
  cache_dir().join("the-preview.log")
}

fn default_config_file() -> PathBuf {
  config_dir().join("config.toml")
}

fn ensure_parent_dir(path: &Path) {
  if let Some(parent) = path.parent()
    && !parent.exists()
  {
    std::fs::create_dir_all(parent).ok();
  }
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let Ok(rest) = path.strip_prefix("~") else {
    return path.to_path_buf();
  };
  match etcetera::home_dir() {
    Ok(home) => home.join(rest),
    Err(_) => path.to_path_buf(),
  }
}

/// Merge two TOML documents, merging values from `right` onto `left`.
///
/// Tables present on both sides are merged key by key, recursively, up to
/// `merge_depth` levels; below that depth `right` wins wholesale. Arrays are
/// never concatenated: a command line or an allow-list from the user replaces
/// the built-in one entirely. Any other value from `right` overrides `left`.
///
/// `merge_toml_values(defaults, user, 2)` turns
///
/// ```toml
/// [sandbox]
/// command = ["chromium", "--headless", "{document}"]
/// timeout-ms = 5000
/// ```
///
/// plus
///
/// ```toml
/// [sandbox]
/// command = ["firefox", "{document}"]
/// ```
///
/// into a `[sandbox]` table with the firefox command and `timeout-ms = 5000`.
pub fn merge_toml_values(left: toml::Value, right: toml::Value, merge_depth: usize) -> toml::Value {
  use toml::Value;

  match (left, right) {
    (Value::Table(mut left_map), Value::Table(right_map)) => {
      if merge_depth > 0 {
        for (rname, rvalue) in right_map {
          let merged = match left_map.remove(&rname) {
            Some(lvalue) => merge_toml_values(lvalue, rvalue, merge_depth - 1),
            None => rvalue,
          };
          left_map.insert(rname, merged);
        }
        Value::Table(left_map)
      } else {
        Value::Table(right_map)
      }
    },
    // Catch everything else we didn't handle, and use the right value
    (_, value) => value,
  }
}
