use std::path::PathBuf;

use anyhow::{
  Result,
  bail,
};
use clap::{
  ArgAction,
  Parser,
};
use the_preview_lib::BufferKind;

use crate::{
  config::Config,
  lesson::LessonFiles,
};

#[derive(Clone, Debug)]
pub struct CliOptions {
  pub files:         LessonFiles,
  pub once:          bool,
  pub manual:        bool,
  pub debounce_ms:   Option<u64>,
  pub error_overlay: bool,
  pub verbosity:     u8,
  pub log_file:      Option<PathBuf>,
  pub config_file:   Option<PathBuf>,
}

impl CliOptions {
  pub fn parse() -> Result<Self> {
    let raw = RawCli::parse();
    raw.try_into()
  }

  /// Flags given on the command line win over the configuration file.
  pub fn apply(&self, config: &mut Config) {
    if self.manual {
      config.preview.auto_render = false;
    }
    if let Some(ms) = self.debounce_ms {
      config.preview.debounce_ms = ms;
    }
    if self.error_overlay {
      config.preview.error_overlay = true;
    }
  }
}

#[derive(Parser, Debug)]
#[command(
  name = "the-preview",
  about = "Live preview of HTML, CSS and JavaScript sources",
  long_about = None,
  version
)]
struct RawCli {
  /// Lesson directory holding index.html, style.css and script.js
  #[arg(value_name = "LESSON_DIR", value_parser = parse_pathbuf)]
  lesson_dir: Option<PathBuf>,

  /// Markup source (overrides the lesson directory)
  #[arg(long, value_name = "FILE", value_parser = parse_pathbuf)]
  markup: Option<PathBuf>,

  /// Style source (overrides the lesson directory)
  #[arg(long, value_name = "FILE", value_parser = parse_pathbuf)]
  style: Option<PathBuf>,

  /// Script source (overrides the lesson directory)
  #[arg(long, value_name = "FILE", value_parser = parse_pathbuf)]
  script: Option<PathBuf>,

  /// Render once, print the result and exit
  #[arg(long)]
  once: bool,

  /// Only render on an explicit `run`
  #[arg(long)]
  manual: bool,

  /// Quiet time after an edit before rendering
  #[arg(long, value_name = "MS")]
  debounce_ms: Option<u64>,

  /// Report script errors inside the rendered page
  #[arg(long)]
  error_overlay: bool,

  /// Increase logging verbosity (repeat for more detail)
  #[arg(short = 'v', action = ArgAction::Count)]
  verbosity: u8,

  /// Save logs to a specific file
  #[arg(long = "log", value_name = "FILE", value_parser = parse_pathbuf)]
  log_file: Option<PathBuf>,

  /// Load configuration from a specific file
  #[arg(short = 'c', long = "config", value_name = "FILE", value_parser = parse_pathbuf)]
  config_file: Option<PathBuf>,
}

impl TryFrom<RawCli> for CliOptions {
  type Error = anyhow::Error;

  fn try_from(raw: RawCli) -> Result<Self> {
    let mut files = match &raw.lesson_dir {
      Some(dir) if !dir.is_dir() => {
        bail!("lesson directory '{}' is not a directory", dir.display());
      },
      Some(dir) => LessonFiles::from_dir(dir),
      None => LessonFiles::default(),
    };
    for (kind, path) in [
      (BufferKind::Markup, raw.markup),
      (BufferKind::Style, raw.style),
      (BufferKind::Script, raw.script),
    ] {
      if let Some(path) = path {
        files.set(kind, path);
      }
    }
    if files.is_empty() {
      bail!("nothing to preview: pass a lesson directory or --markup/--style/--script");
    }

    Ok(Self {
      files,
      once: raw.once,
      manual: raw.manual,
      debounce_ms: raw.debounce_ms,
      error_overlay: raw.error_overlay,
      verbosity: raw.verbosity,
      log_file: raw.log_file,
      config_file: raw.config_file,
    })
  }
}

fn parse_pathbuf(value: &str) -> std::result::Result<PathBuf, String> {
  let path = the_preview_loader::expand_tilde(std::path::Path::new(value));
  if path.is_absolute() {
    return Ok(path);
  }
  std::env::current_dir()
    .map(|cwd| cwd.join(path))
    .map_err(|err| format!("cannot resolve '{value}': {err}"))
}
