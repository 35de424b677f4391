//! Source files a preview session is seeded from.

use std::{
  io,
  path::{
    Path,
    PathBuf,
  },
};

use anyhow::{
  Context,
  Result,
};
use the_preview_lib::{
  BufferKind,
  Seed,
};

/// Conventional file names inside a lesson directory.
pub fn default_file_name(kind: BufferKind) -> &'static str {
  match kind {
    BufferKind::Markup => "index.html",
    BufferKind::Style => "style.css",
    BufferKind::Script => "script.js",
  }
}

/// Where each buffer is read from. A buffer without a file starts empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonFiles {
  paths: [Option<PathBuf>; 3],
}

impl LessonFiles {
  pub fn from_dir(dir: &Path) -> Self {
    let mut files = Self::default();
    for kind in BufferKind::ALL {
      files.set(kind, dir.join(default_file_name(kind)));
    }
    files
  }

  pub fn set(&mut self, kind: BufferKind, path: PathBuf) {
    self.paths[kind.index()] = Some(path);
  }

  pub fn path(&self, kind: BufferKind) -> Option<&Path> {
    self.paths[kind.index()].as_deref()
  }

  pub fn iter(&self) -> impl Iterator<Item = (BufferKind, &Path)> {
    BufferKind::ALL
      .into_iter()
      .filter_map(|kind| self.path(kind).map(|path| (kind, path)))
  }

  pub fn is_empty(&self) -> bool {
    self.paths.iter().all(Option::is_none)
  }

  /// Read one source. Missing files read as empty text.
  pub fn read(&self, kind: BufferKind) -> Result<String> {
    let Some(path) = self.path(kind) else {
      return Ok(String::new());
    };
    match std::fs::read_to_string(path) {
      Ok(text) => Ok(text),
      Err(err) if err.kind() == io::ErrorKind::NotFound => {
        log::debug!("{} does not exist, {kind} starts empty", path.display());
        Ok(String::new())
      },
      Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
  }

  pub fn load(&self) -> Result<Seed> {
    Ok(Seed::new(
      self.read(BufferKind::Markup)?,
      self.read(BufferKind::Style)?,
      self.read(BufferKind::Script)?,
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lesson_dir_uses_conventional_names() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<p>hi</p>").unwrap();
    std::fs::write(dir.path().join("style.css"), "p{color:red}").unwrap();

    let files = LessonFiles::from_dir(dir.path());
    let seed = files.load().unwrap();
    assert_eq!(seed, Seed::new("<p>hi</p>", "p{color:red}", ""));
    assert_eq!(
      files.path(BufferKind::Style),
      Some(dir.path().join("style.css").as_path())
    );
  }

  #[test]
  fn unset_buffers_start_empty() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("main.js");
    std::fs::write(&script, "document.title='x'").unwrap();

    let mut files = LessonFiles::default();
    files.set(BufferKind::Script, script);
    let seed = files.load().unwrap();
    assert_eq!(seed.markup, "");
    assert_eq!(seed.script, "document.title='x'");
    assert_eq!(files.iter().count(), 1);
  }

  #[test]
  fn unreadable_source_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut files = LessonFiles::default();
    // a directory cannot be read as text
    files.set(BufferKind::Markup, dir.path().to_path_buf());
    let err = files.load().unwrap_err();
    assert!(format!("{err:#}").contains("failed to read"));
  }
}
