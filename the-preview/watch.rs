//! Feeds on-disk edits of the lesson sources back into the buffers.

use std::path::{
  Path,
  PathBuf,
};

use notify::{
  EventKind,
  RecursiveMode,
  Watcher as _,
};
use the_preview_lib::BufferKind;
use tokio::sync::mpsc::UnboundedSender;

use crate::lesson::LessonFiles;

/// Watches the directories holding the source files and reports which buffer
/// changed. Dropping the watcher stops it.
pub struct SourceWatcher {
  _watcher: notify::RecommendedWatcher,
}

impl SourceWatcher {
  pub fn new(files: &LessonFiles, tx: UnboundedSender<BufferKind>) -> notify::Result<Self> {
    let targets: Vec<(BufferKind, PathBuf)> = files
      .iter()
      .map(|(kind, path)| (kind, resolve(path)))
      .collect();
    let mut dirs: Vec<PathBuf> = targets
      .iter()
      .filter_map(|(_, path)| path.parent().map(Path::to_path_buf))
      .collect();
    dirs.sort();
    dirs.dedup();

    let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
      let event = match result {
        Ok(event) => event,
        Err(err) => {
          log::warn!("file watcher error: {err}");
          return;
        },
      };
      if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
      ) {
        return;
      }
      for kind in changed_kinds(&targets, &event.paths) {
        if tx.send(kind).is_err() {
          return;
        }
      }
    })?;

    for dir in &dirs {
      // non-recursive on the parent so editors that save by rename are seen
      watcher.watch(dir, RecursiveMode::NonRecursive)?;
      log::debug!("watching {}", dir.display());
    }
    Ok(Self { _watcher: watcher })
  }
}

/// Canonical form of a source path, so it matches what the watcher reports
/// even when the file itself does not exist yet.
fn resolve(path: &Path) -> PathBuf {
  if let Ok(path) = path.canonicalize() {
    return path;
  }
  match (path.parent(), path.file_name()) {
    (Some(parent), Some(name)) => {
      parent
        .canonicalize()
        .map(|parent| parent.join(name))
        .unwrap_or_else(|_| path.to_path_buf())
    },
    _ => path.to_path_buf(),
  }
}

fn changed_kinds(targets: &[(BufferKind, PathBuf)], paths: &[PathBuf]) -> Vec<BufferKind> {
  let mut kinds: Vec<BufferKind> = targets
    .iter()
    .filter(|(_, target)| paths.iter().any(|path| path == target))
    .map(|(kind, _)| *kind)
    .collect();
  kinds.dedup();
  kinds
}
