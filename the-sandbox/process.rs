//! Execution host backed by a restricted subprocess.
//!
//! Every load gets a brand new instance:
//! - the document is staged as `index.html` in a private temp directory that
//!   is removed together with the instance;
//! - the configured renderer runs with a cleared environment (plus an
//!   allow-list), no stdin, `HOME`/`TMPDIR` pointing at the instance
//!   directory and CPU/memory limits on Unix;
//! - the renderer leads its own process group; a newer load or
//!   [`ExecutionHost::release`] cancels the instance, which kills the whole
//!   group (helpers the renderer forked included) and reports nothing.

use std::{
  path::Path,
  process::Stdio,
  sync::Arc,
};

use tempfile::TempDir;
use the_preview_lib::{
  AssembledDocument,
  Generation,
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::{
  config::{
    DOCUMENT_PLACEHOLDER,
    HostMode,
    SandboxConfig,
  },
  host::{
    CompletionSink,
    ExecutionHost,
    HostError,
    LoadCompletion,
    RenderOutcome,
  },
  limits,
};

pub const DOCUMENT_FILE_NAME: &str = "index.html";

struct Instance {
  generation: Generation,
  token:      CancellationToken,
}

impl Drop for Instance {
  fn drop(&mut self) {
    self.token.cancel();
  }
}

/// Kills the renderer's process group when the instance ends, however it
/// ends: finished, timed out, cancelled or dropped with the runtime.
struct ProcessGroup {
  leader: Option<u32>,
}

impl ProcessGroup {
  fn kill(&mut self) {
    if let Some(leader) = self.leader.take() {
      limits::kill_group(leader);
    }
  }
}

impl Drop for ProcessGroup {
  fn drop(&mut self) {
    self.kill();
  }
}

pub struct ProcessHost {
  config: Arc<SandboxConfig>,
  sink:   CompletionSink,
  live:   Option<Instance>,
}

impl ProcessHost {
  pub fn new(config: SandboxConfig, sink: CompletionSink) -> Self {
    Self {
      config: Arc::new(config),
      sink,
      live: None,
    }
  }

  pub fn config(&self) -> &SandboxConfig {
    &self.config
  }
}

impl ExecutionHost for ProcessHost {
  fn load(&mut self, document: Arc<AssembledDocument>, generation: Generation) {
    if let Some(previous) = self.live.take() {
      log::debug!("sandbox {} superseded by {generation}", previous.generation);
    }

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      log::error!("cannot load {generation}: {}", HostError::NoRuntime);
      self.sink.report(LoadCompletion {
        generation,
        outcome: RenderOutcome::Failed(HostError::NoRuntime),
      });
      return;
    };

    let token = CancellationToken::new();
    runtime.spawn(run_instance(
      self.config.clone(),
      document,
      generation,
      token.clone(),
      self.sink.clone(),
    ));
    self.live = Some(Instance { generation, token });
  }

  fn release(&mut self) {
    if let Some(instance) = self.live.take() {
      log::debug!("releasing sandbox {}", instance.generation);
    }
  }

  fn live(&self) -> Option<Generation> {
    self.live.as_ref().map(|instance| instance.generation)
  }
}

async fn run_instance(
  config: Arc<SandboxConfig>,
  document: Arc<AssembledDocument>,
  generation: Generation,
  token: CancellationToken,
  sink: CompletionSink,
) {
  let report = |outcome: RenderOutcome| {
    if token.is_cancelled() {
      log::trace!("dropping result of cancelled sandbox {generation}");
      return;
    }
    if let RenderOutcome::Failed(err) = &outcome {
      log::error!("sandbox {generation} failed: {err}");
    }
    sink.report(LoadCompletion {
      generation,
      outcome,
    });
  };

  let dir = match stage(&document).await {
    Ok(dir) => dir,
    Err(err) => return report(RenderOutcome::Failed(err)),
  };
  let mut command = match build_command(&config, dir.path()) {
    Ok(command) => command,
    Err(err) => return report(RenderOutcome::Failed(err)),
  };
  if token.is_cancelled() {
    return;
  }
  let mut child = match command.spawn() {
    Ok(child) => child,
    Err(source) => {
      let program = config.command.first().cloned().unwrap_or_default();
      return report(RenderOutcome::Failed(HostError::Spawn { program, source }));
    },
  };
  let mut group = ProcessGroup {
    leader: child.id(),
  };
  log::debug!(
    "sandbox {generation} started (pid {:?}, {} bytes)",
    group.leader,
    document.len()
  );

  match config.mode {
    HostMode::Capture => {
      // dropping the wait future drops the child; kill_on_drop stops it and
      // the group guard below takes care of its descendants
      let wait = tokio::time::timeout(config.timeout(), child.wait_with_output());
      tokio::select! {
        _ = token.cancelled() => {
          log::debug!("sandbox {generation} cancelled before it finished");
        },
        result = wait => {
          let outcome = match result {
            Ok(Ok(output)) => RenderOutcome::Rendered {
              stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
              stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
              status: output.status.code(),
            },
            Ok(Err(err)) => RenderOutcome::Failed(HostError::Wait(err)),
            Err(_) => {
              log::warn!("sandbox {generation} timed out after {:?}", config.timeout());
              RenderOutcome::TimedOut
            },
          };
          report(outcome);
        },
      }
    },
    HostMode::Persistent => {
      report(RenderOutcome::Running);
      let exited = tokio::select! {
        _ = token.cancelled() => false,
        status = child.wait() => {
          log::debug!("sandbox {generation} exited on its own: {status:?}");
          true
        },
      };
      group.kill();
      if !exited && let Err(err) = child.wait().await {
        log::warn!("failed to reap sandbox {generation}: {err}");
      }
    },
  }

  group.kill();
  drop(dir);
}

async fn stage(document: &AssembledDocument) -> Result<TempDir, HostError> {
  let dir = tempfile::Builder::new()
    .prefix("the-preview-")
    .tempdir()
    .map_err(HostError::Stage)?;
  tokio::fs::write(dir.path().join(DOCUMENT_FILE_NAME), document.as_str())
    .await
    .map_err(HostError::Stage)?;
  Ok(dir)
}

fn build_command(config: &SandboxConfig, dir: &Path) -> Result<Command, HostError> {
  let (program, args) = config
    .command
    .split_first()
    .ok_or(HostError::EmptyCommand)?;
  let document = dir.join(DOCUMENT_FILE_NAME);
  let document_arg = document.to_string_lossy();

  let mut command = Command::new(program);
  let mut substituted = false;
  for arg in args {
    if arg.contains(DOCUMENT_PLACEHOLDER) {
      substituted = true;
      command.arg(arg.replace(DOCUMENT_PLACEHOLDER, &document_arg));
    } else {
      command.arg(arg);
    }
  }
  if !substituted {
    command.arg(&document);
  }

  command.env_clear();
  for key in &config.inherit_env {
    if let Some(value) = std::env::var_os(key) {
      command.env(key, value);
    }
  }
  if !config.inherit_env.iter().any(|key| key == "HOME") {
    command.env("HOME", dir);
  }
  command.env("TMPDIR", dir);

  let (stdout, stderr) = match config.mode {
    HostMode::Capture => (Stdio::piped(), Stdio::piped()),
    HostMode::Persistent => (Stdio::null(), Stdio::null()),
  };
  command
    .current_dir(dir)
    .stdin(Stdio::null())
    .stdout(stdout)
    .stderr(stderr)
    .kill_on_drop(true);
  limits::isolate(&mut command);
  limits::apply(&mut command, config.limits());
  Ok(command)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn placeholder_is_substituted() {
    let dir = tempfile::tempdir().unwrap();
    let config = SandboxConfig {
      command: vec!["cat".into(), "--file={document}".into()],
      ..SandboxConfig::default()
    };
    let command = build_command(&config, dir.path()).unwrap();
    let args: Vec<_> = command.as_std().get_args().collect();
    let expected = format!("--file={}", dir.path().join(DOCUMENT_FILE_NAME).display());
    assert_eq!(args, vec![std::ffi::OsStr::new(&expected)]);
  }

  #[test]
  fn document_is_appended_without_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let config = SandboxConfig {
      command: vec!["cat".into()],
      ..SandboxConfig::default()
    };
    let command = build_command(&config, dir.path()).unwrap();
    let expected = dir.path().join(DOCUMENT_FILE_NAME);
    let args: Vec<_> = command.as_std().get_args().collect();
    assert_eq!(args, vec![expected.as_os_str()]);
  }

  #[test]
  fn environment_is_cleared() {
    let dir = tempfile::tempdir().unwrap();
    let config = SandboxConfig {
      command: vec!["env".into()],
      inherit_env: Vec::new(),
      ..SandboxConfig::default()
    };
    let command = build_command(&config, dir.path()).unwrap();
    let envs: Vec<_> = command
      .as_std()
      .get_envs()
      .filter_map(|(key, value)| value.map(|_| key.to_string_lossy().into_owned()))
      .collect();
    assert_eq!(envs.len(), 2);
    assert!(envs.contains(&"HOME".to_string()));
    assert!(envs.contains(&"TMPDIR".to_string()));
  }

  #[test]
  fn empty_command_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = SandboxConfig {
      command: Vec::new(),
      ..SandboxConfig::default()
    };
    assert!(matches!(
      build_command(&config, dir.path()),
      Err(HostError::EmptyCommand)
    ));
  }
}
