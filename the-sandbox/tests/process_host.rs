//! Integration tests for the subprocess execution host
#![cfg(unix)]

use std::{
  path::Path,
  sync::Arc,
  time::Duration,
};

use the_preview_lib::{
  AssembledDocument,
  Generation,
  Seed,
  SourceBuffers,
  assemble,
};
use the_preview_sandbox::{
  CompletionSink,
  ExecutionHost,
  HostError,
  HostMode,
  LoadCompletion,
  ProcessHost,
  RenderOutcome,
  SandboxConfig,
};
use tokio::sync::mpsc;

fn document(markup: &str, script: &str) -> Arc<AssembledDocument> {
  let buffers = SourceBuffers::from_seed(&Seed::new(markup, "", script));
  Arc::new(assemble(&buffers.snapshot()))
}

fn shell(script: &str) -> SandboxConfig {
  SandboxConfig {
    command: vec![
      "/bin/sh".to_string(),
      "-c".to_string(),
      script.to_string(),
      "sh".to_string(),
      "{document}".to_string(),
    ],
    ..SandboxConfig::default()
  }
}

fn host(config: SandboxConfig) -> (ProcessHost, mpsc::UnboundedReceiver<LoadCompletion>) {
  let (tx, rx) = mpsc::unbounded_channel();
  let sink = CompletionSink::new(move |completion| {
    let _ = tx.send(completion);
  });
  (ProcessHost::new(config, sink), rx)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<LoadCompletion>) -> LoadCompletion {
  tokio::time::timeout(Duration::from_secs(10), rx.recv())
    .await
    .expect("completion in time")
    .expect("sink alive")
}

#[tokio::test]
async fn capture_reports_renderer_output() {
  let (mut host, mut rx) = host(shell("cat \"$1\""));
  host.load(document("<p>hi</p>", ""), Generation::new(1));

  let completion = next(&mut rx).await;
  assert_eq!(completion.generation, Generation::new(1));
  match completion.outcome {
    RenderOutcome::Rendered { stdout, status, .. } => {
      assert!(stdout.contains("<p>hi</p>"));
      assert_eq!(status, Some(0));
    },
    other => panic!("unexpected outcome {other:?}"),
  }
}

#[tokio::test]
async fn failing_document_is_reported_as_data() {
  let (mut host, mut rx) = host(shell("echo 'Uncaught Error: boom' >&2; exit 3"));
  host.load(
    document("<p></p>", "throw new Error('boom')"),
    Generation::new(1),
  );

  let completion = next(&mut rx).await;
  match completion.outcome {
    RenderOutcome::Rendered { stderr, status, .. } => {
      assert!(stderr.contains("boom"));
      assert_eq!(status, Some(3));
    },
    other => panic!("unexpected outcome {other:?}"),
  }
}

#[tokio::test]
async fn superseded_instance_reports_nothing() {
  let (mut host, mut rx) = host(shell("sleep 2; cat \"$1\""));
  host.load(document("<p>old</p>", ""), Generation::new(1));

  // same host, newer document
  host.load(document("<p>new</p>", ""), Generation::new(2));
  assert_eq!(host.live(), Some(Generation::new(2)));

  let completion = next(&mut rx).await;
  assert_eq!(completion.generation, Generation::new(2));
  assert!(
    tokio::time::timeout(Duration::from_millis(2500), rx.recv())
      .await
      .is_err(),
    "superseded instance must stay silent"
  );
}

#[tokio::test]
async fn slow_renderer_times_out() {
  let mut config = shell("sleep 5");
  config.timeout_ms = 100;
  let (mut host, mut rx) = host(config);
  host.load(document("", ""), Generation::new(1));

  let completion = next(&mut rx).await;
  assert!(matches!(completion.outcome, RenderOutcome::TimedOut));
}

#[tokio::test]
async fn missing_renderer_is_a_host_fault() {
  let config = SandboxConfig {
    command: vec!["/nonexistent/renderer".to_string()],
    ..SandboxConfig::default()
  };
  let (mut host, mut rx) = host(config);
  host.load(document("", ""), Generation::new(1));

  let completion = next(&mut rx).await;
  assert!(matches!(
    completion.outcome,
    RenderOutcome::Failed(HostError::Spawn { .. })
  ));
}

#[tokio::test]
async fn release_stops_a_persistent_instance() {
  let pid_dir = tempfile::tempdir().unwrap();
  let pid_file = pid_dir.path().join("pid");
  let mut config = SandboxConfig {
    command: vec![
      "/bin/sh".to_string(),
      "-c".to_string(),
      "echo $$ > \"$0\"; exec sleep 30".to_string(),
      pid_file.display().to_string(),
    ],
    ..SandboxConfig::default()
  };
  config.mode = HostMode::Persistent;
  let (mut host, mut rx) = host(config);
  host.load(document("<p>live</p>", ""), Generation::new(1));

  let completion = next(&mut rx).await;
  assert!(matches!(completion.outcome, RenderOutcome::Running));
  let pid = wait_for_pid(&pid_file).await;
  assert!(is_alive(&pid));

  host.release();
  assert_eq!(host.live(), None);
  assert_gone(&pid).await;
}

/// Renderer that forks a long-lived helper, records the helper's pid and
/// then waits for it.
fn forking(pid_file: &Path, mode: HostMode) -> SandboxConfig {
  SandboxConfig {
    command: vec![
      "/bin/sh".to_string(),
      "-c".to_string(),
      "sleep 30 & echo $! > \"$0\"; wait".to_string(),
      pid_file.display().to_string(),
    ],
    mode,
    ..SandboxConfig::default()
  }
}

async fn assert_gone(pid: &str) {
  for _ in 0..50 {
    if !is_alive(pid) {
      return;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
  }
  panic!("process {pid} outlived its sandbox");
}

#[tokio::test]
async fn release_stops_processes_the_renderer_forked() {
  let pid_dir = tempfile::tempdir().unwrap();
  let pid_file = pid_dir.path().join("pid");
  let (mut host, mut rx) = host(forking(&pid_file, HostMode::Persistent));
  host.load(document("<p>live</p>", ""), Generation::new(1));

  let completion = next(&mut rx).await;
  assert!(matches!(completion.outcome, RenderOutcome::Running));
  let helper = wait_for_pid(&pid_file).await;
  assert!(is_alive(&helper));

  host.release();
  drop(host);
  assert_gone(&helper).await;
}

#[tokio::test]
async fn timeout_stops_processes_the_renderer_forked() {
  let pid_dir = tempfile::tempdir().unwrap();
  let pid_file = pid_dir.path().join("pid");
  let mut config = forking(&pid_file, HostMode::Capture);
  config.timeout_ms = 300;
  let (mut host, mut rx) = host(config);
  host.load(document("", ""), Generation::new(1));

  let helper = wait_for_pid(&pid_file).await;
  let completion = next(&mut rx).await;
  assert!(matches!(completion.outcome, RenderOutcome::TimedOut));
  assert_gone(&helper).await;
}

#[tokio::test]
async fn superseding_stops_processes_the_old_renderer_forked() {
  let pid_dir = tempfile::tempdir().unwrap();
  let pid_file = pid_dir.path().join("pid");
  let (mut host, mut rx) = host(forking(&pid_file, HostMode::Persistent));
  host.load(document("<p>old</p>", ""), Generation::new(1));
  assert!(matches!(next(&mut rx).await.outcome, RenderOutcome::Running));
  let helper = wait_for_pid(&pid_file).await;
  std::fs::remove_file(&pid_file).unwrap();

  host.load(document("<p>new</p>", ""), Generation::new(2));
  assert_gone(&helper).await;
  host.release();
}

async fn wait_for_pid(path: &Path) -> String {
  for _ in 0..100 {
    if let Ok(pid) = std::fs::read_to_string(path) {
      let pid = pid.trim();
      if !pid.is_empty() {
        return pid.to_string();
      }
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
  }
  panic!("renderer never wrote its pid");
}

/// Whether `pid` is still running. A zombie waiting for a reaper counts as
/// gone.
fn is_alive(pid: &str) -> bool {
  if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
    let state = stat
      .rsplit_once(')')
      .and_then(|(_, rest)| rest.trim_start().chars().next());
    return !matches!(state, Some('Z' | 'X'));
  }
  if Path::new("/proc/self").exists() {
    return false;
  }
  std::process::Command::new("kill")
    .args(["-0", pid])
    .status()
    .map(|status| status.success())
    .unwrap_or(false)
}
