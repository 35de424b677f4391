use std::{
  io::{
    self,
    Write,
  },
  time::Duration,
};

use anyhow::{
  Context,
  Result,
  bail,
};
use the_preview_sandbox::RenderOutcome;
use tokio::{
  io::{
    AsyncBufReadExt,
    BufReader,
  },
  sync::mpsc,
};

use crate::{
  cli::CliOptions,
  command::Command,
  config::Config,
  controller::{
    HostFactory,
    PreviewController,
    SandboxHosts,
  },
  lesson::LessonFiles,
  scheduler::{
    FrameReceiver,
    RenderedFrame,
  },
  watch::SourceWatcher,
};

/// Extra time allowed on top of the sandbox timeout in `--once` mode.
const ONCE_GRACE: Duration = Duration::from_secs(5);

/// Run the previewer until the user quits. Returns the process exit code.
pub async fn run(options: CliOptions, config: Config) -> Result<i32> {
  let seed = options.files.load()?;
  let mut controller = PreviewController::new(
    SandboxHosts(config.sandbox.clone()),
    config.controller_options(),
  );
  let frames = controller.frames();
  controller.open(&seed);

  if options.once {
    let limit = config.sandbox.timeout() + ONCE_GRACE;
    return render_once(&mut controller, frames, limit).await;
  }
  watch(&mut controller, frames, &options.files).await
}

async fn render_once<F: HostFactory>(
  controller: &mut PreviewController<F>,
  mut frames: FrameReceiver,
  limit: Duration,
) -> Result<i32> {
  let frame = tokio::time::timeout(limit, frames.wait_for(|slot| slot.frame().is_some()))
    .await
    .context("timed out waiting for the preview")?
    .context("preview closed before rendering")?
    .frame()
    .cloned();
  controller.close();
  let Some(frame) = frame else {
    bail!("preview closed before rendering");
  };

  match &frame.outcome {
    RenderOutcome::Rendered { stdout, stderr, .. } => {
      io::stdout().write_all(stdout.as_bytes())?;
      io::stderr().write_all(stderr.as_bytes())?;
    },
    _ => {
      write_frame(&mut io::stderr().lock(), &frame)?;
    },
  }
  Ok(if frame.outcome.is_success() { 0 } else { 1 })
}

async fn watch<F: HostFactory>(
  controller: &mut PreviewController<F>,
  mut frames: FrameReceiver,
  files: &LessonFiles,
) -> Result<i32> {
  let (tx, mut changes) = mpsc::unbounded_channel();
  let _watcher = SourceWatcher::new(files, tx).context("failed to watch the sources")?;
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let mut stdin_open = true;

  loop {
    tokio::select! {
      changed = frames.changed() => {
        if changed.is_err() {
          break;
        }
        let frame = frames.borrow_and_update().frame().cloned();
        if let Some(frame) = frame {
          write_frame(&mut io::stdout().lock(), &frame)?;
        }
      },
      Some(kind) = changes.recv() => {
        match files.read(kind) {
          Ok(text) => {
            if controller.update(kind, text) {
              log::debug!("{kind} changed on disk");
            }
          },
          Err(err) => log::warn!("{err:#}"),
        }
      },
      line = lines.next_line(), if stdin_open => {
        let Some(line) = line.context("failed to read stdin")? else {
          log::debug!("stdin closed, still watching");
          stdin_open = false;
          continue;
        };
        if line.trim().is_empty() {
          continue;
        }
        match line.parse::<Command>() {
          Ok(Command::Quit) => break,
          Ok(command) => execute(controller, files, command)?,
          Err(err) => eprintln!("{err}"),
        }
      },
    }
  }

  controller.close();
  Ok(0)
}

fn execute<F: HostFactory>(
  controller: &mut PreviewController<F>,
  files: &LessonFiles,
  command: Command,
) -> Result<()> {
  let applied = match command {
    Command::Run => controller.run(),
    Command::Undo(kind) => controller.undo(kind),
    Command::Redo(kind) => controller.redo(kind),
    Command::Toggle => {
      let seed = files.load()?;
      controller.toggle(&seed);
      true
    },
    Command::Reload => {
      if controller.is_open() {
        controller.open(&files.load()?);
      }
      controller.is_open()
    },
    Command::Width(percent) => {
      let width = controller.set_width(percent);
      println!("width {width}%");
      true
    },
    Command::Status => {
      let layout = controller.layout();
      println!(
        "{:?}, width {}%, content {}%",
        layout.state(),
        layout.width(),
        layout.content_width()
      );
      true
    },
    Command::Quit => true,
  };
  if !applied {
    eprintln!("nothing to do");
  }
  Ok(())
}

/// Human readable rendering of one frame.
pub fn write_frame(out: &mut impl Write, frame: &RenderedFrame) -> io::Result<()> {
  let generation = frame.generation;
  match &frame.outcome {
    RenderOutcome::Rendered {
      stdout,
      stderr,
      status,
    } => {
      match status {
        Some(code) => writeln!(out, "--- frame {generation} (exit {code}) ---")?,
        None => writeln!(out, "--- frame {generation} (killed) ---")?,
      }
      write_block(out, stdout)?;
      if !stderr.is_empty() {
        writeln!(out, "--- stderr ---")?;
        write_block(out, stderr)?;
      }
    },
    RenderOutcome::Running => writeln!(out, "--- frame {generation} (running) ---")?,
    RenderOutcome::TimedOut => writeln!(out, "--- frame {generation} (timed out) ---")?,
    RenderOutcome::Failed(err) => writeln!(out, "--- frame {generation} (failed: {err}) ---")?,
  }
  out.flush()
}

fn write_block(out: &mut impl Write, text: &str) -> io::Result<()> {
  out.write_all(text.as_bytes())?;
  if !text.is_empty() && !text.ends_with('\n') {
    writeln!(out)?;
  }
  Ok(())
}
