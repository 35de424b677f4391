use std::path::Path;

use log::LevelFilter;

pub fn level_for(verbosity: u8) -> LevelFilter {
  match verbosity {
    0 => LevelFilter::Warn,
    1 => LevelFilter::Debug,
    _ => LevelFilter::Trace,
  }
}

/// Install the global logger, writing to `log_file`.
pub fn setup_logging(verbosity: u8, log_file: &Path) -> Result<(), fern::InitError> {
  fern::Dispatch::new()
    .format(|out, message, record| {
      out.finish(format_args!(
        "{} {} [{}] {}",
        chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
        record.target(),
        record.level(),
        message
      ))
    })
    .level(level_for(verbosity))
    // the watcher backend is chatty at trace level
    .level_for("notify", LevelFilter::Warn)
    .chain(fern::log_file(log_file)?)
    .apply()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn verbosity_raises_the_level() {
    assert_eq!(level_for(0), LevelFilter::Warn);
    assert_eq!(level_for(1), LevelFilter::Debug);
    assert_eq!(level_for(2), LevelFilter::Trace);
    assert_eq!(level_for(9), LevelFilter::Trace);
  }
}
