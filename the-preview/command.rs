//! Commands typed on stdin while watching.

use std::str::FromStr;

use the_preview_lib::{
  BufferKind,
  buffer::UnknownBufferKind,
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Run,
  Undo(BufferKind),
  Redo(BufferKind),
  Toggle,
  /// Re-read every source from disk into the open pane.
  Reload,
  Width(u16),
  Status,
  Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseCommandError {
  #[error("unknown command '{0}', expected run, undo, redo, toggle, reload, width, status or quit")]
  Unknown(String),
  #[error("'{0}' needs an argument")]
  MissingArgument(&'static str),
  #[error(transparent)]
  Buffer(#[from] UnknownBufferKind),
  #[error("invalid width '{0}'")]
  Width(String),
}

impl FromStr for Command {
  type Err = ParseCommandError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut words = s.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next();
    let command = match name {
      "run" | "r" => Self::Run,
      "undo" | "u" => Self::Undo(arg.ok_or(ParseCommandError::MissingArgument("undo"))?.parse()?),
      "redo" => Self::Redo(arg.ok_or(ParseCommandError::MissingArgument("redo"))?.parse()?),
      "toggle" | "t" => Self::Toggle,
      "reload" => Self::Reload,
      "width" | "w" => {
        let arg = arg.ok_or(ParseCommandError::MissingArgument("width"))?;
        Self::Width(
          arg
            .parse()
            .map_err(|_| ParseCommandError::Width(arg.to_string()))?,
        )
      },
      "status" | "s" => Self::Status,
      "quit" | "q" | "exit" => Self::Quit,
      other => return Err(ParseCommandError::Unknown(other.to_string())),
    };
    Ok(command)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_commands() {
    assert_eq!("run".parse::<Command>(), Ok(Command::Run));
    assert_eq!(
      " undo  css ".parse::<Command>(),
      Ok(Command::Undo(BufferKind::Style))
    );
    assert_eq!(
      "redo script".parse::<Command>(),
      Ok(Command::Redo(BufferKind::Script))
    );
    assert_eq!("width 35".parse::<Command>(), Ok(Command::Width(35)));
    assert_eq!("q".parse::<Command>(), Ok(Command::Quit));
  }

  #[test]
  fn rejects_bad_input() {
    assert_eq!(
      "undo".parse::<Command>(),
      Err(ParseCommandError::MissingArgument("undo"))
    );
    assert!(matches!(
      "undo lisp".parse::<Command>(),
      Err(ParseCommandError::Buffer(_))
    ));
    assert!(matches!(
      "width wide".parse::<Command>(),
      Err(ParseCommandError::Width(_))
    ));
    assert!(matches!(
      "launch".parse::<Command>(),
      Err(ParseCommandError::Unknown(_))
    ));
  }
}
