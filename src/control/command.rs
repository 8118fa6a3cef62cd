//! # Operator command parsing.
//!
//! One command per line, whitespace separated:
//!
//! | input                          | command                 |
//! |--------------------------------|-------------------------|
//! | `status`                       | compact list            |
//! | `status <name> <index>`        | full report             |
//! | `start <name> <index>` / `run` | start request           |
//! | `stop <name> <index>`          | stop request            |
//! | `reload`                       | reload the program file |
//! | `help`                         | command list            |
//! | `clear`                        | clear the screen        |
//! | `quit` / `exit`                | shut down               |
//!
//! Anything else parses to [`Command::Unknown`] and is ignored by the console.

use crate::error::ControlError;

/// A process addressed by program name and instance index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub index: usize,
}

/// A parsed operator command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Blank line.
    Empty,
    /// `status` with or without a target.
    Status(Option<Target>),
    Start(Target),
    Stop(Target),
    Reload,
    Help,
    Clear,
    Quit,
    /// Unrecognized verb; ignored.
    Unknown(String),
}

/// Parses one input line.
pub fn parse(line: &str) -> Result<Command, ControlError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(Command::Empty);
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match verb {
        "status" if rest.is_empty() => Command::Status(None),
        "status" => Command::Status(Some(target("status", &rest)?)),
        "start" | "run" => Command::Start(target("start", &rest)?),
        "stop" => Command::Stop(target("stop", &rest)?),
        "reload" => Command::Reload,
        "help" => Command::Help,
        "clear" => Command::Clear,
        "quit" | "exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Ok(cmd)
}

fn target(command: &'static str, args: &[&str]) -> Result<Target, ControlError> {
    let [name, index, ..] = args else {
        return Err(ControlError::MissingArguments { command });
    };
    let index = index.parse().map_err(|_| ControlError::InvalidIndex {
        raw: (*index).to_string(),
    })?;
    Ok(Target {
        name: (*name).to_string(),
        index,
    })
}

/// Help text printed by `help`.
pub const HELP: &str = "\
commands:
  status                  list every program
  status <name> <index>   full report for one process
  start <name> <index>    start a process (alias: run)
  stop <name> <index>     stop a process
  reload                  re-read the program file
  clear                   clear the screen
  help                    this text
  quit                    stop every process and exit (alias: exit)
";

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str, index: usize) -> Target {
        Target {
            name: name.into(),
            index,
        }
    }

    #[test]
    fn parses_targets() {
        assert_eq!(parse("start web 1"), Ok(Command::Start(t("web", 1))));
        assert_eq!(parse("  run   web 0 "), Ok(Command::Start(t("web", 0))));
        assert_eq!(parse("stop db 0"), Ok(Command::Stop(t("db", 0))));
        assert_eq!(parse("status web 2"), Ok(Command::Status(Some(t("web", 2)))));
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(parse(""), Ok(Command::Empty));
        assert_eq!(parse("status"), Ok(Command::Status(None)));
        assert_eq!(parse("reload"), Ok(Command::Reload));
        assert_eq!(parse("help"), Ok(Command::Help));
        assert_eq!(parse("clear"), Ok(Command::Clear));
        assert_eq!(parse("exit"), Ok(Command::Quit));
        assert_eq!(parse("dance now"), Ok(Command::Unknown("dance".into())));
    }

    #[test]
    fn reports_bad_arguments() {
        assert_eq!(
            parse("start web"),
            Err(ControlError::MissingArguments { command: "start" })
        );
        assert_eq!(
            parse("stop web -1"),
            Err(ControlError::InvalidIndex { raw: "-1".into() })
        );
        assert_eq!(
            parse("status web x"),
            Err(ControlError::InvalidIndex { raw: "x".into() })
        );
    }
}
