//! # Auto-restart policy for children that exit while `running`.
//!
//! [`AutoRestart`] decides what happens after a confirmed-started child exits:
//!
//! - [`AutoRestart::Never`] the process settles in `stopped`, whatever the exit code.
//! - [`AutoRestart::Always`] the child is spawned again, whatever the exit code.
//! - [`AutoRestart::Unexpected`] the process settles in `stopped` when the exit code is in
//!   the expected set, otherwise it is retried against the start-retry limit (default).
//!
//! Deaths by signal carry no exit code and are never "expected".

use std::fmt;
use std::str::FromStr;

/// Outcome of applying an [`AutoRestart`] policy to an exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitDecision {
    /// Settle in `stopped`.
    Stop,
    /// Spawn again without touching the retry counter.
    Restart,
    /// Spawn again, counted against the start-retry limit.
    Retry,
}

/// Policy controlling whether a child is spawned again after leaving `running`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AutoRestart {
    /// Always spawn again.
    Always,
    /// Never spawn again.
    Never,
    /// Spawn again only when the exit code is not expected.
    #[default]
    Unexpected,
}

impl AutoRestart {
    /// Applies the policy to an exit.
    ///
    /// `code` is `None` when the child was killed by a signal. `expected` is the
    /// program's sorted expected-exit-code set.
    pub fn on_exit(self, code: Option<i32>, expected: &[i32]) -> ExitDecision {
        match self {
            AutoRestart::Never => ExitDecision::Stop,
            AutoRestart::Always => ExitDecision::Restart,
            AutoRestart::Unexpected => match code {
                Some(c) if expected.binary_search(&c).is_ok() => ExitDecision::Stop,
                _ => ExitDecision::Retry,
            },
        }
    }

    /// Config spelling of the policy.
    pub fn as_str(self) -> &'static str {
        match self {
            AutoRestart::Always => "always",
            AutoRestart::Never => "never",
            AutoRestart::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for AutoRestart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutoRestart {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(AutoRestart::Always),
            "never" => Ok(AutoRestart::Never),
            "" | "unexpected" => Ok(AutoRestart::Unexpected),
            other => Err(format!(
                "unknown policy `{other}` (expected always, never or unexpected)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_consults_expected_codes() {
        let expected = [0, 2];
        let p = AutoRestart::Unexpected;
        assert_eq!(p.on_exit(Some(2), &expected), ExitDecision::Stop);
        assert_eq!(p.on_exit(Some(0), &expected), ExitDecision::Stop);
        assert_eq!(p.on_exit(Some(1), &expected), ExitDecision::Retry);
        assert_eq!(p.on_exit(None, &expected), ExitDecision::Retry);
    }

    #[test]
    fn always_and_never_ignore_exit_code() {
        assert_eq!(AutoRestart::Always.on_exit(Some(0), &[0]), ExitDecision::Restart);
        assert_eq!(AutoRestart::Never.on_exit(Some(9), &[0]), ExitDecision::Stop);
    }

    #[test]
    fn parses_config_spelling() {
        assert_eq!("Always".parse::<AutoRestart>(), Ok(AutoRestart::Always));
        assert_eq!("".parse::<AutoRestart>(), Ok(AutoRestart::Unexpected));
        assert!("sometimes".parse::<AutoRestart>().is_err());
    }
}
