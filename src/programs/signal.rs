//! # Stop signal parsing.
//!
//! `stopsignal` accepts any standard signal name, with or without the `SIG`
//! prefix and in any case (`TERM`, `sigusr1`, `SIGQUIT`), or a signal number.
//! Unknown names are configuration errors; an absent field means `SIGTERM`.

use std::fmt;
use std::str::FromStr;

use nix::sys::signal::Signal;

/// Signal sent to a child when the operator (or a reload) stops it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopSignal(Signal);

impl StopSignal {
    /// Wraps a signal.
    pub fn new(signal: Signal) -> Self {
        Self(signal)
    }

    /// The underlying signal.
    pub fn signal(self) -> Signal {
        self.0
    }

    /// Canonical name without the `SIG` prefix (e.g. `TERM`).
    pub fn name(self) -> &'static str {
        let full = self.0.as_str();
        full.strip_prefix("SIG").unwrap_or(full)
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self(Signal::SIGTERM)
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StopSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err("empty signal name".to_string());
        }
        if let Ok(n) = raw.parse::<i32>() {
            return Signal::try_from(n)
                .map(StopSignal)
                .map_err(|_| format!("unknown signal number {n}"));
        }

        let upper = raw.to_ascii_uppercase();
        let full = if upper.starts_with("SIG") {
            upper
        } else {
            format!("SIG{upper}")
        };
        Signal::from_str(&full)
            .map(StopSignal)
            .map_err(|_| format!("unknown signal `{raw}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_spellings() {
        for raw in ["TERM", "term", "SIGTERM", "SigTerm", " 15 "] {
            assert_eq!(
                raw.parse::<StopSignal>(),
                Ok(StopSignal::new(Signal::SIGTERM)),
                "{raw}"
            );
        }
    }

    #[test]
    fn parses_standard_termination_signals() {
        let cases = [
            ("HUP", Signal::SIGHUP),
            ("INT", Signal::SIGINT),
            ("QUIT", Signal::SIGQUIT),
            ("KILL", Signal::SIGKILL),
            ("USR1", Signal::SIGUSR1),
            ("USR2", Signal::SIGUSR2),
            ("ABRT", Signal::SIGABRT),
            ("ALRM", Signal::SIGALRM),
        ];
        for (name, sig) in cases {
            let parsed: StopSignal = name.parse().expect(name);
            assert_eq!(parsed.signal(), sig);
            assert_eq!(parsed.name(), name);
        }
    }

    #[test]
    fn rejects_unknown_names() {
        assert!("NOPE".parse::<StopSignal>().is_err());
        assert!("".parse::<StopSignal>().is_err());
        assert!("4096".parse::<StopSignal>().is_err());
    }

    #[test]
    fn defaults_to_term() {
        assert_eq!(StopSignal::default().name(), "TERM");
    }
}
