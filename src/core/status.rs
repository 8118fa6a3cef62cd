//! # Observable process state.
//!
//! Plain data shared between the core and its readers:
//! - [`ProcessId`] program name + instance index
//! - [`ProcessState`] lifecycle state
//! - [`ExitOutcome`] how a child ended
//! - [`StatusReport`] settled view of one process
//! - [`Snapshot`] settled view of the whole registry, published after every
//!   message the core handles
//!
//! Rendering lives here too: `StatusReport` displays as the full multi-line
//! report, [`Snapshot::summary`] as the compact one-line-per-program list.

use std::fmt::{self, Write as _};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Identity of one managed process.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessId {
    pub program: Arc<str>,
    pub index: usize,
}

impl ProcessId {
    pub fn new(program: impl Into<Arc<str>>, index: usize) -> Self {
        Self {
            program: program.into(),
            index,
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.program, self.index)
    }
}

/// Lifecycle state of a managed process.
///
/// ```text
/// pending ─► starting ─► running ─► stopping ─► stopped
///               │  ▲         │
///               ▼  │         └──► starting (restart policy)
///             backoff ─► fatal
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessState {
    /// Created by a reload, never started.
    Pending,
    /// Child spawned, confirmation delay running.
    Starting,
    /// Failed start, waiting for the retry timer.
    Backoff,
    /// Child confirmed started.
    Running,
    /// Stop signal sent, waiting for the child to exit.
    Stopping,
    /// Idle; may be started again.
    Stopped,
    /// Retries exhausted; needs a manual start.
    Fatal,
}

impl ProcessState {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Pending => "PENDING",
            ProcessState::Starting => "STARTING",
            ProcessState::Backoff => "BACKOFF",
            ProcessState::Running => "RUNNING",
            ProcessState::Stopping => "STOPPING",
            ProcessState::Stopped => "STOPPED",
            ProcessState::Fatal => "FATAL",
        }
    }

    /// States in which a start request is a no-op.
    pub fn is_starting_or_up(self) -> bool {
        matches!(
            self,
            ProcessState::Starting | ProcessState::Backoff | ProcessState::Running
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a child ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited with a status code.
    Code(i32),
    /// Killed by a signal (raw number).
    Signal(i32),
    /// Never started; the spawn itself failed.
    SpawnFailed(Arc<str>),
    /// The OS reported neither a code nor a signal.
    Unknown,
}

impl ExitOutcome {
    /// Exit code, if the child exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Code(c) => Some(*c),
            _ => None,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitOutcome::Code(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(sig) = status.signal() {
                return ExitOutcome::Signal(sig);
            }
        }
        ExitOutcome::Unknown
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Code(c) => write!(f, "exit code {c}"),
            ExitOutcome::Signal(s) => match nix::sys::signal::Signal::try_from(*s) {
                Ok(sig) => write!(f, "killed by {}", sig.as_str()),
                Err(_) => write!(f, "killed by signal {s}"),
            },
            ExitOutcome::SpawnFailed(reason) => write!(f, "spawn failed: {reason}"),
            ExitOutcome::Unknown => f.write_str("unknown exit"),
        }
    }
}

/// Settled view of one process.
#[derive(Clone, Debug)]
pub struct StatusReport {
    pub id: ProcessId,
    pub state: ProcessState,
    /// OS pid while a child is live.
    pub pid: Option<u32>,
    /// Spawn time of the live child.
    pub since: Option<Instant>,
    /// Failed attempts since the last confirmed start.
    pub retries: u32,
    pub last_exit: Option<ExitOutcome>,
    /// `cmd args...` of the spec this process runs.
    pub command: String,
    /// Removed by a reload and still being stopped.
    pub retiring: bool,
}

impl StatusReport {
    /// Time since the live child was spawned.
    pub fn uptime(&self) -> Option<Duration> {
        self.since.map(|t| t.elapsed())
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}{}", self.id, if self.retiring { " (retiring)" } else { "" })?;
        writeln!(f, "  state:     {}", self.state)?;
        match self.pid {
            Some(pid) => writeln!(f, "  pid:       {pid}")?,
            None => writeln!(f, "  pid:       -")?,
        }
        match self.uptime() {
            Some(up) => writeln!(f, "  uptime:    {}", format_uptime(up))?,
            None => writeln!(f, "  uptime:    -")?,
        }
        writeln!(f, "  retries:   {}", self.retries)?;
        match &self.last_exit {
            Some(exit) => writeln!(f, "  last exit: {exit}")?,
            None => writeln!(f, "  last exit: -")?,
        }
        writeln!(f, "  command:   {}", self.command)
    }
}

/// Settled view of one program.
#[derive(Clone, Debug)]
pub struct ProgramStatus {
    pub name: Arc<str>,
    pub processes: Vec<StatusReport>,
}

impl ProgramStatus {
    /// Number of processes in `running`.
    pub fn running(&self) -> usize {
        self.processes
            .iter()
            .filter(|p| p.state == ProcessState::Running)
            .count()
    }

    fn summary_line(&self, out: &mut String, retiring: bool) {
        let _ = write!(
            out,
            "{:<16} {}/{} up ",
            self.name,
            self.running(),
            self.processes.len()
        );
        for p in &self.processes {
            let _ = write!(out, " {}:{}", p.id.index, p.state);
        }
        if retiring {
            out.push_str("  (retiring)");
        }
        out.push('\n');
    }
}

/// Settled view of the registry plus processes still being retired.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub programs: Vec<ProgramStatus>,
    pub retiring: Vec<ProgramStatus>,
}

impl Snapshot {
    /// Looks up a process; declared programs shadow retiring ones.
    pub fn get(&self, id: &ProcessId) -> Option<&StatusReport> {
        self.programs
            .iter()
            .chain(self.retiring.iter())
            .filter(|p| p.name == id.program)
            .find_map(|p| p.processes.iter().find(|r| r.id.index == id.index))
    }

    /// Looks up a declared program.
    pub fn program(&self, name: &str) -> Option<&ProgramStatus> {
        self.programs.iter().find(|p| &*p.name == name)
    }

    /// Iterates every report, declared programs first.
    pub fn reports(&self) -> impl Iterator<Item = &StatusReport> {
        self.programs
            .iter()
            .chain(self.retiring.iter())
            .flat_map(|p| p.processes.iter())
    }

    /// Compact list view: one line per program.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for p in &self.programs {
            p.summary_line(&mut out, false);
        }
        for p in &self.retiring {
            p.summary_line(&mut out, true);
        }
        if out.is_empty() {
            out.push_str("no programs\n");
        }
        out
    }
}

/// `H:MM:SS`, prefixed with days when needed.
pub fn format_uptime(d: Duration) -> String {
    let secs = d.as_secs();
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (h, m, s) = (rem / 3600, (rem % 3600) / 60, rem % 60);
    if days > 0 {
        format!("{days}d {h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(program: &str, index: usize, state: ProcessState) -> StatusReport {
        StatusReport {
            id: ProcessId::new(program, index),
            state,
            pid: None,
            since: None,
            retries: 0,
            last_exit: None,
            command: "/bin/sleep 10".into(),
            retiring: false,
        }
    }

    #[test]
    fn full_report_lists_every_field() {
        let mut r = report("web", 1, ProcessState::Fatal);
        r.retries = 4;
        r.last_exit = Some(ExitOutcome::Code(3));
        let text = r.to_string();
        assert!(text.starts_with("web:1\n"));
        assert!(text.contains("state:     FATAL"));
        assert!(text.contains("pid:       -"));
        assert!(text.contains("retries:   4"));
        assert!(text.contains("last exit: exit code 3"));
        assert!(text.contains("command:   /bin/sleep 10"));
    }

    #[test]
    fn summary_has_one_line_per_program() {
        let snap = Snapshot {
            programs: vec![ProgramStatus {
                name: "web".into(),
                processes: vec![
                    report("web", 0, ProcessState::Running),
                    report("web", 1, ProcessState::Backoff),
                ],
            }],
            retiring: vec![ProgramStatus {
                name: "old".into(),
                processes: vec![report("old", 0, ProcessState::Stopping)],
            }],
        };
        let text = snap.summary();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("web"));
        assert!(lines[0].contains("1/2 up"));
        assert!(lines[0].contains("0:RUNNING 1:BACKOFF"));
        assert!(lines[1].ends_with("(retiring)"));

        assert_eq!(
            snap.get(&ProcessId::new("old", 0)).map(|r| r.state),
            Some(ProcessState::Stopping)
        );
        assert!(snap.get(&ProcessId::new("web", 2)).is_none());
        assert_eq!(Snapshot::default().summary(), "no programs\n");
    }

    #[test]
    fn exit_outcomes_render() {
        assert_eq!(ExitOutcome::Signal(9).to_string(), "killed by SIGKILL");
        assert_eq!(
            ExitOutcome::SpawnFailed("nope".into()).to_string(),
            "spawn failed: nope"
        );
        assert_eq!(ExitOutcome::Code(0).code(), Some(0));
        assert_eq!(ExitOutcome::Signal(15).code(), None);
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(Duration::from_secs(59)), "0:00:59");
        assert_eq!(format_uptime(Duration::from_secs(3_725)), "1:02:05");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 1:01:01");
    }
}
