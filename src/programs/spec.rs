//! # Process specification.
//!
//! [`ProcessSpec`] is the immutable description of one program: what to run,
//! how many instances, and the policies the core applies to each instance.
//! Specs are shared as `Arc<ProcessSpec>`; a running process keeps the spec it
//! was started with until it is stopped and started again.
//!
//! A spec is created by the program-file loader or with [`ProcessSpec::builder`].
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{AutoRestart, ProcessSpec};
//!
//! let spec = ProcessSpec::builder("web", "/usr/bin/python3")
//!     .args(["-m", "http.server"])
//!     .numprocs(2)
//!     .autostart(true)
//!     .autorestart(AutoRestart::Never)
//!     .exitcodes([2, 0, 2])
//!     .starttime(Duration::from_secs(1))
//!     .build();
//!
//! assert_eq!(spec.exitcodes(), &[0, 2]);
//! assert_eq!(spec.numprocs(), 2);
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::policies::AutoRestart;
use crate::programs::signal::StopSignal;

/// Default start-retry limit.
pub const DEFAULT_START_RETRIES: u32 = 3;
/// Default start-confirmation delay.
pub const DEFAULT_START_TIME: Duration = Duration::from_secs(1);
/// Default grace period between the stop signal and `SIGKILL`.
pub const DEFAULT_STOP_TIME: Duration = Duration::from_secs(10);

/// Desired run configuration of one program.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessSpec {
    name: String,
    cmd: String,
    args: Vec<String>,
    numprocs: usize,
    umask: Option<u32>,
    workingdir: Option<PathBuf>,
    autostart: bool,
    autorestart: AutoRestart,
    exitcodes: Vec<i32>,
    startretries: u32,
    starttime: Duration,
    stopsignal: StopSignal,
    stoptime: Duration,
    stdin: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ProcessSpec {
    /// Starts a builder with every optional field at its default.
    pub fn builder(name: impl Into<String>, cmd: impl Into<String>) -> ProcessSpecBuilder {
        ProcessSpecBuilder::new(name, cmd)
    }

    /// Program name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executable path (resolved through `PATH` when relative).
    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    /// Arguments passed after the executable.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Number of instances.
    pub fn numprocs(&self) -> usize {
        self.numprocs
    }

    /// File-creation mask applied in the child, if set.
    pub fn umask(&self) -> Option<u32> {
        self.umask
    }

    /// Working directory of the child, if set.
    pub fn workingdir(&self) -> Option<&Path> {
        self.workingdir.as_deref()
    }

    pub fn autostart(&self) -> bool {
        self.autostart
    }

    pub fn autorestart(&self) -> AutoRestart {
        self.autorestart
    }

    /// Expected exit codes, sorted and deduplicated; never empty.
    pub fn exitcodes(&self) -> &[i32] {
        &self.exitcodes
    }

    pub fn startretries(&self) -> u32 {
        self.startretries
    }

    /// Minimum uptime for a spawn to count as started.
    pub fn starttime(&self) -> Duration {
        self.starttime
    }

    pub fn stopsignal(&self) -> StopSignal {
        self.stopsignal
    }

    /// Grace period between the stop signal and `SIGKILL`.
    pub fn stoptime(&self) -> Duration {
        self.stoptime
    }

    pub fn stdin(&self) -> Option<&Path> {
        self.stdin.as_deref()
    }

    pub fn stdout(&self) -> Option<&Path> {
        self.stdout.as_deref()
    }

    pub fn stderr(&self) -> Option<&Path> {
        self.stderr.as_deref()
    }

    /// Environment overrides applied on top of the supervisor's environment.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// `cmd arg1 arg2 ...` for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.cmd.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Fluent builder for [`ProcessSpec`].
#[derive(Clone, Debug)]
pub struct ProcessSpecBuilder {
    spec: ProcessSpec,
}

impl ProcessSpecBuilder {
    /// Creates a builder with defaults: one instance, no autostart,
    /// `unexpected` restarts, exit codes `{0}`, inherited stdio.
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            spec: ProcessSpec {
                name: name.into(),
                cmd: cmd.into(),
                args: Vec::new(),
                numprocs: 1,
                umask: None,
                workingdir: None,
                autostart: false,
                autorestart: AutoRestart::default(),
                exitcodes: Vec::new(),
                startretries: DEFAULT_START_RETRIES,
                starttime: DEFAULT_START_TIME,
                stopsignal: StopSignal::default(),
                stoptime: DEFAULT_STOP_TIME,
                stdin: None,
                stdout: None,
                stderr: None,
                env: BTreeMap::new(),
            },
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Instance count; `0` is raised to `1`.
    pub fn numprocs(mut self, n: usize) -> Self {
        self.spec.numprocs = n.max(1);
        self
    }

    pub fn umask(mut self, mask: Option<u32>) -> Self {
        self.spec.umask = mask;
        self
    }

    pub fn workingdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.workingdir = Some(dir.into());
        self
    }

    pub fn autostart(mut self, on: bool) -> Self {
        self.spec.autostart = on;
        self
    }

    pub fn autorestart(mut self, policy: AutoRestart) -> Self {
        self.spec.autorestart = policy;
        self
    }

    /// Expected exit codes; an empty set means `{0}`.
    pub fn exitcodes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.spec.exitcodes = codes.into_iter().collect();
        self
    }

    pub fn startretries(mut self, n: u32) -> Self {
        self.spec.startretries = n;
        self
    }

    pub fn starttime(mut self, d: Duration) -> Self {
        self.spec.starttime = d;
        self
    }

    pub fn stopsignal(mut self, sig: StopSignal) -> Self {
        self.spec.stopsignal = sig;
        self
    }

    pub fn stoptime(mut self, d: Duration) -> Self {
        self.spec.stoptime = d;
        self
    }

    pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.stdin = Some(path.into());
        self
    }

    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.stdout = Some(path.into());
        self
    }

    pub fn stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.stderr = Some(path.into());
        self
    }

    /// Adds (or replaces) one environment override.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.env.insert(key.into(), value.into());
        self
    }

    /// Finalizes the spec, normalizing the expected exit codes.
    pub fn build(mut self) -> ProcessSpec {
        if self.spec.exitcodes.is_empty() {
            self.spec.exitcodes.push(0);
        }
        self.spec.exitcodes.sort_unstable();
        self.spec.exitcodes.dedup();
        self.spec
    }
}
