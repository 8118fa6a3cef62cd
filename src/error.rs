//! Error types used by the procvisor runtime, config loader and console.
//!
//! This module defines the error enums raised across the crate:
//!
//! - [`RuntimeError`]: errors raised by the supervisor core itself.
//! - [`ConfigError`]: a program file could not be read, parsed or validated.
//! - [`SpawnError`]: a child process could not be launched.
//! - [`SubmitError`]: a request could not be queued for the core.
//! - [`ReloadError`]: a reload was rejected (config) or could not be delivered (core).
//! - [`ControlError`]: an operator command was malformed.
//!
//! Each type provides `as_label` (stable snake_case label for logs) where it is reported as an event.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the supervisor core.
///
/// None of these is caused by a single managed process: per-process failures are
/// converted into state transitions and events instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown did not finish in time; listed processes were still alive.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The bound that was exceeded.
        grace: Duration,
        /// `program:index` of every process that was still alive.
        stuck: Vec<String>,
    },

    /// The coordinating task is gone (shut down or never started).
    #[error("supervisor core is not running")]
    CoreStopped,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use procvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::CoreStopped => "runtime_core_stopped",
        }
    }
}

/// # Errors produced while loading a program file.
///
/// A reload that fails with one of these leaves the live registry untouched.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not have the expected shape.
    #[error("cannot parse {origin}: {source}")]
    Parse {
        /// File path, or `<inline>` for in-memory documents.
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document has no `programs` section.
    #[error("{origin}: missing `programs` section")]
    MissingPrograms { origin: String },

    /// A program entry carries an invalid value.
    #[error("program `{program}`: invalid `{field}`: {reason}")]
    Invalid {
        program: String,
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "config_read",
            ConfigError::Parse { .. } => "config_parse",
            ConfigError::MissingPrograms { .. } => "config_missing_programs",
            ConfigError::Invalid { .. } => "config_invalid",
        }
    }

    pub(crate) fn invalid(program: &str, field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            program: program.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

/// # Errors produced while launching a child.
///
/// The core counts every one of these as a failed start attempt.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SpawnError {
    /// The configured working directory does not exist or is not a directory.
    #[error("working directory {path} is not usable")]
    WorkingDir { path: PathBuf },

    /// A stdio redirection target could not be opened.
    #[error("cannot open {stream} redirection {path}: {source}")]
    Redirect {
        stream: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The executable could not be started.
    #[error("cannot execute {cmd}: {source}")]
    Exec {
        cmd: String,
        #[source]
        source: std::io::Error,
    },
}

impl SpawnError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SpawnError::WorkingDir { .. } => "spawn_working_dir",
            SpawnError::Redirect { .. } => "spawn_redirect",
            SpawnError::Exec { .. } => "spawn_exec",
        }
    }
}

/// Error returned when a request cannot be queued for the core.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Request queue is full (try again later).
    #[error("request queue full")]
    Full,

    /// Core is gone; nothing will process the request.
    #[error("supervisor core closed")]
    Closed,
}

/// Error returned by [`SupervisorHandle::reload`](crate::SupervisorHandle::reload).
#[derive(Error, Debug)]
pub enum ReloadError {
    /// The new program file was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The core could not apply the reload.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// # Errors in operator commands.
///
/// Reported on the console; they never reach the supervised processes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// The command needs `<name> <index>`.
    #[error("usage: {command} <name> <index>")]
    MissingArguments { command: &'static str },

    /// The index argument is not a non-negative integer.
    #[error("invalid index `{raw}`")]
    InvalidIndex { raw: String },

    /// No program with this name is supervised.
    #[error("unknown program `{name}`")]
    UnknownProgram { name: String },

    /// The program has fewer instances than the index requires.
    #[error("program `{name}` has no instance {index} (numprocs = {len})")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },
}
