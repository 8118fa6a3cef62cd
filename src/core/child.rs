//! # Child launch and watcher task.
//!
//! [`spawn`] builds the OS command from a [`ProcessSpec`] (argv, environment
//! overlay, working directory, umask, stdio redirections), launches it, and
//! hands the `tokio::process::Child` to a watcher task.
//!
//! The watcher is the only owner of the child:
//! - it awaits the exit and posts [`Lifecycle::Exited`] back to the core;
//! - it delivers signals sent through the returned [`ChildHandle`], and only
//!   while the child is un-reaped, so a signal never reaches a recycled pid.
//!
//! ```text
//! core ── ChildHandle::signal / kill ──► [mpsc] ──► watcher ──► kill(2) / start_kill
//!  ▲                                                   │
//!  └──────────── Lifecycle::Exited { serial, incarnation, outcome } ◄─┘
//! ```

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process::Stdio;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::core::process::{Lifecycle, Stamp};
use crate::core::status::ExitOutcome;
use crate::error::SpawnError;
use crate::programs::ProcessSpec;

enum Delivery {
    Signal(Signal),
    Kill,
}

/// Core-side handle to a live child.
///
/// Dropping it does not affect the child; the watcher keeps waiting for the exit.
#[derive(Debug)]
pub(crate) struct ChildHandle {
    pid: Option<u32>,
    tx: mpsc::UnboundedSender<Delivery>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delivery::Signal(s) => write!(f, "Signal({})", s.as_str()),
            Delivery::Kill => f.write_str("Kill"),
        }
    }
}

impl ChildHandle {
    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Asks the watcher to deliver `sig`. Returns `false` once the child was reaped.
    pub(crate) fn signal(&self, sig: Signal) -> bool {
        self.tx.send(Delivery::Signal(sig)).is_ok()
    }

    /// Asks the watcher to `SIGKILL` the child.
    pub(crate) fn kill(&self) -> bool {
        self.tx.send(Delivery::Kill).is_ok()
    }
}

/// Launches one child for `spec` and starts its watcher.
///
/// The exit is reported on `events`, tagged with `stamp`.
pub(crate) fn spawn(
    spec: &ProcessSpec,
    stamp: Stamp,
    events: mpsc::UnboundedSender<Lifecycle>,
) -> Result<ChildHandle, SpawnError> {
    let mut cmd = command(spec)?;
    let child = cmd.spawn().map_err(|source| SpawnError::Exec {
        cmd: spec.cmd().to_string(),
        source,
    })?;
    let pid = child.id();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(watch(child, rx, stamp, events));
    Ok(ChildHandle { pid, tx })
}

async fn watch(
    mut child: Child,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    stamp: Stamp,
    events: mpsc::UnboundedSender<Lifecycle>,
) {
    let outcome = loop {
        tokio::select! {
            status = child.wait() => {
                break match status {
                    Ok(status) => ExitOutcome::from(status),
                    Err(_) => ExitOutcome::Unknown,
                };
            }
            Some(delivery) = rx.recv() => deliver(&mut child, delivery),
        }
    };
    let _ = events.send(Lifecycle::Exited { stamp, outcome });
}

fn deliver(child: &mut Child, delivery: Delivery) {
    match delivery {
        Delivery::Signal(sig) => {
            // `id()` is None once the child has been reaped.
            if let Some(pid) = child.id() {
                let _ = signal::kill(Pid::from_raw(pid as i32), sig);
            }
        }
        Delivery::Kill => {
            let _ = child.start_kill();
        }
    }
}

fn command(spec: &ProcessSpec) -> Result<Command, SpawnError> {
    let mut cmd = Command::new(spec.cmd());
    cmd.args(spec.args()).envs(spec.env()).kill_on_drop(true);

    if let Some(dir) = spec.workingdir() {
        if !dir.is_dir() {
            return Err(SpawnError::WorkingDir {
                path: dir.to_path_buf(),
            });
        }
        cmd.current_dir(dir);
    }

    cmd.stdin(match spec.stdin() {
        Some(path) => Stdio::from(open_input(path)?),
        None => Stdio::inherit(),
    });
    cmd.stdout(match spec.stdout() {
        Some(path) => Stdio::from(open_output("stdout", path)?),
        None => Stdio::inherit(),
    });
    cmd.stderr(match spec.stderr() {
        Some(path) => Stdio::from(open_output("stderr", path)?),
        None => Stdio::inherit(),
    });

    if let Some(mask) = spec.umask() {
        let mode = nix::sys::stat::Mode::from_bits_truncate(mask as nix::libc::mode_t);
        // SAFETY: umask(2) is async-signal-safe and touches no shared state.
        unsafe {
            cmd.pre_exec(move || {
                nix::sys::stat::umask(mode);
                Ok(())
            });
        }
    }
    Ok(cmd)
}

fn open_input(path: &Path) -> Result<File, SpawnError> {
    File::open(path).map_err(|source| SpawnError::Redirect {
        stream: "stdin",
        path: path.to_path_buf(),
        source,
    })
}

fn open_output(stream: &'static str, path: &Path) -> Result<File, SpawnError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SpawnError::Redirect {
            stream,
            path: path.to_path_buf(),
            source,
        })
}
