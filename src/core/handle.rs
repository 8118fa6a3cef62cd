//! # SupervisorHandle: the only way into a running core.
//!
//! A cheap-to-clone handle carrying:
//! - the bounded start and stop request queues ([`submit_start`](SupervisorHandle::submit_start),
//!   [`submit_stop`](SupervisorHandle::submit_stop));
//! - the control channel (reload, shutdown);
//! - a `watch` receiver over the latest settled [`Snapshot`];
//! - the event [`Bus`], for callers that want the raw lifecycle stream.
//!
//! Requests are fire-and-forget: the core decides whether they apply and
//! reports no-ops as `RequestIgnored` events. Reads never wait on the core.
//!
//! ## Example
//! ```rust,no_run
//! use procvisor::{ProcessId, ProcessState, Supervisor, SupervisorConfig, ProgramSet};
//!
//! # async fn demo(programs: ProgramSet) -> anyhow::Result<()> {
//! let sup = Supervisor::new(SupervisorConfig::default(), Vec::new());
//! let handle = sup.handle();
//! let core = tokio::spawn(sup.run(programs));
//!
//! let id = ProcessId::new("web", 0);
//! handle.submit_start(id.clone())?;
//! handle
//!     .wait_for(|s| s.get(&id).is_some_and(|r| r.state == ProcessState::Running))
//!     .await?;
//! println!("{}", handle.status(&id).map(|r| r.to_string()).unwrap_or_default());
//!
//! handle.shutdown().await;
//! core.await??;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::core::status::{ProcessId, Snapshot, StatusReport};
use crate::error::{ReloadError, RuntimeError, SubmitError};
use crate::events::{Bus, Event, EventKind};
use crate::programs::{self, ProgramSet};

/// Messages on the control channel.
pub(crate) enum Control {
    Reload {
        programs: ProgramSet,
        reply: oneshot::Sender<Result<ReloadSummary, RuntimeError>>,
    },
    Shutdown,
}

/// What a reload did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    /// New processes queued for start (`autostart` programs).
    pub started: Vec<ProcessId>,
    /// New processes left `pending` until an explicit start.
    pub pending: Vec<ProcessId>,
    /// Processes of removed programs, queued for stop.
    pub stopping: Vec<ProcessId>,
    /// Retained programs whose spec changed; their processes keep the old one.
    pub changed: Vec<Arc<str>>,
}

impl fmt::Display for ReloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} starting, {} pending, {} stopping, {} changed",
            self.started.len(),
            self.pending.len(),
            self.stopping.len(),
            self.changed.len()
        )
    }
}

/// Cloneable handle to a supervisor core.
#[derive(Clone)]
pub struct SupervisorHandle {
    starts: mpsc::Sender<ProcessId>,
    stops: mpsc::Sender<ProcessId>,
    control: mpsc::UnboundedSender<Control>,
    snapshot: watch::Receiver<Snapshot>,
    bus: Bus,
}

impl SupervisorHandle {
    pub(crate) fn new(
        starts: mpsc::Sender<ProcessId>,
        stops: mpsc::Sender<ProcessId>,
        control: mpsc::UnboundedSender<Control>,
        snapshot: watch::Receiver<Snapshot>,
        bus: Bus,
    ) -> Self {
        Self {
            starts,
            stops,
            control,
            snapshot,
            bus,
        }
    }

    /// Queues a start request.
    ///
    /// Accepted for any id; the core ignores it when the process is already
    /// starting/backoff/running or does not exist.
    pub fn submit_start(&self, id: ProcessId) -> Result<(), SubmitError> {
        submit(&self.starts, id)
    }

    /// Queues a stop request.
    ///
    /// The core ignores it when the process is already stopped/fatal/stopping.
    pub fn submit_stop(&self, id: ProcessId) -> Result<(), SubmitError> {
        submit(&self.stops, id)
    }

    /// Applies a new program set and waits for the core's summary.
    pub async fn reload(&self, programs: ProgramSet) -> Result<ReloadSummary, ReloadError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(Control::Reload { programs, reply })
            .map_err(|_| RuntimeError::CoreStopped)?;
        let summary = rx.await.map_err(|_| RuntimeError::CoreStopped)??;
        Ok(summary)
    }

    /// Loads a program file and applies it.
    ///
    /// A file that fails to load is reported as `ReloadRejected` and leaves
    /// the registry untouched.
    pub async fn reload_file(&self, path: impl AsRef<Path>) -> Result<ReloadSummary, ReloadError> {
        match programs::load(path.as_ref()) {
            Ok(set) => self.reload(set).await,
            Err(err) => {
                self.bus.publish(
                    Event::new(EventKind::ReloadRejected)
                        .with_reason(format!("{}: {err}", err.as_label())),
                );
                Err(err.into())
            }
        }
    }

    /// Latest settled report for one process.
    pub fn status(&self, id: &ProcessId) -> Option<StatusReport> {
        self.snapshot.borrow().get(id).cloned()
    }

    /// Latest settled snapshot of every process.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receiver notified after every message the core handles.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Waits until a published snapshot satisfies `pred`.
    pub async fn wait_for(&self, mut pred: impl FnMut(&Snapshot) -> bool) -> Result<(), RuntimeError> {
        let mut rx = self.snapshot.clone();
        rx.wait_for(|s| pred(s))
            .await
            .map(|_| ())
            .map_err(|_| RuntimeError::CoreStopped)
    }

    /// Raw lifecycle event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Asks the core to stop everything and exit, without waiting.
    pub fn request_shutdown(&self) -> Result<(), SubmitError> {
        self.control
            .send(Control::Shutdown)
            .map_err(|_| SubmitError::Closed)
    }

    /// Asks the core to stop everything and waits until it has exited.
    pub async fn shutdown(&self) {
        let _ = self.request_shutdown();
        let mut rx = self.snapshot.clone();
        while rx.changed().await.is_ok() {}
    }

    /// `true` once the core has exited.
    pub fn is_closed(&self) -> bool {
        self.control.is_closed()
    }
}

fn submit(queue: &mpsc::Sender<ProcessId>, id: ProcessId) -> Result<(), SubmitError> {
    queue.try_send(id).map_err(|e| match e {
        mpsc::error::TrySendError::Full(_) => SubmitError::Full,
        mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_and_closed_queues_are_reported() {
        let (tx, rx) = mpsc::channel(1);
        assert_eq!(submit(&tx, ProcessId::new("web", 0)), Ok(()));
        assert_eq!(submit(&tx, ProcessId::new("web", 1)), Err(SubmitError::Full));
        drop(rx);
        assert_eq!(submit(&tx, ProcessId::new("web", 0)), Err(SubmitError::Closed));
    }

    #[test]
    fn summary_renders_counts() {
        let s = ReloadSummary {
            started: vec![ProcessId::new("web", 0), ProcessId::new("web", 1)],
            pending: vec![],
            stopping: vec![ProcessId::new("old", 0)],
            changed: vec![Arc::from("db")],
        };
        assert_eq!(s.to_string(), "2 starting, 0 pending, 1 stopping, 1 changed");
    }
}
