//! # Runtime events emitted by the supervisor core.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Lifecycle events**: one managed process moving through its state machine
//! - **Management events**: reloads and registry bookkeeping
//! - **Shutdown events**: draining the whole supervisor
//! - **Subscriber events**: problems inside report sinks
//!
//! The [`Event`] struct carries the optional metadata (process identity, pid,
//! exit outcome, delays) set depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use procvisor::{Event, EventKind, ProcessId};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_process(&ProcessId::new("web", 1))
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(200));
//!
//! assert_eq!(ev.program.as_deref(), Some("web"));
//! assert_eq!(ev.index, Some(1));
//! assert_eq!(ev.delay_ms, Some(200));
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::core::{ExitOutcome, ProcessId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Lifecycle events ===
    /// A child was spawned.
    ///
    /// Sets: `program`, `index`, `pid`, `attempt` (spawn attempts since the last confirmed start).
    ProcessSpawned,

    /// A child could not be spawned; counted as a failed start.
    ///
    /// Sets: `program`, `index`, `attempt`, `reason`.
    SpawnFailed,

    /// A child stayed up for its confirmation delay.
    ///
    /// Sets: `program`, `index`, `pid`.
    ProcessRunning,

    /// A child exited (or died) on its own.
    ///
    /// Sets: `program`, `index`, `pid`, `exit`.
    ProcessExited,

    /// A failed start will be retried after a delay.
    ///
    /// Sets: `program`, `index`, `attempt`, `delay_ms`.
    BackoffScheduled,

    /// Retries exhausted; the process needs a manual start.
    ///
    /// Sets: `program`, `index`, `attempt`, `exit`.
    ProcessFatal,

    /// The configured stop signal was sent.
    ///
    /// Sets: `program`, `index`, `pid`, `reason` (signal name), `timeout_ms` (grace period).
    StopSignalSent,

    /// The grace period expired and the child was sent `SIGKILL`.
    ///
    /// Sets: `program`, `index`, `pid`, `timeout_ms`.
    ForceKilled,

    /// The process settled in `stopped`.
    ///
    /// Sets: `program`, `index`, `exit` (when a child was reaped).
    ProcessStopped,

    /// A start/stop request did not apply to the current state.
    ///
    /// Sets: `program`, `index`, `reason`.
    RequestIgnored,

    // === Management events ===
    /// A reload was applied.
    ///
    /// Sets: `reason` (summary of started/stopped/changed programs).
    ReloadApplied,

    /// A reload was rejected; the registry is unchanged.
    ///
    /// Sets: `reason`.
    ReloadRejected,

    /// A retained program's spec changed but its processes keep the old one.
    ///
    /// Sets: `program`.
    SpecChangeDeferred,

    /// A process removed by a reload was fully stopped and dropped.
    ///
    /// Sets: `program`, `index`.
    ProcessRetired,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or explicit request).
    ShutdownRequested,

    /// Every child stopped within the shutdown bound.
    AllStoppedWithin,

    /// Shutdown bound exceeded; some children were still alive.
    GraceExceeded,

    // === Subscriber events ===
    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `program` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// A subscriber dropped an event (queue full or closed).
    ///
    /// Sets: `program` (subscriber name), `reason`.
    SubscriberOverflow,
}

impl EventKind {
    /// Short stable label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::ProcessSpawned => "spawned",
            EventKind::SpawnFailed => "spawn-failed",
            EventKind::ProcessRunning => "running",
            EventKind::ProcessExited => "exited",
            EventKind::BackoffScheduled => "backoff",
            EventKind::ProcessFatal => "fatal",
            EventKind::StopSignalSent => "stop-signal",
            EventKind::ForceKilled => "force-killed",
            EventKind::ProcessStopped => "stopped",
            EventKind::RequestIgnored => "request-ignored",
            EventKind::ReloadApplied => "reload-applied",
            EventKind::ReloadRejected => "reload-rejected",
            EventKind::SpecChangeDeferred => "spec-change-deferred",
            EventKind::ProcessRetired => "retired",
            EventKind::ShutdownRequested => "shutdown-requested",
            EventKind::AllStoppedWithin => "all-stopped-within-grace",
            EventKind::GraceExceeded => "grace-exceeded",
            EventKind::SubscriberPanicked => "subscriber-panicked",
            EventKind::SubscriberOverflow => "subscriber-overflow",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Program name (or subscriber name for subscriber events).
    pub program: Option<Arc<str>>,
    /// Instance index within the program.
    pub index: Option<u32>,
    /// OS process id of the child involved.
    pub pid: Option<u32>,
    /// Spawn attempts since the last confirmed start.
    pub attempt: Option<u32>,
    /// How the child ended.
    pub exit: Option<ExitOutcome>,
    /// Retry delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Grace period in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Human-readable detail.
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            program: None,
            index: None,
            pid: None,
            attempt: None,
            exit: None,
            delay_ms: None,
            timeout_ms: None,
            reason: None,
        }
    }

    /// Attaches program name and instance index.
    #[inline]
    pub fn with_process(mut self, id: &ProcessId) -> Self {
        self.program = Some(Arc::clone(&id.program));
        self.index = Some(id.index.min(u32::MAX as usize) as u32);
        self
    }

    /// Attaches a program name only.
    #[inline]
    pub fn with_program(mut self, program: impl Into<Arc<str>>) -> Self {
        self.program = Some(program.into());
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    #[inline]
    pub fn with_exit(mut self, exit: ExitOutcome) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches a grace period (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_program(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_program(subscriber)
            .with_reason(info)
    }

    /// `program:index` when both are set.
    pub fn target(&self) -> Option<String> {
        match (&self.program, self.index) {
            (Some(p), Some(i)) => Some(format!("{p}:{i}")),
            (Some(p), None) => Some(p.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::ShutdownRequested);
        let b = Event::new(EventKind::ShutdownRequested);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn target_formats_identity() {
        let ev = Event::new(EventKind::ProcessStopped).with_process(&ProcessId::new("db", 0));
        assert_eq!(ev.target().as_deref(), Some("db:0"));
        let ev = Event::new(EventKind::SpecChangeDeferred).with_program("db");
        assert_eq!(ev.target().as_deref(), Some("db"));
        assert_eq!(Event::new(EventKind::GraceExceeded).target(), None);
    }
}
