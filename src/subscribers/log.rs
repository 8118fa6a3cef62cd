//! # LogWriter: lifecycle events as `tracing` records
//!
//! Emits one structured record per [`Event`]. Failures (`spawn-failed`,
//! `fatal`, `force-killed`, `grace-exceeded`, `reload-rejected`, sink
//! problems) are logged at `warn`/`error`; everything else at `info`, with
//! request no-ops at `debug`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO procvisor::log: spawned process="web:0" pid=4121 attempt=1
//! WARN procvisor::log: spawn-failed process="web:1" attempt=1 reason="cannot execute /nope: No such file or directory"
//! INFO procvisor::log: backoff process="web:1" delay_ms=100 attempt=1
//! ERROR procvisor::log: fatal process="web:1" attempt=4
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Sink that writes every event through `tracing` (target `procvisor::log`).
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let who = e.target().unwrap_or_default();
        let reason = e.reason.as_deref().unwrap_or("");
        let exit = e.exit.as_ref().map(ToString::to_string).unwrap_or_default();
        let kind = e.kind.as_str();

        match e.kind {
            EventKind::ProcessSpawned => {
                info!(target: "procvisor::log", process = %who, pid = ?e.pid, attempt = ?e.attempt, "{kind}");
            }
            EventKind::ProcessRunning => {
                info!(target: "procvisor::log", process = %who, pid = ?e.pid, "{kind}");
            }
            EventKind::ProcessExited | EventKind::ProcessStopped => {
                info!(target: "procvisor::log", process = %who, pid = ?e.pid, exit = %exit, "{kind}");
            }
            EventKind::BackoffScheduled => {
                info!(target: "procvisor::log", process = %who, delay_ms = ?e.delay_ms, attempt = ?e.attempt, "{kind}");
            }
            EventKind::StopSignalSent => {
                info!(target: "procvisor::log", process = %who, pid = ?e.pid, signal = %reason, grace_ms = ?e.timeout_ms, "{kind}");
            }
            EventKind::SpawnFailed => {
                warn!(target: "procvisor::log", process = %who, attempt = ?e.attempt, reason = %reason, "{kind}");
            }
            EventKind::ForceKilled => {
                warn!(target: "procvisor::log", process = %who, pid = ?e.pid, grace_ms = ?e.timeout_ms, "{kind}");
            }
            EventKind::ProcessFatal => {
                error!(target: "procvisor::log", process = %who, attempt = ?e.attempt, exit = %exit, "{kind}");
            }
            EventKind::RequestIgnored => {
                debug!(target: "procvisor::log", process = %who, reason = %reason, "{kind}");
            }
            EventKind::ReloadApplied | EventKind::ProcessRetired | EventKind::SpecChangeDeferred => {
                info!(target: "procvisor::log", process = %who, reason = %reason, "{kind}");
            }
            EventKind::ReloadRejected | EventKind::SubscriberOverflow => {
                warn!(target: "procvisor::log", process = %who, reason = %reason, "{kind}");
            }
            EventKind::ShutdownRequested | EventKind::AllStoppedWithin => {
                info!(target: "procvisor::log", "{kind}");
            }
            EventKind::GraceExceeded => {
                error!(target: "procvisor::log", reason = %reason, "{kind}");
            }
            EventKind::SubscriberPanicked => {
                error!(target: "procvisor::log", subscriber = %who, reason = %reason, "{kind}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
