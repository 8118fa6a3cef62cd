//! # Supervisor: the coordinating task that owns the registry.
//!
//! [`Supervisor::run`] turns into a single actor. It is the only code that
//! touches the [`Registry`] and the processes inside it; everything else talks
//! to it through queues and reads the published [`Snapshot`].
//!
//! ## Inputs (biased, in this order)
//! ```text
//! lifecycle  (unbounded)  Exited / StartConfirmed / RetryDue / GraceExpired
//! stop queue (bounded)    SupervisorHandle::submit_stop, reload removals
//! start queue(bounded)    SupervisorHandle::submit_start, reload additions (autostart)
//! control    (unbounded)  Reload { programs, reply } / Shutdown
//! OS signal               SIGINT / SIGTERM / SIGQUIT (when enabled)
//! drain deadline          only while shutting down
//! ```
//! After every handled message the core publishes a fresh snapshot.
//!
//! ## Event flow
//! ```text
//! Process transitions ── publish(Event) ──► Bus ──► listener ──► SubscriberSet::emit(&Event)
//!                                                                  ├─► [queue] ─► LogWriter
//!                                                                  └─► [queue] ─► ...
//! ```
//!
//! ## Reload
//! `reconcile(old, new)` yields the kept registry and the start/stop work.
//! Removed processes move to a retiring list and their ids go to the stop
//! queue; new ids of `autostart` programs go to the start queue. Both queues
//! are drained by the same handlers as operator requests.
//!
//! ## Shutdown
//! ```text
//! Shutdown / OS signal
//!   └─► publish(ShutdownRequested)
//!   └─► request_stop() on every live process
//!   └─► wait until no child is alive, bounded by max(stoptime) + shutdown_slack:
//!         ├─ all exited      → publish(AllStoppedWithin), Ok(())
//!         └─ bound exceeded  → SIGKILL leftovers, publish(GraceExceeded),
//!                              Err(RuntimeError::GraceExceeded)
//! ```

use std::collections::VecDeque;
use std::future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::builder::SupervisorBuilder;
use crate::core::config::SupervisorConfig;
use crate::core::handle::{Control, ReloadSummary, SupervisorHandle};
use crate::core::process::{Ctx, Lifecycle, Process};
use crate::core::reconcile::{Reconciliation, reconcile};
use crate::core::registry::Registry;
use crate::core::shutdown;
use crate::core::status::{ProcessId, ProcessState, ProgramStatus, Snapshot};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::BackoffPolicy;
use crate::programs::ProgramSet;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Owns the core's inputs until [`run`](Supervisor::run) consumes them.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handle: SupervisorHandle,
    starts: mpsc::Receiver<ProcessId>,
    stops: mpsc::Receiver<ProcessId>,
    control: mpsc::UnboundedReceiver<Control>,
    snapshot: watch::Sender<Snapshot>,
}

impl Supervisor {
    /// Creates a supervisor with the given config and report sinks.
    pub fn new(cfg: SupervisorConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        Self::new_internal(cfg, subscribers)
    }

    /// Starts a [`SupervisorBuilder`].
    pub fn builder(cfg: SupervisorConfig) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: SupervisorConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let (start_tx, starts) = mpsc::channel(cfg.queue_capacity_clamped());
        let (stop_tx, stops) = mpsc::channel(cfg.queue_capacity_clamped());
        let (control_tx, control) = mpsc::unbounded_channel();
        let (snapshot, snapshot_rx) = watch::channel(Snapshot::default());
        let handle = SupervisorHandle::new(start_tx, stop_tx, control_tx, snapshot_rx, bus.clone());

        Self {
            cfg,
            bus,
            subscribers,
            handle,
            starts,
            stops,
            control,
            snapshot,
        }
    }

    /// Handle for submitting requests and reading status.
    pub fn handle(&self) -> SupervisorHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Loads `programs` and supervises them until shutdown.
    ///
    /// Returns `Ok(())` once every child has exited after a shutdown request
    /// (or OS signal), or [`RuntimeError::GraceExceeded`] when some did not
    /// exit within the bound.
    pub async fn run(self, programs: ProgramSet) -> Result<(), RuntimeError> {
        let token = CancellationToken::new();
        let listener = subscriber_listener(
            self.bus.subscribe(),
            SubscriberSet::new(self.subscribers, self.bus.clone()),
            token.clone(),
        );

        let (events, lifecycle) = mpsc::unbounded_channel();
        let mut core = Core {
            wiring: Wiring {
                bus: self.bus,
                events,
                backoff: self.cfg.backoff,
            },
            shutdown_slack: self.cfg.shutdown_slack,
            handle_os_signals: self.cfg.handle_os_signals,
            registry: Registry::new(),
            retiring: Vec::new(),
            lifecycle,
            stops: RequestQueue::new(self.stops),
            starts: RequestQueue::new(self.starts),
            control: self.control,
            snapshot: self.snapshot,
            draining: None,
        };
        let result = core.run(programs).await;

        token.cancel();
        let _ = listener.await;
        // Handles waiting in `shutdown()` return once the snapshot sender is gone.
        drop(core);
        result
    }
}

/// Forwards bus events to the sinks until cancelled, then flushes them.
fn subscriber_listener(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(ev) => set.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = token.cancelled() => {
                    while let Ok(ev) = rx.try_recv() {
                        set.emit(&ev);
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    })
}

/// What every transition needs, kept apart from the registry so both can be
/// borrowed at once.
struct Wiring {
    bus: Bus,
    events: mpsc::UnboundedSender<Lifecycle>,
    backoff: BackoffPolicy,
}

impl Wiring {
    fn ctx(&self) -> Ctx<'_> {
        Ctx {
            bus: &self.bus,
            events: &self.events,
            backoff: &self.backoff,
        }
    }
}

/// Request queue with a local front segment for work produced by reloads.
struct RequestQueue {
    rx: mpsc::Receiver<ProcessId>,
    backlog: VecDeque<ProcessId>,
}

impl RequestQueue {
    fn new(rx: mpsc::Receiver<ProcessId>) -> Self {
        Self {
            rx,
            backlog: VecDeque::new(),
        }
    }

    fn push(&mut self, id: ProcessId) {
        self.backlog.push_back(id);
    }

    async fn next(&mut self) -> Option<ProcessId> {
        match self.backlog.pop_front() {
            Some(id) => Some(id),
            None => self.rx.recv().await,
        }
    }
}

/// Stand-in deadline for bounds too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct Drain {
    bound: Duration,
    deadline: Instant,
}

struct Core {
    wiring: Wiring,
    shutdown_slack: Duration,
    handle_os_signals: bool,
    registry: Registry,
    retiring: Vec<Process>,
    lifecycle: mpsc::UnboundedReceiver<Lifecycle>,
    stops: RequestQueue,
    starts: RequestQueue,
    control: mpsc::UnboundedReceiver<Control>,
    snapshot: watch::Sender<Snapshot>,
    draining: Option<Drain>,
}

impl Core {
    async fn run(&mut self, programs: ProgramSet) -> Result<(), RuntimeError> {
        self.apply_reload(programs);
        self.publish_snapshot();

        let os_signal = os_signal(self.handle_os_signals);
        tokio::pin!(os_signal);
        let mut signalled = false;

        loop {
            tokio::select! {
                biased;
                Some(msg) = self.lifecycle.recv() => self.on_lifecycle(msg),
                Some(id) = self.stops.next() => self.stop(&id),
                Some(id) = self.starts.next() => self.start(&id),
                Some(ctl) = self.control.recv() => match ctl {
                    Control::Reload { programs, reply } => {
                        let _ = reply.send(self.reload(programs));
                    }
                    Control::Shutdown => self.begin_shutdown(),
                },
                _ = &mut os_signal, if !signalled => {
                    signalled = true;
                    self.begin_shutdown();
                }
                _ = until(self.draining.as_ref().map(|d| d.deadline)) => {
                    let err = self.grace_exceeded();
                    self.publish_snapshot();
                    return Err(err);
                }
            }

            self.publish_snapshot();
            if self.drained() {
                self.wiring.bus.publish(Event::new(EventKind::AllStoppedWithin));
                return Ok(());
            }
        }
    }

    fn on_lifecycle(&mut self, msg: Lifecycle) {
        let serial = msg.stamp().serial;
        let ctx = self.wiring.ctx();
        if let Some(p) = self.registry.find_serial_mut(serial) {
            p.on_lifecycle(msg, &ctx);
            return;
        }
        // Unknown serials belong to processes that were already dropped.
        if let Some(pos) = self.retiring.iter().position(|p| p.serial() == serial) {
            self.retiring[pos].on_lifecycle(msg, &ctx);
            self.retire_if_idle(pos);
        }
    }

    fn stop(&mut self, id: &ProcessId) {
        let ctx = self.wiring.ctx();
        if let Some(p) = self.registry.get_mut(id) {
            p.request_stop(&ctx);
            return;
        }
        let pos = self
            .retiring
            .iter()
            .position(|p| p.id() == id && p.state() != ProcessState::Stopping)
            .or_else(|| self.retiring.iter().position(|p| p.id() == id));
        match pos {
            Some(pos) => {
                self.retiring[pos].request_stop(&ctx);
                self.retire_if_idle(pos);
            }
            None => self.ignore(id, "unknown process"),
        }
    }

    fn start(&mut self, id: &ProcessId) {
        if self.draining.is_some() {
            self.ignore(id, "shutting down");
            return;
        }
        let ctx = self.wiring.ctx();
        match self.registry.start_target(id) {
            Some((p, declared)) => p.request_start(Some(declared), &ctx),
            None => self.ignore(id, "unknown process"),
        }
    }

    fn ignore(&self, id: &ProcessId, reason: &'static str) {
        self.wiring.bus.publish(
            Event::new(EventKind::RequestIgnored)
                .with_process(id)
                .with_reason(reason),
        );
    }

    /// Drops a retiring process once it settled without a child.
    fn retire_if_idle(&mut self, pos: usize) {
        let p = &self.retiring[pos];
        let idle = matches!(p.state(), ProcessState::Stopped | ProcessState::Fatal);
        if idle && !p.has_child() {
            let p = self.retiring.remove(pos);
            self.wiring
                .bus
                .publish(Event::new(EventKind::ProcessRetired).with_process(p.id()));
        }
    }

    fn reload(&mut self, programs: ProgramSet) -> Result<ReloadSummary, RuntimeError> {
        if self.draining.is_some() {
            return Err(RuntimeError::CoreStopped);
        }
        Ok(self.apply_reload(programs))
    }

    fn apply_reload(&mut self, programs: ProgramSet) -> ReloadSummary {
        let old = std::mem::take(&mut self.registry);
        let Reconciliation {
            kept,
            to_start,
            to_stop,
            changed,
        } = reconcile(old, &programs);
        self.registry = kept;

        let mut summary = ReloadSummary::default();
        for id in to_start {
            let autostart = self
                .registry
                .declared(&id.program)
                .is_some_and(|spec| spec.autostart());
            if autostart {
                self.starts.push(id.clone());
                summary.started.push(id);
            } else {
                summary.pending.push(id);
            }
        }
        for p in to_stop {
            self.stops.push(p.id().clone());
            summary.stopping.push(p.id().clone());
            self.retiring.push(p);
        }
        for name in &changed {
            self.wiring.bus.publish(
                Event::new(EventKind::SpecChangeDeferred)
                    .with_program(Arc::clone(name))
                    .with_reason("running processes keep their current spec"),
            );
        }
        summary.changed = changed;

        self.wiring
            .bus
            .publish(Event::new(EventKind::ReloadApplied).with_reason(summary.to_string()));
        summary
    }

    fn begin_shutdown(&mut self) {
        if self.draining.is_some() {
            return;
        }
        self.wiring
            .bus
            .publish(Event::new(EventKind::ShutdownRequested));

        let longest = self
            .registry
            .processes()
            .chain(self.retiring.iter())
            .filter(|p| p.has_child())
            .map(|p| p.spec().stoptime())
            .max()
            .unwrap_or(Duration::ZERO);
        let bound = longest.saturating_add(self.shutdown_slack);
        let now = Instant::now();
        self.draining = Some(Drain {
            bound,
            deadline: now.checked_add(bound).unwrap_or_else(|| now + FAR_FUTURE),
        });

        let ctx = self.wiring.ctx();
        for p in self.registry.processes_mut().chain(self.retiring.iter_mut()) {
            p.cancel_deferred_start();
            if !matches!(
                p.state(),
                ProcessState::Stopped | ProcessState::Fatal | ProcessState::Stopping
            ) {
                p.request_stop(&ctx);
            }
        }
        let retired: Vec<Process> = {
            let (idle, busy): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retiring)
                .into_iter()
                .partition(|p| !p.has_child() && p.state() != ProcessState::Stopping);
            self.retiring = busy;
            idle
        };
        for p in retired {
            self.wiring
                .bus
                .publish(Event::new(EventKind::ProcessRetired).with_process(p.id()));
        }
    }

    fn drained(&self) -> bool {
        self.draining.is_some()
            && self
                .registry
                .processes()
                .chain(self.retiring.iter())
                .all(|p| !p.has_child())
    }

    fn grace_exceeded(&mut self) -> RuntimeError {
        let bound = self.draining.as_ref().map_or(Duration::ZERO, |d| d.bound);
        let mut stuck = Vec::new();
        for p in self.registry.processes().chain(self.retiring.iter()) {
            if p.force_kill() {
                stuck.push(p.id().to_string());
            }
        }
        self.wiring.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_timeout(bound)
                .with_reason(format!("stuck: {}", stuck.join(", "))),
        );
        RuntimeError::GraceExceeded {
            grace: bound,
            stuck,
        }
    }

    fn publish_snapshot(&self) {
        let mut retiring: Vec<ProgramStatus> = Vec::new();
        for p in &self.retiring {
            let report = p.report(true);
            match retiring.iter_mut().find(|s| s.name == p.id().program) {
                Some(group) => group.processes.push(report),
                None => retiring.push(ProgramStatus {
                    name: Arc::clone(&p.id().program),
                    processes: vec![report],
                }),
            }
        }
        self.snapshot.send_replace(Snapshot {
            programs: self.registry.statuses(),
            retiring,
        });
    }
}

/// Completes on the first termination signal; never when disabled or when
/// the handlers cannot be installed.
async fn os_signal(enabled: bool) {
    if enabled && shutdown::wait_for_shutdown_signal().await.is_ok() {
        return;
    }
    future::pending::<()>().await
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending::<()>().await,
    }
}
