//! # Per-process lifecycle state machine.
//!
//! A [`Process`] is one instance of a program. It owns at most one live child
//! (through a [`ChildHandle`]) and at most one pending timer. The core is the
//! only caller: every method runs inside the core task, so there is no locking.
//!
//! Timers and the child watcher never mutate state. They post a [`Lifecycle`]
//! message stamped with the process serial and the incarnation of the spawn
//! they belong to. [`Process::on_lifecycle`] drops messages whose stamp or
//! expected state no longer matches, so whichever message the core dequeues
//! first wins a race (exit vs. confirmation, exit vs. grace timer).
//!
//! ```text
//! request_start ─► spawn ─┬─ ok ──► starting ── StartConfirmed ──► running
//!                         └─ err ─► failed_start ─┬─► backoff ── RetryDue ──► spawn
//!                                                 └─► fatal
//! request_stop (starting/running) ─► stopping ── Exited ──► stopped
//!                                        └── GraceExpired ──► SIGKILL ── Exited ──► stopped
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::child::{self, ChildHandle};
use crate::core::status::{ExitOutcome, ProcessId, ProcessState, StatusReport};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffPolicy, ExitDecision};
use crate::programs::ProcessSpec;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Identifies one spawn attempt of one process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Stamp {
    /// Unique per `Process` value, never reused.
    pub serial: u64,
    /// Bumped on every spawn attempt.
    pub incarnation: u64,
}

/// Messages posted back to the core by watchers and timers.
#[derive(Debug)]
pub(crate) enum Lifecycle {
    Exited { stamp: Stamp, outcome: ExitOutcome },
    StartConfirmed { stamp: Stamp },
    RetryDue { stamp: Stamp },
    GraceExpired { stamp: Stamp },
}

impl Lifecycle {
    pub(crate) fn stamp(&self) -> Stamp {
        match self {
            Lifecycle::Exited { stamp, .. }
            | Lifecycle::StartConfirmed { stamp }
            | Lifecycle::RetryDue { stamp }
            | Lifecycle::GraceExpired { stamp } => *stamp,
        }
    }
}

/// What a transition needs from the core.
pub(crate) struct Ctx<'a> {
    pub bus: &'a Bus,
    pub events: &'a mpsc::UnboundedSender<Lifecycle>,
    pub backoff: &'a BackoffPolicy,
}

/// One managed instance of a program.
#[derive(Debug)]
pub struct Process {
    id: ProcessId,
    serial: u64,
    spec: Arc<ProcessSpec>,
    state: ProcessState,
    retries: u32,
    last_exit: Option<ExitOutcome>,
    since: Option<Instant>,
    incarnation: u64,
    child: Option<ChildHandle>,
    timer: Option<JoinHandle<()>>,
    start_after_stop: bool,
}

impl Process {
    pub(crate) fn new(id: ProcessId, spec: Arc<ProcessSpec>) -> Self {
        Self {
            id,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            spec,
            state: ProcessState::Pending,
            retries: 0,
            last_exit: None,
            since: None,
            incarnation: 0,
            child: None,
            timer: None,
            start_after_stop: false,
        }
    }

    pub fn id(&self) -> &ProcessId {
        &self.id
    }

    /// Spec the current (or next) child runs with.
    pub fn spec(&self) -> &Arc<ProcessSpec> {
        &self.spec
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Failed attempts since the last confirmed start.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(ChildHandle::pid)
    }

    pub fn last_exit(&self) -> Option<&ExitOutcome> {
        self.last_exit.as_ref()
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn has_child(&self) -> bool {
        self.child.is_some()
    }

    pub(crate) fn report(&self, retiring: bool) -> StatusReport {
        StatusReport {
            id: self.id.clone(),
            state: self.state,
            pid: self.pid(),
            since: self.since,
            retries: self.retries,
            last_exit: self.last_exit.clone(),
            command: self.spec.command_line(),
            retiring,
        }
    }

    fn stamp(&self) -> Stamp {
        Stamp {
            serial: self.serial,
            incarnation: self.incarnation,
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_process(&self.id)
    }

    fn ignore(&self, ctx: &Ctx<'_>, reason: &'static str) {
        ctx.bus
            .publish(self.event(EventKind::RequestIgnored).with_reason(reason));
    }

    /// Handles a start request.
    ///
    /// `declared` is the program's current spec; an idle process adopts it
    /// before spawning, a live one keeps the spec it was started with.
    pub(crate) fn request_start(&mut self, declared: Option<&Arc<ProcessSpec>>, ctx: &Ctx<'_>) {
        match self.state {
            state if state.is_starting_or_up() => self.ignore(ctx, "already started"),
            ProcessState::Stopping => {
                self.start_after_stop = true;
            }
            _ => {
                if let Some(spec) = declared {
                    self.spec = Arc::clone(spec);
                }
                self.retries = 0;
                self.spawn(ctx);
            }
        }
    }

    /// Handles a stop request.
    pub(crate) fn request_stop(&mut self, ctx: &Ctx<'_>) {
        match self.state {
            ProcessState::Stopped | ProcessState::Fatal => self.ignore(ctx, "not running"),
            ProcessState::Stopping => {
                self.start_after_stop = false;
                self.ignore(ctx, "already stopping");
            }
            ProcessState::Pending | ProcessState::Backoff => {
                self.cancel_timer();
                self.state = ProcessState::Stopped;
                ctx.bus.publish(self.event(EventKind::ProcessStopped));
            }
            ProcessState::Starting | ProcessState::Running => {
                let signal = self.spec.stopsignal();
                let grace = self.spec.stoptime();
                self.state = ProcessState::Stopping;
                if let Some(child) = &self.child {
                    child.signal(signal.signal());
                    ctx.bus.publish(
                        self.event(EventKind::StopSignalSent)
                            .with_pid(child.pid())
                            .with_reason(signal.name())
                            .with_timeout(grace),
                    );
                }
                self.arm(grace, Lifecycle::GraceExpired { stamp: self.stamp() }, ctx);
            }
        }
    }

    /// Drops a start deferred behind an in-flight stop.
    pub(crate) fn cancel_deferred_start(&mut self) {
        self.start_after_stop = false;
    }

    /// Sends `SIGKILL` to the live child, if any.
    pub(crate) fn force_kill(&self) -> bool {
        self.child.as_ref().is_some_and(ChildHandle::kill)
    }

    /// Applies a message from a watcher or timer.
    ///
    /// Returns `false` when the message was stale and ignored.
    pub(crate) fn on_lifecycle(&mut self, msg: Lifecycle, ctx: &Ctx<'_>) -> bool {
        if msg.stamp() != self.stamp() {
            return false;
        }
        match msg {
            Lifecycle::Exited { outcome, .. } if self.child.is_some() => {
                self.on_exit(outcome, ctx);
            }
            Lifecycle::StartConfirmed { .. }
                if self.state == ProcessState::Starting && self.child.is_some() =>
            {
                self.timer = None;
                // outlived `starttime`: the retry budget is earned back
                self.retries = 0;
                self.confirm(ctx);
            }
            Lifecycle::RetryDue { .. } if self.state == ProcessState::Backoff => {
                self.timer = None;
                self.spawn(ctx);
            }
            Lifecycle::GraceExpired { .. } if self.state == ProcessState::Stopping => {
                self.timer = None;
                if let Some(child) = &self.child {
                    child.kill();
                    ctx.bus.publish(
                        self.event(EventKind::ForceKilled)
                            .with_pid(child.pid())
                            .with_timeout(self.spec.stoptime()),
                    );
                }
            }
            _ => return false,
        }
        true
    }

    fn spawn(&mut self, ctx: &Ctx<'_>) {
        self.cancel_timer();
        self.incarnation += 1;
        self.state = ProcessState::Starting;
        let attempt = self.retries + 1;

        match child::spawn(&self.spec, self.stamp(), ctx.events.clone()) {
            Ok(handle) => {
                self.since = Some(Instant::now());
                ctx.bus.publish(
                    self.event(EventKind::ProcessSpawned)
                        .with_pid(handle.pid())
                        .with_attempt(attempt),
                );
                self.child = Some(handle);

                let delay = self.spec.starttime();
                if delay.is_zero() {
                    self.confirm(ctx);
                } else {
                    self.arm(delay, Lifecycle::StartConfirmed { stamp: self.stamp() }, ctx);
                }
            }
            Err(err) => {
                let reason: Arc<str> = err.to_string().into();
                ctx.bus.publish(
                    self.event(EventKind::SpawnFailed)
                        .with_attempt(attempt)
                        .with_reason(Arc::clone(&reason)),
                );
                self.last_exit = Some(ExitOutcome::SpawnFailed(reason));
                self.failed_start(ctx);
            }
        }
    }

    /// Marks the child as up. A zero `starttime` confirms at once and keeps
    /// the retry count, so a crash loop still ends in `fatal`.
    fn confirm(&mut self, ctx: &Ctx<'_>) {
        self.state = ProcessState::Running;
        ctx.bus
            .publish(self.event(EventKind::ProcessRunning).with_pid(self.pid()));
    }

    fn failed_start(&mut self, ctx: &Ctx<'_>) {
        self.since = None;
        self.retries += 1;
        if self.retries > self.spec.startretries() {
            self.fatal(ctx);
            return;
        }
        self.schedule_retry(ctx);
    }

    /// Parks in `backoff` until the retry timer fires.
    fn schedule_retry(&mut self, ctx: &Ctx<'_>) {
        let delay = ctx.backoff.next(self.retries.max(1));
        self.state = ProcessState::Backoff;
        ctx.bus.publish(
            self.event(EventKind::BackoffScheduled)
                .with_attempt(self.retries)
                .with_delay(delay),
        );
        self.arm(delay, Lifecycle::RetryDue { stamp: self.stamp() }, ctx);
    }

    fn fatal(&mut self, ctx: &Ctx<'_>) {
        self.cancel_timer();
        self.state = ProcessState::Fatal;
        let mut ev = self.event(EventKind::ProcessFatal).with_attempt(self.retries);
        if let Some(exit) = &self.last_exit {
            ev = ev.with_exit(exit.clone());
        }
        ctx.bus.publish(ev);
    }

    fn on_exit(&mut self, outcome: ExitOutcome, ctx: &Ctx<'_>) {
        let pid = self.child.take().and_then(|c| c.pid());
        self.since = None;
        self.last_exit = Some(outcome.clone());

        match self.state {
            ProcessState::Starting => {
                self.cancel_timer();
                ctx.bus.publish(
                    self.event(EventKind::ProcessExited)
                        .with_pid(pid)
                        .with_exit(outcome),
                );
                self.failed_start(ctx);
            }
            ProcessState::Running => {
                ctx.bus.publish(
                    self.event(EventKind::ProcessExited)
                        .with_pid(pid)
                        .with_exit(outcome.clone()),
                );
                let policy = self.spec.autorestart();
                match policy.on_exit(outcome.code(), self.spec.exitcodes()) {
                    ExitDecision::Stop => {
                        self.state = ProcessState::Stopped;
                        ctx.bus.publish(self.event(EventKind::ProcessStopped).with_exit(outcome));
                    }
                    ExitDecision::Restart => self.schedule_retry(ctx),
                    ExitDecision::Retry => {
                        self.retries += 1;
                        if self.retries > self.spec.startretries() {
                            self.fatal(ctx);
                        } else {
                            self.schedule_retry(ctx);
                        }
                    }
                }
            }
            ProcessState::Stopping => {
                self.cancel_timer();
                self.state = ProcessState::Stopped;
                ctx.bus.publish(
                    self.event(EventKind::ProcessStopped)
                        .with_pid(pid)
                        .with_exit(outcome),
                );
                if std::mem::take(&mut self.start_after_stop) {
                    self.retries = 0;
                    self.spawn(ctx);
                }
            }
            // a child only exists in starting/running/stopping
            _ => {}
        }
    }

    fn arm(&mut self, delay: Duration, msg: Lifecycle, ctx: &Ctx<'_>) {
        self.cancel_timer();
        let tx = ctx.events.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(msg);
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::AutoRestart;
    use tokio::sync::broadcast;

    struct Harness {
        bus: Bus,
        tx: mpsc::UnboundedSender<Lifecycle>,
        rx: mpsc::UnboundedReceiver<Lifecycle>,
        backoff: BackoffPolicy,
    }

    impl Harness {
        fn new(backoff: BackoffPolicy) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                bus: Bus::new(256),
                tx,
                rx,
                backoff,
            }
        }

        fn ctx(&self) -> Ctx<'_> {
            Ctx {
                bus: &self.bus,
                events: &self.tx,
                backoff: &self.backoff,
            }
        }

        async fn next(&mut self) -> Lifecycle {
            match tokio::time::timeout(Duration::from_secs(5), self.rx.recv()).await {
                Ok(Some(msg)) => msg,
                other => panic!("no lifecycle message: {other:?}"),
            }
        }

        /// Feeds messages until `p` reaches `want`.
        async fn drive(&mut self, p: &mut Process, want: ProcessState) {
            while p.state() != want {
                let msg = self.next().await;
                let ctx = Ctx {
                    bus: &self.bus,
                    events: &self.tx,
                    backoff: &self.backoff,
                };
                p.on_lifecycle(msg, &ctx);
            }
        }
    }

    fn process(spec: ProcessSpec) -> Process {
        Process::new(ProcessId::new(spec.name().to_string(), 0), Arc::new(spec))
    }

    fn count(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> usize {
        let mut n = 0;
        loop {
            match rx.try_recv() {
                Ok(ev) if ev.kind == kind => n += 1,
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    panic!("event receiver lagged, {missed} events lost")
                }
                Err(_) => return n,
            }
        }
    }

    #[tokio::test]
    async fn failing_spawn_makes_retries_plus_one_attempts() {
        let mut h = Harness::new(BackoffPolicy::immediate());
        let mut events = h.bus.subscribe();
        let mut p = process(
            ProcessSpec::builder("bad", "/definitely/not/here")
                .startretries(2)
                .build(),
        );

        p.request_start(None, &h.ctx());
        assert_eq!(p.state(), ProcessState::Backoff);
        h.drive(&mut p, ProcessState::Fatal).await;

        assert_eq!(p.retries(), 3);
        assert!(matches!(p.last_exit(), Some(ExitOutcome::SpawnFailed(_))));
        assert_eq!(count(&mut events, EventKind::SpawnFailed), 3);
    }

    #[tokio::test]
    async fn manual_start_from_fatal_clears_retries() {
        let mut h = Harness::new(BackoffPolicy::immediate());
        let mut p = process(
            ProcessSpec::builder("bad", "/definitely/not/here")
                .startretries(0)
                .build(),
        );
        p.request_start(None, &h.ctx());
        assert_eq!(p.state(), ProcessState::Fatal);
        assert_eq!(p.retries(), 1);

        let fixed = Arc::new(
            ProcessSpec::builder("bad", "/bin/sh")
                .args(["-c", "exec sleep 30"])
                .starttime(Duration::ZERO)
                .build(),
        );
        p.request_start(Some(&fixed), &h.ctx());
        assert_eq!(p.state(), ProcessState::Running);
        assert_eq!(p.retries(), 0);
        assert!(p.pid().is_some());

        p.request_stop(&h.ctx());
        h.drive(&mut p, ProcessState::Stopped).await;
    }

    #[tokio::test]
    async fn start_is_ignored_while_live() {
        let mut h = Harness::new(BackoffPolicy::default());
        let mut p = process(
            ProcessSpec::builder("sleeper", "/bin/sh")
                .args(["-c", "exec sleep 30"])
                .starttime(Duration::ZERO)
                .build(),
        );
        p.request_start(None, &h.ctx());
        let pid = p.pid();
        let stamp = p.stamp();
        p.request_start(None, &h.ctx());
        assert_eq!(p.pid(), pid);
        assert_eq!(p.stamp(), stamp);

        p.request_stop(&h.ctx());
        assert_eq!(p.state(), ProcessState::Stopping);
        h.drive(&mut p, ProcessState::Stopped).await;
        assert_eq!(
            p.last_exit(),
            Some(&ExitOutcome::Signal(nix::sys::signal::Signal::SIGTERM as i32))
        );
    }

    #[tokio::test]
    async fn stop_during_backoff_cancels_retry() {
        let backoff = BackoffPolicy {
            first: Duration::from_millis(50),
            ..BackoffPolicy::default()
        };
        let mut h = Harness::new(backoff);
        let mut p = process(ProcessSpec::builder("bad", "/definitely/not/here").build());

        p.request_start(None, &h.ctx());
        assert_eq!(p.state(), ProcessState::Backoff);
        p.request_stop(&h.ctx());
        assert_eq!(p.state(), ProcessState::Stopped);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(h.rx.try_recv().is_err());
        assert_eq!(p.retries(), 1);
    }

    #[tokio::test]
    async fn stale_messages_are_dropped() {
        let h = Harness::new(BackoffPolicy::default());
        let mut p = process(ProcessSpec::builder("idle", "/bin/true").build());
        let old = Stamp {
            serial: p.serial(),
            incarnation: 41,
        };
        assert!(!p.on_lifecycle(Lifecycle::RetryDue { stamp: old }, &h.ctx()));
        assert!(!p.on_lifecycle(Lifecycle::StartConfirmed { stamp: p.stamp() }, &h.ctx()));
        assert_eq!(p.state(), ProcessState::Pending);
    }

    #[tokio::test]
    async fn exit_code_policy_decides_restart() {
        let mut h = Harness::new(BackoffPolicy::default());
        let spec = |code: i32| {
            ProcessSpec::builder("job", "/bin/sh")
                .args(["-c".to_string(), format!("sleep 0.2; exit {code}")])
                .autorestart(AutoRestart::Unexpected)
                .exitcodes([0, 2])
                .starttime(Duration::from_millis(50))
                .build()
        };

        let mut expected = process(spec(2));
        expected.request_start(None, &h.ctx());
        h.drive(&mut expected, ProcessState::Running).await;
        h.drive(&mut expected, ProcessState::Stopped).await;
        assert_eq!(expected.last_exit(), Some(&ExitOutcome::Code(2)));

        let mut unexpected = process(spec(1));
        let mut events = h.bus.subscribe();
        unexpected.request_start(None, &h.ctx());
        h.drive(&mut unexpected, ProcessState::Running).await;
        count(&mut events, EventKind::ProcessSpawned);
        // exits with 1 and is spawned again
        while count(&mut events, EventKind::ProcessSpawned) == 0 {
            let msg = h.next().await;
            unexpected.on_lifecycle(msg, &h.ctx());
        }
        assert_eq!(unexpected.state(), ProcessState::Starting);
        assert_eq!(unexpected.retries(), 1);
        assert_eq!(unexpected.last_exit(), Some(&ExitOutcome::Code(1)));
        unexpected.request_stop(&h.ctx());
        h.drive(&mut unexpected, ProcessState::Stopped).await;
    }

    #[tokio::test]
    async fn start_while_stopping_runs_after_stop() {
        let mut h = Harness::new(BackoffPolicy::default());
        let mut p = process(
            ProcessSpec::builder("sleeper", "/bin/sh")
                .args(["-c", "exec sleep 30"])
                .starttime(Duration::ZERO)
                .build(),
        );
        p.request_start(None, &h.ctx());
        let first = p.pid();
        p.request_stop(&h.ctx());
        p.request_start(None, &h.ctx());
        assert_eq!(p.state(), ProcessState::Stopping);

        let msg = h.next().await;
        assert!(p.on_lifecycle(msg, &h.ctx()));
        assert_eq!(p.state(), ProcessState::Running);
        assert_ne!(p.pid(), first);

        p.request_stop(&h.ctx());
        h.drive(&mut p, ProcessState::Stopped).await;
    }

    #[tokio::test]
    async fn crash_loop_with_zero_starttime_ends_fatal() {
        let mut h = Harness::new(BackoffPolicy::immediate());
        let mut events = h.bus.subscribe();
        let mut p = process(
            ProcessSpec::builder("crash", "/bin/sh")
                .args(["-c", "exit 1"])
                .starttime(Duration::ZERO)
                .startretries(2)
                .build(),
        );

        p.request_start(None, &h.ctx());
        h.drive(&mut p, ProcessState::Fatal).await;

        assert_eq!(count(&mut events, EventKind::ProcessSpawned), 3);
        assert_eq!(p.retries(), 3);
        assert_eq!(p.last_exit(), Some(&ExitOutcome::Code(1)));
        assert!(!p.has_child());
    }

    #[tokio::test]
    async fn unexpected_exit_waits_in_backoff() {
        let backoff = BackoffPolicy {
            first: Duration::from_secs(30),
            ..BackoffPolicy::default()
        };
        let mut h = Harness::new(backoff);
        let mut p = process(
            ProcessSpec::builder("crash", "/bin/sh")
                .args(["-c", "exit 1"])
                .starttime(Duration::ZERO)
                .build(),
        );

        p.request_start(None, &h.ctx());
        h.drive(&mut p, ProcessState::Backoff).await;
        assert_eq!(p.retries(), 1);
        p.request_stop(&h.ctx());
        assert_eq!(p.state(), ProcessState::Stopped);
    }

    #[tokio::test]
    async fn unopenable_redirection_counts_as_failed_start() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut h = Harness::new(BackoffPolicy::immediate());
        let mut events = h.bus.subscribe();
        let mut p = process(
            ProcessSpec::builder("logger", "/bin/sh")
                .args(["-c", "echo hi"])
                .stdout(dir.path().join("missing").join("out.log"))
                .startretries(1)
                .build(),
        );

        p.request_start(None, &h.ctx());
        assert_eq!(p.state(), ProcessState::Backoff);
        h.drive(&mut p, ProcessState::Fatal).await;

        assert_eq!(count(&mut events, EventKind::SpawnFailed), 2);
        assert!(!p.has_child());
        match p.last_exit() {
            Some(ExitOutcome::SpawnFailed(reason)) => {
                assert!(reason.contains("stdout"), "{reason}")
            }
            other => panic!("expected a spawn failure, got {other:?}"),
        }
    }
}
