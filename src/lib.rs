//! # procvisor
//!
//! **Procvisor** supervises a set of OS processes on one host.
//!
//! A YAML program file declares *programs*: a command, how many instances,
//! and the policies that decide when an instance is started, retried, given
//! up on, or stopped. Procvisor spawns the instances, watches them, applies
//! those policies, and reconciles the running set with the file on reload.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  program file ──► programs::load ──► ProgramSet
//!                                         │ run / reload
//!                                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor core (single task, owns the Registry)                 │
//! │  - reconcile(old, new) → kept / to_start / to_stop                │
//! │  - start queue, stop queue   (SupervisorHandle::submit_*)         │
//! │  - lifecycle channel         (watchers + timers)                  │
//! │  - control channel           (reload, shutdown)                   │
//! └──────┬──────────────────┬──────────────────┬───────────────┬──────┘
//!        ▼                  ▼                  ▼               │
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐   │
//!     │   Process    │   │   Process    │   │   Process    │   │ watch::Sender<Snapshot>
//!     │   web:0      │   │   web:1      │   │   db:0       │   │
//!     └┬─────────────┘   └┬─────────────┘   └┬─────────────┘   ▼
//!      │ child watcher    │                  │          Console / status readers
//!      ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        Bus (broadcast events)                     │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       SubscriberSet (per-sink queues)
//!                                   ▼
//!                           LogWriter → tracing
//! ```
//!
//! ### Lifecycle
//! ```text
//! pending ──start──► starting ──starttime elapsed──► running
//!                      │  ▲                            │ exit
//!        exit early    ▼  │ retry timer               ├─ never / expected code ─► stopped
//!                    backoff                           ├─ always ───────────────► backoff
//!                      │ retries > startretries        └─ unexpected code ──────► backoff (counted)
//!                      ▼
//!                    fatal ──manual start──► starting
//!
//! starting/running ──stop──► stopping ──exit──► stopped
//!                               └── stoptime elapsed ──► SIGKILL ──exit──► stopped
//! ```
//!
//! ## Features
//! | Area               | Description                                          | Key types                                   |
//! |--------------------|------------------------------------------------------|---------------------------------------------|
//! | **Programs**       | Declarative specs, YAML loader, defaults             | [`ProcessSpec`], [`ProgramSet`], [`load`]   |
//! | **Supervision**    | Single-owner core, queues, reconcile on reload       | [`Supervisor`], [`SupervisorHandle`]        |
//! | **Policies**       | Restart decision and retry pacing                    | [`AutoRestart`], [`BackoffPolicy`]          |
//! | **Status**         | Settled snapshots and reports                        | [`Snapshot`], [`StatusReport`]              |
//! | **Report sinks**   | Lifecycle events to logs or custom sinks             | [`Subscribe`], [`LogWriter`]                |
//! | **Control**        | Line console for operators                           | [`Console`], [`Command`]                    |
//! | **Errors**         | Typed errors per concern                             | [`RuntimeError`], [`ConfigError`], ...      |
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use procvisor::{LogWriter, ProcessId, Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let programs = procvisor::parse(r#"
//! programs:
//!   web:
//!     cmd: /usr/bin/python3
//!     args: ["-m", "http.server"]
//!     autostart: true
//! "#)?;
//!
//!     let sup = Supervisor::builder(SupervisorConfig::default())
//!         .with_subscribers(vec![Arc::new(LogWriter::new())])
//!         .build();
//!     let handle = sup.handle();
//!     let core = tokio::spawn(sup.run(programs));
//!
//!     if let Some(report) = handle.status(&ProcessId::new("web", 0)) {
//!         println!("{report}");
//!     }
//!     handle.shutdown().await;
//!     core.await??;
//!     Ok(())
//! }
//! ```

pub mod control;
mod core;
mod error;
mod events;
mod policies;
mod programs;
mod subscribers;

// ---- Public re-exports ----

pub use control::{Command, Console, Flow};
pub use core::{
    ExitOutcome, Process, ProcessId, ProcessState, ProgramStatus, Reconciliation, Registry,
    ReloadSummary, Snapshot, StatusReport, Supervisor, SupervisorBuilder, SupervisorConfig,
    SupervisorHandle, format_uptime, reconcile,
};
pub use error::{ConfigError, ControlError, ReloadError, RuntimeError, SpawnError, SubmitError};
pub use events::{Bus, Event, EventKind};
pub use policies::{AutoRestart, BackoffPolicy, ExitDecision, JitterPolicy};
pub use programs::{ProcessSpec, ProcessSpecBuilder, ProgramSet, StopSignal, load, parse};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
