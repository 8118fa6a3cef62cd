//! Runtime core: the supervisor actor and the per-process state machine.
//!
//! The public surface is [`Supervisor`] (build + run), [`SupervisorHandle`]
//! (requests and status reads) and the status types.
//!
//! Internal modules:
//! - [`supervisor`]: the coordinating task; owns the registry, drains the queues;
//! - [`process`]: lifecycle state machine of one instance;
//! - [`child`]: launches a child and watches it until it exits;
//! - [`registry`]: program name → ordered instances;
//! - [`reconcile`]: old registry + new program set → start/stop work;
//! - [`handle`]: request queues, control channel and snapshot reads;
//! - [`status`]: ids, states, exit outcomes, reports and snapshots;
//! - [`shutdown`]: termination signals for the supervisor itself.

mod builder;
mod child;
mod config;
mod handle;
mod process;
mod reconcile;
mod registry;
mod shutdown;
mod status;
mod supervisor;

pub use builder::SupervisorBuilder;
pub use config::SupervisorConfig;
pub use handle::{ReloadSummary, SupervisorHandle};
pub use process::Process;
pub use reconcile::{Reconciliation, reconcile};
pub use registry::Registry;
pub use status::{
    ExitOutcome, ProcessId, ProcessState, ProgramStatus, Snapshot, StatusReport, format_uptime,
};
pub use supervisor::Supervisor;
