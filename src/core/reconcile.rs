//! # Reconciler: old registry + new program set → work for the core.
//!
//! [`reconcile`] is a pure function. It consumes the old registry and returns:
//! - `kept`: the registry to install, in the new set's program order;
//! - `to_start`: ids of freshly created `pending` processes;
//! - `to_stop`: processes of programs that disappeared, handed over by value
//!   so the core keeps them (as *retiring*) until they reach `stopped`;
//! - `changed`: retained programs whose spec body changed.
//!
//! Retained programs keep their processes untouched; only the declared spec
//! of the entry is refreshed.
//!
//! `to_start` and `to_stop` are disjoint, and reconciling `kept` against the
//! same set again yields no work at all.

use std::sync::Arc;

use crate::core::process::Process;
use crate::core::registry::{ProgramEntry, Registry};
use crate::core::status::ProcessId;
use crate::programs::ProgramSet;

/// Outcome of [`reconcile`].
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub kept: Registry,
    pub to_start: Vec<ProcessId>,
    pub to_stop: Vec<Process>,
    pub changed: Vec<Arc<str>>,
}

/// Computes the registry and the start/stop work implied by `new`.
pub fn reconcile(mut old: Registry, new: &ProgramSet) -> Reconciliation {
    let mut out = Reconciliation::default();

    for spec in new.iter() {
        match old.take(spec.name()) {
            Some(mut entry) => {
                if *entry.declared != **spec {
                    out.changed.push(Arc::from(spec.name()));
                    entry.declared = Arc::clone(spec);
                }
                out.kept.push(entry);
            }
            None => {
                let entry = ProgramEntry::fresh(Arc::clone(spec));
                out.to_start
                    .extend(entry.processes.iter().map(|p| p.id().clone()));
                out.kept.push(entry);
            }
        }
    }

    out.to_stop = old.into_processes().collect();
    out
}
