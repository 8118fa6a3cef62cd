//! # Process registry.
//!
//! Ordered mapping program name → instances, in program-file order. Instance
//! `i` of a program sits at position `i` of its vector.
//!
//! Each entry also remembers the program's *declared* spec: the one from the
//! latest accepted program file. Live processes keep the spec they were
//! started with; an idle process adopts the declared spec on its next manual
//! start.
//!
//! The registry is owned and mutated by the core task alone.

use std::sync::Arc;

use crate::core::process::Process;
use crate::core::status::{ProcessId, ProgramStatus};
use crate::programs::ProcessSpec;

#[derive(Debug)]
pub(crate) struct ProgramEntry {
    pub(crate) declared: Arc<ProcessSpec>,
    pub(crate) processes: Vec<Process>,
}

impl ProgramEntry {
    /// `numprocs` fresh `pending` processes.
    pub(crate) fn fresh(spec: Arc<ProcessSpec>) -> Self {
        let processes = (0..spec.numprocs())
            .map(|i| Process::new(ProcessId::new(spec.name(), i), Arc::clone(&spec)))
            .collect();
        Self {
            declared: spec,
            processes,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.declared.name()
    }
}

/// Program name → ordered processes.
#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<ProgramEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of programs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, program: &str) -> bool {
        self.entries.iter().any(|e| e.name() == program)
    }

    /// Program names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(ProgramEntry::name)
    }

    pub fn get(&self, id: &ProcessId) -> Option<&Process> {
        self.entry(&id.program)?.processes.get(id.index)
    }

    /// Every process, program by program.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.entries.iter().flat_map(|e| e.processes.iter())
    }

    /// Latest declared spec of a program.
    pub fn declared(&self, program: &str) -> Option<&Arc<ProcessSpec>> {
        self.entry(program).map(|e| &e.declared)
    }

    fn entry(&self, program: &str) -> Option<&ProgramEntry> {
        self.entries.iter().find(|e| e.name() == program)
    }

    pub(crate) fn get_mut(&mut self, id: &ProcessId) -> Option<&mut Process> {
        self.entries
            .iter_mut()
            .find(|e| e.name() == &*id.program)?
            .processes
            .get_mut(id.index)
    }

    /// A process together with its program's declared spec.
    pub(crate) fn start_target(
        &mut self,
        id: &ProcessId,
    ) -> Option<(&mut Process, &Arc<ProcessSpec>)> {
        let entry = self.entries.iter_mut().find(|e| e.name() == &*id.program)?;
        let ProgramEntry {
            declared,
            processes,
        } = entry;
        let process = processes.get_mut(id.index)?;
        Some((process, &*declared))
    }

    pub(crate) fn find_serial_mut(&mut self, serial: u64) -> Option<&mut Process> {
        self.processes_mut().find(|p| p.serial() == serial)
    }

    pub(crate) fn processes_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.entries.iter_mut().flat_map(|e| e.processes.iter_mut())
    }

    pub(crate) fn push(&mut self, entry: ProgramEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn take(&mut self, program: &str) -> Option<ProgramEntry> {
        let pos = self.entries.iter().position(|e| e.name() == program)?;
        Some(self.entries.remove(pos))
    }

    pub(crate) fn into_processes(self) -> impl Iterator<Item = Process> {
        self.entries.into_iter().flat_map(|e| e.processes)
    }

    pub(crate) fn statuses(&self) -> Vec<ProgramStatus> {
        self.entries
            .iter()
            .map(|e| ProgramStatus {
                name: Arc::from(e.name()),
                processes: e.processes.iter().map(|p| p.report(false)).collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::status::ProcessState;

    fn registry() -> Registry {
        let mut r = Registry::new();
        r.push(ProgramEntry::fresh(Arc::new(
            ProcessSpec::builder("web", "/bin/true").numprocs(2).build(),
        )));
        r.push(ProgramEntry::fresh(Arc::new(
            ProcessSpec::builder("db", "/bin/true").build(),
        )));
        r
    }

    #[test]
    fn instances_are_indexed_by_position() {
        let r = registry();
        assert_eq!(r.names().collect::<Vec<_>>(), vec!["web", "db"]);
        assert_eq!(r.processes().count(), 3);

        let p = r.get(&ProcessId::new("web", 1)).expect("web:1");
        assert_eq!(p.id().index, 1);
        assert_eq!(p.state(), ProcessState::Pending);
        assert!(r.get(&ProcessId::new("web", 2)).is_none());
        assert!(r.get(&ProcessId::new("cache", 0)).is_none());
    }

    #[test]
    fn lookup_by_serial_and_take() {
        let mut r = registry();
        let serial = r.get(&ProcessId::new("db", 0)).map(Process::serial);
        let found = serial.and_then(|s| r.find_serial_mut(s).map(|p| p.id().clone()));
        assert_eq!(found, Some(ProcessId::new("db", 0)));

        let web = r.take("web").expect("web entry");
        assert_eq!(web.processes.len(), 2);
        assert!(!r.contains("web"));
        assert_eq!(r.len(), 1);
    }
}
