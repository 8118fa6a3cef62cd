//! # Ordered program set.
//!
//! [`ProgramSet`] is what the config loader hands to the core: program name →
//! [`ProcessSpec`], in file order, names unique.

use std::sync::Arc;

use crate::programs::spec::ProcessSpec;

/// Ordered mapping from program name to its spec.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgramSet {
    programs: Vec<Arc<ProcessSpec>>,
}

impl ProgramSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a spec, replacing (in place) any spec with the same name.
    ///
    /// Returns the replaced spec, if any.
    pub fn insert(&mut self, spec: impl Into<Arc<ProcessSpec>>) -> Option<Arc<ProcessSpec>> {
        let spec = spec.into();
        match self.programs.iter_mut().find(|s| s.name() == spec.name()) {
            Some(slot) => Some(std::mem::replace(slot, spec)),
            None => {
                self.programs.push(spec);
                None
            }
        }
    }

    /// Looks up a program by name.
    pub fn get(&self, name: &str) -> Option<&Arc<ProcessSpec>> {
        self.programs.iter().find(|s| s.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates specs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ProcessSpec>> {
        self.programs.iter()
    }

    /// Program names in insertion order.
    pub fn names(&self) -> Vec<&str> {
        self.programs.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl FromIterator<ProcessSpec> for ProgramSet {
    fn from_iter<I: IntoIterator<Item = ProcessSpec>>(iter: I) -> Self {
        let mut set = ProgramSet::new();
        for spec in iter {
            set.insert(spec);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_and_replaces_in_place() {
        let mut set: ProgramSet = [
            ProcessSpec::builder("b", "/bin/true").build(),
            ProcessSpec::builder("a", "/bin/true").build(),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.names(), vec!["b", "a"]);

        let old = set.insert(ProcessSpec::builder("b", "/bin/false").build());
        assert_eq!(old.map(|s| s.cmd().to_string()).as_deref(), Some("/bin/true"));
        assert_eq!(set.names(), vec!["b", "a"]);
        assert_eq!(set.get("b").map(|s| s.cmd()), Some("/bin/false"));
        assert!(!set.contains("c"));
    }
}
