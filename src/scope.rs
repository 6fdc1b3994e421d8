//! Scope stack used while assembling sibling declarations.
//!
//! Only one scope is active at a time. A nested block suspends the active
//! scope with [`ScopeStack::snapshot`], drains it with [`ScopeStack::pop`] so
//! the block starts from nothing, pops again to collect exactly the block's
//! own entries, then puts the suspended scope back with
//! [`ScopeStack::restore`].
use std::mem;

use crate::param::Entry;

/// Captured contents of a scope, restorable later.
#[derive(Debug, Clone, Default)]
pub struct ScopeHandle {
    entries: Vec<Entry>,
}

impl ScopeHandle {
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    active: Vec<Entry>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ScopeHandle {
        ScopeHandle { entries: self.active.clone() }
    }

    /// Drain the active scope, leaving it empty.
    pub fn pop(&mut self) -> Vec<Entry> {
        mem::take(&mut self.active)
    }

    pub fn push(&mut self, entry: Entry) {
        self.active.push(entry);
    }

    /// Reinstate `handle` as the active scope. Whatever was collected since
    /// the snapshot is dropped.
    pub fn restore(&mut self, handle: ScopeHandle) {
        self.active = handle.entries;
    }

    pub fn entries(&self) -> &[Entry] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::{Validator, ValidatorInformation, ValidatorRuntime};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn marker(name: &str) -> Entry {
        Entry::Validator(Validator {
            information: ValidatorInformation {
                action: name.to_string(),
                attr_names: Vec::new(),
            },
            runtime: ValidatorRuntime { validate_func: Arc::new(|_| Ok(())) },
        })
    }

    fn names(entries: &[Entry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| match e {
                Entry::Validator(v) => v.information.action.clone(),
                Entry::Parameter(p) => p.attr_name().to_string(),
            })
            .collect()
    }

    #[test]
    fn nested_cycle_isolates_block_entries() {
        let mut stack = ScopeStack::new();
        stack.push(marker("a"));
        stack.push(marker("b"));

        let outer = stack.snapshot();
        stack.pop();
        assert!(stack.is_empty());

        stack.push(marker("x"));
        stack.push(marker("y"));
        let block = stack.pop();
        stack.restore(outer);

        assert_eq!(names(&block), ["x", "y"]);
        assert_eq!(names(stack.entries()), ["a", "b"]);
    }

    #[test]
    fn pop_leaves_scope_empty() {
        let mut stack = ScopeStack::new();
        stack.push(marker("a"));
        assert_eq!(stack.pop().len(), 1);
        assert_eq!(stack.len(), 0);
        assert!(stack.pop().is_empty());
    }

    proptest! {
        #[test]
        fn prop_restore_discards_later_pushes(
            before in prop::collection::vec("[a-z]{1,6}", 0..8),
            after in prop::collection::vec("[a-z]{1,6}", 0..8),
        ) {
            let mut stack = ScopeStack::new();
            for name in &before { stack.push(marker(name)); }

            let handle = stack.snapshot();
            stack.restore(handle.clone());
            for name in &after { stack.push(marker(name)); }
            stack.restore(handle);

            prop_assert_eq!(names(stack.entries()), before);
        }

        #[test]
        fn prop_cycle_neither_loses_nor_duplicates(
            outer in prop::collection::vec("[a-z]{1,6}", 0..8),
            inner in prop::collection::vec("[a-z]{1,6}", 0..8),
        ) {
            let mut stack = ScopeStack::new();
            for name in &outer { stack.push(marker(name)); }

            let handle = stack.snapshot();
            stack.pop();
            for name in &inner { stack.push(marker(name)); }
            let block = stack.pop();
            stack.restore(handle);

            prop_assert_eq!(names(&block), inner);
            prop_assert_eq!(names(stack.entries()), outer);
        }
    }
}
