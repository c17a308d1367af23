//! Completion ledger: which tasks finished successfully, in order.

use std::collections::HashSet;

use serde::Serialize;

use super::task::TaskId;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CompletionLedger {
    entries: Vec<TaskId>,
    #[serde(skip)]
    completed: HashSet<TaskId>,
}

impl CompletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful task. Recording the same id twice is ignored.
    pub fn record(&mut self, id: TaskId) {
        if self.completed.insert(id.clone()) {
            self.entries.push(id);
        }
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.completed.contains(id)
    }

    /// Entries in completion order.
    pub fn entries(&self) -> &[TaskId] {
        &self.entries
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TaskId> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
