//! Working set of tasks selected for one build.
//!
//! [`TaskSet`] is the mutable form handed to contributors during assembly.
//! [`ResolvedTaskSet`] is the frozen form: every task's phase is resolved against a
//! [`PhaseRegistry`] and nothing can be added or removed any more.

use std::collections::HashMap;
use std::fmt;

use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use super::phase::{PhaseRank, PhaseRegistry};
use super::task::{BoxedTask, TaskId};

/// Insertion-ordered set of tasks keyed by id.
pub struct TaskSet<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
    index: HashMap<TaskId, usize>,
}

impl<Ctx> TaskSet<Ctx>
where
    Ctx: Send,
{
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a task. Adding an id that is already present keeps the existing task.
    ///
    /// Returns whether the task was inserted.
    pub fn add(&mut self, task: BoxedTask<Ctx>) -> bool {
        let id = task.id().clone();
        if self.index.contains_key(&id) {
            return false;
        }
        self.index.insert(id, self.tasks.len());
        self.tasks.push(task);
        true
    }

    /// Add several tasks in order.
    pub fn update(&mut self, tasks: impl IntoIterator<Item = BoxedTask<Ctx>>) {
        for task in tasks {
            self.add(task);
        }
    }

    /// Remove a task by id. Discarding an absent id is a no-op.
    ///
    /// Returns whether a task was removed.
    pub fn discard(&mut self, id: &TaskId) -> bool {
        let Some(position) = self.index.remove(id) else {
            return false;
        };
        self.tasks.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        true
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &TaskId) -> Option<&BoxedTask<Ctx>> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub fn ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.iter().map(|task| task.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoxedTask<Ctx>> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Freeze the set, resolving each task's phase.
    ///
    /// # Errors
    ///
    /// Returns [`VmbuildError::UnknownPhase`] for the first task (in insertion order)
    /// whose phase is not in `registry`.
    pub fn freeze(self, registry: &PhaseRegistry) -> VmbuildResult<ResolvedTaskSet<Ctx>> {
        let mut entries = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            let descriptor = task.descriptor();
            let rank = registry
                .rank(&descriptor.phase)
                .map_err(|_| VmbuildError::UnknownPhase {
                    task: descriptor.id.to_string(),
                    phase: descriptor.phase.clone(),
                })?;
            entries.push(ResolvedTask { task, rank });
        }

        Ok(ResolvedTaskSet {
            entries,
            index: self.index,
        })
    }
}

impl<Ctx> Default for TaskSet<Ctx>
where
    Ctx: Send,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx> fmt::Debug for TaskSet<Ctx>
where
    Ctx: Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

/// A task together with its resolved phase rank.
pub struct ResolvedTask<Ctx> {
    pub task: BoxedTask<Ctx>,
    pub rank: PhaseRank,
}

/// Frozen working set. Positions are insertion order.
pub struct ResolvedTaskSet<Ctx> {
    entries: Vec<ResolvedTask<Ctx>>,
    index: HashMap<TaskId, usize>,
}

impl<Ctx> ResolvedTaskSet<Ctx>
where
    Ctx: Send,
{
    pub fn get(&self, id: &TaskId) -> Option<&BoxedTask<Ctx>> {
        self.position(id).map(|i| &self.entries[i].task)
    }

    pub fn position(&self, id: &TaskId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn entry(&self, position: usize) -> Option<&ResolvedTask<Ctx>> {
        self.entries.get(position)
    }

    pub fn entries(&self) -> &[ResolvedTask<Ctx>] {
        &self.entries
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<Ctx> fmt::Debug for ResolvedTaskSet<Ctx>
where
    Ctx: Send,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.task.id(), e.rank)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::phase::phases;
    use crate::pipeline::task::{FnTask, TaskDescriptor};

    fn task(id: &str, phase: &str) -> BoxedTask<()> {
        FnTask::noop(TaskDescriptor::new(id, id, phase)).boxed()
    }

    fn ids(set: &TaskSet<()>) -> Vec<&str> {
        set.ids().map(|id| id.as_str()).collect()
    }

    #[test]
    fn test_add_same_id_twice_keeps_one() {
        let mut set = TaskSet::new();
        assert!(set.add(task("a", phases::PREPARATION)));
        assert!(!set.add(task("a", phases::CLEANING)));

        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get(&TaskId::from("a")).unwrap().descriptor().phase,
            phases::PREPARATION
        );
    }

    #[test]
    fn test_discard_absent_is_noop() {
        let mut with_discard = TaskSet::new();
        with_discard.update([task("a", phases::PREPARATION), task("b", phases::CLEANING)]);
        assert!(!with_discard.discard(&TaskId::from("missing")));

        let mut without = TaskSet::new();
        without.update([task("a", phases::PREPARATION), task("b", phases::CLEANING)]);

        assert_eq!(ids(&with_discard), ids(&without));
    }

    #[test]
    fn test_discard_keeps_insertion_order() {
        let mut set = TaskSet::new();
        set.update([
            task("a", phases::PREPARATION),
            task("b", phases::PREPARATION),
            task("c", phases::PREPARATION),
        ]);

        assert!(set.discard(&TaskId::from("a")));
        assert_eq!(ids(&set), vec!["b", "c"]);
        assert!(set.get(&TaskId::from("c")).is_some());

        // Re-adding goes to the end.
        set.add(task("a", phases::PREPARATION));
        assert_eq!(ids(&set), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_freeze_resolves_phases() {
        let registry = PhaseRegistry::standard();
        let mut set = TaskSet::new();
        set.update([task("late", phases::CLEANING), task("early", phases::VALIDATION)]);

        let resolved = set.freeze(&registry).unwrap();
        let late = resolved.position(&TaskId::from("late")).unwrap();
        let early = resolved.position(&TaskId::from("early")).unwrap();

        assert_eq!(late, 0);
        assert!(resolved.entry(early).unwrap().rank < resolved.entry(late).unwrap().rank);
    }

    #[test]
    fn test_freeze_rejects_unknown_phase() {
        let registry = PhaseRegistry::standard();
        let mut set = TaskSet::new();
        set.update([task("ok", phases::PREPARATION), task("bad", "teleportation")]);

        let err = set.freeze(&registry).unwrap_err();
        match err {
            VmbuildError::UnknownPhase { task, phase } => {
                assert_eq!(task, "bad");
                assert_eq!(phase, "teleportation");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
