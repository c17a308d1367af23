//! Dependency graph over a frozen task set.
//!
//! Phase order is global and never stored as edges: it is folded into the scheduling
//! key instead. Only explicit predecessor/successor declarations between tasks of the
//! same phase become edges.
//!
//! ```text
//! ready queue key = (phase rank, insertion position)
//!
//!   validation   [a] ──→ [b]
//!   preparation  [c]   [d] ──→ [e]
//!   ...
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};

use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use super::phase::PhaseRegistry;
use super::task::TaskId;
use super::taskset::ResolvedTaskSet;

/// Compute the deterministic execution order of a frozen task set.
///
/// # Errors
///
/// - [`VmbuildError::PhaseConflict`] if an edge asks a task to run before a task of an
///   earlier phase
/// - [`VmbuildError::DependencyCycle`] if explicit edges form a cycle
pub fn order<Ctx>(
    set: &ResolvedTaskSet<Ctx>,
    registry: &PhaseRegistry,
) -> VmbuildResult<Vec<TaskId>>
where
    Ctx: Send,
{
    let graph = DependencyGraph::build(set, registry)?;
    let positions = graph.topological_sort(set)?;
    Ok(positions
        .into_iter()
        .filter_map(|i| set.entry(i).map(|e| e.task.id().clone()))
        .collect())
}

/// Intra-phase edges between task positions.
#[derive(Debug, Clone)]
pub(crate) struct DependencyGraph {
    /// Adjacency list (position -> positions that must run later)
    edges: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    pub(crate) fn build<Ctx>(
        set: &ResolvedTaskSet<Ctx>,
        registry: &PhaseRegistry,
    ) -> VmbuildResult<Self>
    where
        Ctx: Send,
    {
        let mut graph = Self {
            edges: vec![BTreeSet::new(); set.len()],
        };

        for (position, entry) in set.entries().iter().enumerate() {
            let descriptor = entry.task.descriptor();

            for predecessor in &descriptor.predecessors {
                match set.position(predecessor) {
                    Some(from) => graph.add_edge(set, registry, from, position)?,
                    None => tracing::trace!(
                        task = %descriptor.id,
                        predecessor = %predecessor,
                        "Ignoring predecessor outside the task set"
                    ),
                }
            }

            for successor in &descriptor.successors {
                match set.position(successor) {
                    Some(to) => graph.add_edge(set, registry, position, to)?,
                    None => tracing::trace!(
                        task = %descriptor.id,
                        successor = %successor,
                        "Ignoring successor outside the task set"
                    ),
                }
            }
        }

        Ok(graph)
    }

    fn add_edge<Ctx>(
        &mut self,
        set: &ResolvedTaskSet<Ctx>,
        registry: &PhaseRegistry,
        from: usize,
        to: usize,
    ) -> VmbuildResult<()>
    where
        Ctx: Send,
    {
        let (Some(before), Some(after)) = (set.entry(from), set.entry(to)) else {
            return Err(VmbuildError::Internal(format!(
                "edge {} -> {} outside task set",
                from, to
            )));
        };

        if from == to {
            let id = before.task.id().to_string();
            return Err(VmbuildError::DependencyCycle {
                cycle: vec![id.clone()],
                edges: vec![(id.clone(), id)],
            });
        }

        if before.rank > after.rank {
            let phase_name = |rank| {
                registry
                    .get(rank)
                    .map(|phase| phase.name.clone())
                    .unwrap_or_else(|| rank.to_string())
            };
            return Err(VmbuildError::PhaseConflict {
                before: before.task.id().to_string(),
                before_phase: phase_name(before.rank),
                after: after.task.id().to_string(),
                after_phase: phase_name(after.rank),
            });
        }

        // Cross-phase edges pointing forward are already implied by phase order.
        if before.rank == after.rank {
            self.edges[from].insert(to);
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn edge_count(&self) -> usize {
        self.edges.iter().map(BTreeSet::len).sum()
    }

    /// Kahn's algorithm with a min-queue on (phase rank, insertion position).
    pub(crate) fn topological_sort<Ctx>(
        &self,
        set: &ResolvedTaskSet<Ctx>,
    ) -> VmbuildResult<Vec<usize>>
    where
        Ctx: Send,
    {
        let n = self.edges.len();

        let mut in_degree = vec![0usize; n];
        for targets in &self.edges {
            for &to in targets {
                in_degree[to] += 1;
            }
        }

        let key = |i: usize| {
            let rank = set.entry(i).map(|e| e.rank);
            Reverse((rank, i))
        };

        let mut ready: BinaryHeap<_> = (0..n).filter(|&i| in_degree[i] == 0).map(key).collect();
        let mut result = Vec::with_capacity(n);

        while let Some(Reverse((_, node))) = ready.pop() {
            result.push(node);
            for &to in &self.edges[node] {
                in_degree[to] -= 1;
                if in_degree[to] == 0 {
                    ready.push(key(to));
                }
            }
        }

        if result.len() != n {
            let stuck: Vec<usize> = (0..n).filter(|&i| in_degree[i] > 0).collect();
            return Err(self.cycle_error(set, &stuck));
        }

        Ok(result)
    }

    /// Build an error describing the shortest cycle among `stuck` nodes.
    fn cycle_error<Ctx>(&self, set: &ResolvedTaskSet<Ctx>, stuck: &[usize]) -> VmbuildError
    where
        Ctx: Send,
    {
        let mut best: Option<Vec<usize>> = None;
        for &start in stuck {
            if let Some(cycle) = self.shortest_cycle_through(start, stuck)
                && best.as_ref().is_none_or(|b| cycle.len() < b.len())
            {
                best = Some(cycle);
            }
        }

        let cycle = best.unwrap_or_else(|| stuck.to_vec());
        let name = |i: usize| {
            set.entry(i)
                .map(|e| e.task.id().to_string())
                .unwrap_or_else(|| format!("#{}", i))
        };

        let members: Vec<String> = cycle.iter().map(|&i| name(i)).collect();
        let edges = cycle
            .iter()
            .zip(cycle.iter().cycle().skip(1))
            .map(|(&a, &b)| (name(a), name(b)))
            .collect();

        VmbuildError::DependencyCycle {
            cycle: members,
            edges,
        }
    }

    /// Breadth-first search from `start` back to itself, restricted to `allowed`.
    fn shortest_cycle_through(&self, start: usize, allowed: &[usize]) -> Option<Vec<usize>> {
        let mut parent: Vec<Option<usize>> = vec![None; self.edges.len()];
        let mut seen = vec![false; self.edges.len()];
        let mut queue = VecDeque::from([start]);
        seen[start] = true;

        while let Some(node) = queue.pop_front() {
            for &next in &self.edges[node] {
                if next == start {
                    let mut path = vec![node];
                    let mut cursor = node;
                    while let Some(p) = parent[cursor] {
                        path.push(p);
                        cursor = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                if !seen[next] && allowed.binary_search(&next).is_ok() {
                    seen[next] = true;
                    parent[next] = Some(node);
                    queue.push_back(next);
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::phase::{Phase, phases};
    use crate::pipeline::task::{FnTask, TaskDescriptor};
    use crate::pipeline::taskset::TaskSet;

    fn resolve(descriptors: Vec<TaskDescriptor>, registry: &PhaseRegistry) -> ResolvedTaskSet<()> {
        let mut set = TaskSet::new();
        set.update(descriptors.into_iter().map(|d| FnTask::noop(d).boxed()));
        set.freeze(registry).unwrap()
    }

    fn order_of(
        descriptors: Vec<TaskDescriptor>,
        registry: &PhaseRegistry,
    ) -> VmbuildResult<Vec<String>> {
        let set = resolve(descriptors, registry);
        order(&set, registry).map(|ids| ids.into_iter().map(|id| id.to_string()).collect())
    }

    fn install_registry() -> PhaseRegistry {
        PhaseRegistry::new(vec![
            Phase::new("preparation", "Preparation", ""),
            Phase::new("install", "Install", ""),
        ])
        .unwrap()
    }

    #[test]
    fn test_no_edges_follows_phase_then_insertion_order() {
        let registry = PhaseRegistry::standard();
        let order = order_of(
            vec![
                TaskDescriptor::new("clean", "", phases::CLEANING),
                TaskDescriptor::new("pkg_b", "", phases::PACKAGE_INSTALLATION),
                TaskDescriptor::new("validate", "", phases::VALIDATION),
                TaskDescriptor::new("pkg_a", "", phases::PACKAGE_INSTALLATION),
                TaskDescriptor::new("prep", "", phases::PREPARATION),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(order, vec!["validate", "prep", "pkg_b", "pkg_a", "clean"]);
    }

    #[test]
    fn test_predecessor_within_phase() {
        let registry = PhaseRegistry::standard();
        let order = order_of(
            vec![
                TaskDescriptor::new("b", "", phases::SYSTEM_MODIFICATION).after("a"),
                TaskDescriptor::new("a", "", phases::SYSTEM_MODIFICATION),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_successor_within_phase() {
        let registry = PhaseRegistry::standard();
        let order = order_of(
            vec![
                TaskDescriptor::new("write_grub", "", phases::SYSTEM_MODIFICATION),
                TaskDescriptor::new("other", "", phases::SYSTEM_MODIFICATION),
                TaskDescriptor::new("configure_grub", "", phases::SYSTEM_MODIFICATION)
                    .before("write_grub"),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(order, vec!["other", "configure_grub", "write_grub"]);
    }

    #[test]
    fn test_mixed_phases_and_predecessor() {
        let registry = install_registry();
        let order = order_of(
            vec![
                TaskDescriptor::new("Z", "", "install"),
                TaskDescriptor::new("Y", "", "install").after("X"),
                TaskDescriptor::new("X", "", "preparation"),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(order, vec!["X", "Z", "Y"]);
    }

    #[test]
    fn test_edges_to_missing_tasks_are_dropped() {
        let registry = PhaseRegistry::standard();
        let order = order_of(
            vec![
                TaskDescriptor::new("a", "", phases::PREPARATION)
                    .after("not_selected")
                    .before("also_not_selected"),
                TaskDescriptor::new("b", "", phases::PREPARATION),
            ],
            &registry,
        )
        .unwrap();

        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_forward_cross_phase_edge_is_implied() {
        let registry = PhaseRegistry::standard();
        let set = resolve(
            vec![
                TaskDescriptor::new("late", "", phases::CLEANING).after("early"),
                TaskDescriptor::new("early", "", phases::PREPARATION).before("late"),
            ],
            &registry,
        );

        let graph = DependencyGraph::build(&set, &registry).unwrap();
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(
            order(&set, &registry).unwrap(),
            vec![TaskId::from("early"), TaskId::from("late")]
        );
    }

    #[test]
    fn test_backward_cross_phase_edge_conflicts() {
        let registry = PhaseRegistry::standard();
        let err = order_of(
            vec![
                TaskDescriptor::new("early", "", phases::PREPARATION).after("late"),
                TaskDescriptor::new("late", "", phases::CLEANING),
            ],
            &registry,
        )
        .unwrap_err();

        match err {
            VmbuildError::PhaseConflict {
                before,
                before_phase,
                after,
                after_phase,
            } => {
                assert_eq!(before, "late");
                assert_eq!(before_phase, phases::CLEANING);
                assert_eq!(after, "early");
                assert_eq!(after_phase, phases::PREPARATION);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_two_node_cycle() {
        let registry = PhaseRegistry::standard();
        let err = order_of(
            vec![
                TaskDescriptor::new("a", "", phases::PREPARATION).after("b"),
                TaskDescriptor::new("b", "", phases::PREPARATION).after("a"),
            ],
            &registry,
        )
        .unwrap_err();

        match err {
            VmbuildError::DependencyCycle { cycle, edges } => {
                assert_eq!(cycle, vec!["a", "b"]);
                assert_eq!(
                    edges,
                    vec![
                        ("a".to_string(), "b".to_string()),
                        ("b".to_string(), "a".to_string())
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reports_shortest_cycle() {
        // a -> b -> c -> a, plus c <-> d; the minimal cycle is c -> d -> c.
        let registry = PhaseRegistry::standard();
        let err = order_of(
            vec![
                TaskDescriptor::new("a", "", phases::PREPARATION).before("b"),
                TaskDescriptor::new("b", "", phases::PREPARATION).before("c"),
                TaskDescriptor::new("c", "", phases::PREPARATION)
                    .before("a")
                    .before("d"),
                TaskDescriptor::new("d", "", phases::PREPARATION).before("c"),
                TaskDescriptor::new("free", "", phases::PREPARATION),
            ],
            &registry,
        )
        .unwrap_err();

        match err {
            VmbuildError::DependencyCycle { cycle, .. } => {
                assert_eq!(cycle, vec!["c", "d"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_edge_is_cycle() {
        let registry = PhaseRegistry::standard();
        let err = order_of(
            vec![TaskDescriptor::new("a", "", phases::PREPARATION).after("a")],
            &registry,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "dependency cycle: a -> a");
    }

    #[test]
    fn test_order_is_reproducible() {
        let registry = PhaseRegistry::standard();
        let build = || {
            vec![
                TaskDescriptor::new("d", "", phases::SYSTEM_MODIFICATION).after("b"),
                TaskDescriptor::new("c", "", phases::SYSTEM_MODIFICATION),
                TaskDescriptor::new("b", "", phases::SYSTEM_MODIFICATION).before("c"),
                TaskDescriptor::new("a", "", phases::OS_INSTALLATION),
            ]
        };

        let first = order_of(build(), &registry).unwrap();
        for _ in 0..10 {
            assert_eq!(order_of(build(), &registry).unwrap(), first);
        }
        assert_eq!(first, vec!["a", "b", "d", "c"]);
    }
}
