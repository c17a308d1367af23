//! Ordered execution of a frozen task set.
//!
//! Provides the plan (tasks in dependency order) and the sequential executor that
//! runs it, hands failures to the rollback resolver and collects the report.

use std::time::Instant;

use vmbuild_shared::errors::VmbuildResult;

use super::graph::DependencyGraph;
use super::ledger::CompletionLedger;
use super::mode::RunMode;
use super::phase::PhaseRegistry;
use super::report::{ExecutionReport, TaskFailure, TaskOutcome, TaskStatus};
use super::rollback::RollbackResolver;
use super::task::{BoxedTask, TaskDescriptor, TaskId, run_task};
use super::taskset::ResolvedTaskSet;

/// A frozen task set plus its execution order.
pub struct ExecutionPlan<Ctx> {
    set: ResolvedTaskSet<Ctx>,
    order: Vec<usize>,
}

impl<Ctx> ExecutionPlan<Ctx>
where
    Ctx: Send,
{
    /// Order `set` using its phases and explicit edges.
    ///
    /// # Errors
    ///
    /// Fails on phase conflicts and dependency cycles; see [`super::graph::order`].
    pub fn new(set: ResolvedTaskSet<Ctx>, registry: &PhaseRegistry) -> VmbuildResult<Self> {
        let graph = DependencyGraph::build(&set, registry)?;
        let order = graph.topological_sort(&set)?;
        Ok(Self { set, order })
    }

    /// Tasks in execution order.
    pub fn tasks(&self) -> impl Iterator<Item = &BoxedTask<Ctx>> {
        self.order
            .iter()
            .filter_map(|&i| self.set.entry(i).map(|entry| &entry.task))
    }

    pub fn ids(&self) -> Vec<&TaskId> {
        self.tasks().map(|task| task.id()).collect()
    }

    pub fn task_set(&self) -> &ResolvedTaskSet<Ctx> {
        &self.set
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Sequential pipeline executor.
///
/// Tasks run one at a time with exclusive access to the context. The first failure
/// stops the run and triggers rollback of what already completed.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Execute a plan.
    ///
    /// Never returns early with an error: task and rollback failures are part of the
    /// report. Use [`ExecutionReport::into_result`] to turn a failed build into an error.
    pub async fn execute<Ctx>(
        plan: &ExecutionPlan<Ctx>,
        ctx: &mut Ctx,
        mode: RunMode,
    ) -> ExecutionReport
    where
        Ctx: Send,
    {
        let total_start = Instant::now();
        let mut outcomes = Vec::with_capacity(plan.len());
        let mut ledger = CompletionLedger::new();
        let mut failure = None;
        let mut rollback = None;

        tracing::info!(tasks = plan.len(), mode = ?mode, "Executing build plan");

        for task in plan.tasks() {
            let descriptor = task.descriptor();

            if mode == RunMode::DryRun {
                tracing::info!(
                    task = %descriptor.id,
                    phase = %descriptor.phase,
                    "(dry run) {}",
                    descriptor.description
                );
                outcomes.push(outcome(descriptor, TaskStatus::Skipped, 0, None));
                continue;
            }

            tracing::info!(
                task = %descriptor.id,
                phase = %descriptor.phase,
                "{}",
                descriptor.description
            );

            let task_start = Instant::now();
            let result = run_task(task.as_ref(), ctx).await;
            let duration_ms = task_start.elapsed().as_millis();

            match result {
                Ok(()) => {
                    tracing::debug!(task = %descriptor.id, duration_ms, "Task completed");
                    ledger.record(descriptor.id.clone());
                    outcomes.push(outcome(descriptor, TaskStatus::Completed, duration_ms, None));
                }
                Err(error) => {
                    tracing::error!(
                        task = %descriptor.id,
                        error = %error,
                        completed = ledger.len(),
                        "Task failed, rolling back"
                    );
                    outcomes.push(outcome(
                        descriptor,
                        TaskStatus::Failed,
                        duration_ms,
                        Some(error.to_string()),
                    ));

                    let report = RollbackResolver::rollback(&ledger, plan.task_set(), ctx).await;
                    if report.is_complete() {
                        tracing::info!(steps = report.steps.len(), "Rollback completed");
                    } else {
                        tracing::warn!(
                            failed = report.failures().count(),
                            "Rollback completed with failures"
                        );
                    }

                    rollback = Some(report);
                    failure = Some(TaskFailure {
                        task: descriptor.id.clone(),
                        error,
                    });
                    break;
                }
            }
        }

        let total_duration_ms = total_start.elapsed().as_millis();
        tracing::info!(
            total_duration_ms,
            completed = ledger.len(),
            success = failure.is_none(),
            "Build plan finished"
        );

        ExecutionReport {
            mode,
            total_duration_ms,
            outcomes,
            ledger,
            failure,
            rollback,
        }
    }
}

fn outcome(
    descriptor: &TaskDescriptor,
    status: TaskStatus,
    duration_ms: u128,
    error: Option<String>,
) -> TaskOutcome {
    TaskOutcome {
        task: descriptor.id.clone(),
        description: descriptor.description.clone(),
        phase: descriptor.phase.clone(),
        status,
        duration_ms,
        error,
    }
}
