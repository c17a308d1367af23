//! Rollback of completed tasks after a failure.
//!
//! Each task may name a counterpart that undoes it. After a failure the ledger is
//! walked newest first and every counterpart that is selected, has not already run
//! and is not itself in the ledger gets one attempt. Failures are recorded and the
//! walk continues.

use std::collections::HashSet;
use std::time::Instant;

use super::ledger::CompletionLedger;
use super::report::{RollbackReport, RollbackStep, TaskStatus};
use super::task::run_task;
use super::taskset::ResolvedTaskSet;

pub struct RollbackResolver;

impl RollbackResolver {
    /// Run the counterparts of everything in `ledger`, in reverse completion order.
    pub async fn rollback<Ctx>(
        ledger: &CompletionLedger,
        set: &ResolvedTaskSet<Ctx>,
        ctx: &mut Ctx,
    ) -> RollbackReport
    where
        Ctx: Send,
    {
        let mut report = RollbackReport::default();
        let mut attempted = HashSet::new();

        for completed in ledger.iter().rev() {
            let Some(counterpart_id) = set
                .get(completed)
                .and_then(|task| task.descriptor().rollback.clone())
            else {
                report.skipped.push(completed.clone());
                continue;
            };

            // Already ran as a normal task; nothing left to undo.
            if ledger.contains(&counterpart_id) {
                tracing::debug!(
                    task = %completed,
                    counterpart = %counterpart_id,
                    "Counterpart already completed, skipping"
                );
                report.skipped.push(completed.clone());
                continue;
            }

            let Some(counterpart) = set.get(&counterpart_id) else {
                tracing::debug!(
                    task = %completed,
                    counterpart = %counterpart_id,
                    "Counterpart not selected for this build, skipping"
                );
                report.skipped.push(completed.clone());
                continue;
            };

            if !attempted.insert(counterpart_id.clone()) {
                continue;
            }

            tracing::info!(
                task = %completed,
                counterpart = %counterpart_id,
                "Rolling back: {}",
                counterpart.descriptor().description
            );

            let start = Instant::now();
            let result = run_task(counterpart.as_ref(), ctx).await;
            let duration_ms = start.elapsed().as_millis();

            let (status, error) = match result {
                Ok(()) => (TaskStatus::Completed, None),
                Err(e) => {
                    tracing::warn!(
                        counterpart = %counterpart_id,
                        error = %e,
                        "Rollback task failed, continuing"
                    );
                    (TaskStatus::Failed, Some(e.to_string()))
                }
            };

            report.steps.push(RollbackStep {
                counterpart: counterpart_id,
                reverts: completed.clone(),
                status,
                duration_ms,
                error,
            });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::phase::{PhaseRegistry, phases};
    use crate::pipeline::task::{BoxedTask, FnTask, TaskDescriptor, TaskId};
    use crate::pipeline::taskset::TaskSet;
    use vmbuild_shared::errors::VmbuildError;

    type Log = Vec<String>;

    fn recording(descriptor: TaskDescriptor) -> BoxedTask<Log> {
        let id = descriptor.id.to_string();
        FnTask::new(descriptor, move |log: &mut Log| {
            log.push(id.clone());
            Ok(())
        })
        .boxed()
    }

    fn plain(id: &str) -> BoxedTask<Log> {
        recording(TaskDescriptor::new(id, "", phases::PREPARATION))
    }

    fn undone_by(id: &str, counterpart: &str) -> BoxedTask<Log> {
        recording(TaskDescriptor::new(id, "", phases::PREPARATION).rolled_back_by(counterpart))
    }

    fn failing(id: &str) -> BoxedTask<Log> {
        let name = id.to_string();
        FnTask::new(
            TaskDescriptor::new(id, "", phases::CLEANING),
            move |log: &mut Log| {
                log.push(name.clone());
                Err(VmbuildError::task(name.clone(), "cannot undo"))
            },
        )
        .boxed()
    }

    fn resolve(tasks: Vec<BoxedTask<Log>>) -> ResolvedTaskSet<Log> {
        let mut set = TaskSet::new();
        set.update(tasks);
        set.freeze(&PhaseRegistry::standard()).unwrap()
    }

    fn ledger_of(ids: &[&str]) -> CompletionLedger {
        let mut ledger = CompletionLedger::new();
        for id in ids {
            ledger.record(TaskId::from(*id));
        }
        ledger
    }

    #[tokio::test]
    async fn test_runs_counterparts_in_reverse_order() {
        let set = resolve(vec![
            undone_by("mount", "unmount"),
            undone_by("attach", "detach"),
            plain("unmount"),
            plain("detach"),
        ]);

        let mut log = Vec::new();
        let report =
            RollbackResolver::rollback(&ledger_of(&["attach", "mount"]), &set, &mut log).await;

        assert_eq!(log, vec!["unmount", "detach"]);
        assert!(report.is_complete());
        assert_eq!(report.steps[0].reverts, TaskId::from("mount"));
    }

    #[tokio::test]
    async fn test_skips_missing_and_undeclared_counterparts() {
        let set = resolve(vec![plain("plain"), undone_by("orphan", "gone")]);

        let mut log = Vec::new();
        let report =
            RollbackResolver::rollback(&ledger_of(&["plain", "orphan"]), &set, &mut log).await;

        assert!(log.is_empty());
        assert!(report.steps.is_empty());
        assert_eq!(
            report.skipped,
            vec![TaskId::from("orphan"), TaskId::from("plain")]
        );
    }

    #[tokio::test]
    async fn test_counterpart_already_completed_is_not_rerun() {
        let set = resolve(vec![undone_by("create", "delete"), plain("delete")]);

        let mut log = Vec::new();
        let report =
            RollbackResolver::rollback(&ledger_of(&["create", "delete"]), &set, &mut log).await;

        assert!(log.is_empty());
        assert!(report.steps.is_empty());
    }

    #[tokio::test]
    async fn test_shared_counterpart_runs_once() {
        let set = resolve(vec![
            undone_by("a", "undo"),
            undone_by("b", "undo"),
            plain("undo"),
        ]);

        let mut log = Vec::new();
        let report = RollbackResolver::rollback(&ledger_of(&["a", "b"]), &set, &mut log).await;

        assert_eq!(log, vec!["undo"]);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].reverts, TaskId::from("b"));
    }

    #[tokio::test]
    async fn test_failed_counterpart_does_not_stop_pass() {
        let set = resolve(vec![
            undone_by("first", "undo_first"),
            undone_by("second", "undo_second"),
            plain("undo_first"),
            failing("undo_second"),
        ]);

        let mut log = Vec::new();
        let report =
            RollbackResolver::rollback(&ledger_of(&["first", "second"]), &set, &mut log).await;

        assert_eq!(log, vec!["undo_second", "undo_first"]);
        assert!(!report.is_complete());

        let failures: Vec<&TaskId> = report.failures().map(|s| &s.counterpart).collect();
        assert_eq!(failures, vec![&TaskId::from("undo_second")]);
        assert!(
            report.steps[0]
                .error
                .as_deref()
                .unwrap()
                .contains("cannot undo")
        );
    }

    #[tokio::test]
    async fn test_panicking_counterpart_is_recorded_and_pass_continues() {
        let exploding = FnTask::new(
            TaskDescriptor::new("detach", "", phases::CLEANING),
            |_: &mut Log| panic!("device busy"),
        )
        .boxed();
        let set = resolve(vec![
            undone_by("mount", "unmount"),
            undone_by("attach", "detach"),
            plain("unmount"),
            exploding,
        ]);

        let mut log = Vec::new();
        let report =
            RollbackResolver::rollback(&ledger_of(&["mount", "attach"]), &set, &mut log).await;

        assert_eq!(log, vec!["unmount"]);
        assert_eq!(
            report.ran(),
            vec![&TaskId::from("detach"), &TaskId::from("unmount")]
        );
        let failed: Vec<&RollbackStep> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert!(
            failed[0]
                .error
                .as_deref()
                .unwrap()
                .contains("panicked: device busy")
        );
    }
}
