use serde::{Serialize, Serializer};
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use super::ledger::CompletionLedger;
use super::mode::RunMode;
use super::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
    /// Not invoked (dry run)
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub task: TaskId,
    pub description: String,
    pub phase: String,
    pub status: TaskStatus,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskFailure {
    pub task: TaskId,
    #[serde(serialize_with = "serialize_error")]
    pub error: VmbuildError,
}

/// One rollback counterpart that was attempted.
#[derive(Debug, Clone, Serialize)]
pub struct RollbackStep {
    pub counterpart: TaskId,
    /// Completed task this counterpart undoes
    pub reverts: TaskId,
    pub status: TaskStatus,
    pub duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollbackReport {
    pub steps: Vec<RollbackStep>,
    /// Completed tasks with no counterpart to run
    pub skipped: Vec<TaskId>,
}

impl RollbackReport {
    /// True if every attempted counterpart succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RollbackStep> {
        self.steps
            .iter()
            .filter(|step| step.status == TaskStatus::Failed)
    }

    /// Counterparts in the order they ran.
    pub fn ran(&self) -> Vec<&TaskId> {
        self.steps.iter().map(|step| &step.counterpart).collect()
    }
}

/// Result of executing a plan.
#[derive(Debug, Serialize)]
pub struct ExecutionReport {
    pub mode: RunMode,
    pub total_duration_ms: u128,
    /// Every task the executor reached, in order
    pub outcomes: Vec<TaskOutcome>,
    pub ledger: CompletionLedger,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<TaskFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackReport>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn attempted(&self) -> Vec<&TaskId> {
        self.outcomes.iter().map(|outcome| &outcome.task).collect()
    }

    pub fn task_duration_ms(&self, name: &str) -> Option<u128> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.task.as_str() == name)
            .map(|outcome| outcome.duration_ms)
    }

    /// Turn a failed build into an error that carries the task failure and every
    /// rollback failure.
    pub fn into_result(mut self) -> VmbuildResult<Self> {
        let Some(failure) = self.failure.take() else {
            return Ok(self);
        };

        let rollback_failures = self
            .rollback
            .iter()
            .flat_map(RollbackReport::failures)
            .map(|step| {
                format!(
                    "{}: {}",
                    step.counterpart,
                    step.error.as_deref().unwrap_or("unknown error")
                )
            })
            .collect();

        Err(VmbuildError::BuildFailed {
            task: failure.task.to_string(),
            message: failure.error.to_string(),
            rollback_failures,
        })
    }
}

fn serialize_error<S>(error: &VmbuildError, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(error)
}
