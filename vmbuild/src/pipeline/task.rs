//! Task trait and descriptor metadata.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

/// Unique task identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Static identity and ordering metadata for one task.
///
/// Ordering references are plain ids, resolved against the frozen task set when the
/// dependency graph is built. Predecessor and successor lists keep declaration order
/// and never hold duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub id: TaskId,
    pub description: String,
    pub phase: String,
    pub predecessors: Vec<TaskId>,
    pub successors: Vec<TaskId>,
    /// Task that undoes this one if a later task fails.
    pub rollback: Option<TaskId>,
}

impl TaskDescriptor {
    pub fn new(
        id: impl Into<TaskId>,
        description: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            phase: phase.into(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            rollback: None,
        }
    }

    /// Require `id` to run before this task.
    pub fn after(mut self, id: impl Into<TaskId>) -> Self {
        push_unique(&mut self.predecessors, id.into());
        self
    }

    /// Require `id` to run after this task.
    pub fn before(mut self, id: impl Into<TaskId>) -> Self {
        push_unique(&mut self.successors, id.into());
        self
    }

    /// Pair this task with the task that undoes it.
    pub fn rolled_back_by(mut self, id: impl Into<TaskId>) -> Self {
        self.rollback = Some(id.into());
        self
    }
}

fn push_unique(ids: &mut Vec<TaskId>, id: TaskId) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// Trait for tasks that can be executed in a pipeline.
///
/// Tasks get exclusive access to the build context for the duration of `run` and
/// cannot hold on to it afterwards.
#[async_trait]
pub trait PipelineTask<Ctx>: Send + Sync {
    fn descriptor(&self) -> &TaskDescriptor;

    /// Execute the task against the shared build context.
    async fn run(&self, ctx: &mut Ctx) -> VmbuildResult<()>;

    fn id(&self) -> &TaskId {
        &self.descriptor().id
    }

    /// Get human-readable task name for logging.
    fn name(&self) -> &str {
        self.descriptor().id.as_str()
    }
}

pub type BoxedTask<Ctx> = Arc<dyn PipelineTask<Ctx>>;

/// Run `task`, reporting a panic inside it as a task failure.
///
/// The context may be partially updated when the task panics; callers treat it the
/// same as any other failure and roll back.
pub(crate) async fn run_task<Ctx>(task: &dyn PipelineTask<Ctx>, ctx: &mut Ctx) -> VmbuildResult<()>
where
    Ctx: Send,
{
    match AssertUnwindSafe(task.run(ctx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(VmbuildError::task(
            task.id().as_str(),
            format!("panicked: {}", panic_message(payload.as_ref())),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

type RunFn<Ctx> = dyn Fn(&mut Ctx) -> VmbuildResult<()> + Send + Sync;

/// Task backed by a synchronous closure.
pub struct FnTask<Ctx> {
    descriptor: TaskDescriptor,
    run: Box<RunFn<Ctx>>,
}

impl<Ctx> FnTask<Ctx>
where
    Ctx: Send + 'static,
{
    pub fn new<F>(descriptor: TaskDescriptor, run: F) -> Self
    where
        F: Fn(&mut Ctx) -> VmbuildResult<()> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            run: Box::new(run),
        }
    }

    /// Task that does nothing when run.
    pub fn noop(descriptor: TaskDescriptor) -> Self {
        Self::new(descriptor, |_| Ok(()))
    }

    pub fn boxed(self) -> BoxedTask<Ctx> {
        Arc::new(self)
    }
}

impl<Ctx> fmt::Debug for FnTask<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

#[async_trait]
impl<Ctx> PipelineTask<Ctx> for FnTask<Ctx>
where
    Ctx: Send,
{
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: &mut Ctx) -> VmbuildResult<()> {
        (self.run)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_builder_dedupes_edges() {
        let descriptor = TaskDescriptor::new("mount", "Mounting volume", "volume_mounting")
            .after("format")
            .after("partition")
            .after("format")
            .before("install")
            .before("install")
            .rolled_back_by("unmount");

        assert_eq!(
            descriptor.predecessors,
            vec![TaskId::from("format"), TaskId::from("partition")]
        );
        assert_eq!(descriptor.successors, vec![TaskId::from("install")]);
        assert_eq!(descriptor.rollback, Some(TaskId::from("unmount")));
    }

    #[tokio::test]
    async fn test_fn_task_runs_closure() {
        let descriptor = TaskDescriptor::new("push", "Push", "preparation");
        let task = FnTask::new(descriptor, |log: &mut Vec<String>| {
            log.push("ran".to_string());
            Ok(())
        })
        .boxed();

        let mut log = Vec::new();
        task.run(&mut log).await.unwrap();
        assert_eq!(log, vec!["ran"]);
        assert_eq!(task.name(), "push");
    }

    #[tokio::test]
    async fn test_fn_task_propagates_error() {
        let descriptor = TaskDescriptor::new("fail", "Fail", "preparation");
        let task: BoxedTask<()> =
            FnTask::new(descriptor, |_| Err(VmbuildError::task("fail", "nope"))).boxed();

        let err = task.run(&mut ()).await.unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn test_run_task_turns_panic_into_error() {
        let descriptor = TaskDescriptor::new("explode", "Explode", "preparation");
        let task: BoxedTask<Vec<String>> = FnTask::new(descriptor, |log: &mut Vec<String>| {
            log.push("before".to_string());
            panic!("disk vanished");
        })
        .boxed();

        let mut log = Vec::new();
        let err = run_task(task.as_ref(), &mut log).await.unwrap_err();
        match err {
            VmbuildError::Task { task, message } => {
                assert_eq!(task, "explode");
                assert_eq!(message, "panicked: disk vanished");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log, vec!["before"]);

        let formatted: BoxedTask<()> = FnTask::new(
            TaskDescriptor::new("fmt", "Fmt", "preparation"),
            |_| panic!("exit code {}", 42),
        )
        .boxed();
        let err = run_task(formatted.as_ref(), &mut ()).await.unwrap_err();
        assert!(err.to_string().contains("panicked: exit code 42"));
    }

    #[test]
    fn test_task_id_serializes_as_string() {
        let json = serde_json::to_string(&TaskId::from("create_workspace")).unwrap();
        assert_eq!(json, "\"create_workspace\"");
    }
}
