//! Contributor hooks that edit the working set.

use std::fmt;
use std::sync::Arc;

use crate::manifest::Manifest;
use crate::pipeline::{BoxedTask, TaskSet};

/// A module that adds or discards tasks for a build.
pub trait Contributor<Ctx>: Send + Sync {
    /// Name used for selection and logging.
    fn name(&self) -> &str;

    /// Edit the working set. Called exactly once per build.
    fn resolve_tasks(&self, taskset: &mut TaskSet<Ctx>, manifest: &Manifest);
}

pub type SharedContributor<Ctx> = Arc<dyn Contributor<Ctx>>;

/// Baseline tasks every build starts from.
pub struct CoreCatalog<Ctx> {
    tasks: Vec<BoxedTask<Ctx>>,
}

impl<Ctx> CoreCatalog<Ctx> {
    pub fn new(tasks: Vec<BoxedTask<Ctx>>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[BoxedTask<Ctx>] {
        &self.tasks
    }
}

impl<Ctx> Contributor<Ctx> for CoreCatalog<Ctx>
where
    Ctx: Send,
{
    fn name(&self) -> &str {
        "core"
    }

    fn resolve_tasks(&self, taskset: &mut TaskSet<Ctx>, _manifest: &Manifest) {
        taskset.update(self.tasks.iter().cloned());
    }
}

type HookFn<Ctx> = dyn Fn(&mut TaskSet<Ctx>, &Manifest) + Send + Sync;

/// Contributor backed by a closure.
pub struct FnContributor<Ctx> {
    name: String,
    hook: Box<HookFn<Ctx>>,
}

impl<Ctx> FnContributor<Ctx>
where
    Ctx: Send + 'static,
{
    pub fn new<F>(name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut TaskSet<Ctx>, &Manifest) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            hook: Box::new(hook),
        }
    }

    pub fn shared(self) -> SharedContributor<Ctx> {
        Arc::new(self)
    }
}

impl<Ctx> fmt::Debug for FnContributor<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnContributor")
            .field("name", &self.name)
            .finish()
    }
}

impl<Ctx> Contributor<Ctx> for FnContributor<Ctx>
where
    Ctx: Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_tasks(&self, taskset: &mut TaskSet<Ctx>, manifest: &Manifest) {
        (self.hook)(taskset, manifest)
    }
}
