use std::iter;

use vmbuild_shared::errors::VmbuildResult;

use super::contributor::Contributor;
use crate::manifest::Manifest;
use crate::pipeline::{PhaseRegistry, ResolvedTaskSet, TaskSet};

/// Build the frozen working set for one build.
///
/// Applies `core`, then `provider`, then each of `plugins` in the given order, and
/// freezes the result against `registry`.
///
/// # Errors
///
/// Returns [`vmbuild_shared::VmbuildError::UnknownPhase`] if any selected task names a
/// phase outside `registry`.
pub fn assemble<Ctx>(
    registry: &PhaseRegistry,
    core: &dyn Contributor<Ctx>,
    provider: &dyn Contributor<Ctx>,
    plugins: &[&dyn Contributor<Ctx>],
    manifest: &Manifest,
) -> VmbuildResult<ResolvedTaskSet<Ctx>>
where
    Ctx: Send,
{
    let mut taskset = TaskSet::new();

    let contributors = iter::once(core)
        .chain(iter::once(provider))
        .chain(plugins.iter().copied());

    for contributor in contributors {
        let before = taskset.len();
        contributor.resolve_tasks(&mut taskset, manifest);
        tracing::debug!(
            contributor = contributor.name(),
            before,
            after = taskset.len(),
            "Applied contributor"
        );
    }

    tracing::info!(tasks = taskset.len(), "Assembled task set");
    taskset.freeze(registry)
}
