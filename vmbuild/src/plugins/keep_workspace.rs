//! Plugin: keep_workspace.
//!
//! Retracts `delete_workspace`, leaving the workspace on disk for inspection. Since the
//! counterpart is no longer selected, a failed build keeps it too.

use crate::assembly::Contributor;
use crate::catalog::DELETE_WORKSPACE;
use crate::context::BuildContext;
use crate::manifest::Manifest;
use crate::pipeline::{TaskId, TaskSet};

pub struct KeepWorkspacePlugin;

impl Contributor<BuildContext> for KeepWorkspacePlugin {
    fn name(&self) -> &str {
        "keep_workspace"
    }

    fn resolve_tasks(&self, taskset: &mut TaskSet<BuildContext>, _manifest: &Manifest) {
        if taskset.discard(&TaskId::from(DELETE_WORKSPACE)) {
            tracing::debug!("Workspace will be kept after the build");
        }
    }
}
