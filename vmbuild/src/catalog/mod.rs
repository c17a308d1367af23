//! Core task catalog.
//!
//! Tasks every build starts from, regardless of provider or plugins:
//!
//! | Task                   | Phase       | Rolled back by     |
//! |------------------------|-------------|--------------------|
//! | `check_workspace_root` | validation  |                    |
//! | `create_workspace`     | preparation | `delete_workspace` |
//! | `delete_workspace`     | cleaning    |                    |

mod workspace;

use std::sync::Arc;

use vmbuild_shared::errors::VmbuildError;

use crate::assembly::CoreCatalog;
use crate::context::{BuildContext, BuildId};

pub use workspace::{
    CHECK_WORKSPACE_ROOT, CREATE_WORKSPACE, CheckWorkspaceRoot, CreateWorkspace, DELETE_WORKSPACE,
    DeleteWorkspace,
};

/// The baseline catalog for [`BuildContext`] builds.
pub fn core_catalog() -> CoreCatalog<BuildContext> {
    CoreCatalog::new(vec![
        Arc::new(CheckWorkspaceRoot::new()),
        Arc::new(CreateWorkspace::new()),
        Arc::new(DeleteWorkspace::new()),
    ])
}

pub(crate) fn log_task_error(build_id: &BuildId, task: &str, error: &VmbuildError) {
    tracing::error!(build_id = %build_id, task, error = %error, "Task failed");
}
