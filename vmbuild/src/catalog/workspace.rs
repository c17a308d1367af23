//! Tasks: build workspace lifecycle.
//!
//! The workspace is a per-build directory under the workspace root, named after the
//! image and the build id. Later tasks find it through [`BuildContext::workspace`].

use std::path::Path;

use async_trait::async_trait;
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use super::log_task_error;
use crate::context::BuildContext;
use crate::pipeline::{PipelineTask, TaskDescriptor, phases};
use crate::util::sanitize_file_name;

pub const CHECK_WORKSPACE_ROOT: &str = "check_workspace_root";
pub const CREATE_WORKSPACE: &str = "create_workspace";
pub const DELETE_WORKSPACE: &str = "delete_workspace";

pub struct CheckWorkspaceRoot {
    descriptor: TaskDescriptor,
}

impl CheckWorkspaceRoot {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                CHECK_WORKSPACE_ROOT,
                "Checking the workspace root",
                phases::VALIDATION,
            ),
        }
    }
}

impl Default for CheckWorkspaceRoot {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineTask<BuildContext> for CheckWorkspaceRoot {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: &mut BuildContext) -> VmbuildResult<()> {
        check_workspace_root(&ctx.workspace_root)
            .await
            .inspect_err(|e| log_task_error(&ctx.build_id, self.name(), e))
    }
}

/// A missing root is fine (it is created later); anything that is not a directory is not.
async fn check_workspace_root(root: &Path) -> VmbuildResult<()> {
    match tokio::fs::metadata(root).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(VmbuildError::Config(format!(
            "workspace root is not a directory: {}",
            root.display()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(root = %root.display(), "Workspace root does not exist yet");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub struct CreateWorkspace {
    descriptor: TaskDescriptor,
}

impl CreateWorkspace {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                CREATE_WORKSPACE,
                "Creating workspace",
                phases::PREPARATION,
            )
            .rolled_back_by(DELETE_WORKSPACE),
        }
    }
}

impl Default for CreateWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineTask<BuildContext> for CreateWorkspace {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: &mut BuildContext) -> VmbuildResult<()> {
        let dir_name = format!(
            "{}-{}",
            sanitize_file_name(&ctx.manifest.name),
            ctx.build_id.short()
        );
        let path = ctx.workspace_root.join(dir_name);

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| {
                VmbuildError::task(
                    CREATE_WORKSPACE,
                    format!("failed to create {}: {}", path.display(), e),
                )
            })
            .inspect_err(|e| log_task_error(&ctx.build_id, self.name(), e))?;

        tracing::info!(workspace = %path.display(), "Created workspace");
        ctx.workspace = Some(path);
        Ok(())
    }
}

pub struct DeleteWorkspace {
    descriptor: TaskDescriptor,
}

impl DeleteWorkspace {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                DELETE_WORKSPACE,
                "Deleting workspace",
                phases::CLEANING,
            ),
        }
    }
}

impl Default for DeleteWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineTask<BuildContext> for DeleteWorkspace {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: &mut BuildContext) -> VmbuildResult<()> {
        let Some(path) = ctx.workspace.take() else {
            tracing::debug!("No workspace to delete");
            return Ok(());
        };

        if let Err(e) = remove_dir(&path).await {
            // Keep the path so a retry can find it.
            ctx.workspace = Some(path);
            log_task_error(&ctx.build_id, self.name(), &e);
            return Err(e);
        }

        tracing::info!(workspace = %path.display(), "Deleted workspace");
        Ok(())
    }
}

async fn remove_dir(path: &Path) -> VmbuildResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(VmbuildError::task(
            DELETE_WORKSPACE,
            format!("failed to remove {}: {}", path.display(), e),
        )),
    }
}
