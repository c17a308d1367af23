//! Build options supplied by the caller (CLI flags or embedding code).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use crate::manifest::Manifest;
use crate::pipeline::RunMode;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Directory build workspaces are created in. Falls back to the manifest's
    /// `bootstrapper.workspace`, then to the system temp directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,
    /// Log the plan without running any task.
    #[serde(default)]
    pub dry_run: bool,
    /// Also write logs to `<log_dir>/vmbuild.log`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl BuildOptions {
    /// Validate paths before anything touches the filesystem.
    pub fn sanitize(&self) -> VmbuildResult<()> {
        for (what, path) in [
            ("workspace root", &self.workspace_root),
            ("log directory", &self.log_dir),
        ] {
            if let Some(path) = path
                && !path.is_absolute()
            {
                return Err(VmbuildError::Config(format!(
                    "{} must be an absolute path: {}",
                    what,
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Workspace root for a build of `manifest`.
    pub fn resolve_workspace_root(&self, manifest: &Manifest) -> PathBuf {
        self.workspace_root
            .clone()
            .or_else(|| manifest.bootstrapper.workspace.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("vmbuild"))
    }

    pub fn run_mode(&self) -> RunMode {
        RunMode::from_dry_run(self.dry_run)
    }
}
