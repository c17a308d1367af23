//! Concrete build context threaded through the built-in tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use crate::manifest::Manifest;

/// Unique identifier of one build (ULID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(Ulid);

impl BuildId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Lowercase form, safe for file names.
    pub fn short(&self) -> String {
        self.0.to_string().to_lowercase()
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State shared by every task of one build.
///
/// Owned by the executor for the duration of the build and lent to one task at a time.
#[derive(Debug)]
pub struct BuildContext {
    pub build_id: BuildId,
    pub manifest: Manifest,
    /// Directory workspaces are created in.
    pub workspace_root: PathBuf,
    /// This build's workspace, once created.
    pub workspace: Option<PathBuf>,
    /// Packages selected for installation.
    pub packages: BTreeSet<String>,
    /// Files produced by the build, keyed by kind.
    pub artifacts: BTreeMap<String, PathBuf>,
    pub started_at: DateTime<Utc>,
}

impl BuildContext {
    pub fn new(manifest: Manifest, workspace_root: PathBuf) -> Self {
        Self {
            build_id: BuildId::new(),
            manifest,
            workspace_root,
            workspace: None,
            packages: BTreeSet::new(),
            artifacts: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }

    /// The workspace directory, which must have been created already.
    pub fn workspace(&self) -> VmbuildResult<&Path> {
        self.workspace
            .as_deref()
            .ok_or_else(|| VmbuildError::Internal("create_workspace task must run first".into()))
    }

    /// Replace `{workspace}`, `{name}` and `{build_id}` placeholders.
    pub fn expand(&self, template: &str) -> String {
        let workspace = self
            .workspace
            .as_ref()
            .map(|w| w.display().to_string())
            .unwrap_or_default();
        template
            .replace("{workspace}", &workspace)
            .replace("{name}", &self.manifest.name)
            .replace("{build_id}", &self.build_id.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_ids_are_unique() {
        assert_ne!(BuildId::new(), BuildId::new());
        let id = BuildId::new();
        assert_eq!(id.short(), id.to_string().to_lowercase());
    }

    #[test]
    fn test_workspace_requires_creation() {
        let mut ctx = BuildContext::new(Manifest::new("img", "local"), PathBuf::from("/tmp"));
        assert!(ctx.workspace().is_err());

        ctx.workspace = Some(PathBuf::from("/tmp/ws"));
        assert_eq!(ctx.workspace().unwrap(), Path::new("/tmp/ws"));
    }

    #[test]
    fn test_expand_placeholders() {
        let mut ctx = BuildContext::new(Manifest::new("img", "local"), PathBuf::from("/tmp"));
        ctx.workspace = Some(PathBuf::from("/tmp/ws"));

        let expanded = ctx.expand("{workspace}/{name}-{build_id}.raw");
        assert_eq!(
            expanded,
            format!("/tmp/ws/img-{}.raw", ctx.build_id.short())
        );
    }
}
