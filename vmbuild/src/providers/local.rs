//! Provider: local.
//!
//! Collects the packages listed under `provider.packages` and registers the build by
//! writing a JSON description next to the workspaces instead of uploading anywhere.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use crate::assembly::Contributor;
use crate::catalog::log_task_error;
use crate::context::{BuildContext, BuildId};
use crate::manifest::Manifest;
use crate::pipeline::{PipelineTask, TaskDescriptor, TaskSet, phases};
use crate::util::sanitize_file_name;

pub const ADD_PACKAGES: &str = "add_packages";
pub const WRITE_BUILD_INFO: &str = "write_build_info";

pub struct LocalProvider;

impl Contributor<BuildContext> for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn resolve_tasks(&self, taskset: &mut TaskSet<BuildContext>, _manifest: &Manifest) {
        taskset.add(Arc::new(AddPackages::new()));
        taskset.add(Arc::new(WriteBuildInfo::new()));
    }
}

pub struct AddPackages {
    descriptor: TaskDescriptor,
}

impl AddPackages {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                ADD_PACKAGES,
                "Adding packages requested by the provider settings",
                phases::PREPARATION,
            ),
        }
    }
}

impl Default for AddPackages {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineTask<BuildContext> for AddPackages {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: &mut BuildContext) -> VmbuildResult<()> {
        let packages = provider_packages(&ctx.manifest)
            .inspect_err(|e| log_task_error(&ctx.build_id, self.name(), e))?;

        tracing::info!(count = packages.len(), "Adding provider packages");
        ctx.packages.extend(packages);
        Ok(())
    }
}

fn provider_packages(manifest: &Manifest) -> VmbuildResult<Vec<String>> {
    match manifest.provider.settings.get("packages") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            VmbuildError::Config(format!("provider `packages` must be a list of names: {}", e))
        }),
    }
}

pub struct WriteBuildInfo {
    descriptor: TaskDescriptor,
}

impl WriteBuildInfo {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                WRITE_BUILD_INFO,
                "Writing build information",
                phases::IMAGE_REGISTRATION,
            ),
        }
    }
}

impl Default for WriteBuildInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct BuildInfo<'a> {
    name: &'a str,
    build_id: BuildId,
    provider: &'a str,
    provider_settings: &'a Map<String, Value>,
    plugins: Vec<&'a str>,
    started_at: DateTime<Utc>,
    registered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace: Option<&'a Path>,
    packages: &'a BTreeSet<String>,
    artifacts: &'a BTreeMap<String, PathBuf>,
}

#[async_trait]
impl PipelineTask<BuildContext> for WriteBuildInfo {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: &mut BuildContext) -> VmbuildResult<()> {
        let path = write_build_info(ctx)
            .await
            .inspect_err(|e| log_task_error(&ctx.build_id, self.name(), e))?;

        tracing::info!(path = %path.display(), "Registered build");
        ctx.artifacts.insert("build_info".into(), path);
        Ok(())
    }
}

async fn write_build_info(ctx: &BuildContext) -> VmbuildResult<PathBuf> {
    let info = BuildInfo {
        name: &ctx.manifest.name,
        build_id: ctx.build_id,
        provider: &ctx.manifest.provider.name,
        provider_settings: &ctx.manifest.provider.settings,
        plugins: ctx.manifest.plugin_names().collect(),
        started_at: ctx.started_at,
        registered_at: Utc::now(),
        workspace: ctx.workspace.as_deref(),
        packages: &ctx.packages,
        artifacts: &ctx.artifacts,
    };
    let contents = serde_json::to_vec_pretty(&info)?;

    let file_name = format!(
        "{}-{}.json",
        sanitize_file_name(&ctx.manifest.name),
        ctx.build_id.short()
    );
    let path = ctx.workspace_root.join(file_name);

    tokio::fs::create_dir_all(&ctx.workspace_root).await?;
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_adds_its_tasks() {
        let mut set = TaskSet::new();
        LocalProvider.resolve_tasks(&mut set, &Manifest::new("img", "local"));

        let task = set.get(&ADD_PACKAGES.into()).unwrap();
        assert_eq!(task.descriptor().phase, phases::PREPARATION);
        let task = set.get(&WRITE_BUILD_INFO.into()).unwrap();
        assert_eq!(task.descriptor().phase, phases::IMAGE_REGISTRATION);
    }

    #[tokio::test]
    async fn test_add_packages_from_provider_settings() {
        let mut manifest = Manifest::new("img", "local");
        manifest
            .provider
            .settings
            .insert("packages".into(), serde_json::json!(["sudo", "openssh-server", "sudo"]));
        let mut ctx = BuildContext::new(manifest, PathBuf::from("/tmp"));

        AddPackages::new().run(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.packages.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["openssh-server", "sudo"]
        );

        ctx.manifest
            .provider
            .settings
            .insert("packages".into(), serde_json::json!("sudo"));
        let err = AddPackages::new().run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, VmbuildError::Config(_)));
    }

    #[tokio::test]
    async fn test_add_packages_without_setting_adds_nothing() {
        let mut ctx = BuildContext::new(Manifest::new("img", "local"), PathBuf::from("/tmp"));
        AddPackages::new().run(&mut ctx).await.unwrap();
        assert!(ctx.packages.is_empty());
    }

    #[tokio::test]
    async fn test_writes_build_info_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::new("img", "local").with_plugin("keep_workspace", Value::Null);
        let mut ctx = BuildContext::new(manifest, dir.path().join("builds"));
        ctx.packages.insert("openssh-server".into());

        WriteBuildInfo::new().run(&mut ctx).await.unwrap();

        let path = ctx.artifacts["build_info"].clone();
        assert_eq!(
            path,
            dir.path()
                .join("builds")
                .join(format!("img-{}.json", ctx.build_id.short()))
        );

        let info: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(info["name"], "img");
        assert_eq!(info["provider"], "local");
        assert_eq!(info["build_id"], ctx.build_id.to_string());
        assert_eq!(info["plugins"], serde_json::json!(["keep_workspace"]));
        assert_eq!(info["packages"], serde_json::json!(["openssh-server"]));
        assert!(info.get("workspace").is_none());
    }
}
