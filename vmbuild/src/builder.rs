//! Image build orchestration.
//!
//! ```text
//! manifest ──→ select contributors ──→ assemble ──→ order ──→ execute ──→ report
//!                (provider, plugins)    (freeze)    (graph)   (rollback on failure)
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use vmbuild_shared::errors::VmbuildResult;

use crate::assembly::{ContributorRegistry, CoreCatalog, SharedContributor, assemble};
use crate::catalog::core_catalog;
use crate::context::{BuildContext, BuildId};
use crate::manifest::Manifest;
use crate::options::BuildOptions;
use crate::pipeline::{ExecutionPlan, ExecutionReport, PhaseRegistry, PipelineExecutor};
use crate::plugins::builtin_plugins;
use crate::providers::builtin_providers;

/// Everything a caller learns about one build.
#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub build_id: BuildId,
    pub name: String,
    pub workspace_root: PathBuf,
    /// Files the build produced, keyed by kind.
    pub artifacts: BTreeMap<String, PathBuf>,
    #[serde(flatten)]
    pub execution: ExecutionReport,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.execution.is_success()
    }
}

/// Builds images from manifests.
///
/// # Example
///
/// ```ignore
/// let builder = ImageBuilder::new(BuildOptions::default())?;
/// let report = builder.build(Manifest::load(path)?).await?;
/// report.execution.into_result()?;
/// ```
pub struct ImageBuilder {
    options: BuildOptions,
    phases: PhaseRegistry,
    core: CoreCatalog<BuildContext>,
    contributors: ContributorRegistry<BuildContext>,
}

impl ImageBuilder {
    /// Builder with the standard phases and every built-in provider and plugin.
    pub fn new(options: BuildOptions) -> VmbuildResult<Self> {
        options.sanitize()?;

        let mut contributors = ContributorRegistry::new();
        for provider in builtin_providers() {
            contributors.register_provider(provider);
        }
        for plugin in builtin_plugins() {
            contributors.register_plugin(plugin);
        }

        Ok(Self {
            options,
            phases: PhaseRegistry::standard(),
            core: core_catalog(),
            contributors,
        })
    }

    pub fn with_phases(mut self, phases: PhaseRegistry) -> Self {
        self.phases = phases;
        self
    }

    pub fn with_core(mut self, core: CoreCatalog<BuildContext>) -> Self {
        self.core = core;
        self
    }

    pub fn register_provider(&mut self, provider: SharedContributor<BuildContext>) {
        self.contributors.register_provider(provider);
    }

    pub fn register_plugin(&mut self, plugin: SharedContributor<BuildContext>) {
        self.contributors.register_plugin(plugin);
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn phases(&self) -> &PhaseRegistry {
        &self.phases
    }

    pub fn contributors(&self) -> &ContributorRegistry<BuildContext> {
        &self.contributors
    }

    /// Ordered plan for `manifest`, without running anything.
    ///
    /// # Errors
    ///
    /// Any planning error: unknown provider, plugin or phase, phase conflict or
    /// dependency cycle.
    pub fn plan(&self, manifest: &Manifest) -> VmbuildResult<ExecutionPlan<BuildContext>> {
        let selection = self.contributors.select(manifest)?;
        let set = assemble(
            &self.phases,
            &self.core,
            selection.provider,
            &selection.plugins,
            manifest,
        )?;
        ExecutionPlan::new(set, &self.phases)
    }

    /// Plan and execute a build of `manifest`.
    ///
    /// Planning errors are returned before any task runs. Task failures are not errors
    /// here: they are recorded in the report, together with the rollback that followed.
    pub async fn build(&self, manifest: Manifest) -> VmbuildResult<BuildReport> {
        let plan = self.plan(&manifest)?;

        let workspace_root = self.options.resolve_workspace_root(&manifest);
        let mut ctx = BuildContext::new(manifest, workspace_root);

        tracing::info!(
            build_id = %ctx.build_id,
            name = %ctx.manifest.name,
            provider = %ctx.manifest.provider.name,
            workspace_root = %ctx.workspace_root.display(),
            "Starting build"
        );

        let execution = PipelineExecutor::execute(&plan, &mut ctx, self.options.run_mode()).await;

        Ok(BuildReport {
            build_id: ctx.build_id,
            name: ctx.manifest.name,
            workspace_root: ctx.workspace_root,
            artifacts: ctx.artifacts,
            execution,
        })
    }
}
