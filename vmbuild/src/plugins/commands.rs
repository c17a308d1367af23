//! Plugin: commands.
//!
//! Runs user supplied commands against the workspace during user modification:
//!
//! ```json
//! { "name": "commands",
//!   "settings": { "commands": [
//!       ["touch", "{workspace}/stamp"],
//!       ["echo $HOME > {workspace}/home"]
//!   ] } }
//! ```
//!
//! Every argument is expanded with [`BuildContext::expand`]. A single-element command is
//! run through `sh -c`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use crate::assembly::Contributor;
use crate::catalog::{CREATE_WORKSPACE, log_task_error};
use crate::context::BuildContext;
use crate::manifest::Manifest;
use crate::pipeline::{PipelineTask, TaskDescriptor, TaskSet, phases};
use crate::util::process::run_command;

pub const IMAGE_EXECUTE_COMMAND: &str = "image_execute_command";

const PLUGIN_NAME: &str = "commands";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandsSettings {
    #[serde(default)]
    pub commands: Vec<Vec<String>>,
}

impl CommandsSettings {
    /// Settings of the `commands` plugin in `manifest`; empty when absent.
    pub fn from_manifest(manifest: &Manifest) -> VmbuildResult<Self> {
        match manifest.plugin(PLUGIN_NAME) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                VmbuildError::Config(format!("invalid `{}` plugin settings: {}", PLUGIN_NAME, e))
            }),
        }
    }
}

pub struct CommandsPlugin;

impl Contributor<BuildContext> for CommandsPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn resolve_tasks(&self, taskset: &mut TaskSet<BuildContext>, _manifest: &Manifest) {
        taskset.add(Arc::new(ImageExecuteCommand::new()));
    }
}

pub struct ImageExecuteCommand {
    descriptor: TaskDescriptor,
}

impl ImageExecuteCommand {
    pub fn new() -> Self {
        Self {
            descriptor: TaskDescriptor::new(
                IMAGE_EXECUTE_COMMAND,
                "Executing commands in the image",
                phases::USER_MODIFICATION,
            )
            .after(CREATE_WORKSPACE),
        }
    }
}

impl Default for ImageExecuteCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineTask<BuildContext> for ImageExecuteCommand {
    fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: &mut BuildContext) -> VmbuildResult<()> {
        run_commands(ctx)
            .await
            .inspect_err(|e| log_task_error(&ctx.build_id, self.name(), e))
    }
}

async fn run_commands(ctx: &BuildContext) -> VmbuildResult<()> {
    let settings = CommandsSettings::from_manifest(&ctx.manifest)?;

    for command in &settings.commands {
        let expanded: Vec<String> = command.iter().map(|arg| ctx.expand(arg)).collect();
        let output = run_command(&expanded).await?;
        tracing::debug!(
            command = %expanded.join(" "),
            output_bytes = output.len(),
            "Command finished"
        );
    }

    tracing::info!(count = settings.commands.len(), "Executed commands");
    Ok(())
}
