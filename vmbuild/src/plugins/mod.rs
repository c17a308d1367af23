//! Built-in plugins.
//!
//! Plugins are enabled by listing them under `plugins` in the manifest and are applied
//! in that order, after the provider.

mod commands;
mod keep_workspace;

use std::sync::Arc;

use crate::assembly::SharedContributor;
use crate::context::BuildContext;

pub use commands::{CommandsPlugin, CommandsSettings, IMAGE_EXECUTE_COMMAND, ImageExecuteCommand};
pub use keep_workspace::KeepWorkspacePlugin;

pub fn builtin_plugins() -> Vec<SharedContributor<BuildContext>> {
    vec![Arc::new(CommandsPlugin), Arc::new(KeepWorkspacePlugin)]
}
