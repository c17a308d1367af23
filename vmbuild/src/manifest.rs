//! Build manifest.
//!
//! Only the parts the engine needs to select contributors are typed: the image name,
//! the provider name and the ordered plugin list. Everything else is kept as opaque
//! JSON for tasks to read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Image name.
    pub name: String,
    pub provider: ProviderSection,
    /// Plugins, applied in this order.
    #[serde(default)]
    pub plugins: Vec<PluginSection>,
    #[serde(default)]
    pub bootstrapper: BootstrapperSection,
    /// Keys the engine does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSection {
    pub name: String,
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSection {
    pub name: String,
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootstrapperSection {
    /// Directory the build workspace is created in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
}

impl Manifest {
    /// Minimal manifest for the given provider.
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: ProviderSection {
                name: provider.into(),
                settings: Map::new(),
            },
            plugins: Vec::new(),
            bootstrapper: BootstrapperSection::default(),
            extra: Map::new(),
        }
    }

    /// Append a plugin with its settings.
    pub fn with_plugin(mut self, name: impl Into<String>, settings: Value) -> Self {
        self.plugins.push(PluginSection {
            name: name.into(),
            settings,
        });
        self
    }

    /// Read a manifest from a JSON file.
    pub fn load(path: &Path) -> VmbuildResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            VmbuildError::Config(format!(
                "Failed to read manifest '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> VmbuildResult<Self> {
        let manifest: Self = serde_json::from_str(contents)?;
        if manifest.name.trim().is_empty() {
            return Err(VmbuildError::Config("manifest name must not be empty".into()));
        }
        Ok(manifest)
    }

    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(|plugin| plugin.name.as_str())
    }

    /// Settings of the named plugin, if it is enabled.
    pub fn plugin(&self, name: &str) -> Option<&Value> {
        self.plugins
            .iter()
            .find(|plugin| plugin.name == name)
            .map(|plugin| &plugin.settings)
    }

    pub fn has_plugin(&self, name: &str) -> bool {
        self.plugin(name).is_some()
    }
}
