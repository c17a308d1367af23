//! Named providers and plugins available to a build.

use std::collections::HashMap;

use vmbuild_shared::errors::{VmbuildError, VmbuildResult};

use super::contributor::{Contributor, SharedContributor};
use crate::manifest::Manifest;

/// Contributors chosen for one manifest.
pub struct Selection<'a, Ctx> {
    pub provider: &'a dyn Contributor<Ctx>,
    /// In manifest order.
    pub plugins: Vec<&'a dyn Contributor<Ctx>>,
}

/// Lookup table of providers and plugins by name.
pub struct ContributorRegistry<Ctx> {
    providers: HashMap<String, SharedContributor<Ctx>>,
    plugins: HashMap<String, SharedContributor<Ctx>>,
}

impl<Ctx> ContributorRegistry<Ctx> {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            plugins: HashMap::new(),
        }
    }

    /// Register a provider. A later registration under the same name replaces it.
    pub fn register_provider(&mut self, provider: SharedContributor<Ctx>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Register a plugin. A later registration under the same name replaces it.
    pub fn register_plugin(&mut self, plugin: SharedContributor<Ctx>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn provider_names(&self) -> Vec<&str> {
        sorted_names(&self.providers)
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        sorted_names(&self.plugins)
    }

    /// Pick the provider and plugins `manifest` asks for.
    ///
    /// # Errors
    /// * [`VmbuildError::UnknownContributor`] - a name is not registered
    /// * [`VmbuildError::Config`] - a plugin is listed more than once
    pub fn select(&self, manifest: &Manifest) -> VmbuildResult<Selection<'_, Ctx>> {
        let provider = self
            .providers
            .get(&manifest.provider.name)
            .ok_or_else(|| VmbuildError::UnknownContributor {
                kind: "provider".into(),
                name: manifest.provider.name.clone(),
            })?;

        let mut plugins: Vec<&dyn Contributor<Ctx>> = Vec::with_capacity(manifest.plugins.len());
        for (i, name) in manifest.plugin_names().enumerate() {
            if manifest.plugin_names().take(i).any(|earlier| earlier == name) {
                return Err(VmbuildError::Config(format!(
                    "plugin `{}` is listed more than once",
                    name
                )));
            }
            let plugin =
                self.plugins
                    .get(name)
                    .ok_or_else(|| VmbuildError::UnknownContributor {
                        kind: "plugin".into(),
                        name: name.to_string(),
                    })?;
            plugins.push(plugin.as_ref());
        }

        tracing::debug!(
            provider = %manifest.provider.name,
            plugins = ?manifest.plugin_names().collect::<Vec<_>>(),
            "Selected contributors"
        );

        Ok(Selection {
            provider: provider.as_ref(),
            plugins,
        })
    }
}

impl<Ctx> Default for ContributorRegistry<Ctx> {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_names<T>(map: &HashMap<String, T>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}
