//! Built-in providers.
//!
//! A provider contributes the tasks that turn a prepared workspace into an image for
//! one target platform. Exactly one provider is selected per build, by the manifest's
//! `provider.name`.

mod local;

use std::sync::Arc;

use crate::assembly::SharedContributor;
use crate::context::BuildContext;

pub use local::{ADD_PACKAGES, AddPackages, LocalProvider, WRITE_BUILD_INFO, WriteBuildInfo};

pub fn builtin_providers() -> Vec<SharedContributor<BuildContext>> {
    vec![Arc::new(LocalProvider)]
}
