//! vmbuild: a task-graph engine for building bootable VM images.
//!
//! A build is described by a [`Manifest`]. The selected provider and plugins edit a
//! working set of tasks, which is frozen, ordered by phase and explicit dependencies,
//! and executed one task at a time. When a task fails, the counterparts of completed
//! tasks run in reverse completion order.
//!
//! See [`pipeline`] for the engine and [`ImageBuilder`] for the wiring.

pub mod assembly;
mod builder;
pub mod catalog;
pub mod context;
pub mod logging;
pub mod manifest;
pub mod options;
pub mod pipeline;
pub mod plugins;
pub mod providers;
pub mod util;

pub use builder::{BuildReport, ImageBuilder};
pub use context::{BuildContext, BuildId};
pub use manifest::Manifest;
pub use options::BuildOptions;
pub use vmbuild_shared::errors::{VmbuildError, VmbuildResult};
