//! Task-set assembly.
//!
//! A build's working set is produced by an ordered list of contributors, each of which
//! receives the set and the manifest explicitly:
//!
//! ```text
//! core catalog ──→ provider ──→ plugin 1 ──→ ... ──→ plugin n ──→ freeze
//!                                (manifest order)
//! ```
//!
//! Contributors may add tasks (adding a present id is a no-op) and discard tasks by id
//! (discarding an absent id is a no-op). Freezing resolves phases; an unknown phase
//! aborts assembly.

mod assembler;
mod contributor;
mod registry;

pub use assembler::assemble;
pub use contributor::{Contributor, CoreCatalog, FnContributor, SharedContributor};
pub use registry::{ContributorRegistry, Selection};
