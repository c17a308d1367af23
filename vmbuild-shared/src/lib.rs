//! Types shared between the vmbuild engine and its front ends.

pub mod errors;

pub use errors::{VmbuildError, VmbuildResult};
