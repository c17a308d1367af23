//! Error types for vmbuild.
//!
//! One enum covers every stage of a build:
//!
//! - Assembly: [`VmbuildError::UnknownPhase`], [`VmbuildError::UnknownContributor`],
//!   [`VmbuildError::Config`]
//! - Graph building: [`VmbuildError::DependencyCycle`], [`VmbuildError::PhaseConflict`]
//! - Execution: [`VmbuildError::Task`], [`VmbuildError::Command`], I/O and serialization
//! - Outcome: [`VmbuildError::BuildFailed`] bundles a task failure with rollback failures

use thiserror::Error;

pub type VmbuildResult<T> = Result<T, VmbuildError>;

#[derive(Debug, Error)]
pub enum VmbuildError {
    /// Invalid options, manifest contents or registry setup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A task declares a phase the registry does not know.
    #[error("task `{task}` references unknown phase `{phase}`")]
    UnknownPhase { task: String, phase: String },

    /// The manifest selects a provider or plugin nobody registered.
    #[error("unknown {kind} `{name}`")]
    UnknownContributor { kind: String, name: String },

    /// Explicit ordering edges form a cycle.
    ///
    /// `cycle` lists the members in edge order; `edges` holds each `(from, to)` pair,
    /// including the one closing the cycle.
    #[error("dependency cycle: {}", format_cycle(.cycle))]
    DependencyCycle {
        cycle: Vec<String>,
        edges: Vec<(String, String)>,
    },

    /// An edge requires a task to run before another task from an earlier phase.
    #[error(
        "task `{before}` ({before_phase}) must run before `{after}` ({after_phase}), but its phase is later"
    )]
    PhaseConflict {
        before: String,
        before_phase: String,
        after: String,
        after_phase: String,
    },

    /// A task reported failure from its run entry point.
    #[error("task `{task}` failed: {message}")]
    Task { task: String, message: String },

    /// An external process exited unsuccessfully.
    #[error("command `{command}` exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    /// Execution stopped at `task`; rollback ran afterwards.
    #[error("build failed at `{task}`: {message}{}", format_rollback_failures(.rollback_failures))]
    BuildFailed {
        task: String,
        message: String,
        rollback_failures: Vec<String>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VmbuildError {
    /// Shorthand for a task-reported failure.
    pub fn task(task: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Task {
            task: task.into(),
            message: message.into(),
        }
    }

    /// True for errors raised before anything executed.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownPhase { .. }
                | Self::UnknownContributor { .. }
                | Self::DependencyCycle { .. }
                | Self::PhaseConflict { .. }
        )
    }
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => {
            let mut path = cycle.join(" -> ");
            path.push_str(" -> ");
            path.push_str(first);
            path
        }
        None => String::from("<empty>"),
    }
}

fn format_rollback_failures(failures: &[String]) -> String {
    if failures.is_empty() {
        String::new()
    } else {
        format!(" (rollback failed: {})", failures.join("; "))
    }
}
