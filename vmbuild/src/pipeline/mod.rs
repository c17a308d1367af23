//! Task graph engine.
//!
//! ## Architecture
//!
//! ```text
//! TaskSet ──freeze──→ ResolvedTaskSet ──graph──→ ExecutionPlan ──→ PipelineExecutor
//!                                                                     │ on failure
//!                                                                     ↓
//!                                                               RollbackResolver
//!
//! - TaskSet: mutable working set edited by contributors during assembly
//! - ResolvedTaskSet: frozen set with every task's phase resolved
//! - ExecutionPlan: deterministic total order (phase, then explicit edges, then insertion)
//! - PipelineExecutor: runs tasks one at a time and records the completion ledger
//! - RollbackResolver: runs counterparts of completed tasks, newest first
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use vmbuild::pipeline::{ExecutionPlan, FnTask, PhaseRegistry, PipelineExecutor, RunMode,
//!     TaskDescriptor, TaskSet, phases};
//!
//! let registry = PhaseRegistry::standard();
//! let mut set = TaskSet::new();
//! set.add(FnTask::noop(TaskDescriptor::new("prepare", "Preparing", phases::PREPARATION)).boxed());
//!
//! let plan = ExecutionPlan::new(set.freeze(&registry)?, &registry)?;
//! let report = PipelineExecutor::execute(&plan, &mut ctx, RunMode::Execute).await;
//! println!("build took {}ms", report.total_duration_ms);
//! ```

mod graph;
mod ledger;
mod mode;
mod phase;
#[allow(clippy::module_inception)]
mod pipeline;
mod report;
mod rollback;
mod task;
mod taskset;

pub use graph::order;
pub use ledger::CompletionLedger;
pub use mode::RunMode;
pub use phase::{Phase, PhaseRank, PhaseRegistry, phases};
pub use pipeline::{ExecutionPlan, PipelineExecutor};
pub use report::{
    ExecutionReport, RollbackReport, RollbackStep, TaskFailure, TaskOutcome, TaskStatus,
};
pub use rollback::RollbackResolver;
pub use task::{BoxedTask, FnTask, PipelineTask, TaskDescriptor, TaskId};
pub use taskset::{ResolvedTask, ResolvedTaskSet, TaskSet};
