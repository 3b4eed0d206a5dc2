//! Task definitions and execution context.
//!
//! A task is one step of a job: a single unit of infrastructure change or
//! inspection. Tasks are constructed by job assembly with their parameters
//! baked in, execute strictly in sequence, and report a terminal
//! [`TaskStatus`]. In noop mode a task performs read-only inspection only
//! and reports what it would have done.

pub mod application;
pub mod database;
pub mod environment;
pub mod loadbalancer;
pub mod vm;

pub use application::{
    DeployPackagesTask, FreezeApplicationTask, StopServicesTask, ThawApplicationTask,
};
pub use database::{
    DeleteDatabasesTask, DeleteSnapshotsTask, RestoreDatabasesTask, SnapshotDatabasesTask,
};
pub use environment::ForgetEnvironmentTask;
pub use loadbalancer::{DeregisterFromLoadBalancerTask, RegisterWithLoadBalancerTask};
pub use vm::{LaunchVmTask, TerminateVmTask};

use crate::error::{CutoverError, Result};
use crate::model::EnvironmentStore;
use crate::poll::{PollOutcome, Poller};
use crate::provider::Provider;

/// Terminal status reported by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Work performed and finished.
    Done,
    /// Noop mode: inspected only, no side effects.
    Noop,
    /// Work could not be completed.
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Done => "done",
            TaskStatus::Noop => "noop",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Shared state handed to every task in a job run.
pub struct TaskContext<'a> {
    /// Inspect only, no mutating side effects.
    pub noop: bool,
    /// Rerun everything, ignore prior history.
    pub force: bool,
    pub provider: &'a dyn Provider,
    pub environments: &'a mut EnvironmentStore,
    pub poller: Poller,
}

/// One step within a job, occupying a fixed position.
pub trait Task {
    /// Human-readable step name, recorded in job history.
    fn name(&self) -> &str;

    /// Perform the step's work (or its noop inspection) and report a
    /// terminal status. Errors are classified as failure by the engine.
    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus>;
}

/// Deterministic id for the snapshot of a live logical database taken
/// during staging deploy. Keeping the name derivable lets a resumed
/// staging-deploy and a later rollback-stage agree on it without extra
/// persisted state.
pub fn snapshot_name(live_env: &str, logical_db: &str) -> String {
    format!("{}-{}-stage", live_env, logical_db)
}

/// Unwrap a poll outcome into its success payload, or fail the task with
/// the outcome's reason (terminal provider failure or timeout).
pub(crate) fn require_complete<T>(
    outcome: PollOutcome<T>,
    task: &str,
    awaited: &str,
) -> Result<T> {
    match outcome {
        PollOutcome::Complete(value) => Ok(value),
        other => Err(CutoverError::TaskFailed {
            task: task.to_string(),
            message: format!("{}: {}", awaited, other.describe()),
        }),
    }
}
