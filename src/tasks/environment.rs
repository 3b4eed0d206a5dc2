//! Environment registry bookkeeping tasks.

use tracing::info;

use super::{Task, TaskContext, TaskStatus};
use crate::error::Result;

/// Remove a torn-down environment from the registry. Runs last in the
/// teardown jobs, after its resources are gone.
pub struct ForgetEnvironmentTask {
    env: String,
}

impl ForgetEnvironmentTask {
    pub fn new(env: &str) -> Self {
        Self {
            env: env.to_string(),
        }
    }
}

impl Task for ForgetEnvironmentTask {
    fn name(&self) -> &str {
        "forget-environment"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        if ctx.noop {
            info!("Would remove '{}' from the environment registry", self.env);
            return Ok(TaskStatus::Noop);
        }

        ctx.environments.remove(&self.env)?;
        info!("Removed '{}' from the environment registry", self.env);
        Ok(TaskStatus::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnvironmentModel, EnvironmentStore};
    use crate::poll::{Poller, WaitPolicy};
    use crate::provider::MockProvider;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn forget_removes_environment() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        environments.put(EnvironmentModel::new("stage")).unwrap();

        let task = ForgetEnvironmentTask::new("stage");
        let mut ctx = TaskContext {
            noop: false,
            force: false,
            provider: &provider,
            environments: &mut environments,
            poller: Poller::new(WaitPolicy::new(Duration::ZERO, 3)),
        };

        assert_eq!(task.execute(&mut ctx).unwrap(), TaskStatus::Done);
        assert!(!environments.exists("stage"));
    }

    #[test]
    fn forget_noop_keeps_environment() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        environments.put(EnvironmentModel::new("stage")).unwrap();

        let task = ForgetEnvironmentTask::new("stage");
        let mut ctx = TaskContext {
            noop: true,
            force: false,
            provider: &provider,
            environments: &mut environments,
            poller: Poller::new(WaitPolicy::new(Duration::ZERO, 3)),
        };

        assert_eq!(task.execute(&mut ctx).unwrap(), TaskStatus::Noop);
        assert!(environments.exists("stage"));
    }
}
