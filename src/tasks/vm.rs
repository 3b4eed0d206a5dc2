//! VM lifecycle tasks.

use tracing::info;

use super::{require_complete, Task, TaskContext, TaskStatus};
use crate::poll::VmStateProgressChecker;
use crate::error::Result;

/// Launch the application VM for an environment and wait for it to run.
pub struct LaunchVmTask {
    env: String,
}

impl LaunchVmTask {
    pub fn new(env: &str) -> Self {
        Self {
            env: env.to_string(),
        }
    }
}

impl Task for LaunchVmTask {
    fn name(&self) -> &str {
        "launch-vm"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        if let Some(existing) = ctx
            .environments
            .get(&self.env)
            .and_then(|env| env.vm_instance.clone())
        {
            // a prior attempt already launched it
            info!(
                "Environment '{}' already has VM '{}', not launching another",
                self.env, existing
            );
            return Ok(TaskStatus::Done);
        }

        if ctx.noop {
            info!("Would launch application VM for '{}'", self.env);
            return Ok(TaskStatus::Noop);
        }

        let initial = ctx.provider.launch_instance(&self.env)?;
        let instance_id = initial.instance_id.clone();
        let mut checker = VmStateProgressChecker::until_running(initial, ctx.provider);
        let outcome = ctx.poller.wait_for(&mut checker)?;
        let vm = require_complete(
            outcome,
            self.name(),
            &format!("instance '{}' did not reach running", instance_id),
        )?;

        ctx.environments.update(&self.env, |env| {
            env.vm_instance = Some(vm.instance_id.clone());
        })?;
        info!("Launched VM '{}' for '{}'", vm.instance_id, self.env);
        Ok(TaskStatus::Done)
    }
}

/// Terminate an environment's VM and wait for it to disappear.
pub struct TerminateVmTask {
    env: String,
}

impl TerminateVmTask {
    pub fn new(env: &str) -> Self {
        Self {
            env: env.to_string(),
        }
    }
}

impl Task for TerminateVmTask {
    fn name(&self) -> &str {
        "terminate-vm"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        let instance_id = match ctx
            .environments
            .get(&self.env)
            .and_then(|env| env.vm_instance.clone())
        {
            Some(id) => id,
            None => {
                info!("No VM recorded for '{}', nothing to terminate", self.env);
                return Ok(if ctx.noop {
                    TaskStatus::Noop
                } else {
                    TaskStatus::Done
                });
            }
        };

        if ctx.noop {
            info!("Would terminate VM '{}' of '{}'", instance_id, self.env);
            return Ok(TaskStatus::Noop);
        }

        let initial = ctx.provider.terminate_instance(&instance_id)?;
        let mut checker = VmStateProgressChecker::until_terminated(initial, ctx.provider);
        let outcome = ctx.poller.wait_for(&mut checker)?;
        require_complete(
            outcome,
            self.name(),
            &format!("instance '{}' did not reach terminated", instance_id),
        )?;

        ctx.environments.update(&self.env, |env| {
            env.vm_instance = None;
        })?;
        info!("Terminated VM '{}' of '{}'", instance_id, self.env);
        Ok(TaskStatus::Done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnvironmentModel, EnvironmentStore};
    use crate::poll::{Poller, WaitPolicy};
    use crate::provider::{ComputeApi, MockProvider};
    use std::time::Duration;
    use tempfile::TempDir;

    fn ctx<'a>(
        provider: &'a MockProvider,
        environments: &'a mut EnvironmentStore,
        noop: bool,
    ) -> TaskContext<'a> {
        TaskContext {
            noop,
            force: false,
            provider,
            environments,
            poller: Poller::new(WaitPolicy::new(Duration::ZERO, 3)),
        }
    }

    #[test]
    fn launch_records_instance_on_environment() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        let task = LaunchVmTask::new("stage");

        let status = task.execute(&mut ctx(&provider, &mut environments, false)).unwrap();

        assert_eq!(status, TaskStatus::Done);
        assert_eq!(
            environments.get("stage").unwrap().vm_instance.as_deref(),
            Some("i-stage-1")
        );
    }

    #[test]
    fn launch_skips_when_vm_already_recorded() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        let mut stage = EnvironmentModel::new("stage");
        stage.vm_instance = Some("i-existing".to_string());
        environments.put(stage).unwrap();
        let task = LaunchVmTask::new("stage");

        let status = task.execute(&mut ctx(&provider, &mut environments, false)).unwrap();

        assert_eq!(status, TaskStatus::Done);
        assert_eq!(provider.call_count("launch-instance"), 0);
    }

    #[test]
    fn launch_noop_launches_nothing() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        let task = LaunchVmTask::new("stage");

        let status = task.execute(&mut ctx(&provider, &mut environments, true)).unwrap();

        assert_eq!(status, TaskStatus::Noop);
        assert!(provider.calls().is_empty());
        assert!(environments.get("stage").is_none());
    }

    #[test]
    fn terminate_clears_instance_binding() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let launched = provider.launch_instance("old-live").unwrap();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        let mut env = EnvironmentModel::new("old-live");
        env.vm_instance = Some(launched.instance_id.clone());
        environments.put(env).unwrap();
        let task = TerminateVmTask::new("old-live");

        let status = task.execute(&mut ctx(&provider, &mut environments, false)).unwrap();

        assert_eq!(status, TaskStatus::Done);
        assert!(environments.get("old-live").unwrap().vm_instance.is_none());
        assert_eq!(provider.call_count("terminate-instance"), 1);
    }

    #[test]
    fn terminate_without_recorded_vm_is_done() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        let task = TerminateVmTask::new("old-live");

        let status = task.execute(&mut ctx(&provider, &mut environments, false)).unwrap();

        assert_eq!(status, TaskStatus::Done);
        assert!(provider.calls().is_empty());
    }
}
