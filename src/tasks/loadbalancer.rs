//! Load balancer target pool tasks.
//!
//! Go-live keeps the load balancer fixed in place: the new live VM is
//! registered with it and the old live VM deregistered, reassigning
//! liveness without touching DNS.

use tracing::info;

use super::{require_complete, Task, TaskContext, TaskStatus};
use crate::error::{CutoverError, Result};
use crate::poll::TargetHealthProgressChecker;

/// Register an environment's VM with a load balancer and wait for the
/// target to report in-service.
pub struct RegisterWithLoadBalancerTask {
    lb_name: String,
    env: String,
}

impl RegisterWithLoadBalancerTask {
    pub fn new(lb_name: &str, env: &str) -> Self {
        Self {
            lb_name: lb_name.to_string(),
            env: env.to_string(),
        }
    }
}

impl Task for RegisterWithLoadBalancerTask {
    fn name(&self) -> &str {
        "register-with-load-balancer"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        let instance_id = ctx
            .environments
            .require(&self.env)?
            .vm_instance
            .clone()
            .ok_or_else(|| CutoverError::TaskFailed {
                task: self.name().to_string(),
                message: format!("environment '{}' has no VM to register", self.env),
            })?;

        if ctx.noop {
            let health = ctx.provider.instance_health(&self.lb_name, &instance_id);
            match health {
                Ok(h) => info!(
                    "Would register '{}' with '{}' (current health '{}')",
                    instance_id, self.lb_name, h.state
                ),
                Err(_) => info!(
                    "Would register '{}' with '{}' (not currently a target)",
                    instance_id, self.lb_name
                ),
            }
            return Ok(TaskStatus::Noop);
        }

        let initial = ctx.provider.register_instance(&self.lb_name, &instance_id)?;
        let mut checker =
            TargetHealthProgressChecker::new(&self.lb_name, &instance_id, initial, ctx.provider);
        let outcome = ctx.poller.wait_for(&mut checker)?;
        require_complete(
            outcome,
            self.name(),
            &format!(
                "target '{}' on '{}' did not reach in-service",
                instance_id, self.lb_name
            ),
        )?;

        ctx.environments.update(&self.env, |env| {
            env.load_balancer = Some(self.lb_name.clone());
        })?;
        info!(
            "Registered '{}' with load balancer '{}'",
            instance_id, self.lb_name
        );
        Ok(TaskStatus::Done)
    }
}

/// Remove an environment's VM from a load balancer's target pool.
pub struct DeregisterFromLoadBalancerTask {
    lb_name: String,
    env: String,
}

impl DeregisterFromLoadBalancerTask {
    pub fn new(lb_name: &str, env: &str) -> Self {
        Self {
            lb_name: lb_name.to_string(),
            env: env.to_string(),
        }
    }
}

impl Task for DeregisterFromLoadBalancerTask {
    fn name(&self) -> &str {
        "deregister-from-load-balancer"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        let instance_id = match ctx
            .environments
            .get(&self.env)
            .and_then(|env| env.vm_instance.clone())
        {
            Some(id) => id,
            None => {
                info!(
                    "No VM recorded for '{}', nothing to deregister",
                    self.env
                );
                return Ok(if ctx.noop {
                    TaskStatus::Noop
                } else {
                    TaskStatus::Done
                });
            }
        };

        if ctx.noop {
            info!(
                "Would deregister '{}' from '{}'",
                instance_id, self.lb_name
            );
            return Ok(TaskStatus::Noop);
        }

        ctx.provider
            .deregister_instance(&self.lb_name, &instance_id)?;
        ctx.environments.update(&self.env, |env| {
            env.load_balancer = None;
        })?;
        info!(
            "Deregistered '{}' from load balancer '{}'",
            instance_id, self.lb_name
        );
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

    fn store_with_vm(temp: &TempDir, env: &str, vm: &str) -> EnvironmentStore {
        let mut store = EnvironmentStore::open(temp.path()).unwrap();
        let mut model = EnvironmentModel::new(env);
        model.vm_instance = Some(vm.to_string());
        store.put(model).unwrap();
        store
    }

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
    fn register_waits_for_in_service_and_binds_lb() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = store_with_vm(&temp, "prod-green", "i-new");
        let task = RegisterWithLoadBalancerTask::new("lb-main", "prod-green");

        let status = task.execute(&mut ctx(&provider, &mut environments, false)).unwrap();

        assert_eq!(status, TaskStatus::Done);
        assert_eq!(
            environments.get("prod-green").unwrap().load_balancer.as_deref(),
            Some("lb-main")
        );
        assert_eq!(provider.call_count("register-instance"), 1);
    }

    #[test]
    fn register_fails_without_vm() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = EnvironmentStore::open(temp.path()).unwrap();
        environments.put(EnvironmentModel::new("prod-green")).unwrap();
        let task = RegisterWithLoadBalancerTask::new("lb-main", "prod-green");

        let err = task
            .execute(&mut ctx(&provider, &mut environments, false))
            .unwrap_err();

        assert!(err.to_string().contains("no VM"));
    }

    #[test]
    fn register_noop_does_not_register() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = store_with_vm(&temp, "prod-green", "i-new");
        let task = RegisterWithLoadBalancerTask::new("lb-main", "prod-green");

        let status = task.execute(&mut ctx(&provider, &mut environments, true)).unwrap();

        assert_eq!(status, TaskStatus::Noop);
        assert_eq!(provider.call_count("register-instance"), 0);
    }

    #[test]
    fn deregister_clears_lb_binding() {
        let temp = TempDir::new().unwrap();
        let provider = MockProvider::new();
        let mut environments = store_with_vm(&temp, "prod-blue", "i-old");
        let task = DeregisterFromLoadBalancerTask::new("lb-main", "prod-blue");

        let status = task.execute(&mut ctx(&provider, &mut environments, false)).unwrap();

        assert_eq!(status, TaskStatus::Done);
        assert!(environments.get("prod-blue").unwrap().load_balancer.is_none());
        assert_eq!(provider.call_count("deregister-instance"), 1);
    }
}
