//! Application control plane tasks: freeze, thaw, deploy, stop services.

use tracing::info;

use super::{Task, TaskContext, TaskStatus};
use crate::error::Result;

/// Freeze the application on an environment so no writes occur while its
/// database is being copied or its liveness reassigned.
pub struct FreezeApplicationTask {
    env: String,
}

impl FreezeApplicationTask {
    pub fn new(env: &str) -> Self {
        Self {
            env: env.to_string(),
        }
    }
}

impl Task for FreezeApplicationTask {
    fn name(&self) -> &str {
        "freeze-application"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        if ctx.noop {
            let state = ctx.provider.application_state(&self.env)?;
            info!(
                "Would freeze application on '{}' (currently '{}')",
                self.env, state
            );
            return Ok(TaskStatus::Noop);
        }

        ctx.provider.freeze(&self.env)?;
        info!("Froze application on '{}'", self.env);
        Ok(TaskStatus::Done)
    }
}

/// Thaw a previously frozen application.
pub struct ThawApplicationTask {
    env: String,
}

impl ThawApplicationTask {
    pub fn new(env: &str) -> Self {
        Self {
            env: env.to_string(),
        }
    }
}

impl Task for ThawApplicationTask {
    fn name(&self) -> &str {
        "thaw-application"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        if ctx.noop {
            let state = ctx.provider.application_state(&self.env)?;
            info!(
                "Would thaw application on '{}' (currently '{}')",
                self.env, state
            );
            return Ok(TaskStatus::Noop);
        }

        ctx.provider.thaw(&self.env)?;
        info!("Thawed application on '{}'", self.env);
        Ok(TaskStatus::Done)
    }
}

/// Deploy the requested packages to an environment. The packages differ
/// from what runs on live; the package repository resolves them.
pub struct DeployPackagesTask {
    env: String,
    packages: Vec<String>,
}

impl DeployPackagesTask {
    pub fn new(env: &str, packages: Vec<String>) -> Self {
        Self {
            env: env.to_string(),
            packages,
        }
    }
}

impl Task for DeployPackagesTask {
    fn name(&self) -> &str {
        "deploy-packages"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        if self.packages.is_empty() {
            info!("No packages requested for '{}'", self.env);
            return Ok(if ctx.noop {
                TaskStatus::Noop
            } else {
                TaskStatus::Done
            });
        }

        if ctx.noop {
            info!(
                "Would deploy to '{}': {}",
                self.env,
                self.packages.join(", ")
            );
            return Ok(TaskStatus::Noop);
        }

        ctx.provider.deploy_packages(&self.env, &self.packages)?;
        info!(
            "Deployed {} package(s) to '{}'",
            self.packages.len(),
            self.env
        );
        Ok(TaskStatus::Done)
    }
}

/// Gracefully stop services on an environment prior to VM deletion.
pub struct StopServicesTask {
    env: String,
    services: Vec<String>,
}

impl StopServicesTask {
    pub fn new(env: &str, services: Vec<String>) -> Self {
        Self {
            env: env.to_string(),
            services,
        }
    }
}

impl Task for StopServicesTask {
    fn name(&self) -> &str {
        "stop-services"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        if self.services.is_empty() {
            info!("No services to stop on '{}'", self.env);
            return Ok(if ctx.noop {
                TaskStatus::Noop
            } else {
                TaskStatus::Done
            });
        }

        if ctx.noop {
            info!(
                "Would stop services on '{}': {}",
                self.env,
                self.services.join(", ")
            );
            return Ok(TaskStatus::Noop);
        }

        ctx.provider.stop_services(&self.env, &self.services)?;
        info!(
            "Stopped {} service(s) on '{}'",
            self.services.len(),
            self.env
        );
        Ok(TaskStatus::Done)
    }
}
