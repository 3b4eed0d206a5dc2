//! Blocking HTTP implementation of the provider traits.
//!
//! Talks JSON to the provider gateway configured in `provider_url`. All
//! calls are synchronous; the engine runs one task at a time and polling
//! already bounds how long a single await may block.

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

use super::{
    ApplicationApi, ComputeApi, DatabaseApi, DbInstance, LoadBalancerApi, Snapshot, TargetHealth,
    VmInstance,
};
use crate::error::{CutoverError, Result};

/// Request timeout for a single gateway call. Long waits are handled by
/// polling, not by long HTTP requests.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Provider gateway client over HTTP.
pub struct HttpProvider {
    base_url: String,
    client: Client,
}

impl HttpProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("cutover/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| CutoverError::ProviderRequest {
                operation: "client-init".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request_error(operation: &str, message: impl ToString) -> CutoverError {
        CutoverError::ProviderRequest {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    fn check(operation: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let message = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body.trim())
            };
            return Err(Self::request_error(operation, message));
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, operation: &str, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|e| Self::request_error(operation, e))?;
        Self::check(operation, response)?
            .json()
            .map_err(|e| Self::request_error(operation, e))
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(|e| Self::request_error(operation, e))?;
        Self::check(operation, response)?
            .json()
            .map_err(|e| Self::request_error(operation, e))
    }

    fn post_unit<B: Serialize>(&self, operation: &str, path: &str, body: &B) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(|e| Self::request_error(operation, e))?;
        Self::check(operation, response)?;
        Ok(())
    }

    fn delete_unit(&self, operation: &str, path: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(path))
            .send()
            .map_err(|e| Self::request_error(operation, e))?;
        Self::check(operation, response)?;
        Ok(())
    }
}

impl DatabaseApi for HttpProvider {
    fn create_snapshot(&self, instance_id: &str, snapshot_id: &str) -> Result<Snapshot> {
        self.post_json(
            "create-snapshot",
            &format!("databases/{}/snapshots", instance_id),
            &json!({ "snapshot_id": snapshot_id }),
        )
    }

    fn describe_snapshot(&self, snapshot_id: &str) -> Result<Snapshot> {
        self.get_json("describe-snapshot", &format!("snapshots/{}", snapshot_id))
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.delete_unit("delete-snapshot", &format!("snapshots/{}", snapshot_id))
    }

    fn restore_snapshot(&self, snapshot_id: &str, instance_id: &str) -> Result<DbInstance> {
        self.post_json(
            "restore-snapshot",
            &format!("snapshots/{}/restore", snapshot_id),
            &json!({ "instance_id": instance_id }),
        )
    }

    fn describe_db_instance(&self, instance_id: &str) -> Result<DbInstance> {
        self.get_json(
            "describe-db-instance",
            &format!("databases/{}", instance_id),
        )
    }

    fn delete_db_instance(&self, instance_id: &str) -> Result<()> {
        self.delete_unit("delete-db-instance", &format!("databases/{}", instance_id))
    }
}

impl ComputeApi for HttpProvider {
    fn launch_instance(&self, env: &str) -> Result<VmInstance> {
        self.post_json("launch-instance", "instances", &json!({ "env": env }))
    }

    fn describe_instance(&self, instance_id: &str) -> Result<VmInstance> {
        self.get_json("describe-instance", &format!("instances/{}", instance_id))
    }

    fn terminate_instance(&self, instance_id: &str) -> Result<VmInstance> {
        self.post_json(
            "terminate-instance",
            &format!("instances/{}/terminate", instance_id),
            &json!({}),
        )
    }
}

impl LoadBalancerApi for HttpProvider {
    fn register_instance(&self, lb_name: &str, instance_id: &str) -> Result<TargetHealth> {
        self.post_json(
            "register-instance",
            &format!("loadbalancers/{}/targets", lb_name),
            &json!({ "instance_id": instance_id }),
        )
    }

    fn deregister_instance(&self, lb_name: &str, instance_id: &str) -> Result<()> {
        self.delete_unit(
            "deregister-instance",
            &format!("loadbalancers/{}/targets/{}", lb_name, instance_id),
        )
    }

    fn instance_health(&self, lb_name: &str, instance_id: &str) -> Result<TargetHealth> {
        self.get_json(
            "instance-health",
            &format!("loadbalancers/{}/targets/{}", lb_name, instance_id),
        )
    }
}

impl ApplicationApi for HttpProvider {
    fn application_state(&self, env: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct AppState {
            state: String,
        }
        let state: AppState =
            self.get_json("application-state", &format!("applications/{}", env))?;
        Ok(state.state)
    }

    fn freeze(&self, env: &str) -> Result<()> {
        self.post_unit("freeze", &format!("applications/{}/freeze", env), &json!({}))
    }

    fn thaw(&self, env: &str) -> Result<()> {
        self.post_unit("thaw", &format!("applications/{}/thaw", env), &json!({}))
    }

    fn deploy_packages(&self, env: &str, packages: &[String]) -> Result<()> {
        self.post_unit(
            "deploy-packages",
            &format!("applications/{}/deploy", env),
            &json!({ "packages": packages }),
        )
    }

    fn stop_services(&self, env: &str, services: &[String]) -> Result<()> {
        self.post_unit(
            "stop-services",
            &format!("applications/{}/stop-services", env),
            &json!({ "services": services }),
        )
    }
}
