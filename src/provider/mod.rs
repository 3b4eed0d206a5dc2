//! Provider gateway clients.
//!
//! Every piece of infrastructure cutover touches (databases, VMs, load
//! balancers, the application control plane) sits behind a trait here, so
//! tasks and progress checkers never talk to a concrete transport. The
//! shipped implementations are [`HttpProvider`] for the real gateway and
//! [`MockProvider`] for tests.
//!
//! Provider status fields are strings from a small closed vocabulary (see
//! [`status`]); classification of those strings belongs to the progress
//! checkers, not to the clients.

pub mod http;
pub mod mock;

pub use http::HttpProvider;
pub use mock::MockProvider;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Status vocabulary reported by the provider gateway.
pub mod status {
    pub const SNAPSHOT_CREATING: &str = "creating";
    pub const SNAPSHOT_AVAILABLE: &str = "available";

    pub const DB_CREATING: &str = "creating";
    pub const DB_AVAILABLE: &str = "available";

    pub const VM_PENDING: &str = "pending";
    pub const VM_RUNNING: &str = "running";
    pub const VM_SHUTTING_DOWN: &str = "shutting-down";
    pub const VM_TERMINATED: &str = "terminated";

    pub const TARGET_REGISTERING: &str = "registering";
    pub const TARGET_IN_SERVICE: &str = "in-service";

    pub const APP_RUNNING: &str = "running";
    pub const APP_FROZEN: &str = "frozen";
}

/// A database snapshot as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    pub instance_id: String,
    pub status: String,
}

/// A database instance as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInstance {
    pub instance_id: String,
    pub status: String,
    pub endpoint: Option<String>,
}

/// A virtual machine as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInstance {
    pub instance_id: String,
    pub state: String,
    pub private_ip: Option<String>,
}

/// Health of one registered load balancer target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHealth {
    pub instance_id: String,
    pub state: String,
}

/// Database snapshot and instance operations.
pub trait DatabaseApi {
    /// Request a snapshot of an instance. The response echoes the snapshot
    /// identity and its initial status.
    fn create_snapshot(&self, instance_id: &str, snapshot_id: &str) -> Result<Snapshot>;

    fn describe_snapshot(&self, snapshot_id: &str) -> Result<Snapshot>;

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<()>;

    /// Restore a snapshot into a new database instance.
    fn restore_snapshot(&self, snapshot_id: &str, instance_id: &str) -> Result<DbInstance>;

    fn describe_db_instance(&self, instance_id: &str) -> Result<DbInstance>;

    fn delete_db_instance(&self, instance_id: &str) -> Result<()>;
}

/// Virtual machine lifecycle operations.
pub trait ComputeApi {
    /// Launch the application VM for an environment.
    fn launch_instance(&self, env: &str) -> Result<VmInstance>;

    fn describe_instance(&self, instance_id: &str) -> Result<VmInstance>;

    /// Request termination. The response echoes the instance with its
    /// transitional state.
    fn terminate_instance(&self, instance_id: &str) -> Result<VmInstance>;
}

/// Load balancer target pool operations.
pub trait LoadBalancerApi {
    /// Register an instance with a load balancer. The response carries the
    /// target's initial health state.
    fn register_instance(&self, lb_name: &str, instance_id: &str) -> Result<TargetHealth>;

    fn deregister_instance(&self, lb_name: &str, instance_id: &str) -> Result<()>;

    fn instance_health(&self, lb_name: &str, instance_id: &str) -> Result<TargetHealth>;
}

/// Application control plane operations.
pub trait ApplicationApi {
    /// Current application state for an environment (see [`status`]).
    fn application_state(&self, env: &str) -> Result<String>;

    /// Freeze the application so no writes occur during database work.
    fn freeze(&self, env: &str) -> Result<()>;

    fn thaw(&self, env: &str) -> Result<()>;

    fn deploy_packages(&self, env: &str, packages: &[String]) -> Result<()>;

    fn stop_services(&self, env: &str, services: &[String]) -> Result<()>;
}

/// The full provider surface a job run needs.
pub trait Provider: DatabaseApi + ComputeApi + LoadBalancerApi + ApplicationApi {}

impl<T: DatabaseApi + ComputeApi + LoadBalancerApi + ApplicationApi> Provider for T {}
