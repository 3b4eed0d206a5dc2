//! In-memory provider used by engine, task, and flow tests.
//!
//! Resources advance one lifecycle step per describe call (pending to
//! running, creating to available, and so on), so progress checkers see a
//! realistic multi-poll transition without wall-clock waits. Tests can
//! script explicit status sequences, force operations to fail, or make the
//! provider misreport a snapshot identity.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use super::{
    status, ApplicationApi, ComputeApi, DatabaseApi, DbInstance, LoadBalancerApi, Snapshot,
    TargetHealth, VmInstance,
};
use crate::error::{CutoverError, Result};

#[derive(Default)]
struct MockState {
    snapshot_scripts: HashMap<String, VecDeque<String>>,
    snapshot_instances: HashMap<String, String>,
    snapshot_current: HashMap<String, String>,
    misreported_snapshots: HashMap<String, String>,
    deleted_snapshots: Vec<String>,

    db_scripts: HashMap<String, VecDeque<String>>,
    db_current: HashMap<String, String>,
    deleted_db_instances: Vec<String>,

    vm_scripts: HashMap<String, VecDeque<String>>,
    vm_current: HashMap<String, String>,
    launched: u32,

    health_scripts: HashMap<String, VecDeque<String>>,
    health_current: HashMap<String, String>,

    app_states: HashMap<String, String>,

    fail_operations: HashSet<String>,
    calls: Vec<String>,
}

/// Scriptable in-memory provider.
#[derive(Default)]
pub struct MockProvider {
    state: RefCell<MockState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status sequence observed for a snapshot. The last entry
    /// repeats once the script runs out.
    pub fn script_snapshot<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        snapshot_id: &str,
        statuses: I,
    ) {
        self.state.borrow_mut().snapshot_scripts.insert(
            snapshot_id.to_string(),
            statuses.into_iter().map(Into::into).collect(),
        );
    }

    /// Script the status sequence observed for a database instance.
    pub fn script_db_instance<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        instance_id: &str,
        statuses: I,
    ) {
        self.state.borrow_mut().db_scripts.insert(
            instance_id.to_string(),
            statuses.into_iter().map(Into::into).collect(),
        );
    }

    /// Script the state sequence observed for a VM.
    pub fn script_vm<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        instance_id: &str,
        states: I,
    ) {
        self.state.borrow_mut().vm_scripts.insert(
            instance_id.to_string(),
            states.into_iter().map(Into::into).collect(),
        );
    }

    /// Script the target health sequence for an instance on a load balancer.
    pub fn script_health<I: IntoIterator<Item = S>, S: Into<String>>(
        &self,
        lb_name: &str,
        instance_id: &str,
        states: I,
    ) {
        self.state.borrow_mut().health_scripts.insert(
            format!("{}/{}", lb_name, instance_id),
            states.into_iter().map(Into::into).collect(),
        );
    }

    /// Force the named operation (e.g. "freeze", "create-snapshot") to fail.
    pub fn fail_on(&self, operation: &str) {
        self.state
            .borrow_mut()
            .fail_operations
            .insert(operation.to_string());
    }

    /// Make describe calls for a snapshot report a different identifier.
    pub fn misreport_snapshot(&self, snapshot_id: &str, reported_id: &str) {
        self.state
            .borrow_mut()
            .misreported_snapshots
            .insert(snapshot_id.to_string(), reported_id.to_string());
    }

    pub fn set_app_state(&self, env: &str, state: &str) {
        self.state
            .borrow_mut()
            .app_states
            .insert(env.to_string(), state.to_string());
    }

    /// All recorded operations, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded operations starting with the given prefix.
    pub fn call_count(&self, prefix: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn deleted_snapshots(&self) -> Vec<String> {
        self.state.borrow().deleted_snapshots.clone()
    }

    pub fn deleted_db_instances(&self) -> Vec<String> {
        self.state.borrow().deleted_db_instances.clone()
    }

    fn record(&self, call: String) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let operation = call.split_whitespace().next().unwrap_or("").to_string();
        state.calls.push(call);
        if state.fail_operations.contains(&operation) {
            return Err(CutoverError::ProviderRequest {
                operation,
                message: "forced failure".to_string(),
            });
        }
        Ok(())
    }

    /// Next observed status: scripted entries first (last one repeats),
    /// otherwise one natural lifecycle step from the current status.
    fn advance(
        scripts: &mut HashMap<String, VecDeque<String>>,
        current: &mut HashMap<String, String>,
        key: &str,
        step: fn(&str) -> &str,
        fallback: &str,
    ) -> String {
        if let Some(script) = scripts.get_mut(key) {
            let next = if script.len() > 1 {
                script.pop_front().unwrap_or_default()
            } else {
                script.front().cloned().unwrap_or_default()
            };
            current.insert(key.to_string(), next.clone());
            return next;
        }
        let next = match current.get(key) {
            Some(state) => step(state).to_string(),
            None => fallback.to_string(),
        };
        current.insert(key.to_string(), next.clone());
        next
    }

    fn step_snapshot(state: &str) -> &str {
        match state {
            status::SNAPSHOT_CREATING => status::SNAPSHOT_AVAILABLE,
            other => Self::same(other),
        }
    }

    fn step_db(state: &str) -> &str {
        match state {
            status::DB_CREATING => status::DB_AVAILABLE,
            other => Self::same(other),
        }
    }

    fn step_vm(state: &str) -> &str {
        match state {
            status::VM_PENDING => status::VM_RUNNING,
            status::VM_SHUTTING_DOWN => status::VM_TERMINATED,
            other => Self::same(other),
        }
    }

    fn step_health(state: &str) -> &str {
        match state {
            status::TARGET_REGISTERING => status::TARGET_IN_SERVICE,
            other => Self::same(other),
        }
    }

    fn same(state: &str) -> &str {
        state
    }

    fn reported_snapshot_id(state: &MockState, snapshot_id: &str) -> String {
        state
            .misreported_snapshots
            .get(snapshot_id)
            .cloned()
            .unwrap_or_else(|| snapshot_id.to_string())
    }
}

impl DatabaseApi for MockProvider {
    fn create_snapshot(&self, instance_id: &str, snapshot_id: &str) -> Result<Snapshot> {
        self.record(format!("create-snapshot {} {}", instance_id, snapshot_id))?;
        let mut state = self.state.borrow_mut();
        state
            .snapshot_instances
            .insert(snapshot_id.to_string(), instance_id.to_string());
        let status = {
            let state = &mut *state;
            Self::advance(
                &mut state.snapshot_scripts,
                &mut state.snapshot_current,
                snapshot_id,
                Self::same,
                status::SNAPSHOT_CREATING,
            )
        };
        Ok(Snapshot {
            snapshot_id: Self::reported_snapshot_id(&state, snapshot_id),
            instance_id: instance_id.to_string(),
            status,
        })
    }

    fn describe_snapshot(&self, snapshot_id: &str) -> Result<Snapshot> {
        self.record(format!("describe-snapshot {}", snapshot_id))?;
        let mut state = self.state.borrow_mut();
        let status = {
            let state = &mut *state;
            Self::advance(
                &mut state.snapshot_scripts,
                &mut state.snapshot_current,
                snapshot_id,
                Self::step_snapshot,
                status::SNAPSHOT_AVAILABLE,
            )
        };
        let instance_id = state
            .snapshot_instances
            .get(snapshot_id)
            .cloned()
            .unwrap_or_default();
        Ok(Snapshot {
            snapshot_id: Self::reported_snapshot_id(&state, snapshot_id),
            instance_id,
            status,
        })
    }

    fn delete_snapshot(&self, snapshot_id: &str) -> Result<()> {
        self.record(format!("delete-snapshot {}", snapshot_id))?;
        self.state
            .borrow_mut()
            .deleted_snapshots
            .push(snapshot_id.to_string());
        Ok(())
    }

    fn restore_snapshot(&self, snapshot_id: &str, instance_id: &str) -> Result<DbInstance> {
        self.record(format!("restore-snapshot {} {}", snapshot_id, instance_id))?;
        let mut state = self.state.borrow_mut();
        let status = {
            let state = &mut *state;
            Self::advance(
                &mut state.db_scripts,
                &mut state.db_current,
                instance_id,
                Self::same,
                status::DB_CREATING,
            )
        };
        Ok(DbInstance {
            instance_id: instance_id.to_string(),
            status,
            endpoint: None,
        })
    }

    fn describe_db_instance(&self, instance_id: &str) -> Result<DbInstance> {
        self.record(format!("describe-db-instance {}", instance_id))?;
        let mut state = self.state.borrow_mut();
        let status = {
            let state = &mut *state;
            Self::advance(
                &mut state.db_scripts,
                &mut state.db_current,
                instance_id,
                Self::step_db,
                status::DB_AVAILABLE,
            )
        };
        Ok(DbInstance {
            instance_id: instance_id.to_string(),
            status,
            endpoint: Some(format!("{}.db.internal", instance_id)),
        })
    }

    fn delete_db_instance(&self, instance_id: &str) -> Result<()> {
        self.record(format!("delete-db-instance {}", instance_id))?;
        self.state
            .borrow_mut()
            .deleted_db_instances
            .push(instance_id.to_string());
        Ok(())
    }
}

impl ComputeApi for MockProvider {
    fn launch_instance(&self, env: &str) -> Result<VmInstance> {
        self.record(format!("launch-instance {}", env))?;
        let mut state = self.state.borrow_mut();
        state.launched += 1;
        let instance_id = format!("i-{}-{}", env, state.launched);
        let vm_state = {
            let state = &mut *state;
            Self::advance(
                &mut state.vm_scripts,
                &mut state.vm_current,
                &instance_id,
                Self::same,
                status::VM_PENDING,
            )
        };
        Ok(VmInstance {
            instance_id,
            state: vm_state,
            private_ip: Some("10.0.0.10".to_string()),
        })
    }

    fn describe_instance(&self, instance_id: &str) -> Result<VmInstance> {
        self.record(format!("describe-instance {}", instance_id))?;
        let mut state = self.state.borrow_mut();
        let vm_state = {
            let state = &mut *state;
            Self::advance(
                &mut state.vm_scripts,
                &mut state.vm_current,
                instance_id,
                Self::step_vm,
                status::VM_RUNNING,
            )
        };
        Ok(VmInstance {
            instance_id: instance_id.to_string(),
            state: vm_state,
            private_ip: Some("10.0.0.10".to_string()),
        })
    }

    fn terminate_instance(&self, instance_id: &str) -> Result<VmInstance> {
        self.record(format!("terminate-instance {}", instance_id))?;
        let mut state = self.state.borrow_mut();
        if !state.vm_scripts.contains_key(instance_id) {
            state
                .vm_current
                .insert(instance_id.to_string(), status::VM_SHUTTING_DOWN.to_string());
        }
        let vm_state = state
            .vm_current
            .get(instance_id)
            .cloned()
            .unwrap_or_else(|| status::VM_SHUTTING_DOWN.to_string());
        Ok(VmInstance {
            instance_id: instance_id.to_string(),
            state: vm_state,
            private_ip: None,
        })
    }
}

impl LoadBalancerApi for MockProvider {
    fn register_instance(&self, lb_name: &str, instance_id: &str) -> Result<TargetHealth> {
        self.record(format!("register-instance {} {}", lb_name, instance_id))?;
        let key = format!("{}/{}", lb_name, instance_id);
        let mut state = self.state.borrow_mut();
        let health = {
            let state = &mut *state;
            Self::advance(
                &mut state.health_scripts,
                &mut state.health_current,
                &key,
                Self::same,
                status::TARGET_REGISTERING,
            )
        };
        Ok(TargetHealth {
            instance_id: instance_id.to_string(),
            state: health,
        })
    }

    fn deregister_instance(&self, lb_name: &str, instance_id: &str) -> Result<()> {
        self.record(format!("deregister-instance {} {}", lb_name, instance_id))
    }

    fn instance_health(&self, lb_name: &str, instance_id: &str) -> Result<TargetHealth> {
        self.record(format!("instance-health {} {}", lb_name, instance_id))?;
        let key = format!("{}/{}", lb_name, instance_id);
        let mut state = self.state.borrow_mut();
        let health = {
            let state = &mut *state;
            Self::advance(
                &mut state.health_scripts,
                &mut state.health_current,
                &key,
                Self::step_health,
                status::TARGET_IN_SERVICE,
            )
        };
        Ok(TargetHealth {
            instance_id: instance_id.to_string(),
            state: health,
        })
    }
}

impl ApplicationApi for MockProvider {
    fn application_state(&self, env: &str) -> Result<String> {
        self.record(format!("application-state {}", env))?;
        Ok(self
            .state
            .borrow()
            .app_states
            .get(env)
            .cloned()
            .unwrap_or_else(|| status::APP_RUNNING.to_string()))
    }

    fn freeze(&self, env: &str) -> Result<()> {
        self.record(format!("freeze {}", env))?;
        self.set_app_state(env, status::APP_FROZEN);
        Ok(())
    }

    fn thaw(&self, env: &str) -> Result<()> {
        self.record(format!("thaw {}", env))?;
        self.set_app_state(env, status::APP_RUNNING);
        Ok(())
    }

    fn deploy_packages(&self, env: &str, packages: &[String]) -> Result<()> {
        self.record(format!("deploy-packages {} {}", env, packages.join(",")))
    }

    fn stop_services(&self, env: &str, services: &[String]) -> Result<()> {
        self.record(format!("stop-services {} {}", env, services.join(",")))
    }
}
