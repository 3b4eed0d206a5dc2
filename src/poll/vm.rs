//! Progress checking for VM state transitions.

use tracing::{debug, error};

use super::{CheckState, PollOutcome, ProgressChecker};
use crate::error::{CutoverError, Result};
use crate::provider::{status, ComputeApi, VmInstance};

/// Waits for a VM to reach a target state, tolerating a fixed set of
/// transitional states along the way. Used both for launch (pending to
/// running) and teardown (running to terminated).
pub struct VmStateProgressChecker<'a> {
    instance_id: String,
    target: &'static str,
    transitional: &'static [&'static str],
    compute: &'a dyn ComputeApi,
    initial: Option<VmInstance>,
    state: CheckState<VmInstance>,
}

impl<'a> VmStateProgressChecker<'a> {
    /// Await a freshly launched VM reaching 'running'.
    pub fn until_running(initial: VmInstance, compute: &'a dyn ComputeApi) -> Self {
        Self::new(initial, status::VM_RUNNING, &[status::VM_PENDING], compute)
    }

    /// Await a terminating VM reaching 'terminated'.
    pub fn until_terminated(initial: VmInstance, compute: &'a dyn ComputeApi) -> Self {
        Self::new(
            initial,
            status::VM_TERMINATED,
            &[status::VM_RUNNING, status::VM_SHUTTING_DOWN],
            compute,
        )
    }

    fn new(
        initial: VmInstance,
        target: &'static str,
        transitional: &'static [&'static str],
        compute: &'a dyn ComputeApi,
    ) -> Self {
        Self {
            instance_id: initial.instance_id.clone(),
            target,
            transitional,
            compute,
            initial: Some(initial),
            state: CheckState::Pending,
        }
    }

    fn check_identity(&self, vm: &VmInstance) -> Result<()> {
        if vm.instance_id != self.instance_id {
            return Err(CutoverError::ProviderMismatch {
                resource: "instance".to_string(),
                requested: self.instance_id.clone(),
                reported: vm.instance_id.clone(),
            });
        }
        Ok(())
    }

    fn classify(&mut self, vm: VmInstance) {
        if vm.state == self.target {
            self.state = CheckState::Complete(vm);
        } else if self.transitional.contains(&vm.state.as_str()) {
            // keep trying
        } else {
            error!(
                "Instance '{}': unexpected state '{}' while waiting for '{}'",
                self.instance_id, vm.state, self.target
            );
            self.state = CheckState::Failed(format!(
                "unexpected instance state '{}' while waiting for '{}'",
                vm.state, self.target
            ));
        }
    }
}

impl ProgressChecker for VmStateProgressChecker<'_> {
    type Output = VmInstance;

    fn description(&self) -> String {
        format!("instance '{}' reaching '{}'", self.instance_id, self.target)
    }

    fn initial_check(&mut self) -> Result<()> {
        let initial = self.initial.take().ok_or_else(|| CutoverError::TaskFailed {
            task: "vm-state-check".to_string(),
            message: "initial instance response consumed twice".to_string(),
        })?;
        debug!("Initial instance state: {}", initial.state);
        self.check_identity(&initial)?;
        self.classify(initial);
        Ok(())
    }

    fn followup_check(&mut self, wait_num: u32) -> Result<()> {
        let vm = self.compute.describe_instance(&self.instance_id)?;
        self.check_identity(&vm)?;
        debug!(
            "Instance '{}' state after wait #{}: {}",
            self.instance_id, wait_num, vm.state
        );
        self.classify(vm);
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn take_outcome(&mut self) -> PollOutcome<VmInstance> {
        self.state.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::{Poller, WaitPolicy};
    use crate::provider::MockProvider;
    use std::time::Duration;

    fn fast_poller() -> Poller {
        Poller::new(WaitPolicy::new(Duration::ZERO, 5))
    }

    #[test]
    fn launch_reaches_running() {
        let provider = MockProvider::new();
        let initial = provider.launch_instance("stage").unwrap();
        assert_eq!(initial.state, "pending");

        let mut checker = VmStateProgressChecker::until_running(initial, &provider);
        let outcome = fast_poller().wait_for(&mut checker).unwrap();

        assert_eq!(outcome.complete().unwrap().state, "running");
    }

    #[test]
    fn terminate_reaches_terminated() {
        let provider = MockProvider::new();
        let launched = provider.launch_instance("stage").unwrap();
        let initial = provider.terminate_instance(&launched.instance_id).unwrap();

        let mut checker = VmStateProgressChecker::until_terminated(initial, &provider);
        let outcome = fast_poller().wait_for(&mut checker).unwrap();

        assert_eq!(outcome.complete().unwrap().state, "terminated");
    }

    #[test]
    fn unexpected_state_fails_the_wait() {
        let provider = MockProvider::new();
        provider.script_vm("i-stage-1", ["pending", "stopped"]);
        let initial = provider.launch_instance("stage").unwrap();

        let mut checker = VmStateProgressChecker::until_running(initial, &provider);
        let outcome = fast_poller().wait_for(&mut checker).unwrap();

        assert!(matches!(outcome, PollOutcome::Failed(_)));
    }
}
