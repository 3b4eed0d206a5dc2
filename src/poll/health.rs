//! Progress checking for load balancer target health.

use tracing::{debug, error};

use super::{CheckState, PollOutcome, ProgressChecker};
use crate::error::{CutoverError, Result};
use crate::provider::{status, LoadBalancerApi, TargetHealth};

/// Waits for a newly registered target to report 'in-service'.
pub struct TargetHealthProgressChecker<'a> {
    lb_name: String,
    instance_id: String,
    lb: &'a dyn LoadBalancerApi,
    initial: Option<TargetHealth>,
    state: CheckState<TargetHealth>,
}

impl<'a> TargetHealthProgressChecker<'a> {
    pub fn new(
        lb_name: &str,
        instance_id: &str,
        initial: TargetHealth,
        lb: &'a dyn LoadBalancerApi,
    ) -> Self {
        Self {
            lb_name: lb_name.to_string(),
            instance_id: instance_id.to_string(),
            lb,
            initial: Some(initial),
            state: CheckState::Pending,
        }
    }

    fn check_identity(&self, health: &TargetHealth) -> Result<()> {
        if health.instance_id != self.instance_id {
            return Err(CutoverError::ProviderMismatch {
                resource: "load balancer target".to_string(),
                requested: self.instance_id.clone(),
                reported: health.instance_id.clone(),
            });
        }
        Ok(())
    }

    fn classify(&mut self, health: TargetHealth) {
        match health.state.as_str() {
            status::TARGET_IN_SERVICE => self.state = CheckState::Complete(health),
            status::TARGET_REGISTERING => {}
            other => {
                error!(
                    "Target '{}' on '{}': unexpected health state '{}'",
                    self.instance_id, self.lb_name, other
                );
                self.state = CheckState::Failed(format!("unexpected target health '{}'", other));
            }
        }
    }
}

impl ProgressChecker for TargetHealthProgressChecker<'_> {
    type Output = TargetHealth;

    fn description(&self) -> String {
        format!(
            "target '{}' on load balancer '{}'",
            self.instance_id, self.lb_name
        )
    }

    fn initial_check(&mut self) -> Result<()> {
        let initial = self.initial.take().ok_or_else(|| CutoverError::TaskFailed {
            task: "target-health-check".to_string(),
            message: "initial health response consumed twice".to_string(),
        })?;
        debug!("Initial target health: {}", initial.state);
        self.check_identity(&initial)?;
        self.classify(initial);
        Ok(())
    }

    fn followup_check(&mut self, wait_num: u32) -> Result<()> {
        let health = self.lb.instance_health(&self.lb_name, &self.instance_id)?;
        self.check_identity(&health)?;
        debug!(
            "Target '{}' health after wait #{}: {}",
            self.instance_id, wait_num, health.state
        );
        self.classify(health);
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn take_outcome(&mut self) -> PollOutcome<TargetHealth> {
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
    fn registered_target_goes_in_service() {
        let provider = MockProvider::new();
        let initial = provider.register_instance("lb-main", "i-1").unwrap();

        let mut checker = TargetHealthProgressChecker::new("lb-main", "i-1", initial, &provider);
        let outcome = fast_poller().wait_for(&mut checker).unwrap();

        assert_eq!(outcome.complete().unwrap().state, "in-service");
    }

    #[test]
    fn out_of_service_is_terminal_failure() {
        let provider = MockProvider::new();
        provider.script_health("lb-main", "i-1", ["registering", "out-of-service"]);
        let initial = provider.register_instance("lb-main", "i-1").unwrap();

        let mut checker = TargetHealthProgressChecker::new("lb-main", "i-1", initial, &provider);
        let outcome = fast_poller().wait_for(&mut checker).unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Failed("unexpected target health 'out-of-service'".into())
        );
    }
}
