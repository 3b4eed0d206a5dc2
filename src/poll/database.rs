//! Progress checking for restored database instances.

use tracing::{debug, error};

use super::{CheckState, PollOutcome, ProgressChecker};
use crate::error::{CutoverError, Result};
use crate::provider::{status, DatabaseApi, DbInstance};

/// Waits for a database instance restored from a snapshot to become
/// available.
pub struct DbInstanceProgressChecker<'a> {
    instance_id: String,
    db: &'a dyn DatabaseApi,
    initial: Option<DbInstance>,
    state: CheckState<DbInstance>,
}

impl<'a> DbInstanceProgressChecker<'a> {
    pub fn new(instance_id: &str, initial: DbInstance, db: &'a dyn DatabaseApi) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            db,
            initial: Some(initial),
            state: CheckState::Pending,
        }
    }

    fn check_identity(&self, instance: &DbInstance) -> Result<()> {
        if instance.instance_id != self.instance_id {
            return Err(CutoverError::ProviderMismatch {
                resource: "database instance".to_string(),
                requested: self.instance_id.clone(),
                reported: instance.instance_id.clone(),
            });
        }
        Ok(())
    }

    fn classify(&mut self, instance: DbInstance) {
        match instance.status.as_str() {
            status::DB_AVAILABLE => self.state = CheckState::Complete(instance),
            status::DB_CREATING => {}
            other => {
                error!(
                    "Database instance '{}': unexpected response status '{}'",
                    self.instance_id, other
                );
                self.state =
                    CheckState::Failed(format!("unexpected database status '{}'", other));
            }
        }
    }
}

impl ProgressChecker for DbInstanceProgressChecker<'_> {
    type Output = DbInstance;

    fn description(&self) -> String {
        format!("database instance '{}'", self.instance_id)
    }

    fn initial_check(&mut self) -> Result<()> {
        let initial = self.initial.take().ok_or_else(|| CutoverError::TaskFailed {
            task: "db-instance-check".to_string(),
            message: "initial instance response consumed twice".to_string(),
        })?;
        debug!("Initial database instance status: {}", initial.status);
        self.check_identity(&initial)?;
        self.classify(initial);
        Ok(())
    }

    fn followup_check(&mut self, wait_num: u32) -> Result<()> {
        let instance = self.db.describe_db_instance(&self.instance_id)?;
        self.check_identity(&instance)?;
        debug!(
            "Database instance '{}' status after wait #{}: {}",
            self.instance_id, wait_num, instance.status
        );
        self.classify(instance);
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn take_outcome(&mut self) -> PollOutcome<DbInstance> {
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
    fn restored_instance_becomes_available() {
        let provider = MockProvider::new();
        provider.script_db_instance("stage-db-1", ["creating", "available"]);
        let initial = provider.restore_snapshot("snap-1", "stage-db-1").unwrap();

        let mut checker = DbInstanceProgressChecker::new("stage-db-1", initial, &provider);
        let outcome = fast_poller().wait_for(&mut checker).unwrap();

        let instance = outcome.complete().expect("instance should be available");
        assert_eq!(instance.instance_id, "stage-db-1");
    }

    #[test]
    fn unexpected_status_is_terminal() {
        let provider = MockProvider::new();
        provider.script_db_instance("stage-db-1", ["creating", "failed"]);
        let initial = provider.restore_snapshot("snap-1", "stage-db-1").unwrap();

        let mut checker = DbInstanceProgressChecker::new("stage-db-1", initial, &provider);
        let outcome = fast_poller().wait_for(&mut checker).unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Failed("unexpected database status 'failed'".into())
        );
    }
}
