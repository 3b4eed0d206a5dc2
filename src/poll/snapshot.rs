//! Progress checking for database snapshot creation.

use tracing::{debug, error};

use super::{CheckState, PollOutcome, ProgressChecker};
use crate::error::{CutoverError, Result};
use crate::provider::{status, DatabaseApi, Snapshot};

/// Knows how to check progress of a database snapshot going from
/// 'creating' to 'available'.
pub struct SnapshotProgressChecker<'a> {
    snapshot_id: String,
    db: &'a dyn DatabaseApi,
    initial: Option<Snapshot>,
    state: CheckState<Snapshot>,
}

impl<'a> SnapshotProgressChecker<'a> {
    /// `initial` is the provider's response to the create request.
    pub fn new(snapshot_id: &str, initial: Snapshot, db: &'a dyn DatabaseApi) -> Self {
        Self {
            snapshot_id: snapshot_id.to_string(),
            db,
            initial: Some(initial),
            state: CheckState::Pending,
        }
    }

    /// Asserts that the response names the snapshot we requested.
    fn check_identity(&self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.snapshot_id != self.snapshot_id {
            return Err(CutoverError::ProviderMismatch {
                resource: "snapshot".to_string(),
                requested: self.snapshot_id.clone(),
                reported: snapshot.snapshot_id.clone(),
            });
        }
        Ok(())
    }

    /// Checks whether the snapshot has attained the desired status.
    fn classify(&mut self, snapshot: Snapshot) {
        match snapshot.status.as_str() {
            status::SNAPSHOT_AVAILABLE => {
                self.state = CheckState::Complete(snapshot);
            }
            status::SNAPSHOT_CREATING => {
                // keep trying
            }
            other => {
                error!(
                    "Snapshot '{}': unexpected response status '{}'",
                    self.snapshot_id, other
                );
                self.state = CheckState::Failed(format!("unexpected snapshot status '{}'", other));
            }
        }
    }
}

impl ProgressChecker for SnapshotProgressChecker<'_> {
    type Output = Snapshot;

    fn description(&self) -> String {
        format!("snapshot '{}'", self.snapshot_id)
    }

    fn initial_check(&mut self) -> Result<()> {
        let initial = self.initial.take().ok_or_else(|| {
            CutoverError::TaskFailed {
                task: "snapshot-check".to_string(),
                message: "initial snapshot response consumed twice".to_string(),
            }
        })?;
        debug!("Initial snapshot status: {}", initial.status);
        self.check_identity(&initial)?;
        self.classify(initial);
        Ok(())
    }

    fn followup_check(&mut self, wait_num: u32) -> Result<()> {
        let snapshot = self.db.describe_snapshot(&self.snapshot_id)?;
        self.check_identity(&snapshot)?;
        debug!(
            "Snapshot '{}' status after wait #{}: {}",
            self.snapshot_id, wait_num, snapshot.status
        );
        self.classify(snapshot);
        Ok(())
    }

    fn is_done(&self) -> bool {
        self.state.is_done()
    }

    fn take_outcome(&mut self) -> PollOutcome<Snapshot> {
        self.state.take()
    }
}
