//! Job execution history.
//!
//! Every job run produces a [`JobRecord`]: the job's identity (kind,
//! environments, command line, noop flag), a start timestamp, the overall
//! outcome, and one [`TaskRecord`] per task position. Records are what
//! makes runs resumable: a re-invocation with identical parameters skips
//! the prefix of tasks its relevant prior record marks successful.
//!
//! [`JobRecordBuilder`] grows an append-only ledger during execution; each
//! completed task appends one entry, and the builder is finalized once
//! into the persisted record.

pub mod store;

pub use store::HistoryStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::jobs::JobKind;

/// Outcome of one task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    Success,
    Failed,
    /// The sequence halted before reaching this task.
    NotAttempted,
}

/// Overall outcome of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The run is still writing its record (or crashed while doing so).
    InProgress,
    Succeeded,
    Failed,
}

/// Outcome of one task at one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub position: usize,
    pub name: String,
    pub outcome: TaskOutcome,
}

/// Record of a single job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub kind: JobKind,
    pub env1: String,
    pub env2: Option<String>,
    pub command_line: String,
    pub noop: bool,
    pub started_at: DateTime<Utc>,
    pub outcome: JobOutcome,
    pub tasks: Vec<TaskRecord>,
}

impl JobRecord {
    /// True if this record marks the given position successful. Positions
    /// beyond the recorded list (a job whose task list has grown since)
    /// count as not attempted.
    pub fn task_succeeded(&self, position: usize) -> bool {
        self.tasks
            .iter()
            .any(|t| t.position == position && t.outcome == TaskOutcome::Success)
    }

    /// One line per task for display.
    pub fn summary_lines(&self) -> Vec<String> {
        self.tasks
            .iter()
            .map(|t| {
                let mark = match t.outcome {
                    TaskOutcome::Success => '✓',
                    TaskOutcome::Failed => '✗',
                    TaskOutcome::NotAttempted => '-',
                };
                format!("{} [{}] {}", mark, t.position, t.name)
            })
            .collect()
    }
}

/// Append-only ledger for a run in progress.
pub struct JobRecordBuilder {
    record: JobRecord,
}

impl JobRecordBuilder {
    /// Start a record for a job that is beginning now.
    pub fn start(
        kind: JobKind,
        env1: &str,
        env2: Option<&str>,
        command_line: &str,
        noop: bool,
    ) -> Self {
        Self {
            record: JobRecord {
                kind,
                env1: env1.to_string(),
                env2: env2.map(String::from),
                command_line: command_line.to_string(),
                noop,
                started_at: Utc::now(),
                outcome: JobOutcome::InProgress,
                tasks: Vec::new(),
            },
        }
    }

    /// Append one task outcome. Positions arrive in strictly ascending
    /// order; the engine guarantees this.
    pub fn record(&mut self, position: usize, name: &str, outcome: TaskOutcome) {
        self.record.tasks.push(TaskRecord {
            position,
            name: name.to_string(),
            outcome,
        });
    }

    /// A consistent in-progress copy for incremental persistence.
    pub fn snapshot(&self) -> JobRecord {
        self.record.clone()
    }

    /// Finalize: overall success only if every recorded task succeeded.
    pub fn finish(mut self) -> JobRecord {
        let all_succeeded = self
            .record
            .tasks
            .iter()
            .all(|t| t.outcome == TaskOutcome::Success);
        self.record.outcome = if all_succeeded {
            JobOutcome::Succeeded
        } else {
            JobOutcome::Failed
        };
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> JobRecordBuilder {
        JobRecordBuilder::start(
            JobKind::StagingDeploy,
            "prod-blue",
            Some("stage"),
            "staging-deploy --live-env prod-blue --stage-env stage",
            false,
        )
    }

    #[test]
    fn finish_succeeds_when_all_tasks_succeed() {
        let mut b = builder();
        b.record(0, "freeze-application", TaskOutcome::Success);
        b.record(1, "snapshot-databases", TaskOutcome::Success);

        let record = b.finish();

        assert_eq!(record.outcome, JobOutcome::Succeeded);
        assert_eq!(record.tasks.len(), 2);
    }

    #[test]
    fn finish_fails_with_any_failed_task() {
        let mut b = builder();
        b.record(0, "freeze-application", TaskOutcome::Success);
        b.record(1, "snapshot-databases", TaskOutcome::Failed);
        b.record(2, "restore-databases", TaskOutcome::NotAttempted);

        let record = b.finish();

        assert_eq!(record.outcome, JobOutcome::Failed);
    }

    #[test]
    fn finish_fails_with_not_attempted_tasks() {
        let mut b = builder();
        b.record(0, "freeze-application", TaskOutcome::Success);
        b.record(1, "snapshot-databases", TaskOutcome::NotAttempted);

        assert_eq!(b.finish().outcome, JobOutcome::Failed);
    }

    #[test]
    fn snapshot_stays_in_progress() {
        let mut b = builder();
        b.record(0, "freeze-application", TaskOutcome::Success);

        let snapshot = b.snapshot();

        assert_eq!(snapshot.outcome, JobOutcome::InProgress);
        assert_eq!(snapshot.tasks.len(), 1);
    }

    #[test]
    fn task_succeeded_checks_exact_position() {
        let mut b = builder();
        b.record(0, "freeze-application", TaskOutcome::Success);
        b.record(1, "snapshot-databases", TaskOutcome::Failed);
        let record = b.finish();

        assert!(record.task_succeeded(0));
        assert!(!record.task_succeeded(1));
        // a grown task list: unrecorded positions are not successes
        assert!(!record.task_succeeded(7));
    }

    #[test]
    fn record_serializes_to_yaml() {
        let mut b = builder();
        b.record(0, "freeze-application", TaskOutcome::Success);
        let record = b.finish();

        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("staging-deploy"));
        assert!(yaml.contains("freeze-application"));
        assert!(yaml.contains("Succeeded"));
    }

    #[test]
    fn summary_lines_mark_outcomes() {
        let mut b = builder();
        b.record(0, "freeze-application", TaskOutcome::Success);
        b.record(1, "snapshot-databases", TaskOutcome::Failed);
        b.record(2, "restore-databases", TaskOutcome::NotAttempted);
        let lines = b.finish().summary_lines();

        assert!(lines[0].starts_with('✓'));
        assert!(lines[1].starts_with('✗'));
        assert!(lines[2].starts_with('-'));
    }
}
