//! Task sequence execution.
//!
//! The engine runs a job's tasks in position order, consulting the
//! relevant prior record (if the caller found one) to skip tasks that
//! already succeeded, and persists the evolving record after every task.
//! Execution is sequential and fail-fast: the first failure halts the
//! sequence, and everything unreached is recorded as not attempted.
//!
//! The engine never retries a failed task. Retry is re-invoking the whole
//! job, which then resumes past the already-succeeded prefix.

use tracing::{error, info};

use crate::error::Result;
use crate::history::{HistoryStore, JobRecord, JobRecordBuilder, TaskOutcome};
use crate::jobs::Job;
use crate::tasks::{TaskContext, TaskStatus};

/// Sequences a job's tasks against its history.
pub struct TaskSequenceEngine<'a> {
    store: &'a HistoryStore,
}

impl<'a> TaskSequenceEngine<'a> {
    pub fn new(store: &'a HistoryStore) -> Self {
        Self { store }
    }

    /// Execute the job and return the finalized record of what happened.
    ///
    /// `prior` is the relevant prior record per the store's lookup
    /// contract; `None` means a fresh run with nothing skippable. The
    /// engine owns the record it is building for the whole run (single
    /// writer) and upserts it into the store as it proceeds.
    pub fn run(
        &self,
        job: &Job,
        ctx: &mut TaskContext,
        prior: Option<&JobRecord>,
    ) -> Result<JobRecord> {
        let total = job.tasks().len();
        info!(
            "Running job '{}' on '{}'{} ({} tasks)",
            job.kind(),
            job.env1(),
            job.env2().map(|e| format!(" and '{}'", e)).unwrap_or_default(),
            total
        );
        if job.noop() {
            info!("Noop mode: inspecting only, no changes will be made");
        }
        if job.force() && prior.is_some() {
            info!("Force: prior task outcomes will be ignored");
        }

        let mut builder = JobRecordBuilder::start(
            job.kind(),
            job.env1(),
            job.env2(),
            job.command_line(),
            job.noop(),
        );
        self.store.save(&builder.snapshot())?;

        for (position, task) in job.tasks().iter().enumerate() {
            let skip = !job.force() && prior.is_some_and(|p| p.task_succeeded(position));
            if skip {
                info!(
                    "[{}/{}] {}: succeeded in prior attempt, skipping",
                    position + 1,
                    total,
                    task.name()
                );
                builder.record(position, task.name(), TaskOutcome::Success);
                self.store.save(&builder.snapshot())?;
                continue;
            }

            info!("[{}/{}] {}", position + 1, total, task.name());
            let outcome = match task.execute(ctx) {
                Ok(TaskStatus::Done) | Ok(TaskStatus::Noop) => TaskOutcome::Success,
                Ok(TaskStatus::Failed) => {
                    error!("Task '{}' reported failure", task.name());
                    TaskOutcome::Failed
                }
                Err(e) => {
                    error!("Task '{}' failed: {}", task.name(), e);
                    TaskOutcome::Failed
                }
            };

            builder.record(position, task.name(), outcome);

            if outcome == TaskOutcome::Failed {
                for unreached in position + 1..total {
                    builder.record(
                        unreached,
                        job.tasks()[unreached].name(),
                        TaskOutcome::NotAttempted,
                    );
                }
                let record = builder.finish();
                self.store.save(&record)?;
                error!(
                    "Job '{}' failed at task {} of {}; re-invoke with the same parameters to resume",
                    job.kind(),
                    position + 1,
                    total
                );
                return Ok(record);
            }

            self.store.save(&builder.snapshot())?;
        }

        let record = builder.finish();
        self.store.save(&record)?;
        info!("Job '{}' succeeded", job.kind());
        Ok(record)
    }
}
