//! Persistent job history storage.
//!
//! One YAML file in the data directory holds the recent [`JobRecord`]s,
//! most recent first. The engine upserts the record it is building after
//! every task; `find_relevant` is the resumption lookup consulted before a
//! run starts.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::JobRecord;
use crate::error::{CutoverError, Result};
use crate::jobs::JobKind;

#[derive(Debug, Serialize, Deserialize)]
struct HistoryFile {
    version: u32,
    runs: Vec<JobRecord>,
}

/// YAML-backed store of job records.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    retention: usize,
}

impl HistoryStore {
    /// Current schema version.
    pub const CURRENT_VERSION: u32 = 1;

    /// Default number of records to keep.
    pub const DEFAULT_RETENTION: usize = 50;

    const FILE_NAME: &'static str = "history.yml";

    pub fn open(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(Self::FILE_NAME),
            retention: Self::DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// A prior record older than this is never used for resumption.
    /// Operators should not skip work based on a stale, long-abandoned try.
    pub fn default_max_age() -> Duration {
        Duration::days(1)
    }

    fn load_runs(&self) -> Result<Vec<JobRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let file: HistoryFile =
            serde_yaml::from_str(&content).map_err(|e| CutoverError::ConfigParseError {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        Ok(file.runs)
    }

    fn write_runs(&self, mut runs: Vec<JobRecord>) -> Result<()> {
        if runs.len() > self.retention {
            runs.truncate(self.retention);
        }

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        let file = HistoryFile {
            version: Self::CURRENT_VERSION,
            runs,
        };
        let content =
            serde_yaml::to_string(&file).map_err(|e| CutoverError::ConfigParseError {
                path: self.path.clone(),
                message: e.to_string(),
            })?;

        // Atomic write: temp file then rename, so a crash mid-write never
        // corrupts existing history
        let temp_path = self.path.with_extension("yml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Insert or replace a record. Identity is (kind, started_at): the
    /// engine saves the same evolving record repeatedly during a run.
    pub fn save(&self, record: &JobRecord) -> Result<()> {
        let mut runs = self.load_runs()?;

        match runs
            .iter_mut()
            .find(|r| r.kind == record.kind && r.started_at == record.started_at)
        {
            Some(existing) => *existing = record.clone(),
            None => runs.insert(0, record.clone()),
        }

        self.write_runs(runs)
    }

    /// The most recent record for this job kind and environment pair,
    /// matching the exact command line and noop flag, no older than
    /// `max_age`. No match means a fresh run with nothing skippable.
    ///
    /// Records still marked in-progress (crashed runs) are eligible; that
    /// is exactly the resume case. Noop and non-noop histories are
    /// distinct matching classes: a dry run never satisfies a real run's
    /// resumption lookup.
    pub fn find_relevant(
        &self,
        kind: JobKind,
        env1: &str,
        env2: Option<&str>,
        command_line: &str,
        noop: bool,
        max_age: Duration,
    ) -> Result<Option<JobRecord>> {
        let oldest_allowed = Utc::now() - max_age;

        Ok(self.load_runs()?.into_iter().find(|r| {
            r.kind == kind
                && r.env1 == env1
                && r.env2.as_deref() == env2
                && r.command_line == command_line
                && r.noop == noop
                && r.started_at >= oldest_allowed
        }))
    }

    /// Recent records, most recent first.
    pub fn recent(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let mut runs = self.load_runs()?;
        runs.truncate(limit);
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{JobOutcome, JobRecordBuilder, TaskOutcome};
    use tempfile::TempDir;

    const CMDLINE: &str = "staging-deploy --live-env prod-blue --stage-env stage";

    fn record(noop: bool) -> JobRecord {
        let mut b = JobRecordBuilder::start(
            JobKind::StagingDeploy,
            "prod-blue",
            Some("stage"),
            CMDLINE,
            noop,
        );
        b.record(0, "freeze-application", TaskOutcome::Success);
        b.finish()
    }

    fn find(
        store: &HistoryStore,
        noop: bool,
    ) -> Option<JobRecord> {
        store
            .find_relevant(
                JobKind::StagingDeploy,
                "prod-blue",
                Some("stage"),
                CMDLINE,
                noop,
                HistoryStore::default_max_age(),
            )
            .unwrap()
    }

    #[test]
    fn save_and_find_relevant_round_trips() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());

        store.save(&record(false)).unwrap();

        let found = find(&store, false).expect("record should be relevant");
        assert_eq!(found.outcome, JobOutcome::Succeeded);
    }

    #[test]
    fn find_returns_none_without_history() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());

        assert!(find(&store, false).is_none());
    }

    #[test]
    fn noop_record_never_matches_real_run() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());

        store.save(&record(true)).unwrap();

        assert!(find(&store, false).is_none());
        assert!(find(&store, true).is_some());
    }

    #[test]
    fn different_command_line_is_not_relevant() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());
        store.save(&record(false)).unwrap();

        let found = store
            .find_relevant(
                JobKind::StagingDeploy,
                "prod-blue",
                Some("stage"),
                "staging-deploy --live-env prod-blue --stage-env other",
                false,
                HistoryStore::default_max_age(),
            )
            .unwrap();

        assert!(found.is_none());
    }

    #[test]
    fn different_kind_is_not_relevant() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());
        store.save(&record(false)).unwrap();

        let found = store
            .find_relevant(
                JobKind::GoLive,
                "prod-blue",
                Some("stage"),
                CMDLINE,
                false,
                HistoryStore::default_max_age(),
            )
            .unwrap();

        assert!(found.is_none());
    }

    #[test]
    fn record_older_than_max_age_is_not_relevant() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());

        let mut old = record(false);
        old.started_at = Utc::now() - Duration::days(2);
        store.save(&old).unwrap();

        assert!(find(&store, false).is_none());

        // the same record is found with a generous age bound
        let found = store
            .find_relevant(
                JobKind::StagingDeploy,
                "prod-blue",
                Some("stage"),
                CMDLINE,
                false,
                Duration::days(7),
            )
            .unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn in_progress_record_is_eligible_for_resume() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());

        let mut b = JobRecordBuilder::start(
            JobKind::StagingDeploy,
            "prod-blue",
            Some("stage"),
            CMDLINE,
            false,
        );
        b.record(0, "freeze-application", TaskOutcome::Success);
        store.save(&b.snapshot()).unwrap();

        let found = find(&store, false).expect("crashed run should be resumable");
        assert_eq!(found.outcome, JobOutcome::InProgress);
        assert!(found.task_succeeded(0));
    }

    #[test]
    fn save_upserts_by_kind_and_start_time() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());

        let mut b = JobRecordBuilder::start(
            JobKind::StagingDeploy,
            "prod-blue",
            Some("stage"),
            CMDLINE,
            false,
        );
        b.record(0, "freeze-application", TaskOutcome::Success);
        store.save(&b.snapshot()).unwrap();
        b.record(1, "snapshot-databases", TaskOutcome::Success);
        store.save(&b.snapshot()).unwrap();
        store.save(&b.finish()).unwrap();

        let runs = store.recent(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].tasks.len(), 2);
        assert_eq!(runs[0].outcome, JobOutcome::Succeeded);
    }

    #[test]
    fn most_recent_matching_record_wins() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path());

        let mut older = record(false);
        older.started_at = Utc::now() - Duration::hours(5);
        store.save(&older).unwrap();

        let mut b = JobRecordBuilder::start(
            JobKind::StagingDeploy,
            "prod-blue",
            Some("stage"),
            CMDLINE,
            false,
        );
        b.record(0, "freeze-application", TaskOutcome::Success);
        b.record(1, "snapshot-databases", TaskOutcome::Failed);
        store.save(&b.finish()).unwrap();

        let found = find(&store, false).unwrap();
        assert_eq!(found.tasks.len(), 2);
    }

    #[test]
    fn retention_prunes_oldest_records() {
        let temp = TempDir::new().unwrap();
        let store = HistoryStore::open(temp.path()).with_retention(3);

        for i in 0..5 {
            let mut r = record(false);
            r.started_at = Utc::now() - Duration::minutes(i);
            store.save(&r).unwrap();
        }

        assert_eq!(store.recent(10).unwrap().len(), 3);
    }
}
