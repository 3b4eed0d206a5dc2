//! Database tasks: snapshot live databases, restore them into stage,
//! delete instances and snapshots on teardown.

use std::collections::BTreeMap;

use tracing::info;

use super::{require_complete, snapshot_name, Task, TaskContext, TaskStatus};
use crate::error::{CutoverError, Result};
use crate::poll::{DbInstanceProgressChecker, SnapshotProgressChecker};

/// Snapshot each live logical database named in the db map. The live
/// application must be frozen while this runs; ordering is enforced by job
/// assembly, not here.
pub struct SnapshotDatabasesTask {
    live_env: String,
    db_map: BTreeMap<String, String>,
}

impl SnapshotDatabasesTask {
    /// `db_map` maps live logical database names to the stage physical
    /// instance names a later restore will create.
    pub fn new(live_env: &str, db_map: BTreeMap<String, String>) -> Self {
        Self {
            live_env: live_env.to_string(),
            db_map,
        }
    }
}

impl Task for SnapshotDatabasesTask {
    fn name(&self) -> &str {
        "snapshot-databases"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        let live = ctx.environments.require(&self.live_env)?.clone();

        for logical in self.db_map.keys() {
            let physical = live.databases.get(logical).ok_or_else(|| {
                CutoverError::TaskFailed {
                    task: self.name().to_string(),
                    message: format!(
                        "live environment '{}' has no database '{}'",
                        self.live_env, logical
                    ),
                }
            })?;
            let snapshot_id = snapshot_name(&self.live_env, logical);

            if ctx.noop {
                info!(
                    "Would snapshot '{}' ({}) as '{}'",
                    logical, physical, snapshot_id
                );
                continue;
            }

            let initial = ctx.provider.create_snapshot(physical, &snapshot_id)?;
            let mut checker = SnapshotProgressChecker::new(&snapshot_id, initial, ctx.provider);
            let outcome = ctx.poller.wait_for(&mut checker)?;
            let snapshot = require_complete(
                outcome,
                self.name(),
                &format!("snapshot '{}' did not become available", snapshot_id),
            )?;
            info!("Snapshot '{}' is available", snapshot.snapshot_id);
        }

        Ok(if ctx.noop {
            TaskStatus::Noop
        } else {
            TaskStatus::Done
        })
    }
}

/// Restore each staged snapshot into its stage physical instance and bind
/// the result to the stage environment.
pub struct RestoreDatabasesTask {
    live_env: String,
    stage_env: String,
    db_map: BTreeMap<String, String>,
}

impl RestoreDatabasesTask {
    pub fn new(live_env: &str, stage_env: &str, db_map: BTreeMap<String, String>) -> Self {
        Self {
            live_env: live_env.to_string(),
            stage_env: stage_env.to_string(),
            db_map,
        }
    }
}

impl Task for RestoreDatabasesTask {
    fn name(&self) -> &str {
        "restore-databases"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        for (logical, stage_physical) in &self.db_map {
            let snapshot_id = snapshot_name(&self.live_env, logical);

            if ctx.noop {
                info!(
                    "Would restore '{}' into '{}' for '{}'",
                    snapshot_id, stage_physical, self.stage_env
                );
                continue;
            }

            let initial = ctx.provider.restore_snapshot(&snapshot_id, stage_physical)?;
            let mut checker = DbInstanceProgressChecker::new(stage_physical, initial, ctx.provider);
            let outcome = ctx.poller.wait_for(&mut checker)?;
            let instance = require_complete(
                outcome,
                self.name(),
                &format!("database '{}' did not become available", stage_physical),
            )?;
            info!("Database instance '{}' is available", instance.instance_id);

            ctx.environments.update(&self.stage_env, |env| {
                env.databases
                    .insert(logical.clone(), stage_physical.clone());
            })?;
        }

        Ok(if ctx.noop {
            TaskStatus::Noop
        } else {
            TaskStatus::Done
        })
    }
}

/// Delete every database instance bound to an environment.
pub struct DeleteDatabasesTask {
    env: String,
}

impl DeleteDatabasesTask {
    pub fn new(env: &str) -> Self {
        Self {
            env: env.to_string(),
        }
    }
}

impl Task for DeleteDatabasesTask {
    fn name(&self) -> &str {
        "delete-databases"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        let databases = match ctx.environments.get(&self.env) {
            Some(env) => env.databases.clone(),
            None => {
                info!("Environment '{}' is not registered, nothing to delete", self.env);
                return Ok(if ctx.noop {
                    TaskStatus::Noop
                } else {
                    TaskStatus::Done
                });
            }
        };

        if ctx.noop {
            for (logical, physical) in &databases {
                info!("Would delete database '{}' ({})", logical, physical);
            }
            return Ok(TaskStatus::Noop);
        }

        for (logical, physical) in &databases {
            ctx.provider.delete_db_instance(physical)?;
            info!("Deleted database '{}' ({})", logical, physical);
        }

        ctx.environments.update(&self.env, |env| {
            env.databases.clear();
        })?;

        Ok(TaskStatus::Done)
    }
}

/// Delete the snapshots taken during staging deploy. The live environment
/// is only read to derive snapshot names, never modified.
pub struct DeleteSnapshotsTask {
    live_env: String,
    stage_env: String,
}

impl DeleteSnapshotsTask {
    pub fn new(live_env: &str, stage_env: &str) -> Self {
        Self {
            live_env: live_env.to_string(),
            stage_env: stage_env.to_string(),
        }
    }
}

impl Task for DeleteSnapshotsTask {
    fn name(&self) -> &str {
        "delete-snapshots"
    }

    fn execute(&self, ctx: &mut TaskContext) -> Result<TaskStatus> {
        let logical_names: Vec<String> = match ctx.environments.get(&self.stage_env) {
            Some(env) => env.databases.keys().cloned().collect(),
            None => Vec::new(),
        };

        if logical_names.is_empty() {
            info!(
                "No staged databases recorded for '{}', no snapshots to delete",
                self.stage_env
            );
            return Ok(if ctx.noop {
                TaskStatus::Noop
            } else {
                TaskStatus::Done
            });
        }

        for logical in &logical_names {
            let snapshot_id = snapshot_name(&self.live_env, logical);
            if ctx.noop {
                info!("Would delete snapshot '{}'", snapshot_id);
                continue;
            }
            ctx.provider.delete_snapshot(&snapshot_id)?;
            info!("Deleted snapshot '{}'", snapshot_id);
        }

        Ok(if ctx.noop {
            TaskStatus::Noop
        } else {
            TaskStatus::Done
        })
    }
}
