//! Job kinds and construction.
//!
//! A job is one top-level orchestrated operation composed of an ordered
//! task sequence. The set of kinds is closed; each kind has a pure
//! constructor from a typed parameter struct to a [`Job`] value, with its
//! fixed task list assembled at construction time. Task order is
//! significant: later tasks depend on the side effects of earlier ones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tasks::{
    DeleteDatabasesTask, DeleteSnapshotsTask, DeployPackagesTask, DeregisterFromLoadBalancerTask,
    ForgetEnvironmentTask, FreezeApplicationTask, LaunchVmTask, RegisterWithLoadBalancerTask,
    RestoreDatabasesTask, SnapshotDatabasesTask, StopServicesTask, Task, TerminateVmTask,
    ThawApplicationTask,
};

/// The closed set of job kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Spin up a new stage env: test database copy, application VM,
    /// packages. Temporarily freezes the live application during the copy.
    StagingDeploy,
    /// Reassign liveness from the old env to the new env behind a fixed
    /// load balancer.
    GoLive,
    /// Commit a prior go-live by destroying the old live env.
    TeardownCommit,
    /// Roll back a prior staging deploy by destroying the stage env and
    /// its snapshots.
    RollbackStage,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::StagingDeploy => "staging-deploy",
            JobKind::GoLive => "go-live",
            JobKind::TeardownCommit => "teardown-commit",
            JobKind::RollbackStage => "rollback-stage",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields shared by every job kind.
#[derive(Debug, Clone, Default)]
pub struct CommonParams {
    /// The raw invocation, kept for history matching and audit.
    pub command_line: String,
    /// Inspect only, no side effects.
    pub noop: bool,
    /// Rerun every task, ignoring prior history.
    pub force: bool,
}

/// Parameters for a staging deploy.
#[derive(Debug, Clone)]
pub struct StagingDeployParams {
    pub common: CommonParams,
    /// The live env we freeze, replicate, and base stage from.
    pub live_env: String,
    /// The stage env this job creates. Must not exist beforehand; whether
    /// it already partially exists is a per-task question when resuming.
    pub stage_env: String,
    /// Live logical database name to stage physical instance name.
    pub db_map: BTreeMap<String, String>,
    /// Packages to deploy to stage.
    pub packages: Vec<String>,
}

/// Parameters for a go-live cutover.
#[derive(Debug, Clone)]
pub struct GoLiveParams {
    pub common: CommonParams,
    pub old_live_env: String,
    pub new_live_env: String,
    /// Fixed live load balancer currently hosting the old live VM.
    pub fixed_lb: String,
}

/// Parameters for a teardown commit.
#[derive(Debug, Clone)]
pub struct TeardownCommitParams {
    pub common: CommonParams,
    /// The old live env, to be deleted.
    pub delete_old_live_env: String,
    /// Services to shut down gracefully before VM deletion.
    pub stop_services: Vec<String>,
}

/// Parameters for a stage rollback.
#[derive(Debug, Clone)]
pub struct RollbackStageParams {
    pub common: CommonParams,
    /// The stage env, to be deleted.
    pub delete_stage_env: String,
    /// The live env whose staging snapshots are deleted. Treated
    /// read-only.
    pub live_env: String,
    pub stop_services: Vec<String>,
}

/// One fully constructed job: kind, flags, environments, and the ordered
/// task sequence. Immutable once constructed.
pub struct Job {
    kind: JobKind,
    command_line: String,
    noop: bool,
    force: bool,
    env1: String,
    env2: Option<String>,
    tasks: Vec<Box<dyn Task>>,
}

impl Job {
    pub(crate) fn from_parts(
        kind: JobKind,
        common: CommonParams,
        env1: String,
        env2: Option<String>,
        tasks: Vec<Box<dyn Task>>,
    ) -> Self {
        Self {
            kind,
            command_line: common.command_line,
            noop: common.noop,
            force: common.force,
            env1,
            env2,
            tasks,
        }
    }

    /// Staging deploy: freeze live, copy its databases into stage, thaw,
    /// then build out the stage VM and application.
    pub fn staging_deploy(params: StagingDeployParams) -> Self {
        let live = params.live_env.clone();
        let stage = params.stage_env.clone();
        let tasks: Vec<Box<dyn Task>> = vec![
            Box::new(FreezeApplicationTask::new(&live)),
            Box::new(SnapshotDatabasesTask::new(&live, params.db_map.clone())),
            Box::new(RestoreDatabasesTask::new(&live, &stage, params.db_map.clone())),
            Box::new(ThawApplicationTask::new(&live)),
            Box::new(LaunchVmTask::new(&stage)),
            Box::new(DeployPackagesTask::new(&stage, params.packages.clone())),
        ];
        Self::from_parts(
            JobKind::StagingDeploy,
            params.common,
            params.live_env,
            Some(params.stage_env),
            tasks,
        )
    }

    /// Go-live: freeze the old live app, swap the VMs behind the fixed
    /// load balancer, thaw the new live app.
    pub fn go_live(params: GoLiveParams) -> Self {
        let old = params.old_live_env.clone();
        let new = params.new_live_env.clone();
        let lb = params.fixed_lb.clone();
        let tasks: Vec<Box<dyn Task>> = vec![
            Box::new(FreezeApplicationTask::new(&old)),
            Box::new(RegisterWithLoadBalancerTask::new(&lb, &new)),
            Box::new(DeregisterFromLoadBalancerTask::new(&lb, &old)),
            Box::new(ThawApplicationTask::new(&new)),
        ];
        Self::from_parts(
            JobKind::GoLive,
            params.common,
            params.old_live_env,
            Some(params.new_live_env),
            tasks,
        )
    }

    /// Teardown commit: destroy the old live env after a successful
    /// go-live.
    pub fn teardown_commit(params: TeardownCommitParams) -> Self {
        let env = params.delete_old_live_env.clone();
        let tasks: Vec<Box<dyn Task>> = vec![
            Box::new(StopServicesTask::new(&env, params.stop_services.clone())),
            Box::new(TerminateVmTask::new(&env)),
            Box::new(DeleteDatabasesTask::new(&env)),
            Box::new(ForgetEnvironmentTask::new(&env)),
        ];
        Self::from_parts(
            JobKind::TeardownCommit,
            params.common,
            params.delete_old_live_env,
            None,
            tasks,
        )
    }

    /// Rollback stage: destroy the stage env and the snapshots taken
    /// during staging deploy. The live env is only read.
    pub fn rollback_stage(params: RollbackStageParams) -> Self {
        let stage = params.delete_stage_env.clone();
        let live = params.live_env.clone();
        // snapshots go before the databases: deleting the stage databases
        // clears the bindings the snapshot names are derived from
        let tasks: Vec<Box<dyn Task>> = vec![
            Box::new(StopServicesTask::new(&stage, params.stop_services.clone())),
            Box::new(TerminateVmTask::new(&stage)),
            Box::new(DeleteSnapshotsTask::new(&live, &stage)),
            Box::new(DeleteDatabasesTask::new(&stage)),
            Box::new(ForgetEnvironmentTask::new(&stage)),
        ];
        Self::from_parts(
            JobKind::RollbackStage,
            params.common,
            params.delete_stage_env,
            Some(params.live_env),
            tasks,
        )
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn noop(&self) -> bool {
        self.noop
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn env1(&self) -> &str {
        &self.env1
    }

    pub fn env2(&self) -> Option<&str> {
        self.env2.as_deref()
    }

    pub fn tasks(&self) -> &[Box<dyn Task>] {
        &self.tasks
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("kind", &self.kind)
            .field("noop", &self.noop)
            .field("force", &self.force)
            .field("env1", &self.env1)
            .field("env2", &self.env2)
            .field("tasks", &self.tasks.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_names(job: &Job) -> Vec<&str> {
        job.tasks().iter().map(|t| t.name()).collect()
    }

    fn common(cmdline: &str) -> CommonParams {
        CommonParams {
            command_line: cmdline.to_string(),
            noop: false,
            force: false,
        }
    }

    #[test]
    fn staging_deploy_task_order() {
        let mut db_map = BTreeMap::new();
        db_map.insert("app".to_string(), "stage-db".to_string());
        let job = Job::staging_deploy(StagingDeployParams {
            common: common("staging-deploy --live-env prod-blue"),
            live_env: "prod-blue".to_string(),
            stage_env: "stage".to_string(),
            db_map,
            packages: vec!["app-2.0.war".to_string()],
        });

        assert_eq!(job.kind(), JobKind::StagingDeploy);
        assert_eq!(job.env1(), "prod-blue");
        assert_eq!(job.env2(), Some("stage"));
        assert_eq!(
            task_names(&job),
            vec![
                "freeze-application",
                "snapshot-databases",
                "restore-databases",
                "thaw-application",
                "launch-vm",
                "deploy-packages",
            ]
        );
    }

    #[test]
    fn go_live_task_order() {
        let job = Job::go_live(GoLiveParams {
            common: common("go-live"),
            old_live_env: "prod-blue".to_string(),
            new_live_env: "prod-green".to_string(),
            fixed_lb: "lb-main".to_string(),
        });

        assert_eq!(job.kind(), JobKind::GoLive);
        assert_eq!(
            task_names(&job),
            vec![
                "freeze-application",
                "register-with-load-balancer",
                "deregister-from-load-balancer",
                "thaw-application",
            ]
        );
    }

    #[test]
    fn teardown_commit_task_order() {
        let job = Job::teardown_commit(TeardownCommitParams {
            common: common("teardown-commit"),
            delete_old_live_env: "prod-blue".to_string(),
            stop_services: vec!["nginx".to_string()],
        });

        assert_eq!(job.env1(), "prod-blue");
        assert_eq!(job.env2(), None);
        assert_eq!(
            task_names(&job),
            vec![
                "stop-services",
                "terminate-vm",
                "delete-databases",
                "forget-environment",
            ]
        );
    }

    #[test]
    fn rollback_stage_task_order() {
        let job = Job::rollback_stage(RollbackStageParams {
            common: common("rollback-stage"),
            delete_stage_env: "stage".to_string(),
            live_env: "prod-blue".to_string(),
            stop_services: Vec::new(),
        });

        assert_eq!(job.env1(), "stage");
        assert_eq!(job.env2(), Some("prod-blue"));
        assert_eq!(
            task_names(&job),
            vec![
                "stop-services",
                "terminate-vm",
                "delete-snapshots",
                "delete-databases",
                "forget-environment",
            ]
        );
    }

    #[test]
    fn common_flags_carry_through() {
        let job = Job::teardown_commit(TeardownCommitParams {
            common: CommonParams {
                command_line: "teardown-commit --noop".to_string(),
                noop: true,
                force: true,
            },
            delete_old_live_env: "prod-blue".to_string(),
            stop_services: Vec::new(),
        });

        assert!(job.noop());
        assert!(job.force());
        assert_eq!(job.command_line(), "teardown-commit --noop");
    }

    #[test]
    fn job_kind_round_trips_as_str() {
        for kind in [
            JobKind::StagingDeploy,
            JobKind::GoLive,
            JobKind::TeardownCommit,
            JobKind::RollbackStage,
        ] {
            assert!(!kind.as_str().is_empty());
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
