//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct. One invocation runs one
//! job; the job subcommands carry the per-kind parameters and the shared
//! `--noop` / `--force` flags.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Cutover - Blue-green deployment orchestration.
#[derive(Debug, Parser)]
#[command(name = "cutover")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (overrides default ~/.cutover/config.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory for the environment registry and job history
    #[arg(long, global = true, env = "CUTOVER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Spin up a new stage env from a live env
    #[command(long_about = "Spins up a new stage env, including a new application VM, its target \
application, and a test copy of the live database. Temporarily freezes the live application \
during the database copy.")]
    StagingDeploy(StagingDeployArgs),

    /// Reassign liveness from the old env to the new env
    GoLive(GoLiveArgs),

    /// Commit a prior go-live by destroying the old live env
    TeardownCommit(TeardownCommitArgs),

    /// Roll back a prior staging-deploy by destroying the stage env
    RollbackStage(RollbackStageArgs),

    /// Show recent job history
    History(HistoryArgs),

    /// Inspect and edit the environment registry
    Env(EnvArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Flags shared by every job subcommand.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct JobFlags {
    /// Print what the job WOULD do without taking any action that leaves
    /// side effects; read-only queries still run
    #[arg(long)]
    pub noop: bool,

    /// Attempt all tasks instead of skipping tasks that succeeded in the
    /// last recent try
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `staging-deploy` command.
#[derive(Debug, Clone, clap::Args)]
#[command(long_about = "Spins up a new stage env, including a new application VM, its target \
application, and a test copy of the live database. Temporarily freezes the live application \
during the database copy.")]
pub struct StagingDeployArgs {
    /// The live env: frozen during copy, its databases replicated, stage
    /// is based from it
    #[arg(long, value_name = "ENV")]
    pub live_env: String,

    /// The stage env to create. Must not exist beforehand
    #[arg(long, value_name = "ENV")]
    pub stage_env: String,

    /// Live logical database to stage physical instance, as
    /// logical=instance pairs (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "LOGICAL=INSTANCE")]
    pub db_map: Vec<String>,

    /// Packages to deploy to stage, as known to the package repository
    #[arg(long, value_delimiter = ',', value_name = "PKG")]
    pub packages: Vec<String>,

    #[command(flatten)]
    pub flags: JobFlags,
}

/// Arguments for the `go-live` command.
#[derive(Debug, Clone, clap::Args)]
#[command(long_about = "Reassigns liveness from the old env to the new env. The load balancer \
stays fixed in place: the new live VM is registered with it and the old live VM deregistered. \
When done, the old env is frozen and out of the live pool.")]
pub struct GoLiveArgs {
    /// The env currently live
    #[arg(long, value_name = "ENV")]
    pub old_live_env: String,

    /// The env taking over liveness
    #[arg(long, value_name = "ENV")]
    pub new_live_env: String,

    /// Name of the fixed live load balancer hosting the old live
    /// application
    #[arg(long, value_name = "LB")]
    pub fixed_lb: String,

    #[command(flatten)]
    pub flags: JobFlags,
}

/// Arguments for the `teardown-commit` command.
#[derive(Debug, Clone, clap::Args)]
#[command(long_about = "Commits the prior go-live by spinning down and destroying the old live \
env, including its databases.")]
pub struct TeardownCommitArgs {
    /// The old live env, which is to be deleted
    #[arg(long, value_name = "ENV")]
    pub delete_old_live_env: String,

    /// Services to shut down gracefully prior to VM deletion
    #[arg(long, value_delimiter = ',', value_name = "SERVICE")]
    pub stop_services: Vec<String>,

    #[command(flatten)]
    pub flags: JobFlags,
}

/// Arguments for the `rollback-stage` command.
#[derive(Debug, Clone, clap::Args)]
#[command(long_about = "Rolls back the prior staging-deploy by spinning down and destroying the \
stage env, including the test databases and the snapshots taken from live. The live env is \
treated 100% read-only in this job.")]
pub struct RollbackStageArgs {
    /// The stage env, which is to be deleted
    #[arg(long, value_name = "ENV")]
    pub delete_stage_env: String,

    /// The live env whose staging-deploy snapshots should be deleted
    #[arg(long, value_name = "ENV")]
    pub live_env: String,

    /// Services to shut down gracefully prior to VM deletion
    #[arg(long, value_delimiter = ',', value_name = "SERVICE")]
    pub stop_services: Vec<String>,

    #[command(flatten)]
    pub flags: JobFlags,
}

/// Arguments for the `history` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct HistoryArgs {
    /// Number of runs to show
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `env` command.
#[derive(Debug, Clone, clap::Args)]
pub struct EnvArgs {
    #[command(subcommand)]
    pub command: EnvCommands,
}

/// Environment registry subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum EnvCommands {
    /// List registered environments
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one environment
    Show {
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register or update an environment
    Add {
        name: String,

        /// Application VM instance id
        #[arg(long, value_name = "INSTANCE")]
        vm: Option<String>,

        /// Databases as logical=instance pairs (comma-separated)
        #[arg(long, value_delimiter = ',', value_name = "LOGICAL=INSTANCE")]
        db: Vec<String>,

        /// Load balancer fronting this environment
        #[arg(long, value_name = "LB")]
        lb: Option<String>,
    },

    /// Remove an environment from the registry
    Remove { name: String },
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
