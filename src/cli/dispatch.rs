//! Command dispatch.
//!
//! Builds typed job parameters from parsed arguments, validates the
//! environment names involved, looks up the relevant prior history, and
//! hands the constructed job to the engine. Also hosts the non-job
//! subcommands (history, env, completions).

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use tracing::info;

use super::args::{
    Cli, Commands, CompletionsArgs, EnvArgs, EnvCommands, GoLiveArgs, HistoryArgs, JobFlags,
    RollbackStageArgs, StagingDeployArgs, TeardownCommitArgs,
};
use crate::config::ToolConfig;
use crate::engine::TaskSequenceEngine;
use crate::error::{CutoverError, Result};
use crate::history::{HistoryStore, JobOutcome};
use crate::jobs::{
    CommonParams, GoLiveParams, Job, RollbackStageParams, StagingDeployParams,
    TeardownCommitParams,
};
use crate::model::{EnvironmentModel, EnvironmentStore};
use crate::poll::Poller;
use crate::provider::HttpProvider;
use crate::tasks::TaskContext;

/// Dispatches parsed CLI commands.
pub struct CommandDispatcher {
    config: ToolConfig,
    data_dir: PathBuf,
}

impl CommandDispatcher {
    pub fn new(config: ToolConfig, data_dir: PathBuf) -> Self {
        Self { config, data_dir }
    }

    /// Run the selected command and return the process exit code.
    pub fn dispatch(&self, cli: &Cli) -> Result<u8> {
        match &cli.command {
            Commands::StagingDeploy(args) => self.run_staging_deploy(args),
            Commands::GoLive(args) => self.run_go_live(args),
            Commands::TeardownCommit(args) => self.run_teardown_commit(args),
            Commands::RollbackStage(args) => self.run_rollback_stage(args),
            Commands::History(args) => self.show_history(args),
            Commands::Env(args) => self.run_env(args),
            Commands::Completions(args) => Self::generate_completions(args),
        }
    }

    fn run_staging_deploy(&self, args: &StagingDeployArgs) -> Result<u8> {
        let db_map = parse_pairs(&args.db_map, "db-map")?;
        if db_map.is_empty() {
            return Err(CutoverError::InvalidParameter {
                name: "db-map".to_string(),
                message: "expects at least one logical=instance pair".to_string(),
            });
        }

        let environments = EnvironmentStore::open(&self.data_dir)?;
        environments.verify_exists(&[args.live_env.as_str()])?;
        // The stage env is deliberately not checked here. Running from the
        // first task it must not exist; resuming past the task that created
        // it, it must. The tasks own those assertions.

        let command_line = format!(
            "staging-deploy --live-env {} --stage-env {} --db-map {} --packages {}",
            args.live_env,
            args.stage_env,
            join_pairs(&db_map),
            args.packages.join(",")
        );

        let job = Job::staging_deploy(StagingDeployParams {
            common: common_params(command_line, &args.flags),
            live_env: args.live_env.clone(),
            stage_env: args.stage_env.clone(),
            db_map,
            packages: args.packages.clone(),
        });

        self.execute_job(job, environments)
    }

    fn run_go_live(&self, args: &GoLiveArgs) -> Result<u8> {
        let environments = EnvironmentStore::open(&self.data_dir)?;
        environments.verify_exists(&[
            args.old_live_env.as_str(),
            args.new_live_env.as_str(),
        ])?;

        let command_line = format!(
            "go-live --old-live-env {} --new-live-env {} --fixed-lb {}",
            args.old_live_env, args.new_live_env, args.fixed_lb
        );

        let job = Job::go_live(GoLiveParams {
            common: common_params(command_line, &args.flags),
            old_live_env: args.old_live_env.clone(),
            new_live_env: args.new_live_env.clone(),
            fixed_lb: args.fixed_lb.clone(),
        });

        self.execute_job(job, environments)
    }

    fn run_teardown_commit(&self, args: &TeardownCommitArgs) -> Result<u8> {
        let environments = EnvironmentStore::open(&self.data_dir)?;
        environments.verify_exists(&[args.delete_old_live_env.as_str()])?;

        let command_line = format!(
            "teardown-commit --delete-old-live-env {} --stop-services {}",
            args.delete_old_live_env,
            args.stop_services.join(",")
        );

        let job = Job::teardown_commit(TeardownCommitParams {
            common: common_params(command_line, &args.flags),
            delete_old_live_env: args.delete_old_live_env.clone(),
            stop_services: args.stop_services.clone(),
        });

        self.execute_job(job, environments)
    }

    fn run_rollback_stage(&self, args: &RollbackStageArgs) -> Result<u8> {
        let environments = EnvironmentStore::open(&self.data_dir)?;
        environments.verify_exists(&[
            args.delete_stage_env.as_str(),
            args.live_env.as_str(),
        ])?;

        let command_line = format!(
            "rollback-stage --delete-stage-env {} --live-env {} --stop-services {}",
            args.delete_stage_env,
            args.live_env,
            args.stop_services.join(",")
        );

        let job = Job::rollback_stage(RollbackStageParams {
            common: common_params(command_line, &args.flags),
            delete_stage_env: args.delete_stage_env.clone(),
            live_env: args.live_env.clone(),
            stop_services: args.stop_services.clone(),
        });

        self.execute_job(job, environments)
    }

    /// Look up relevant prior history, run the engine, print the summary.
    fn execute_job(&self, job: Job, mut environments: EnvironmentStore) -> Result<u8> {
        let store = HistoryStore::open(&self.data_dir).with_retention(self.config.history_retention);

        let prior = store.find_relevant(
            job.kind(),
            job.env1(),
            job.env2(),
            job.command_line(),
            job.noop(),
            HistoryStore::default_max_age(),
        )?;
        match &prior {
            Some(record) => info!(
                "Found relevant prior attempt from {}",
                record.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => info!("No relevant prior attempt, starting fresh"),
        }

        let provider = HttpProvider::new(&self.config.provider_url)?;
        let mut ctx = TaskContext {
            noop: job.noop(),
            force: job.force(),
            provider: &provider,
            environments: &mut environments,
            poller: Poller::new(self.config.wait_policy()),
        };

        let engine = TaskSequenceEngine::new(&store);
        let record = engine.run(&job, &mut ctx, prior.as_ref())?;

        for line in record.summary_lines() {
            println!("{}", line);
        }
        match record.outcome {
            JobOutcome::Succeeded => {
                println!("Job '{}' succeeded", job.kind());
                Ok(0)
            }
            _ => {
                println!(
                    "Job '{}' failed; re-invoke with the same parameters to resume",
                    job.kind()
                );
                Ok(1)
            }
        }
    }

    fn show_history(&self, args: &HistoryArgs) -> Result<u8> {
        let store = HistoryStore::open(&self.data_dir);
        let runs = store.recent(args.limit)?;

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&runs)
                    .map_err(|e| anyhow::anyhow!("failed to render history: {}", e))?
            );
            return Ok(0);
        }

        if runs.is_empty() {
            println!("No job history");
            return Ok(0);
        }

        for run in &runs {
            let envs = match &run.env2 {
                Some(env2) => format!("{} {}", run.env1, env2),
                None => run.env1.clone(),
            };
            println!(
                "{} {} [{}] {:?}{}",
                run.started_at.format("%Y-%m-%d %H:%M:%S"),
                run.kind,
                envs,
                run.outcome,
                if run.noop { " (noop)" } else { "" }
            );
            for line in run.summary_lines() {
                println!("  {}", line);
            }
        }
        Ok(0)
    }

    fn run_env(&self, args: &EnvArgs) -> Result<u8> {
        let mut environments = EnvironmentStore::open(&self.data_dir)?;

        match &args.command {
            EnvCommands::List { json } => {
                let all: Vec<&EnvironmentModel> = environments.all().collect();
                if *json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&all)
                            .map_err(|e| anyhow::anyhow!("failed to render environments: {}", e))?
                    );
                } else if all.is_empty() {
                    println!("No environments registered");
                } else {
                    for env in all {
                        println!(
                            "{} (vm: {}, databases: {}, lb: {})",
                            env.name,
                            env.vm_instance.as_deref().unwrap_or("-"),
                            env.databases.len(),
                            env.load_balancer.as_deref().unwrap_or("-")
                        );
                    }
                }
                Ok(0)
            }
            EnvCommands::Show { name, json } => {
                let env = environments.require(name)?;
                if *json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(env)
                            .map_err(|e| anyhow::anyhow!("failed to render environment: {}", e))?
                    );
                } else {
                    println!("name: {}", env.name);
                    println!("vm: {}", env.vm_instance.as_deref().unwrap_or("-"));
                    println!("lb: {}", env.load_balancer.as_deref().unwrap_or("-"));
                    for (logical, physical) in &env.databases {
                        println!("db: {} = {}", logical, physical);
                    }
                }
                Ok(0)
            }
            EnvCommands::Add { name, vm, db, lb } => {
                let databases = parse_pairs(db, "db")?;
                let env = EnvironmentModel {
                    name: name.clone(),
                    vm_instance: vm.clone(),
                    databases,
                    load_balancer: lb.clone(),
                };
                environments.put(env)?;
                println!("Registered environment '{}'", name);
                Ok(0)
            }
            EnvCommands::Remove { name } => {
                environments.remove(name)?;
                println!("Removed environment '{}'", name);
                Ok(0)
            }
        }
    }

    fn generate_completions(args: &CompletionsArgs) -> Result<u8> {
        let mut command = Cli::command();
        clap_complete::generate(args.shell, &mut command, "cutover", &mut io::stdout());
        Ok(0)
    }
}

fn common_params(command_line: String, flags: &JobFlags) -> CommonParams {
    CommonParams {
        command_line,
        noop: flags.noop,
        force: flags.force,
    }
}

/// Parse `key=value` entries into an ordered map.
fn parse_pairs(entries: &[String], param: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for entry in entries {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            CutoverError::InvalidParameter {
                name: param.to_string(),
                message: format!("'{}' is not a key=value pair", entry),
            }
        })?;
        if key.is_empty() || value.is_empty() {
            return Err(CutoverError::InvalidParameter {
                name: param.to_string(),
                message: format!("'{}' has an empty key or value", entry),
            });
        }
        map.insert(key.to_string(), value.to_string());
    }
    Ok(map)
}

fn join_pairs(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}
