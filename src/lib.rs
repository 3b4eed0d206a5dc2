//! Cutover - Blue-green deployment orchestration.
//!
//! Cutover runs one job per invocation: a fixed ordered sequence of tasks
//! that mutates or inspects external infrastructure (VMs, databases, load
//! balancers, package deployments). Runs are resumable: per-task outcomes
//! are persisted as the job proceeds, and a re-invocation with identical
//! parameters skips the tasks its relevant prior record marks successful.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and dispatch
//! - [`config`] - Tool configuration loading
//! - [`engine`] - Task sequence execution with resume-from-history
//! - [`error`] - Error types and result aliases
//! - [`history`] - Job/task records and the persistent history store
//! - [`jobs`] - Job kinds, typed parameters, and task assembly
//! - [`model`] - Environment registry
//! - [`poll`] - Generic progress polling of asynchronous operations
//! - [`provider`] - Provider gateway clients (HTTP and mock)
//! - [`tasks`] - Task trait and the concrete task catalog

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod jobs;
pub mod model;
pub mod poll;
pub mod provider;
pub mod tasks;

pub use error::{CutoverError, Result};
