//! Domain model for managed environments.

pub mod environment;

pub use environment::{EnvironmentModel, EnvironmentStore};
