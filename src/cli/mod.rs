//! Command-line interface.

pub mod args;
pub mod dispatch;

pub use args::{Cli, Commands};
pub use dispatch::CommandDispatcher;
