//! Generic progress polling for asynchronous provider operations.
//!
//! Cloud operations like snapshot creation finish on their own schedule.
//! Each awaited condition gets a [`ProgressChecker`] implementation that
//! knows how to classify the provider's status reports; the [`Poller`]
//! drives any checker through an initial check plus bounded timed followup
//! checks and produces a terminal [`PollOutcome`].
//!
//! Timeout is a soft failure: the poller logs it and hands back an empty
//! outcome instead of an error, leaving the enclosing task to decide.

pub mod database;
pub mod health;
pub mod snapshot;
pub mod vm;

pub use database::DbInstanceProgressChecker;
pub use health::TargetHealthProgressChecker;
pub use snapshot::SnapshotProgressChecker;
pub use vm::VmStateProgressChecker;

use std::thread;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::Result;

/// Terminal outcome of waiting on one asynchronous operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The awaited condition was reached.
    Complete(T),
    /// The provider reported a state outside the expected transition.
    Failed(String),
    /// The wait budget ran out while the operation was still in progress.
    TimedOut,
}

impl<T> PollOutcome<T> {
    /// The success payload, if the condition was reached.
    pub fn complete(self) -> Option<T> {
        match self {
            PollOutcome::Complete(value) => Some(value),
            _ => None,
        }
    }

    /// Short label for log and failure messages.
    pub fn describe(&self) -> &str {
        match self {
            PollOutcome::Complete(_) => "complete",
            PollOutcome::Failed(reason) => reason,
            PollOutcome::TimedOut => "timed out",
        }
    }
}

/// Classification state carried by checker implementations between checks.
#[derive(Debug, Clone)]
pub enum CheckState<T> {
    /// Still in progress, keep waiting.
    Pending,
    /// Terminal success.
    Complete(T),
    /// Terminal failure reported by the provider.
    Failed(String),
}

impl<T> CheckState<T> {
    /// True once a terminal state was observed.
    pub fn is_done(&self) -> bool {
        !matches!(self, CheckState::Pending)
    }

    /// Convert into the poll outcome, leaving `Pending` behind.
    ///
    /// A still-pending state maps to [`PollOutcome::TimedOut`]; the poller
    /// only takes the outcome after `is_done` or budget exhaustion.
    pub fn take(&mut self) -> PollOutcome<T> {
        match std::mem::replace(self, CheckState::Pending) {
            CheckState::Pending => PollOutcome::TimedOut,
            CheckState::Complete(value) => PollOutcome::Complete(value),
            CheckState::Failed(reason) => PollOutcome::Failed(reason),
        }
    }
}

/// One specific asynchronous external condition.
///
/// Implementations hold the requested resource identity and classify each
/// observed status three ways: terminal success, still in progress, or an
/// unexpected terminal failure. A provider response that names a different
/// resource than the one requested is a client/provider mismatch and must
/// be returned as a fatal error, never retried.
pub trait ProgressChecker {
    /// Success payload produced when the condition is reached.
    type Output;

    /// Label for logging and diagnostics.
    fn description(&self) -> String;

    /// Validate and classify the first provider response.
    fn initial_check(&mut self) -> Result<()>;

    /// Re-query the provider and reclassify. `wait_num` starts at 1.
    fn followup_check(&mut self, wait_num: u32) -> Result<()>;

    /// True once a terminal state (success or failure) was observed.
    fn is_done(&self) -> bool;

    /// The terminal outcome. Only meaningful once `is_done` is true.
    fn take_outcome(&mut self) -> PollOutcome<Self::Output>;

    /// Invoked when the wait budget is exhausted without a terminal state.
    /// Logs the situation and yields the empty outcome; no error is raised.
    fn timeout(&mut self) -> PollOutcome<Self::Output> {
        error!("{} did not finish before timeout", self.description());
        PollOutcome::TimedOut
    }
}

/// Wait budget for one poll: a fixed delay between checks and a maximum
/// number of followup checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Fixed delay between checks.
    pub delay: Duration,
    /// Maximum number of followup checks after the initial one.
    pub max_waits: u32,
}

impl WaitPolicy {
    /// Default delay between checks, in seconds.
    pub const DEFAULT_DELAY_SECS: u64 = 10;

    /// Default maximum number of followup checks.
    pub const DEFAULT_MAX_WAITS: u32 = 60;

    pub fn new(delay: Duration, max_waits: u32) -> Self {
        Self { delay, max_waits }
    }

    /// Total wait budget across all followup checks.
    pub fn max_wait(&self) -> Duration {
        self.delay * self.max_waits
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(Self::DEFAULT_DELAY_SECS),
            max_waits: Self::DEFAULT_MAX_WAITS,
        }
    }
}

/// Generic driver for any [`ProgressChecker`].
///
/// One poller instance is shared by every task in a job run; the checker
/// carries all per-operation state.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    policy: WaitPolicy,
}

impl Poller {
    pub fn new(policy: WaitPolicy) -> Self {
        Self { policy }
    }

    /// Drive the checker until it reaches a terminal state or the wait
    /// budget is exhausted.
    ///
    /// Errors out of the checks (identity mismatch, transport failure) are
    /// fatal and propagate immediately; exhaustion of the budget is a soft
    /// failure reported through the returned outcome.
    pub fn wait_for<C: ProgressChecker>(&self, checker: &mut C) -> Result<PollOutcome<C::Output>> {
        debug!("Waiting on {}", checker.description());
        checker.initial_check()?;

        let mut wait_num: u32 = 0;
        while !checker.is_done() {
            if wait_num >= self.policy.max_waits {
                return Ok(checker.timeout());
            }
            thread::sleep(self.policy.delay);
            wait_num += 1;
            debug!(
                "Followup check #{}/{} on {}",
                wait_num,
                self.policy.max_waits,
                checker.description()
            );
            checker.followup_check(wait_num)?;
        }

        Ok(checker.take_outcome())
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(WaitPolicy::default())
    }
}
