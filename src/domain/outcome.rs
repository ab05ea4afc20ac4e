//! Settling remote call results.
//!
//! Each remote call made by the pipeline is settled into a [`CallOutcome`]
//! under a [`FailurePolicy`]. Calls are made once, sequentially.

use super::AppError;

/// How a failed call affects the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// A failure aborts the export.
    Abort,
    /// A failure is recorded as a warning and the export continues.
    Tolerate,
}

/// Settled result of one remote call.
#[derive(Debug)]
pub enum CallOutcome<T> {
    Done(T),
    /// Failed, but the export continues without the value.
    Degraded(AppError),
    /// Failed and the export must stop.
    Failed(AppError),
}

/// Settle `result` according to `policy`.
pub fn settle<T>(result: Result<T, AppError>, policy: FailurePolicy) -> CallOutcome<T> {
    match (result, policy) {
        (Ok(value), _) => CallOutcome::Done(value),
        (Err(err), FailurePolicy::Tolerate) => CallOutcome::Degraded(err),
        (Err(err), FailurePolicy::Abort) => CallOutcome::Failed(err),
    }
}
