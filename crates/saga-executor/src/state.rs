use std::fmt;

use serde::Serialize;

/// Lifecycle of a single step within one saga run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Added to the saga, not yet started.
    Pending,
    /// Action is being invoked.
    Running,
    /// Action succeeded; its effect is committed.
    Completed,
    /// Action failed, or compensation of a completed step failed.
    Failed,
    /// Compensation is being invoked.
    Compensating,
    /// Compensation succeeded; the step's effect was undone.
    Compensated,
}

impl StepState {
    /// Whether rollback can no longer change this step.
    ///
    /// `Completed` is not settled: it is final for a successful saga but is still
    /// compensated if a later step fails.
    #[must_use]
    pub fn is_settled_after_rollback(self) -> bool {
        matches!(self, Self::Failed | Self::Compensated)
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
        };
        f.write_str(label)
    }
}

/// Lifecycle of a saga.
///
/// `Pending → Running → Completed`, or `Pending → Running → Compensating → Compensated`
/// when a step fails. `Failed` is only reached when the executor's own bookkeeping is
/// found to be inconsistent during rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    Pending,
    Running,
    Completed,
    Compensating,
    Compensated,
    Failed,
}

impl SagaState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Compensated | Self::Failed)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed | Self::Compensating)
                | (Self::Compensating, Self::Compensated | Self::Failed)
        )
    }
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
