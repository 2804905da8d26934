use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::state::SagaState;

/// How a step's action or compensation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FailureKind {
    /// The step declined through its normal result channel (business rule, unavailable resource).
    Rejected,
    /// The step failed transiently and may succeed if invoked again.
    Retryable,
    /// The step failed outside its declared result channel, e.g. by panicking.
    Unexpected,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Rejected => "rejected",
            Self::Retryable => "retryable",
            Self::Unexpected => "unexpected",
        };
        f.write_str(label)
    }
}

/// Failure reported by a step's action or compensation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message}")]
pub struct StepFailure {
    kind: FailureKind,
    message: String,
}

impl StepFailure {
    /// An expected failure; drives compensation but is not a defect.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Rejected,
            message: message.into(),
        }
    }

    /// A transient failure, retried when the saga carries a retry policy.
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Retryable,
            message: message.into(),
        }
    }

    /// A failure that points at a defect in the step itself.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Unexpected,
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error as an unexpected failure, keeping its source chain in the message.
    #[must_use]
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::unexpected(message)
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Retryable
    }
}

/// Misuse of a saga. Business failures never surface through this type.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SagaError {
    /// A step was added after execution started.
    #[error("cannot add step '{step}' to saga '{saga_id}': saga is already {state}")]
    AlreadyStarted {
        saga_id: String,
        step: String,
        state: SagaState,
    },

    /// `execute()` was called on a saga that is not pending.
    #[error("saga '{saga_id}' was already executed (state: {state})")]
    AlreadyExecuted { saga_id: String, state: SagaState },

    /// A step was added with an empty name.
    #[error("step names must not be empty (saga '{saga_id}')")]
    EmptyStepName { saga_id: String },
}

/// Error from a failed compensation operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compensation failed for step '{step}': {description}")]
pub struct CompensationError {
    /// Name of the step whose compensation failed.
    pub step: String,
    /// Position of the step in the saga.
    pub index: usize,
    /// Description of what the compensation was trying to do.
    pub description: String,
    /// The underlying failure.
    #[source]
    pub error: StepFailure,
}

/// Error form of a saga run that did not complete.
///
/// Obtained from [`SagaReport::into_result`](crate::SagaReport::into_result) for callers
/// who prefer `?` over inspecting the report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaFailure {
    /// A step failed and all compensations succeeded.
    #[error("step '{step}' failed")]
    StepFailed {
        /// Name of the step that failed.
        step: String,
        /// The failure that stopped the saga.
        #[source]
        source: StepFailure,
    },

    /// A step failed and some compensations also failed.
    #[error("step '{failed_step}' failed, and {} compensation(s) also failed", compensation_errors.len())]
    CompensationFailed {
        /// Name of the step that originally failed.
        failed_step: String,
        /// The failure from the step.
        step_error: StepFailure,
        /// Errors from failed compensations, in the order they were attempted.
        compensation_errors: Vec<CompensationError>,
    },

    /// The saga stopped without a failing step, which means its bookkeeping is inconsistent.
    #[error("saga '{saga_id}' aborted in state {state}")]
    Aborted { saga_id: String, state: SagaState },
}
