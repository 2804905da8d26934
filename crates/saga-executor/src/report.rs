use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::audit::{SagaAuditLog, StepRecord, summarize};
use crate::error::{CompensationError, SagaFailure};
use crate::state::{SagaState, StepState};

/// Overall result of a saga run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SagaOutcome {
    /// Not executed yet, or still running.
    InProgress,
    /// Every step completed.
    Succeeded,
    /// A step failed and every completed step was compensated.
    Compensated,
    /// A step failed and at least one compensation failed too.
    CompensatedWithResidualFailures,
    /// Rollback stopped on an internal inconsistency.
    Aborted,
}

impl fmt::Display for SagaOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InProgress => "in-progress",
            Self::Succeeded => "succeeded",
            Self::Compensated => "compensated",
            Self::CompensatedWithResidualFailures => "compensated-with-residual-failures",
            Self::Aborted => "aborted",
        };
        f.write_str(label)
    }
}

/// Snapshot of a saga and its steps, suitable for an audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SagaReport {
    pub saga_id: String,
    pub state: SagaState,
    pub outcome: SagaOutcome,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<StepRecord>,
}

impl SagaReport {
    pub(crate) fn snapshot(
        saga_id: &str,
        state: SagaState,
        audit: &SagaAuditLog,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Self {
        let residual = audit.records().iter().any(StepRecord::needs_remediation);
        let outcome = match state {
            SagaState::Pending | SagaState::Running | SagaState::Compensating => {
                SagaOutcome::InProgress
            }
            SagaState::Completed => SagaOutcome::Succeeded,
            SagaState::Compensated if residual => SagaOutcome::CompensatedWithResidualFailures,
            SagaState::Compensated => SagaOutcome::Compensated,
            SagaState::Failed => SagaOutcome::Aborted,
        };
        Self {
            saga_id: saga_id.to_string(),
            state,
            outcome,
            started_at,
            finished_at,
            steps: audit.records().to_vec(),
        }
    }

    /// Whether the forward sequence fully succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome == SagaOutcome::Succeeded
    }

    #[must_use]
    pub fn outcome(&self) -> SagaOutcome {
        self.outcome
    }

    /// The step whose action failed, if any.
    #[must_use]
    pub fn failed_step(&self) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.error.is_some())
    }

    /// Steps whose effects are still in place.
    pub fn committed_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|record| record.is_committed())
    }

    /// Steps whose effects were rolled back.
    pub fn compensated_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|record| record.state == StepState::Compensated)
    }

    /// Steps whose compensation failed and that need manual remediation.
    pub fn residual_failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|record| record.needs_remediation())
    }

    /// One line per step, prefixed by a status glyph.
    #[must_use]
    pub fn summary(&self) -> String {
        summarize(&self.steps)
    }

    /// Convert the report into a `Result`, for callers that want to propagate failure.
    ///
    /// # Errors
    ///
    /// Returns [`SagaFailure::StepFailed`] when a step failed and rollback was clean,
    /// [`SagaFailure::CompensationFailed`] when some compensations failed as well, and
    /// [`SagaFailure::Aborted`] when the saga did not reach a normal terminal state.
    pub fn into_result(self) -> Result<(), SagaFailure> {
        if self.succeeded() {
            return Ok(());
        }
        if self.outcome == SagaOutcome::Aborted || self.outcome == SagaOutcome::InProgress {
            return Err(SagaFailure::Aborted {
                saga_id: self.saga_id,
                state: self.state,
            });
        }

        let failed = self
            .steps
            .iter()
            .find_map(|record| record.error.clone().map(|error| (record.name.clone(), error)));
        let Some((failed_step, step_error)) = failed else {
            return Err(SagaFailure::Aborted {
                saga_id: self.saga_id,
                state: self.state,
            });
        };

        // Compensation runs last-completed-first; report failures in that order.
        let compensation_errors: Vec<CompensationError> = self
            .steps
            .iter()
            .rev()
            .filter_map(|record| {
                record
                    .compensation_error
                    .clone()
                    .map(|error| CompensationError {
                        step: record.name.clone(),
                        index: record.index,
                        description: record.compensation_description.clone(),
                        error,
                    })
            })
            .collect();

        if compensation_errors.is_empty() {
            Err(SagaFailure::StepFailed {
                step: failed_step,
                source: step_error,
            })
        } else {
            Err(SagaFailure::CompensationFailed {
                failed_step,
                step_error,
                compensation_errors,
            })
        }
    }
}
