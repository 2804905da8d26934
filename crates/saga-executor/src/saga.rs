use std::thread;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn};

use crate::audit::{SagaAuditLog, StepRecord};
use crate::erased::ClosureStep;
use crate::error::{SagaError, StepFailure};
use crate::report::SagaReport;
use crate::retry::RetryPolicy;
use crate::state::{SagaState, StepState};
use crate::step::SagaStep;
use crate::unwind::guarded;

const GENERATED_ID_WORDS: u8 = 3;

/// An ordered sequence of compensatable steps sharing one transaction id.
///
/// Steps execute in insertion order. If any step fails, previously completed steps
/// are compensated in reverse order (LIFO); the failing step itself is not
/// compensated and steps that never started are skipped.
///
/// A saga is single-shot: once [`execute`](Self::execute) has been called it cannot
/// be run again or extended. Retrying a business operation means building a new saga.
pub struct Saga {
    id: String,
    state: SagaState,
    steps: Vec<Box<dyn SagaStep>>,
    audit: SagaAuditLog,
    retry_policy: RetryPolicy,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Saga {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: SagaState::Pending,
            steps: Vec::new(),
            audit: SagaAuditLog::new(),
            retry_policy: RetryPolicy::none(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Create a saga with a generated, human-readable id such as `gently-humble-otter`.
    #[must_use]
    pub fn with_generated_id() -> Self {
        Self::new(generate_id())
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> SagaState {
        self.state
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step built from an action and its compensation.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError::AlreadyStarted`] once the saga has left the pending state,
    /// and [`SagaError::EmptyStepName`] for an empty name. The saga is unchanged in both
    /// cases.
    pub fn add_step<A, C>(
        &mut self,
        name: impl Into<String>,
        action: A,
        compensation: C,
    ) -> Result<&mut Self, SagaError>
    where
        A: FnMut() -> Result<(), StepFailure> + Send + 'static,
        C: FnMut() -> Result<(), StepFailure> + Send + 'static,
    {
        self.add(ClosureStep::new(name, action, compensation))
    }

    /// Append any [`SagaStep`] implementation.
    ///
    /// # Errors
    ///
    /// Same as [`add_step`](Self::add_step).
    pub fn add<S>(&mut self, step: S) -> Result<&mut Self, SagaError>
    where
        S: SagaStep + 'static,
    {
        self.add_boxed(Box::new(step))
    }

    pub(crate) fn add_boxed(&mut self, step: Box<dyn SagaStep>) -> Result<&mut Self, SagaError> {
        if self.state != SagaState::Pending {
            return Err(SagaError::AlreadyStarted {
                saga_id: self.id.clone(),
                step: step.name().to_string(),
                state: self.state,
            });
        }
        if step.name().is_empty() {
            return Err(SagaError::EmptyStepName {
                saga_id: self.id.clone(),
            });
        }

        debug!(saga_id = %self.id, step = step.name(), index = self.steps.len(), "added step");
        self.audit
            .record_added(step.name(), step.compensation_description());
        self.steps.push(step);
        Ok(self)
    }

    /// Execute the saga.
    ///
    /// Steps run strictly sequentially on the calling thread. A step failure, whether
    /// returned or raised as a panic, triggers compensation of every completed step in
    /// reverse order; a failing compensation is recorded and the unwind continues.
    ///
    /// The returned report tells whether the forward sequence succeeded and, if not,
    /// which steps were rolled back and which rollbacks failed.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError::AlreadyExecuted`] if the saga is not pending. Step failures
    /// are never returned as errors.
    pub fn execute(&mut self) -> Result<SagaReport, SagaError> {
        if self.state != SagaState::Pending {
            return Err(SagaError::AlreadyExecuted {
                saga_id: self.id.clone(),
                state: self.state,
            });
        }

        let span = info_span!("saga", saga_id = %self.id, steps = self.steps.len());
        let _entered = span.enter();

        self.transition(SagaState::Running);
        self.started_at = Some(Utc::now());

        let mut failed_index = None;
        for index in 0..self.steps.len() {
            if let Err(failure) = self.run_step(index) {
                failed_index = Some(index);
                warn!(
                    step = self.steps[index].name(),
                    index,
                    kind = %failure.kind(),
                    error = %failure,
                    "step failed, starting compensation"
                );
                break;
            }
        }

        match failed_index {
            None => {
                self.transition(SagaState::Completed);
                info!("saga completed");
            }
            Some(index) => {
                self.transition(SagaState::Compensating);
                let terminal = self.compensate(index);
                self.transition(terminal);
            }
        }

        self.finished_at = Some(Utc::now());
        Ok(self.report())
    }

    /// Snapshot of the saga and its steps. Stable once the saga has finished.
    #[must_use]
    pub fn report(&self) -> SagaReport {
        SagaReport::snapshot(
            &self.id,
            self.state,
            &self.audit,
            self.started_at,
            self.finished_at,
        )
    }

    #[must_use]
    pub fn audit_log(&self) -> &SagaAuditLog {
        &self.audit
    }

    /// Per-step records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        self.audit.records()
    }

    #[must_use]
    pub fn step_states(&self) -> Vec<StepState> {
        self.audit
            .records()
            .iter()
            .map(|record| record.state)
            .collect()
    }

    fn run_step(&mut self, index: usize) -> Result<(), StepFailure> {
        let step = &mut self.steps[index];
        debug!(step = step.name(), index, "executing step");
        self.audit.record_start(index);

        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            match guarded(|| step.execute()) {
                Ok(()) => {
                    debug!(step = step.name(), index, attempts, "step completed");
                    self.audit.record_success(index, attempts);
                    return Ok(());
                }
                Err(failure) if self.retry_policy.should_retry(&failure, attempts) => {
                    debug!(
                        step = step.name(),
                        index,
                        attempts,
                        error = %failure,
                        "retrying step"
                    );
                    thread::sleep(self.retry_policy.backoff());
                }
                Err(failure) => {
                    self.audit.record_failure(index, attempts, failure.clone());
                    return Err(failure);
                }
            }
        }
    }

    /// Unwind completed steps before `failed_index`, returning the terminal saga state.
    fn compensate(&mut self, failed_index: usize) -> SagaState {
        let mut terminal = SagaState::Compensated;
        let mut residual = 0_usize;

        for index in (0..failed_index).rev() {
            let state = self.audit.records()[index].state;
            if state != StepState::Completed {
                error!(
                    index,
                    %state,
                    "step before the failing step is not completed, aborting rollback bookkeeping"
                );
                terminal = SagaState::Failed;
                continue;
            }

            let step = &mut self.steps[index];
            debug!(
                step = step.name(),
                index,
                description = %step.compensation_description(),
                "compensating step"
            );
            self.audit.record_compensating(index);

            match guarded(|| step.compensate()) {
                Ok(()) => {
                    debug!(step = step.name(), index, "step compensated");
                    self.audit.record_compensated(index);
                }
                Err(failure) => {
                    residual += 1;
                    warn!(
                        step = step.name(),
                        index,
                        kind = %failure.kind(),
                        error = %failure,
                        "compensation failed, continuing rollback"
                    );
                    self.audit.record_compensation_failed(index, failure);
                }
            }
        }

        if residual == 0 {
            info!("saga compensated");
        } else {
            warn!(residual, "saga compensated with residual failures");
        }
        terminal
    }

    fn transition(&mut self, next: SagaState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid saga transition {} -> {next}",
            self.state
        );
        debug!(from = %self.state, to = %next, "saga state changed");
        self.state = next;
    }
}

impl std::fmt::Debug for Saga {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Saga")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("steps", &self.audit.records())
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

fn generate_id() -> String {
    petname::petname(GENERATED_ID_WORDS, "-").unwrap_or_else(|| {
        let millis = Utc::now().timestamp_millis();
        format!("saga-{millis}")
    })
}
