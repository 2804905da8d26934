use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::StepFailure;
use crate::state::StepState;

/// Record of a step's execution in the saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    /// Position of the step in the saga.
    pub index: usize,
    /// Name of the step.
    pub name: String,
    /// Current state.
    pub state: StepState,
    /// Failure captured when the action failed.
    pub error: Option<StepFailure>,
    /// Failure captured when the compensation failed.
    pub compensation_error: Option<StepFailure>,
    /// Number of times the action was invoked.
    pub attempts: u32,
    /// Description of compensation.
    pub compensation_description: String,
    /// When the step started executing.
    pub started_at: Option<DateTime<Utc>>,
    /// When the step last finished (execution or compensation).
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    /// Whether the step committed an effect that is still in place.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.state == StepState::Completed
    }

    /// Whether the step's compensation failed, leaving an effect to undo by hand.
    #[must_use]
    pub fn needs_remediation(&self) -> bool {
        self.compensation_error.is_some()
    }
}

/// Audit log tracking all step executions in a saga.
///
/// Records are addressed by step index, so steps sharing a name are tracked separately.
#[derive(Debug, Clone, Default)]
pub struct SagaAuditLog {
    records: Vec<StepRecord>,
}

impl SagaAuditLog {
    /// Create a new empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly added step in the pending state.
    pub(crate) fn record_added(&mut self, name: &str, compensation_description: String) {
        self.records.push(StepRecord {
            index: self.records.len(),
            name: name.to_string(),
            state: StepState::Pending,
            error: None,
            compensation_error: None,
            attempts: 0,
            compensation_description,
            started_at: None,
            finished_at: None,
        });
    }

    /// Record a step execution starting.
    pub(crate) fn record_start(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.state = StepState::Running;
            record.started_at = Some(Utc::now());
        }
    }

    /// Mark the step as completed successfully.
    pub(crate) fn record_success(&mut self, index: usize, attempts: u32) {
        if let Some(record) = self.records.get_mut(index) {
            record.state = StepState::Completed;
            record.attempts = attempts;
            record.finished_at = Some(Utc::now());
        }
    }

    /// Mark the step as failed.
    pub(crate) fn record_failure(&mut self, index: usize, attempts: u32, failure: StepFailure) {
        if let Some(record) = self.records.get_mut(index) {
            record.state = StepState::Failed;
            record.attempts = attempts;
            record.error = Some(failure);
            record.finished_at = Some(Utc::now());
        }
    }

    /// Record that compensation of a step started.
    pub(crate) fn record_compensating(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.state = StepState::Compensating;
        }
    }

    /// Record that a step was compensated.
    pub(crate) fn record_compensated(&mut self, index: usize) {
        if let Some(record) = self.records.get_mut(index) {
            record.state = StepState::Compensated;
            record.finished_at = Some(Utc::now());
        }
    }

    /// Record that a step's compensation failed.
    pub(crate) fn record_compensation_failed(&mut self, index: usize, failure: StepFailure) {
        if let Some(record) = self.records.get_mut(index) {
            record.state = StepState::Failed;
            record.compensation_error = Some(failure);
            record.finished_at = Some(Utc::now());
        }
    }

    /// Get all records in the audit log.
    #[must_use]
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get a summary of the saga execution for display.
    #[must_use]
    pub fn summary(&self) -> String {
        summarize(&self.records)
    }
}

pub(crate) fn summarize(records: &[StepRecord]) -> String {
    let mut lines = Vec::new();
    for record in records {
        let status = match (record.state, record.needs_remediation()) {
            (StepState::Failed, true) => "⚠",
            (StepState::Failed, false) => "✗",
            (StepState::Completed, _) => "✓",
            (StepState::Compensated, _) => "↩",
            (StepState::Pending, _) => "·",
            (StepState::Running | StepState::Compensating, _) => "…",
        };
        let mut line = format!("{status} {}", record.name);
        if let Some(error) = &record.error {
            line.push_str(&format!(" ({}: {})", error.kind(), error.message()));
        }
        if let Some(error) = &record.compensation_error {
            line.push_str(&format!(
                " (compensation {}: {})",
                error.kind(),
                error.message()
            ));
        }
        lines.push(line);
    }
    lines.join("\n")
}
