use saga_executor::{OrchestratorStats, SagaReport};
use serde::Serialize;

use crate::error::Result;

/// A single saga run together with the service calls it made.
#[derive(Debug, Serialize)]
pub(crate) struct RunSummary<'a> {
    pub report: &'a SagaReport,
    pub journal: &'a [String],
}

/// Every saga of a batch plus the orchestrator counters.
#[derive(Debug, Serialize)]
pub(crate) struct BatchSummary<'a> {
    pub sagas: &'a [SagaReport],
    pub stats: OrchestratorStats,
}

pub(crate) trait ReportFormatter {
    fn format_run(&self, run: &RunSummary<'_>) -> Result<String>;
    fn format_batch(&self, batch: &BatchSummary<'_>) -> Result<String>;
}
