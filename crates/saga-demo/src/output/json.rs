use super::{BatchSummary, ReportFormatter, RunSummary};
use crate::error::Result;

pub(crate) struct JsonFormatter;

impl ReportFormatter for JsonFormatter {
    fn format_run(&self, run: &RunSummary<'_>) -> Result<String> {
        Ok(serde_json::to_string_pretty(run)?)
    }

    fn format_batch(&self, batch: &BatchSummary<'_>) -> Result<String> {
        Ok(serde_json::to_string_pretty(batch)?)
    }
}
