use saga_executor::{OrchestratorStats, SagaReport};

use super::{BatchSummary, ReportFormatter, RunSummary};
use crate::error::Result;

pub(crate) struct PlainTextFormatter;

impl PlainTextFormatter {
    fn format_header(output: &mut String, report: &SagaReport) {
        output.push_str(&format!("Saga {}: {}\n", report.saga_id, report.outcome()));
    }

    fn format_steps(output: &mut String, report: &SagaReport) {
        for line in report.summary().lines() {
            output.push_str(&format!("  {line}\n"));
        }
    }

    fn format_remediation(output: &mut String, report: &SagaReport) {
        let residual: Vec<_> = report.residual_failures().collect();
        if residual.is_empty() {
            return;
        }

        output.push_str("\nManual remediation required:\n");
        for record in residual {
            output.push_str(&format!(
                "  {}: {}\n",
                record.name, record.compensation_description
            ));
        }
    }

    fn format_journal(output: &mut String, journal: &[String]) {
        if journal.is_empty() {
            return;
        }

        output.push_str("\nService calls:\n");
        for entry in journal {
            output.push_str(&format!("  {entry}\n"));
        }
    }

    fn format_stats(output: &mut String, stats: &OrchestratorStats) {
        output.push_str("Orchestrator statistics:\n");
        output.push_str(&format!("  total: {}\n", stats.total));
        output.push_str(&format!("  completed: {}\n", stats.completed));
        output.push_str(&format!("  compensated: {}\n", stats.compensated));
        output.push_str(&format!(
            "  compensated with residual failures: {}\n",
            stats.residual
        ));
        output.push_str(&format!("  aborted: {}\n", stats.aborted));
    }
}

impl ReportFormatter for PlainTextFormatter {
    fn format_run(&self, run: &RunSummary<'_>) -> Result<String> {
        let mut output = String::new();
        Self::format_header(&mut output, run.report);
        Self::format_steps(&mut output, run.report);
        Self::format_remediation(&mut output, run.report);
        Self::format_journal(&mut output, run.journal);
        Ok(output)
    }

    fn format_batch(&self, batch: &BatchSummary<'_>) -> Result<String> {
        let mut output = String::new();
        for report in batch.sagas {
            Self::format_header(&mut output, report);
            Self::format_steps(&mut output, report);
            Self::format_remediation(&mut output, report);
            output.push('\n');
        }
        Self::format_stats(&mut output, &batch.stats);
        Ok(output)
    }
}
