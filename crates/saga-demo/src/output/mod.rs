mod formatter;
mod json;
mod plain;

use clap::ValueEnum;

pub(crate) use formatter::{BatchSummary, ReportFormatter, RunSummary};
pub(crate) use json::JsonFormatter;
pub(crate) use plain::PlainTextFormatter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub(crate) fn formatter(self) -> Box<dyn ReportFormatter> {
        match self {
            Self::Text => Box::new(PlainTextFormatter),
            Self::Json => Box::new(JsonFormatter),
        }
    }
}
