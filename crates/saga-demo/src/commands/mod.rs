mod batch;
mod run;

use std::process::ExitCode;

use clap::Subcommand;

use crate::config::DemoConfig;
use crate::error::Result;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run one order-fulfilment saga and print its report
    Run(run::RunArgs),
    /// Run several orders through an orchestrator and print statistics
    Batch(batch::BatchArgs),
}

impl Commands {
    pub(crate) fn execute(self, config: &DemoConfig) -> Result<ExitCode> {
        match self {
            Self::Run(args) => run::run(args, config),
            Self::Batch(args) => batch::run(args, config),
        }
    }
}
