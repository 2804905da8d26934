use std::process::ExitCode;

use clap::Args;
use saga_executor::Saga;
use tracing::info;

use crate::config::DemoConfig;
use crate::error::{CliError, Result};
use crate::fulfillment::{FaultPlan, OrderRequest, Stage, add_fulfillment_steps};
use crate::output::{OutputFormat, RunSummary};
use crate::services::Services;

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Order identifier, also used as the saga id
    #[arg(long, default_value = "ORDER-12345")]
    order_id: String,

    /// Amount to charge
    #[arg(long, default_value_t = 99.99)]
    amount: f64,

    /// Make this step's action fail
    #[arg(long, value_enum)]
    fail_at: Option<Stage>,

    /// Make this step's compensation fail
    #[arg(long, value_enum)]
    fail_compensation: Option<Stage>,

    /// Make this step's action panic
    #[arg(long, value_enum)]
    panic_at: Option<Stage>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

pub(crate) fn run(args: RunArgs, config: &DemoConfig) -> Result<ExitCode> {
    if args.order_id.trim().is_empty() {
        return Err(CliError::InvalidOrder("order id must not be empty".to_string()));
    }
    if !(args.amount.is_finite() && args.amount > 0.0) {
        return Err(CliError::InvalidOrder(format!(
            "amount must be a positive number, got {}",
            args.amount
        )));
    }

    let services = Services::new(&config.services);
    let order = OrderRequest {
        order_id: args.order_id,
        amount: args.amount,
    };
    let faults = FaultPlan {
        fail_at: args.fail_at,
        fail_compensation: args.fail_compensation,
        panic_at: args.panic_at,
    };

    let mut saga = Saga::new(order.order_id.clone()).with_retry_policy(config.retry_policy());
    add_fulfillment_steps(&mut saga, &services, &order, faults)?;
    let report = saga.execute()?;
    info!(saga_id = %report.saga_id, outcome = %report.outcome(), "order processed");

    let journal = services.journal.entries();
    let output = args.format.formatter().format_run(&RunSummary {
        report: &report,
        journal: &journal,
    })?;
    print!("{output}");
    if args.format == OutputFormat::Json {
        println!();
    }

    if report.succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
