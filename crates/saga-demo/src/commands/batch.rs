use std::process::ExitCode;

use clap::Args;
use saga_executor::SagaOrchestrator;

use crate::config::DemoConfig;
use crate::error::Result;
use crate::fulfillment::{FaultPlan, OrderRequest, add_fulfillment_steps};
use crate::output::{BatchSummary, OutputFormat};
use crate::services::Services;

const FIRST_ORDER_NUMBER: u32 = 10_000;

#[derive(Args)]
pub(crate) struct BatchArgs {
    /// Number of orders to process
    #[arg(long, default_value_t = 5)]
    count: u32,

    /// Run the sagas on separate threads
    #[arg(long)]
    parallel: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

/// The `index`-th order of a batch: `ORDER-10000` for $50, then $10 more per order.
fn batch_order(index: u32) -> OrderRequest {
    OrderRequest {
        order_id: format!("ORDER-{}", FIRST_ORDER_NUMBER + index),
        amount: 50.0 + f64::from(index) * 10.0,
    }
}

pub(crate) fn run(args: BatchArgs, config: &DemoConfig) -> Result<ExitCode> {
    let services = Services::new(&config.services);
    let mut orchestrator = SagaOrchestrator::new().with_retry_policy(config.retry_policy());

    for index in 0..args.count {
        let order = batch_order(index);
        let saga = orchestrator.create(order.order_id.clone())?;
        add_fulfillment_steps(saga, &services, &order, FaultPlan::default())?;
    }

    let reports = if args.parallel {
        orchestrator.execute_pending_parallel()
    } else {
        let ids: Vec<String> = orchestrator.ids().map(str::to_string).collect();
        ids.iter()
            .map(|id| orchestrator.execute(id))
            .collect::<std::result::Result<Vec<_>, _>>()?
    };

    let output = args.format.formatter().format_batch(&BatchSummary {
        sagas: &reports,
        stats: orchestrator.stats(),
    })?;
    print!("{output}");
    if args.format == OutputFormat::Json {
        println!();
    }

    Ok(ExitCode::SUCCESS)
}
