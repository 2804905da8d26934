//! Integration tests for steps that only undo what they actually applied.

use std::sync::{Arc, Mutex};

use saga_executor::{RetryPolicy, Saga, SagaStep, StepFailure};

#[derive(Default)]
struct Warehouse {
    reserved: Vec<String>,
    operations: Vec<String>,
}

type SharedWarehouse = Arc<Mutex<Warehouse>>;

/// Reserves a product, remembering whether the reservation took effect.
struct ReserveStep {
    warehouse: SharedWarehouse,
    product: &'static str,
    in_stock: bool,
    reserved: bool,
}

impl ReserveStep {
    fn new(warehouse: &SharedWarehouse, product: &'static str, in_stock: bool) -> Self {
        Self {
            warehouse: Arc::clone(warehouse),
            product,
            in_stock,
            reserved: false,
        }
    }
}

impl SagaStep for ReserveStep {
    fn name(&self) -> &str {
        self.product
    }

    fn execute(&mut self) -> Result<(), StepFailure> {
        let mut warehouse = self.warehouse.lock().expect("warehouse poisoned");
        if self.in_stock {
            warehouse.reserved.push(self.product.to_string());
            warehouse.operations.push(format!("reserved {}", self.product));
            self.reserved = true;
        } else {
            warehouse
                .operations
                .push(format!("skipped {} (backorder)", self.product));
        }
        Ok(())
    }

    fn compensate(&mut self) -> Result<(), StepFailure> {
        if self.reserved {
            let mut warehouse = self.warehouse.lock().expect("warehouse poisoned");
            warehouse.reserved.retain(|p| p != self.product);
            warehouse.operations.push(format!("released {}", self.product));
            self.reserved = false;
        }
        Ok(())
    }

    fn compensation_description(&self) -> String {
        format!("release reservation of {}", self.product)
    }
}

/// Fails with a retryable error a fixed number of times, then succeeds.
struct FlakyStep {
    failures_left: u32,
}

impl SagaStep for FlakyStep {
    fn name(&self) -> &str {
        "flaky_gateway"
    }

    fn execute(&mut self) -> Result<(), StepFailure> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(StepFailure::retryable("gateway timeout"));
        }
        Ok(())
    }
}

fn operations(warehouse: &SharedWarehouse) -> Vec<String> {
    warehouse
        .lock()
        .expect("warehouse poisoned")
        .operations
        .clone()
}

#[test]
fn reservations_stay_in_place_on_success() -> anyhow::Result<()> {
    let warehouse = SharedWarehouse::default();
    let mut saga = Saga::new("order-1");
    saga.add(ReserveStep::new(&warehouse, "keyboard", true))?
        .add(ReserveStep::new(&warehouse, "mouse", true))?;

    let report = saga.execute()?;

    assert!(report.succeeded());
    assert_eq!(
        warehouse.lock().expect("warehouse poisoned").reserved,
        ["keyboard", "mouse"]
    );
    Ok(())
}

#[test]
fn compensation_releases_only_what_was_reserved() -> anyhow::Result<()> {
    let warehouse = SharedWarehouse::default();
    let mut saga = Saga::new("order-2");
    saga.add(ReserveStep::new(&warehouse, "keyboard", true))?
        .add(ReserveStep::new(&warehouse, "monitor", false))?
        .add_step(
            "charge_card",
            || Err(StepFailure::rejected("card declined")),
            || Ok(()),
        )?;

    saga.execute()?;

    assert_eq!(
        operations(&warehouse),
        [
            "reserved keyboard",
            "skipped monitor (backorder)",
            "released keyboard"
        ]
    );
    assert!(warehouse
        .lock()
        .expect("warehouse poisoned")
        .reserved
        .is_empty());
    Ok(())
}

#[test]
fn retry_policy_lets_flaky_step_recover() -> anyhow::Result<()> {
    let warehouse = SharedWarehouse::default();
    let mut saga = Saga::new("order-3").with_retry_policy(RetryPolicy::new(
        2,
        std::time::Duration::ZERO,
    ));
    saga.add(ReserveStep::new(&warehouse, "keyboard", true))?
        .add(FlakyStep { failures_left: 2 })?;

    let report = saga.execute()?;

    assert!(report.succeeded());
    assert_eq!(report.steps[1].attempts, 3);
    assert_eq!(operations(&warehouse), ["reserved keyboard"]);
    Ok(())
}

#[test]
fn exhausted_retries_trigger_compensation() -> anyhow::Result<()> {
    let warehouse = SharedWarehouse::default();
    let mut saga = Saga::new("order-4").with_retry_policy(RetryPolicy::new(
        1,
        std::time::Duration::ZERO,
    ));
    saga.add(ReserveStep::new(&warehouse, "keyboard", true))?
        .add(FlakyStep { failures_left: 5 })?;

    let report = saga.execute()?;

    assert!(!report.succeeded());
    assert_eq!(report.steps[1].attempts, 2);
    assert_eq!(
        operations(&warehouse),
        ["reserved keyboard", "released keyboard"]
    );
    Ok(())
}
