//! The order-fulfilment saga: create the order, charge the customer, reserve stock,
//! and schedule shipping.

use std::fmt;

use clap::ValueEnum;
use saga_executor::{Saga, SagaError, SagaStep, StepFailure};

use crate::services::Services;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum Stage {
    CreateOrder,
    ProcessPayment,
    ReserveInventory,
    ScheduleShipping,
}

impl Stage {
    pub(crate) const ALL: [Self; 4] = [
        Self::CreateOrder,
        Self::ProcessPayment,
        Self::ReserveInventory,
        Self::ScheduleShipping,
    ];

    pub(crate) fn step_name(self) -> &'static str {
        match self {
            Self::CreateOrder => "create-order",
            Self::ProcessPayment => "process-payment",
            Self::ReserveInventory => "reserve-inventory",
            Self::ScheduleShipping => "schedule-shipping",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.step_name())
    }
}

/// Faults to inject into a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FaultPlan {
    pub fail_at: Option<Stage>,
    pub fail_compensation: Option<Stage>,
    pub panic_at: Option<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderRequest {
    pub order_id: String,
    pub amount: f64,
}

struct FulfillmentStep {
    stage: Stage,
    order: OrderRequest,
    services: Services,
    faults: FaultPlan,
}

impl SagaStep for FulfillmentStep {
    fn name(&self) -> &str {
        self.stage.step_name()
    }

    fn execute(&mut self) -> Result<(), StepFailure> {
        let order_id = self.order.order_id.as_str();
        if self.faults.panic_at == Some(self.stage) {
            panic!("injected panic in {} for {order_id}", self.stage);
        }
        if self.faults.fail_at == Some(self.stage) {
            return Err(StepFailure::rejected(format!(
                "injected failure in {} for {order_id}",
                self.stage
            )));
        }

        match self.stage {
            Stage::CreateOrder => self.services.orders.create(order_id),
            Stage::ProcessPayment => self.services.payments.charge(order_id, self.order.amount)?,
            Stage::ReserveInventory => self.services.inventory.reserve(order_id),
            Stage::ScheduleShipping => self.services.shipping.schedule(order_id),
        }
        Ok(())
    }

    fn compensate(&mut self) -> Result<(), StepFailure> {
        let order_id = self.order.order_id.as_str();
        if self.faults.fail_compensation == Some(self.stage) {
            return Err(StepFailure::rejected(format!(
                "injected compensation failure in {} for {order_id}",
                self.stage
            )));
        }

        match self.stage {
            Stage::CreateOrder => self.services.orders.cancel(order_id),
            Stage::ProcessPayment => self.services.payments.refund(order_id),
            Stage::ReserveInventory => self.services.inventory.release(order_id),
            Stage::ScheduleShipping => self.services.shipping.cancel(order_id),
        }
        Ok(())
    }

    fn compensation_description(&self) -> String {
        let order_id = &self.order.order_id;
        match self.stage {
            Stage::CreateOrder => format!("cancel order {order_id}"),
            Stage::ProcessPayment => format!("refund payment for {order_id}"),
            Stage::ReserveInventory => format!("release items reserved for {order_id}"),
            Stage::ScheduleShipping => format!("cancel shipment for {order_id}"),
        }
    }
}

/// Register the four fulfilment steps on `saga`, in order.
pub(crate) fn add_fulfillment_steps(
    saga: &mut Saga,
    services: &Services,
    order: &OrderRequest,
    faults: FaultPlan,
) -> Result<(), SagaError> {
    for stage in Stage::ALL {
        saga.add(FulfillmentStep {
            stage,
            order: order.clone(),
            services: services.clone(),
            faults,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use saga_executor::{FailureKind, SagaOutcome, StepState};

    use super::*;
    use crate::config::ServicesConfig;

    fn services() -> Services {
        Services::new(&ServicesConfig::default())
    }

    fn order() -> OrderRequest {
        OrderRequest {
            order_id: "ORDER-1".to_string(),
            amount: 99.99,
        }
    }

    fn run(services: &Services, faults: FaultPlan) -> anyhow::Result<saga_executor::SagaReport> {
        let mut saga = Saga::new("ORDER-1");
        add_fulfillment_steps(&mut saga, services, &order(), faults)?;
        Ok(saga.execute()?)
    }

    #[test]
    fn successful_order_touches_every_service() -> anyhow::Result<()> {
        let services = services();

        let report = run(&services, FaultPlan::default())?;

        assert!(report.succeeded());
        assert_eq!(
            services.journal.entries(),
            [
                "order-service: created ORDER-1",
                "payment-service: charged $99.99 for ORDER-1",
                "inventory-service: reserved items for ORDER-1",
                "shipping-service: scheduled shipment for ORDER-1",
            ]
        );
        Ok(())
    }

    #[test]
    fn inventory_failure_refunds_and_cancels() -> anyhow::Result<()> {
        let services = services();
        let faults = FaultPlan {
            fail_at: Some(Stage::ReserveInventory),
            ..FaultPlan::default()
        };

        let report = run(&services, faults)?;

        assert_eq!(report.outcome(), SagaOutcome::Compensated);
        assert_eq!(
            services.journal.entries(),
            [
                "order-service: created ORDER-1",
                "payment-service: charged $99.99 for ORDER-1",
                "payment-service: refunded ORDER-1",
                "order-service: cancelled ORDER-1",
            ]
        );
        Ok(())
    }

    #[test]
    fn failed_refund_is_left_for_remediation() -> anyhow::Result<()> {
        let services = services();
        let faults = FaultPlan {
            fail_at: Some(Stage::ScheduleShipping),
            fail_compensation: Some(Stage::ProcessPayment),
            ..FaultPlan::default()
        };

        let report = run(&services, faults)?;

        assert_eq!(report.outcome(), SagaOutcome::CompensatedWithResidualFailures);
        let residual: Vec<_> = report.residual_failures().collect();
        assert_eq!(residual.len(), 1);
        assert_eq!(residual[0].name, "process-payment");
        assert_eq!(
            residual[0].compensation_description,
            "refund payment for ORDER-1"
        );
        assert_eq!(report.steps[0].state, StepState::Compensated);
        Ok(())
    }

    #[test]
    fn injected_panic_becomes_unexpected_failure() -> anyhow::Result<()> {
        let services = services();
        let faults = FaultPlan {
            panic_at: Some(Stage::ProcessPayment),
            ..FaultPlan::default()
        };

        let report = run(&services, faults)?;

        let failed = report.failed_step().expect("payment failed");
        let error = failed.error.as_ref().expect("error recorded");
        assert_eq!(error.kind(), FailureKind::Unexpected);
        assert_eq!(error.message(), "injected panic in process-payment for ORDER-1");
        assert_eq!(
            services.journal.entries(),
            ["order-service: created ORDER-1", "order-service: cancelled ORDER-1"]
        );
        Ok(())
    }

    #[test]
    fn stage_names_match_command_line_values() {
        for stage in Stage::ALL {
            let value = stage.to_possible_value().expect("stage is not skipped");
            assert_eq!(value.get_name(), stage.step_name());
        }
    }
}
