//! In-process stand-ins for the services an order touches.
//!
//! Every call is written to a shared [`Journal`] so a run's side effects can be
//! printed and checked after the saga finishes.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use saga_executor::StepFailure;
use thiserror::Error;
use tracing::trace;

use crate::config::ServicesConfig;

#[derive(Debug, Error)]
pub(crate) enum ServiceError {
    #[error("payment gateway timed out for order {order_id}")]
    GatewayTimeout { order_id: String },
}

impl From<ServiceError> for StepFailure {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::GatewayTimeout { .. } => StepFailure::retryable(error.to_string()),
        }
    }
}

/// Ordered record of service calls, shared by all services of a run.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn record(&self, entry: String) {
        trace!(%entry, "service call");
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct OrderService {
    journal: Journal,
    latency: Duration,
}

impl OrderService {
    pub(crate) fn create(&self, order_id: &str) {
        thread::sleep(self.latency);
        self.journal.record(format!("order-service: created {order_id}"));
    }

    pub(crate) fn cancel(&self, order_id: &str) {
        thread::sleep(self.latency);
        self.journal
            .record(format!("order-service: cancelled {order_id}"));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PaymentService {
    journal: Journal,
    latency: Duration,
    failure_rate: f64,
    rng: Arc<Mutex<StdRng>>,
}

impl PaymentService {
    pub(crate) fn charge(&self, order_id: &str, amount: f64) -> Result<(), ServiceError> {
        thread::sleep(self.latency);
        let timed_out = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.failure_rate);
        if timed_out {
            self.journal
                .record(format!("payment-service: timed out charging {order_id}"));
            return Err(ServiceError::GatewayTimeout {
                order_id: order_id.to_string(),
            });
        }
        self.journal
            .record(format!("payment-service: charged ${amount:.2} for {order_id}"));
        Ok(())
    }

    pub(crate) fn refund(&self, order_id: &str) {
        thread::sleep(self.latency);
        self.journal
            .record(format!("payment-service: refunded {order_id}"));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InventoryService {
    journal: Journal,
    latency: Duration,
}

impl InventoryService {
    pub(crate) fn reserve(&self, order_id: &str) {
        thread::sleep(self.latency);
        self.journal
            .record(format!("inventory-service: reserved items for {order_id}"));
    }

    pub(crate) fn release(&self, order_id: &str) {
        thread::sleep(self.latency);
        self.journal
            .record(format!("inventory-service: released items for {order_id}"));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ShippingService {
    journal: Journal,
    latency: Duration,
}

impl ShippingService {
    pub(crate) fn schedule(&self, order_id: &str) {
        thread::sleep(self.latency);
        self.journal
            .record(format!("shipping-service: scheduled shipment for {order_id}"));
    }

    pub(crate) fn cancel(&self, order_id: &str) {
        thread::sleep(self.latency);
        self.journal
            .record(format!("shipping-service: cancelled shipment for {order_id}"));
    }
}

/// The four services of the order-fulfilment flow, sharing one journal.
///
/// Cloning is cheap and clones share the journal and the payment generator.
#[derive(Debug, Clone)]
pub(crate) struct Services {
    pub orders: OrderService,
    pub payments: PaymentService,
    pub inventory: InventoryService,
    pub shipping: ShippingService,
    pub journal: Journal,
}

impl Services {
    pub(crate) fn new(config: &ServicesConfig) -> Self {
        let journal = Journal::default();
        let latency = Duration::from_millis(config.latency_ms);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            orders: OrderService {
                journal: journal.clone(),
                latency,
            },
            payments: PaymentService {
                journal: journal.clone(),
                latency,
                failure_rate: config.payment_failure_rate.clamp(0.0, 1.0),
                rng: Arc::new(Mutex::new(rng)),
            },
            inventory: InventoryService {
                journal: journal.clone(),
                latency,
            },
            shipping: ShippingService {
                journal: journal.clone(),
                latency,
            },
            journal,
        }
    }
}

#[cfg(test)]
mod tests {
    use saga_executor::FailureKind;

    use super::*;

    fn services(payment_failure_rate: f64) -> Services {
        Services::new(&ServicesConfig {
            payment_failure_rate,
            latency_ms: 0,
            seed: Some(1),
        })
    }

    #[test]
    fn calls_are_journaled_in_order() {
        let services = services(0.0);

        services.orders.create("ORDER-1");
        services
            .payments
            .charge("ORDER-1", 99.99)
            .expect("payments never fail at rate 0");
        services.payments.refund("ORDER-1");
        services.orders.cancel("ORDER-1");

        assert_eq!(
            services.journal.entries(),
            [
                "order-service: created ORDER-1",
                "payment-service: charged $99.99 for ORDER-1",
                "payment-service: refunded ORDER-1",
                "order-service: cancelled ORDER-1",
            ]
        );
    }

    #[test]
    fn certain_failure_rate_always_times_out() {
        let services = services(1.0);

        let err = services
            .payments
            .charge("ORDER-2", 10.0)
            .expect_err("rate 1 always fails");

        let failure = StepFailure::from(err);
        assert_eq!(failure.kind(), FailureKind::Retryable);
        assert!(failure.message().contains("ORDER-2"));
    }

    #[test]
    fn same_seed_gives_same_payment_outcomes() {
        let outcomes = |services: &Services| -> Vec<bool> {
            (0..20)
                .map(|i| services.payments.charge(&format!("ORDER-{i}"), 1.0).is_ok())
                .collect()
        };

        assert_eq!(outcomes(&services(0.5)), outcomes(&services(0.5)));
    }
}
