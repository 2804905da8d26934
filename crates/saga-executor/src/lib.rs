//! Orchestrated sagas with compensating transactions.
//!
//! A [`Saga`] runs an ordered list of steps, each pairing a forward action with a
//! compensation. When a step fails, every step that completed before it is compensated
//! in reverse order. Compensation failures are recorded and do not stop the unwind, so
//! the returned [`SagaReport`] always says which effects were committed, which were
//! rolled back, and which rollbacks need manual remediation.

mod audit;
mod builder;
mod erased;
mod error;
mod orchestrator;
mod report;
mod retry;
mod saga;
mod state;
mod step;
mod unwind;

pub use audit::{SagaAuditLog, StepRecord};
pub use builder::SagaBuilder;
pub use erased::ClosureStep;
pub use error::{CompensationError, FailureKind, SagaError, SagaFailure, StepFailure};
pub use orchestrator::{OrchestratorError, OrchestratorStats, SagaOrchestrator};
pub use report::{SagaOutcome, SagaReport};
pub use retry::RetryPolicy;
pub use saga::Saga;
pub use state::{SagaState, StepState};
pub use step::SagaStep;
