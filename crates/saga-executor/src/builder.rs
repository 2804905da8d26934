use crate::erased::ClosureStep;
use crate::error::{SagaError, StepFailure};
use crate::retry::RetryPolicy;
use crate::saga::Saga;
use crate::step::SagaStep;

/// Fluent construction of a [`Saga`].
///
/// ```
/// use saga_executor::{SagaBuilder, StepFailure};
///
/// let mut saga = SagaBuilder::new()
///     .id("order-42")
///     .step("reserve_inventory", || Ok(()), || Ok(()))
///     .step(
///         "charge_card",
///         || Err(StepFailure::rejected("card declined")),
///         || Ok(()),
///     )
///     .build()?;
///
/// let report = saga.execute()?;
/// assert!(!report.succeeded());
/// # Ok::<(), saga_executor::SagaError>(())
/// ```
#[derive(Default)]
pub struct SagaBuilder {
    id: Option<String>,
    retry_policy: RetryPolicy,
    steps: Vec<Box<dyn SagaStep>>,
}

impl SagaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the saga id. A generated id is used when none is given.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Add a step built from an action and its compensation.
    #[must_use]
    pub fn step<A, C>(self, name: impl Into<String>, action: A, compensation: C) -> Self
    where
        A: FnMut() -> Result<(), StepFailure> + Send + 'static,
        C: FnMut() -> Result<(), StepFailure> + Send + 'static,
    {
        self.then(ClosureStep::new(name, action, compensation))
    }

    /// Add any [`SagaStep`] implementation.
    #[must_use]
    pub fn then<S>(mut self, step: S) -> Self
    where
        S: SagaStep + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Build the saga from the accumulated steps.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError::EmptyStepName`] if any step has an empty name.
    pub fn build(self) -> Result<Saga, SagaError> {
        let saga = match self.id {
            Some(id) => Saga::new(id),
            None => Saga::with_generated_id(),
        };
        let mut saga = saga.with_retry_policy(self.retry_policy);
        for step in self.steps {
            saga.add_boxed(step)?;
        }
        Ok(saga)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SagaState;

    struct ReadOnlyStep;

    impl SagaStep for ReadOnlyStep {
        fn name(&self) -> &str {
            "read_only"
        }

        fn execute(&mut self) -> Result<(), StepFailure> {
            Ok(())
        }
    }

    #[test]
    fn builder_keeps_step_order() -> anyhow::Result<()> {
        let saga = SagaBuilder::new()
            .id("order-1")
            .step("first", || Ok(()), || Ok(()))
            .then(ReadOnlyStep)
            .step("third", || Ok(()), || Ok(()))
            .build()?;

        let names: Vec<_> = saga.records().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["first", "read_only", "third"]);
        assert_eq!(saga.id(), "order-1");
        assert_eq!(saga.state(), SagaState::Pending);
        Ok(())
    }

    #[test]
    fn builder_generates_id_when_missing() -> anyhow::Result<()> {
        let saga = SagaBuilder::new().build()?;
        assert!(!saga.id().is_empty());
        Ok(())
    }

    #[test]
    fn builder_applies_retry_policy() -> anyhow::Result<()> {
        let saga = SagaBuilder::new()
            .retry_policy(RetryPolicy::standard())
            .build()?;
        assert_eq!(saga.retry_policy(), RetryPolicy::standard());
        Ok(())
    }

    #[test]
    fn builder_rejects_empty_step_name() {
        let result = SagaBuilder::new()
            .id("order-2")
            .step("", || Ok(()), || Ok(()))
            .build();

        assert!(matches!(result, Err(SagaError::EmptyStepName { .. })));
    }
}
