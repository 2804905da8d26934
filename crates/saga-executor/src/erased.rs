use crate::error::StepFailure;
use crate::step::SagaStep;

/// A [`SagaStep`] assembled from a name and two closures.
///
/// This is what [`Saga::add_step`](crate::Saga::add_step) stores; it can also be built
/// directly and passed to [`Saga::add`](crate::Saga::add).
pub struct ClosureStep<A, C> {
    name: String,
    description: Option<String>,
    action: A,
    compensation: C,
}

impl<A, C> ClosureStep<A, C>
where
    A: FnMut() -> Result<(), StepFailure> + Send,
    C: FnMut() -> Result<(), StepFailure> + Send,
{
    #[must_use]
    pub fn new(name: impl Into<String>, action: A, compensation: C) -> Self {
        Self {
            name: name.into(),
            description: None,
            action,
            compensation,
        }
    }

    /// Override the default `undo <name>` compensation description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<A, C> SagaStep for ClosureStep<A, C>
where
    A: FnMut() -> Result<(), StepFailure> + Send,
    C: FnMut() -> Result<(), StepFailure> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self) -> Result<(), StepFailure> {
        (self.action)()
    }

    fn compensate(&mut self) -> Result<(), StepFailure> {
        (self.compensation)()
    }

    fn compensation_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("undo {}", self.name))
    }
}
