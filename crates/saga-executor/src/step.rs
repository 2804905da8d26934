use crate::error::StepFailure;

/// A step in a saga that can be executed and compensated.
///
/// `execute` performs the forward effect; `compensate` semantically undoes it and is
/// only called when a later step fails after this one completed. Both report failure
/// through [`StepFailure`]. A panic inside either is caught by the executor and treated
/// as an unexpected failure.
///
/// Steps run on whichever thread calls [`Saga::execute`](crate::Saga::execute), hence
/// the `Send` bound.
pub trait SagaStep: Send {
    /// Human-readable name for logging and reporting. Need not be unique.
    fn name(&self) -> &str;

    /// Perform the step's forward effect.
    ///
    /// # Errors
    ///
    /// Returns a [`StepFailure`] if the step could not commit its effect.
    fn execute(&mut self) -> Result<(), StepFailure>;

    /// Compensate (undo) the step's effects.
    ///
    /// The default implementation is a no-op, suitable for read-only steps.
    ///
    /// # Errors
    ///
    /// Returns a [`StepFailure`] if the effect could not be undone.
    fn compensate(&mut self) -> Result<(), StepFailure> {
        Ok(())
    }

    /// Human-readable description of what compensation will do.
    fn compensation_description(&self) -> String {
        format!("undo {}", self.name())
    }
}
