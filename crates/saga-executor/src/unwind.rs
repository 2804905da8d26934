use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::error::StepFailure;

/// Invoke a step callable, converting a panic into an unexpected failure.
///
/// The step is not touched again after a panic except for reporting, so observing it
/// in a possibly broken state is acceptable.
pub(crate) fn guarded<F>(call: F) -> Result<(), StepFailure>
where
    F: FnOnce() -> Result<(), StepFailure>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => Err(StepFailure::unexpected(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "step panicked with a non-string payload".to_string()
    }
}
