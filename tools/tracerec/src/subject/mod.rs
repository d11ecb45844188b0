use crate::value::{ExceptionValue, Value};
use std::panic::{self, AssertUnwindSafe};

pub mod builtin;
pub mod registry;

pub trait Subject: Send + Sync {
    fn name(&self) -> &str;
    fn call(&self, input: &Value) -> Result<Value, ExceptionValue>;
}

/// Calls `subject`, turning a panic into a raised exception. The panic hook is
/// silenced for the duration of the call so nothing reaches stderr.
pub fn invoke(subject: &dyn Subject, input: &Value) -> Result<Value, ExceptionValue> {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let caught = panic::catch_unwind(AssertUnwindSafe(|| subject.call(input)));
    panic::set_hook(previous);
    match caught {
        Ok(outcome) => outcome,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "subject panicked".to_string());
            Err(ExceptionValue {
                message,
                stacktrace: format!("panic in subject `{}`", subject.name()),
            })
        }
    }
}
