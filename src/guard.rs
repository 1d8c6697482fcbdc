//! The "never fail past this boundary" primitive.
//!
//! Every public entry point and every deferred report runs its body through
//! [`attempt`] or [`attempt_result`]. Errors and panics are logged and turned
//! into the caller-supplied fallback, so nothing raised inside the layer can
//! reach host application code.

use std::fmt::Display;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

/// Run `f`, returning `fallback` if it panics.
pub fn attempt<T>(context: &str, f: impl FnOnce() -> T, fallback: T) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            warn!(context, panic = %panic_message(&payload), "recovered from panic");
            fallback
        }
    }
}

/// Run a fallible `f`, returning `fallback` on `Err` or panic.
pub fn attempt_result<T, E: Display>(
    context: &str,
    f: impl FnOnce() -> Result<T, E>,
    fallback: T,
) -> T {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => {
            debug!(context, error = %err, "operation failed, using fallback");
            fallback
        }
        Err(payload) => {
            warn!(context, panic = %panic_message(&payload), "recovered from panic");
            fallback
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
