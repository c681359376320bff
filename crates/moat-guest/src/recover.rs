//! Panic containment for guest entry points.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::arena::MemoryArena;
use crate::error::AbiError;

/// Runs `f`, turning a panic into [`AbiError::Panicked`].
///
/// On panic every buffer in `arena` is released so a trapped call cannot
/// leak accounted memory into the next one.
pub fn recover<T, F>(arena: &MemoryArena, f: F) -> Result<T, AbiError>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = panic_message(payload.as_ref());
        let released = arena.allocation_count();
        arena.release_all();
        tracing::error!(message = %message, released, "guest call panicked");
        AbiError::Panicked { message }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
