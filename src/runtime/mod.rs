//! Library lifecycle and the process-wide context used by the C ABI.
//!
//! Rust callers can hold an [`ArlContext`] directly. The C entry points share
//! one context in a process-wide slot; every call locks the slot for its
//! whole duration, so calls through the C ABI never run concurrently.

pub mod config;
pub mod context;

pub use config::{ArlConfig, DEFAULT_VIS_SLICES, ENV_LOG};
pub use context::ArlContext;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::ArlError;

static CONTEXT: Mutex<Option<ArlContext>> = Mutex::new(None);

fn slot() -> MutexGuard<'static, Option<ArlContext>> {
    // A panic inside an entry point is caught at the boundary and leaves the
    // context usable.
    CONTEXT.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Create the process-wide context if there is none.
///
/// Returns `false` when a context already existed and was left unchanged.
pub fn initialize(config: ArlConfig) -> Result<bool, ArlError> {
    let mut guard = slot();
    if guard.is_some() {
        log::warn!("arl_initialize: already initialised, ignoring");
        return Ok(false);
    }
    let ctx = ArlContext::new(config)?;
    log::info!(
        "arl_initialize: {} workers, {} w slices, {} deconvolution",
        ctx.worker_count(),
        ctx.config().vis_slices,
        ctx.config().deconvolve.algorithm.name()
    );
    *guard = Some(ctx);
    Ok(true)
}

/// Drop the process-wide context. Returns `false` if there was none.
pub fn finalize() -> bool {
    let dropped = slot().take().is_some();
    if dropped {
        log::info!("arl_finalize: released library context");
    }
    dropped
}

pub fn is_initialized() -> bool {
    slot().is_some()
}

/// Run `f` with the process-wide context, holding the lock throughout.
pub(crate) fn with_context<R>(
    operation: &str,
    f: impl FnOnce(&ArlContext) -> Result<R, ArlError>,
) -> Result<R, ArlError> {
    let guard = slot();
    match guard.as_ref() {
        Some(ctx) => f(ctx),
        None => {
            log::error!("{operation}: called before arl_initialize");
            Err(ArlError::NotInitialised)
        }
    }
}
