//! Library initialisation and shutdown.

use env_logger::Env;

use super::status::ffi_call;
use super::types::ARLRuntimeConfig;
use crate::runtime::{self, ArlConfig, ENV_LOG};

fn init_logging() {
    // A host that installed its own logger keeps it.
    let _ = env_logger::Builder::from_env(Env::default().filter_or(ENV_LOG, "info")).try_init();
}

/// Initialise the library with defaults from the environment.
///
/// Installs the logger (filter from `ARL_LOG`) and creates the worker pool.
/// Calling it again while initialised has no effect.
#[no_mangle]
pub extern "C" fn arl_initialize() {
    init_logging();
    ffi_call("arl_initialize", || runtime::initialize(ArlConfig::from_env()).map(|_| ()));
}

/// Initialise the library with explicit settings. NULL behaves like
/// [`arl_initialize`].
///
/// # Safety
/// `config` must be null or a valid pointer to an `ARLRuntimeConfig`.
#[no_mangle]
pub unsafe extern "C" fn arl_initialize_with_config(config: *const ARLRuntimeConfig) {
    init_logging();
    let config = match config.as_ref() {
        Some(c) => ArlConfig::from(*c),
        None => ArlConfig::from_env(),
    };
    ffi_call("arl_initialize_with_config", || runtime::initialize(config).map(|_| ()));
}

/// Release the worker pool. Calls other than initialisation fail with
/// `NotInitialised` until the library is initialised again.
#[no_mangle]
pub extern "C" fn arl_finalize() {
    ffi_call("arl_finalize", || {
        if !runtime::finalize() {
            log::warn!("arl_finalize: library was not initialised");
        }
        Ok(())
    });
}

/// Whether `arl_initialize` has run without a matching `arl_finalize`.
///
/// Safe to call at any time; it does not touch the call status.
#[no_mangle]
pub extern "C" fn arl_is_initialized() -> bool {
    runtime::is_initialized()
}
