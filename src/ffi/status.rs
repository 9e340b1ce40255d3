//! Per-thread status of the last call, and the panic barrier every entry
//! point runs behind.

use std::any::Any;
use std::cell::RefCell;
use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::types::ArlStatus;
use crate::error::ArlError;
use crate::runtime::{self, ArlContext};

struct LastError {
    status: ArlStatus,
    message: CString,
}

thread_local! {
    static LAST_ERROR: RefCell<LastError> = RefCell::new(LastError {
        status: ArlStatus::Ok,
        message: CString::default(),
    });
}

fn record(status: ArlStatus, message: &str) {
    // Interior NULs would truncate the message on the C side anyway.
    let message = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|slot| {
        let mut slot = slot.borrow_mut();
        slot.status = status;
        slot.message = message;
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run the body of entry point `name`, recording its outcome in this
/// thread's status slot. Panics are caught and become `InternalError`.
pub(crate) fn ffi_call<F>(name: &str, f: F) -> ArlStatus
where
    F: FnOnce() -> Result<(), ArlError>,
{
    record(ArlStatus::Ok, "");
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => ArlStatus::Ok,
        Ok(Err(err)) => {
            let status = ArlStatus::from(&err);
            let message = format!("{name}: {err}");
            log::debug!("{message}");
            record(status, &message);
            status
        }
        Err(payload) => {
            let message = format!("{name}: panicked: {}", panic_message(payload.as_ref()));
            log::error!("{message}");
            record(ArlStatus::InternalError, &message);
            ArlStatus::InternalError
        }
    }
}

/// [`ffi_call`] for an operation that needs the library context.
pub(crate) fn ffi_entry<F>(name: &str, f: F) -> ArlStatus
where
    F: FnOnce(&ArlContext) -> Result<(), ArlError>,
{
    ffi_call(name, || runtime::with_context(name, f))
}

/// Status of the last library call made on this thread.
#[no_mangle]
pub extern "C" fn arl_last_status() -> ArlStatus {
    LAST_ERROR.with(|slot| slot.borrow().status)
}

/// Message describing the last failure on this thread, or an empty string.
///
/// The pointer stays valid until the next library call on this thread.
#[no_mangle]
pub extern "C" fn arl_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().message.as_ptr())
}

/// Reset this thread's status to `Ok`.
#[no_mangle]
pub extern "C" fn arl_clear_error() {
    record(ArlStatus::Ok, "");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_error_recorded_and_cleared() {
        let status = ffi_call("op", || Err(ArlError::NullPointer("vis")));
        assert_eq!(status, ArlStatus::NullPointer);
        assert_eq!(arl_last_status(), ArlStatus::NullPointer);
        let message = unsafe { CStr::from_ptr(arl_last_error()) }.to_str().unwrap().to_string();
        assert!(message.contains("op") && message.contains("vis"));

        assert_eq!(ffi_call("op", || Ok(())), ArlStatus::Ok);
        assert_eq!(arl_last_status(), ArlStatus::Ok);

        ffi_call("op", || Err(ArlError::MissingCoalesceIndex));
        arl_clear_error();
        assert_eq!(arl_last_status(), ArlStatus::Ok);
        assert!(unsafe { CStr::from_ptr(arl_last_error()) }.to_bytes().is_empty());
    }

    #[test]
    fn test_panic_is_caught() {
        let status = ffi_call("boom", || panic!("bad index"));
        assert_eq!(status, ArlStatus::InternalError);
        let message = unsafe { CStr::from_ptr(arl_last_error()) }.to_str().unwrap().to_string();
        assert!(message.contains("bad index"));
    }
}
