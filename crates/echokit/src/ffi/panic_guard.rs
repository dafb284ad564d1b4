//! Panic guards for the FFI boundary.
//!
//! Every `extern "C"` function catches panics so unwinding never crosses
//! into C. A caught panic is logged and mapped to a fallback value.

/// Run an FFI body returning [`EchokitError`](super::types::EchokitError);
/// a panic becomes `EchokitError::Internal`.
///
/// ```ignore
/// extern "C" fn echokit_aec_do_thing(aec: *mut EchokitAec) -> EchokitError {
///     ffi_guard! {
///         // ... body ...
///         EchokitError::None
///     }
/// }
/// ```
macro_rules! ffi_guard {
    ($($body:tt)*) => {
        $crate::ffi::panic_guard::ffi_guard_or!(
            $crate::ffi::types::EchokitError::Internal;
            $($body)*
        )
    };
}

/// Run an FFI body returning a pointer; a panic becomes null.
macro_rules! ffi_guard_ptr {
    ($($body:tt)*) => {
        $crate::ffi::panic_guard::ffi_guard_or!(std::ptr::null_mut(); $($body)*)
    };
}

/// Run an FFI body, returning `$fallback` if it panics.
macro_rules! ffi_guard_or {
    ($fallback:expr; $($body:tt)*) => {{
        use std::panic::{self, AssertUnwindSafe};

        match panic::catch_unwind(AssertUnwindSafe(move || { $($body)* })) {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("[aec]: panic caught at the C API boundary");
                $fallback
            }
        }
    }};
}

pub(crate) use ffi_guard;
pub(crate) use ffi_guard_or;
pub(crate) use ffi_guard_ptr;
