//! C ABI of the SVM engine.
//!
//! Every fallible engine function returns an [`svm_result_t`] envelope:
//!
//! - `receipt` set: the call produced a receipt of `buf_size` bytes
//! - `error` set: the call failed with a UTF-8 message of `buf_size` bytes
//! - neither set: the call succeeded without data
//!
//! Buffers are owned by the engine and must be released exactly once with
//! `svm_free_result`. The adapter (see [`crate::adapter`]) is the only code
//! that reads or frees them.

#![allow(non_camel_case_types)]

use std::ffi::c_void;
use std::ptr::{self, NonNull};

/// Uniform result envelope returned by the engine.
#[repr(C)]
#[derive(Debug)]
pub struct svm_result_t {
    pub receipt: *const u8,
    pub error: *const u8,
    pub buf_size: u32,
}

impl svm_result_t {
    /// An envelope carrying no data.
    pub const fn ok() -> Self {
        Self {
            receipt: ptr::null(),
            error: ptr::null(),
            buf_size: 0,
        }
    }

    pub fn has_receipt(&self) -> bool {
        !self.receipt.is_null()
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_null()
    }

    pub fn is_ok(&self) -> bool {
        !self.is_error()
    }
}

/// Opaque pointer to a runtime allocated by the engine.
///
/// Neither `Copy` nor `Clone`: a handle has exactly one owner and is
/// consumed by `Engine::runtime_destroy`.
#[derive(Debug, PartialEq, Eq)]
pub struct RawRuntime(NonNull<c_void>);

impl RawRuntime {
    /// Take ownership of a runtime pointer produced by the engine.
    ///
    /// Returns `None` for a null pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by the engine's `runtime_create` and
    /// must not be owned by any other `RawRuntime`.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }
}

#[cfg(feature = "native")]
#[link(name = "svm")]
extern "C" {
    pub fn svm_init(in_memory: bool, path: *const u8, path_len: u32) -> svm_result_t;

    pub fn svm_runtime_create(runtime: *mut *mut c_void) -> svm_result_t;

    pub fn svm_runtime_destroy(runtime: *mut c_void) -> svm_result_t;

    pub fn svm_runtimes_count(count: *mut u64);

    pub fn svm_validate_deploy(
        runtime: *mut c_void,
        message: *const u8,
        message_size: u32,
    ) -> svm_result_t;

    pub fn svm_validate_spawn(
        runtime: *mut c_void,
        message: *const u8,
        message_size: u32,
    ) -> svm_result_t;

    pub fn svm_validate_call(
        runtime: *mut c_void,
        message: *const u8,
        message_size: u32,
    ) -> svm_result_t;

    pub fn svm_deploy(
        runtime: *mut c_void,
        envelope: *const u8,
        message: *const u8,
        message_size: u32,
        context: *const u8,
    ) -> svm_result_t;

    pub fn svm_spawn(
        runtime: *mut c_void,
        envelope: *const u8,
        message: *const u8,
        message_size: u32,
        context: *const u8,
    ) -> svm_result_t;

    pub fn svm_verify(
        runtime: *mut c_void,
        envelope: *const u8,
        message: *const u8,
        message_size: u32,
        context: *const u8,
    ) -> svm_result_t;

    pub fn svm_call(
        runtime: *mut c_void,
        envelope: *const u8,
        message: *const u8,
        message_size: u32,
        context: *const u8,
    ) -> svm_result_t;

    pub fn svm_commit(runtime: *mut c_void) -> svm_result_t;

    pub fn svm_rewind(runtime: *mut c_void, layer_id: u64) -> svm_result_t;

    pub fn svm_layer_info(
        runtime: *mut c_void,
        state: *mut u8,
        layer: *mut u64,
    ) -> svm_result_t;

    pub fn svm_get_account(
        runtime: *mut c_void,
        account_addr: *const u8,
        balance: *mut u64,
        counter_upper_bits: *mut u64,
        counter_lower_bits: *mut u64,
        template_addr: *mut u8,
    ) -> svm_result_t;

    pub fn svm_create_genesis_account(
        runtime: *mut c_void,
        account_addr: *const u8,
        balance: u64,
        counter_upper_bits: u64,
        counter_lower_bits: u64,
    ) -> svm_result_t;

    pub fn svm_increase_balance(
        runtime: *mut c_void,
        account_addr: *const u8,
        amount: u64,
    ) -> svm_result_t;

    pub fn svm_free_result(result: svm_result_t);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_envelope() {
        let res = svm_result_t::ok();
        assert!(res.is_ok());
        assert!(!res.is_error());
        assert!(!res.has_receipt());
        assert_eq!(res.buf_size, 0);
    }

    #[test]
    fn test_raw_runtime_rejects_null() {
        assert!(unsafe { RawRuntime::from_raw(ptr::null_mut()) }.is_none());
    }
}
