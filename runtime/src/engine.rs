//! The engine seam.
//!
//! `Engine` mirrors the engine's C ABI one function at a time, with raw
//! pointers replaced by slices, fixed-size arrays and `&mut` out
//! parameters. Implementations return the raw [`svm_result_t`] envelope;
//! interpreting and freeing it is the adapter's job.
//!
//! Byte slices handed to an `Engine` are at most `u32::MAX` bytes long;
//! `Svm` and `Runtime` reject longer input before calling in.
//!
//! Implementations:
//! - [`NativeEngine`] (feature `native`): forwards to the linked `libsvm`
//! - [`MemEngine`](crate::MemEngine): in-process engine

use std::sync::Mutex;

use svm_primitives::types::{ADDRESS_LENGTH, STATE_LENGTH};
use svm_primitives::{Address, CONTEXT_LENGTH, ENVELOPE_LENGTH};

use crate::ffi::{svm_result_t, RawRuntime};

/// Image of the SVM engine ABI.
pub trait Engine: Send + Sync {
    /// Whether `init` has succeeded on this engine.
    ///
    /// Shared by every `Svm` built over the same engine, so the flag lives
    /// with the engine and not with its callers.
    fn init_flag(&self) -> &Mutex<bool>;

    /// Configure the engine for all runtimes created afterwards.
    fn init(&self, in_memory: bool, path: &[u8]) -> svm_result_t;

    /// Allocate a runtime, storing it into `runtime` on success.
    fn runtime_create(&self, runtime: &mut Option<RawRuntime>) -> svm_result_t;

    /// Release a runtime and everything it owns.
    fn runtime_destroy(&self, runtime: RawRuntime);

    /// Number of runtimes currently allocated.
    fn runtimes_count(&self) -> u64;

    fn validate_deploy(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t;

    fn validate_spawn(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t;

    fn validate_call(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t;

    fn deploy(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t;

    fn spawn(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t;

    fn verify(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t;

    fn call(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t;

    /// Apply the pending changes as a new layer.
    fn commit(&self, runtime: &RawRuntime) -> svm_result_t;

    /// Drop every layer after `layer`, and any pending changes.
    fn rewind(&self, runtime: &RawRuntime, layer: u64) -> svm_result_t;

    /// Report the last committed layer and its state root.
    fn layer_info(
        &self,
        runtime: &RawRuntime,
        state: &mut [u8; STATE_LENGTH],
        layer: &mut u64,
    ) -> svm_result_t;

    fn get_account(
        &self,
        runtime: &RawRuntime,
        addr: &Address,
        balance: &mut u64,
        counter_upper: &mut u64,
        counter_lower: &mut u64,
        template_addr: &mut [u8; ADDRESS_LENGTH],
    ) -> svm_result_t;

    fn create_genesis_account(
        &self,
        runtime: &RawRuntime,
        addr: &Address,
        balance: u64,
        counter_upper: u64,
        counter_lower: u64,
    ) -> svm_result_t;

    fn increase_balance(&self, runtime: &RawRuntime, addr: &Address, amount: u64)
        -> svm_result_t;

    /// Release the buffers of a result envelope.
    ///
    /// # Safety
    ///
    /// `result` must have been returned by this engine and not freed before.
    unsafe fn free_result(&self, result: svm_result_t);
}

/// The prebuilt native engine, linked as `libsvm`.
#[cfg(feature = "native")]
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

#[cfg(feature = "native")]
mod native {
    use std::ffi::c_void;
    use std::ptr;

    use super::*;
    use crate::ffi;

    // `RawRuntime` is only built from pointers the engine handed out, and
    // every slice passed below outlives the call that borrows it.
    // One linked library per process, so one flag for every `NativeEngine`.
    static INITIALIZED: Mutex<bool> = Mutex::new(false);

    impl Engine for NativeEngine {
        fn init_flag(&self) -> &Mutex<bool> {
            &INITIALIZED
        }

        fn init(&self, in_memory: bool, path: &[u8]) -> svm_result_t {
            unsafe { ffi::svm_init(in_memory, path.as_ptr(), path.len() as u32) }
        }

        fn runtime_create(&self, runtime: &mut Option<RawRuntime>) -> svm_result_t {
            let mut raw: *mut c_void = ptr::null_mut();
            let res = unsafe { ffi::svm_runtime_create(&mut raw) };
            *runtime = unsafe { RawRuntime::from_raw(raw) };
            res
        }

        fn runtime_destroy(&self, runtime: RawRuntime) {
            let res = unsafe { ffi::svm_runtime_destroy(runtime.as_ptr()) };
            unsafe { ffi::svm_free_result(res) };
        }

        fn runtimes_count(&self) -> u64 {
            let mut count = 0u64;
            unsafe { ffi::svm_runtimes_count(&mut count) };
            count
        }

        fn validate_deploy(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
            unsafe {
                ffi::svm_validate_deploy(runtime.as_ptr(), message.as_ptr(), message.len() as u32)
            }
        }

        fn validate_spawn(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
            unsafe {
                ffi::svm_validate_spawn(runtime.as_ptr(), message.as_ptr(), message.len() as u32)
            }
        }

        fn validate_call(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
            unsafe {
                ffi::svm_validate_call(runtime.as_ptr(), message.as_ptr(), message.len() as u32)
            }
        }

        fn deploy(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            unsafe {
                ffi::svm_deploy(
                    runtime.as_ptr(),
                    envelope.as_ptr(),
                    message.as_ptr(),
                    message.len() as u32,
                    context.as_ptr(),
                )
            }
        }

        fn spawn(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            unsafe {
                ffi::svm_spawn(
                    runtime.as_ptr(),
                    envelope.as_ptr(),
                    message.as_ptr(),
                    message.len() as u32,
                    context.as_ptr(),
                )
            }
        }

        fn verify(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            unsafe {
                ffi::svm_verify(
                    runtime.as_ptr(),
                    envelope.as_ptr(),
                    message.as_ptr(),
                    message.len() as u32,
                    context.as_ptr(),
                )
            }
        }

        fn call(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            unsafe {
                ffi::svm_call(
                    runtime.as_ptr(),
                    envelope.as_ptr(),
                    message.as_ptr(),
                    message.len() as u32,
                    context.as_ptr(),
                )
            }
        }

        fn commit(&self, runtime: &RawRuntime) -> svm_result_t {
            unsafe { ffi::svm_commit(runtime.as_ptr()) }
        }

        fn rewind(&self, runtime: &RawRuntime, layer: u64) -> svm_result_t {
            unsafe { ffi::svm_rewind(runtime.as_ptr(), layer) }
        }

        fn layer_info(
            &self,
            runtime: &RawRuntime,
            state: &mut [u8; STATE_LENGTH],
            layer: &mut u64,
        ) -> svm_result_t {
            unsafe { ffi::svm_layer_info(runtime.as_ptr(), state.as_mut_ptr(), layer) }
        }

        fn get_account(
            &self,
            runtime: &RawRuntime,
            addr: &Address,
            balance: &mut u64,
            counter_upper: &mut u64,
            counter_lower: &mut u64,
            template_addr: &mut [u8; ADDRESS_LENGTH],
        ) -> svm_result_t {
            unsafe {
                ffi::svm_get_account(
                    runtime.as_ptr(),
                    addr.as_ptr(),
                    balance,
                    counter_upper,
                    counter_lower,
                    template_addr.as_mut_ptr(),
                )
            }
        }

        fn create_genesis_account(
            &self,
            runtime: &RawRuntime,
            addr: &Address,
            balance: u64,
            counter_upper: u64,
            counter_lower: u64,
        ) -> svm_result_t {
            unsafe {
                ffi::svm_create_genesis_account(
                    runtime.as_ptr(),
                    addr.as_ptr(),
                    balance,
                    counter_upper,
                    counter_lower,
                )
            }
        }

        fn increase_balance(
            &self,
            runtime: &RawRuntime,
            addr: &Address,
            amount: u64,
        ) -> svm_result_t {
            unsafe { ffi::svm_increase_balance(runtime.as_ptr(), addr.as_ptr(), amount) }
        }

        unsafe fn free_result(&self, result: svm_result_t) {
            ffi::svm_free_result(result)
        }
    }
}
