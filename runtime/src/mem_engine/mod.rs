//! In-process SVM engine.
//!
//! `MemEngine` implements the full [`Engine`] ABI without the native
//! library: runtimes are in-memory [`LayeredWorld`]s and every deployed
//! template runs the built-in functions described in [`exec`]. Result
//! buffers are heap allocations handed out as raw pointers, exactly like
//! the native engine's, and [`MemEngine::outstanding_buffers`] reports how
//! many are still unfreed.
//!
//! `MemEngine` also requires `init` before runtimes can be created.

pub mod exec;
pub mod message;
pub mod world;

use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use svm_primitives::types::{ADDRESS_LENGTH, STATE_LENGTH};
use svm_primitives::{
    decode_context, decode_envelope, encode_receipt, to_hex, Address, Envelope, Receipt, TxNonce,
    CONTEXT_LENGTH, ENVELOPE_LENGTH,
};
use tracing::trace;

use crate::engine::Engine;
use crate::ffi::{svm_result_t, RawRuntime};

pub use message::{CallMessage, DeployMessage, MessageError, SpawnMessage, WASM_MAGIC};
pub use world::LayeredWorld;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    in_memory: bool,
    path: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct MemEngine {
    initialized: Mutex<bool>,
    settings: Mutex<Option<Settings>>,
    runtimes: Mutex<HashMap<usize, LayeredWorld>>,
    next_id: AtomicUsize,
    outstanding: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of result buffers handed out and not yet freed.
    pub fn outstanding_buffers(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Whether `init` has been called, and with a persistent path.
    pub fn is_persistent(&self) -> Option<bool> {
        lock(&self.settings).as_ref().map(|s| !s.in_memory)
    }

    // ── Result buffers ──

    /// Move `bytes` to an engine-owned buffer.
    pub(crate) fn alloc_buffer(&self, bytes: Vec<u8>) -> (*const u8, u32) {
        let boxed = bytes.into_boxed_slice();
        let len = boxed.len() as u32;
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        (Box::into_raw(boxed) as *const u8, len)
    }

    pub(crate) fn receipt_result(&self, bytes: Vec<u8>) -> svm_result_t {
        let (receipt, buf_size) = self.alloc_buffer(bytes);
        svm_result_t {
            receipt,
            error: std::ptr::null(),
            buf_size,
        }
    }

    pub(crate) fn error_result(&self, message: impl Into<String>) -> svm_result_t {
        let (error, buf_size) = self.alloc_buffer(message.into().into_bytes());
        svm_result_t {
            receipt: std::ptr::null(),
            error,
            buf_size,
        }
    }

    fn receipt_or_error(&self, outcome: Result<Receipt, String>) -> svm_result_t {
        match outcome.and_then(|receipt| encode_receipt(&receipt).map_err(|e| e.to_string())) {
            Ok(bytes) => self.receipt_result(bytes),
            Err(message) => self.error_result(message),
        }
    }

    fn unit_or_error(&self, outcome: Result<(), String>) -> svm_result_t {
        match outcome {
            Ok(()) => svm_result_t::ok(),
            Err(message) => self.error_result(message),
        }
    }

    // ── Runtimes ──

    fn with_world<T>(
        &self,
        runtime: &RawRuntime,
        f: impl FnOnce(&mut LayeredWorld) -> Result<T, String>,
    ) -> Result<T, String> {
        let mut runtimes = lock(&self.runtimes);
        let world = runtimes
            .get_mut(&(runtime.as_ptr() as usize))
            .ok_or_else(|| "unknown runtime".to_string())?;
        f(world)
    }

    fn execute(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        context: &[u8; CONTEXT_LENGTH],
        f: impl FnOnce(&mut LayeredWorld, &Envelope) -> Result<Receipt, String>,
    ) -> svm_result_t {
        let outcome = decode_envelope(envelope)
            .and_then(|(env, _)| decode_context(context).map(|(ctx, _)| (env, ctx)))
            .map_err(|e| e.to_string())
            .and_then(|(env, ctx)| {
                trace!(layer = ctx.layer, tx_id = %to_hex(&ctx.tx_id), "mem engine executing");
                self.with_world(runtime, |world| f(world, &env))
            });
        self.receipt_or_error(outcome)
    }
}

impl Engine for MemEngine {
    fn init_flag(&self) -> &Mutex<bool> {
        &self.initialized
    }

    fn init(&self, in_memory: bool, path: &[u8]) -> svm_result_t {
        if !in_memory && path.is_empty() {
            return self.error_result("a persistent engine requires a path");
        }
        *lock(&self.settings) = Some(Settings {
            in_memory,
            path: path.to_vec(),
        });
        svm_result_t::ok()
    }

    fn runtime_create(&self, runtime: &mut Option<RawRuntime>) -> svm_result_t {
        if lock(&self.settings).is_none() {
            return self.error_result("`svm_init` must be called before creating a runtime");
        }
        // Ids start at 1 so the handle pointer is never null.
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.runtimes).insert(id, LayeredWorld::new());
        // SAFETY: `id` is non-zero, unique, and only ever used as a map key.
        *runtime = unsafe { RawRuntime::from_raw(id as *mut c_void) };
        svm_result_t::ok()
    }

    fn runtime_destroy(&self, runtime: RawRuntime) {
        lock(&self.runtimes).remove(&(runtime.as_ptr() as usize));
    }

    fn runtimes_count(&self) -> u64 {
        lock(&self.runtimes).len() as u64
    }

    fn validate_deploy(&self, _runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
        self.unit_or_error(DeployMessage::decode(message).map(|_| ()).map_err(|e| e.to_string()))
    }

    fn validate_spawn(&self, _runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
        self.unit_or_error(SpawnMessage::decode(message).map(|_| ()).map_err(|e| e.to_string()))
    }

    fn validate_call(&self, _runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
        self.unit_or_error(CallMessage::decode(message).map(|_| ()).map_err(|e| e.to_string()))
    }

    fn deploy(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t {
        self.execute(runtime, envelope, context, |world, env| {
            exec::deploy(world, env, message)
        })
    }

    fn spawn(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t {
        self.execute(runtime, envelope, context, |world, env| {
            exec::spawn(world, env, message)
        })
    }

    fn verify(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t {
        self.execute(runtime, envelope, context, |world, env| {
            exec::verify(world, env, message)
        })
    }

    fn call(
        &self,
        runtime: &RawRuntime,
        envelope: &[u8; ENVELOPE_LENGTH],
        message: &[u8],
        context: &[u8; CONTEXT_LENGTH],
    ) -> svm_result_t {
        self.execute(runtime, envelope, context, |world, env| {
            exec::call(world, env, message)
        })
    }

    fn commit(&self, runtime: &RawRuntime) -> svm_result_t {
        let outcome = self.with_world(runtime, |world| {
            let (layer, root) = world.commit();
            trace!(layer, root = %to_hex(&root), "mem engine committed");
            Ok(())
        });
        self.unit_or_error(outcome)
    }

    fn rewind(&self, runtime: &RawRuntime, layer: u64) -> svm_result_t {
        let outcome = self.with_world(runtime, |world| world.rewind(layer).map(|_| ()));
        self.unit_or_error(outcome)
    }

    fn layer_info(
        &self,
        runtime: &RawRuntime,
        state: &mut [u8; STATE_LENGTH],
        layer: &mut u64,
    ) -> svm_result_t {
        let outcome = self.with_world(runtime, |world| {
            let (current, root) = world.layer_info();
            *layer = current;
            *state = root;
            Ok(())
        });
        self.unit_or_error(outcome)
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
        let outcome = self.with_world(runtime, |world| {
            let account = world
                .pending()
                .accounts
                .get(addr)
                .ok_or_else(|| format!("account {} not found", to_hex(addr)))?;
            *balance = account.balance;
            *counter_upper = account.counter.upper;
            *counter_lower = account.counter.lower;
            *template_addr = account.template;
            Ok(())
        });
        self.unit_or_error(outcome)
    }

    fn create_genesis_account(
        &self,
        runtime: &RawRuntime,
        addr: &Address,
        balance: u64,
        counter_upper: u64,
        counter_lower: u64,
    ) -> svm_result_t {
        let counter = TxNonce::new(counter_upper, counter_lower);
        let outcome = self.with_world(runtime, |world| {
            world.create_genesis_account(*addr, balance, counter)
        });
        self.unit_or_error(outcome)
    }

    fn increase_balance(&self, runtime: &RawRuntime, addr: &Address, amount: u64) -> svm_result_t {
        let outcome = self.with_world(runtime, |world| world.increase_balance(addr, amount));
        self.unit_or_error(outcome)
    }

    unsafe fn free_result(&self, result: svm_result_t) {
        for ptr in [result.receipt, result.error] {
            if ptr.is_null() {
                continue;
            }
            let slice = std::ptr::slice_from_raw_parts_mut(ptr as *mut u8, result.buf_size as usize);
            drop(Box::from_raw(slice));
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
