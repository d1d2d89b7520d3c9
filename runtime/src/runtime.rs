//! Runtime session handle.
//!
//! A `Runtime` owns exactly one engine runtime and tracks the layer state
//! machine on the host side:
//!
//! ```text
//!   ┌────────┐  open(L)   ┌──────────┐  commit()  ┌────────┐
//!   │ Closed │ ─────────> │ Open(L)  │ ─────────> │ Closed │
//!   └────────┘            └──────────┘            └────────┘
//!        │ rewind(L)            │ deploy / spawn / call / verify
//!        └── Closed             └── Open(L)
//! ```
//!
//! `open(L)` only accepts the layer following the last committed (or
//! rewound-to) one. Transactions and `commit` need an open layer; `rewind`
//! needs a closed one.
//!
//! Dropping a `Runtime` destroys its engine runtime. The handle is `Send`
//! but not `Sync`.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use svm_primitives::{
    encode_context, encode_envelope, to_hex, Account, Address, Amount, CallReceipt, Context,
    DeployReceipt, Envelope, Layer, SpawnReceipt, State, TxNonce,
};
use tracing::{debug, warn};

use crate::adapter::{check_abi_len, expect_ok, expect_receipt, TypedReceipt};
use crate::engine::Engine;
use crate::error::SvmError;
use crate::ffi::RawRuntime;

#[derive(Debug, Clone, Copy)]
enum Tx {
    Deploy,
    Spawn,
    Call,
    Verify,
}

pub struct Runtime {
    engine: Arc<dyn Engine>,
    /// Taken only by `Drop`.
    raw: ManuallyDrop<RawRuntime>,
    /// Last committed or rewound-to layer.
    layer: Layer,
    open: Option<Layer>,
}

// SAFETY: the engine runtime is owned exclusively by this handle and is
// only reached through `&self`/`&mut self`; the missing `Sync` impl keeps
// it from being used from two threads at once.
unsafe impl Send for Runtime {}

impl Runtime {
    pub(crate) fn open_session(engine: Arc<dyn Engine>, raw: RawRuntime) -> Result<Self, SvmError> {
        let mut runtime = Self {
            engine,
            raw: ManuallyDrop::new(raw),
            layer: 0,
            open: None,
        };
        // On failure `runtime` is dropped and the engine runtime destroyed.
        let (layer, _) = runtime.layer_info()?;
        runtime.layer = layer;
        Ok(runtime)
    }

    // ── Validation ──

    pub fn validate_deploy(&self, message: &[u8]) -> Result<(), SvmError> {
        check_message(message)?;
        let raw = &*self.raw;
        expect_ok(self.engine.as_ref(), self.engine.validate_deploy(raw, message))
    }

    pub fn validate_spawn(&self, message: &[u8]) -> Result<(), SvmError> {
        check_message(message)?;
        let raw = &*self.raw;
        expect_ok(self.engine.as_ref(), self.engine.validate_spawn(raw, message))
    }

    pub fn validate_call(&self, message: &[u8]) -> Result<(), SvmError> {
        check_message(message)?;
        let raw = &*self.raw;
        expect_ok(self.engine.as_ref(), self.engine.validate_call(raw, message))
    }

    // ── Transactions ──

    pub fn deploy(
        &mut self,
        envelope: &Envelope,
        message: &[u8],
        context: &Context,
    ) -> Result<DeployReceipt, SvmError> {
        self.execute(Tx::Deploy, envelope, message, context)
    }

    pub fn spawn(
        &mut self,
        envelope: &Envelope,
        message: &[u8],
        context: &Context,
    ) -> Result<SpawnReceipt, SvmError> {
        self.execute(Tx::Spawn, envelope, message, context)
    }

    pub fn call(
        &mut self,
        envelope: &Envelope,
        message: &[u8],
        context: &Context,
    ) -> Result<CallReceipt, SvmError> {
        self.execute(Tx::Call, envelope, message, context)
    }

    /// Run the target account's verification. The outcome is reported in
    /// a call receipt.
    pub fn verify(
        &mut self,
        envelope: &Envelope,
        message: &[u8],
        context: &Context,
    ) -> Result<CallReceipt, SvmError> {
        self.execute(Tx::Verify, envelope, message, context)
    }

    fn execute<R: TypedReceipt>(
        &self,
        tx: Tx,
        envelope: &Envelope,
        message: &[u8],
        context: &Context,
    ) -> Result<R, SvmError> {
        check_message(message)?;
        let layer = self.open.ok_or(SvmError::LayerNotOpen)?;
        let raw = &*self.raw;

        if context.layer != layer {
            warn!(open = layer, context = context.layer, "context layer differs from the open layer");
        }
        debug!(
            ?tx,
            layer,
            principal = %to_hex(&envelope.principal),
            gas_limit = envelope.gas_limit,
            "executing transaction"
        );

        let env = encode_envelope(envelope);
        let ctx = encode_context(context);
        let engine = self.engine.as_ref();
        let res = match tx {
            Tx::Deploy => engine.deploy(raw, &env, message, &ctx),
            Tx::Spawn => engine.spawn(raw, &env, message, &ctx),
            Tx::Call => engine.call(raw, &env, message, &ctx),
            Tx::Verify => engine.verify(raw, &env, message, &ctx),
        };
        expect_receipt(engine, res)
    }

    // ── Layers ──

    /// Start layer `layer`. It must directly follow [`Runtime::current_layer`].
    pub fn open(&mut self, layer: Layer) -> Result<(), SvmError> {
        if let Some(open) = self.open {
            return Err(SvmError::LayerAlreadyOpen(open));
        }
        let expected = self.layer.checked_add(1);
        if expected != Some(layer) {
            return Err(SvmError::InvalidLayer {
                requested: layer,
                expected: expected.unwrap_or(self.layer),
            });
        }
        self.open = Some(layer);
        debug!(layer, "layer opened");
        Ok(())
    }

    /// Commit the open layer, returning the layer the engine recorded and
    /// its state root. On failure the layer stays open.
    pub fn commit(&mut self) -> Result<(Layer, State), SvmError> {
        let open = self.open.ok_or(SvmError::LayerNotOpen)?;
        let raw = &*self.raw;
        expect_ok(self.engine.as_ref(), self.engine.commit(raw))?;

        self.open = None;
        let (layer, state) = match self.layer_info() {
            Ok(info) => info,
            Err(err) => {
                // The engine did commit; only the read-back failed.
                self.layer = open;
                return Err(err);
            }
        };
        if layer != open {
            warn!(open, committed = layer, "engine committed a different layer");
        }
        self.layer = layer;
        debug!(layer, state = %to_hex(&state), "layer committed");
        Ok((layer, state))
    }

    /// Roll back to the committed `layer`, discarding everything after it.
    pub fn rewind(&mut self, layer: Layer) -> Result<State, SvmError> {
        if let Some(open) = self.open {
            return Err(SvmError::LayerAlreadyOpen(open));
        }
        let raw = &*self.raw;
        expect_ok(self.engine.as_ref(), self.engine.rewind(raw, layer))?;

        let (current, state) = match self.layer_info() {
            Ok(info) => info,
            Err(err) => {
                self.layer = layer;
                return Err(err);
            }
        };
        self.layer = current;
        debug!(layer = current, state = %to_hex(&state), "rewound");
        Ok(state)
    }

    /// Last committed layer and its state root, as reported by the engine.
    pub fn layer_info(&self) -> Result<(Layer, State), SvmError> {
        let raw = &*self.raw;
        let mut state = [0u8; 32];
        let mut layer = 0u64;
        expect_ok(
            self.engine.as_ref(),
            self.engine.layer_info(raw, &mut state, &mut layer),
        )?;
        Ok((layer, state))
    }

    /// Last committed or rewound-to layer.
    pub fn current_layer(&self) -> Layer {
        self.layer
    }

    pub fn open_layer(&self) -> Option<Layer> {
        self.open
    }

    // ── Accounts ──

    pub fn get_account(&self, addr: &Address) -> Result<Account, SvmError> {
        let raw = &*self.raw;
        let mut balance = 0;
        let mut upper = 0;
        let mut lower = 0;
        let mut template_addr = [0u8; 20];
        expect_ok(
            self.engine.as_ref(),
            self.engine.get_account(
                raw,
                addr,
                &mut balance,
                &mut upper,
                &mut lower,
                &mut template_addr,
            ),
        )?;
        Ok(Account {
            addr: *addr,
            balance,
            counter: TxNonce::new(upper, lower),
            template_addr,
        })
    }

    /// Create a genesis account. Its template address is ignored.
    pub fn create_account(&mut self, account: &Account) -> Result<(), SvmError> {
        let raw = &*self.raw;
        expect_ok(
            self.engine.as_ref(),
            self.engine.create_genesis_account(
                raw,
                &account.addr,
                account.balance,
                account.counter.upper,
                account.counter.lower,
            ),
        )?;
        debug!(addr = %to_hex(&account.addr), balance = account.balance, "genesis account created");
        Ok(())
    }

    pub fn increase_balance(&mut self, addr: &Address, amount: Amount) -> Result<(), SvmError> {
        let raw = &*self.raw;
        expect_ok(
            self.engine.as_ref(),
            self.engine.increase_balance(raw, addr, amount),
        )
    }

    // ── Lifetime ──

    /// Release the engine runtime now. Equivalent to dropping the handle.
    pub fn destroy(self) {}
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // SAFETY: `raw` is not touched again after this point.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        self.engine.runtime_destroy(raw);
        debug!("runtime destroyed");
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("layer", &self.layer)
            .field("open", &self.open)
            .finish_non_exhaustive()
    }
}

fn check_message(message: &[u8]) -> Result<(), SvmError> {
    if message.is_empty() {
        return Err(SvmError::EmptyMessage);
    }
    check_abi_len("msg", message.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use svm_primitives::types::{ADDRESS_LENGTH, STATE_LENGTH};
    use svm_primitives::{CONTEXT_LENGTH, ENVELOPE_LENGTH};

    use crate::ffi::svm_result_t;
    use crate::{MemEngine, Svm, SvmConfig};

    fn runtime() -> (Svm, Runtime) {
        let svm = Svm::in_process();
        svm.init(&SvmConfig::in_memory()).unwrap();
        let runtime = svm.new_runtime().unwrap();
        (svm, runtime)
    }

    #[test]
    fn test_fresh_runtime_is_at_genesis() {
        let (_svm, runtime) = runtime();
        assert_eq!(runtime.current_layer(), 0);
        assert_eq!(runtime.open_layer(), None);
        assert_eq!(runtime.layer_info().unwrap(), (0, [0u8; 32]));
    }

    #[test]
    fn test_open_rejects_wrong_layer() {
        let (_svm, mut runtime) = runtime();
        assert_eq!(
            runtime.open(2).unwrap_err(),
            SvmError::InvalidLayer {
                requested: 2,
                expected: 1
            }
        );
        runtime.open(1).unwrap();
        assert_eq!(runtime.open(1).unwrap_err(), SvmError::LayerAlreadyOpen(1));
    }

    #[test]
    fn test_commit_requires_open_layer() {
        let (_svm, mut runtime) = runtime();
        assert_eq!(runtime.commit().unwrap_err(), SvmError::LayerNotOpen);
    }

    #[test]
    fn test_rewind_rejected_while_open() {
        let (_svm, mut runtime) = runtime();
        runtime.open(1).unwrap();
        assert_eq!(runtime.rewind(0).unwrap_err(), SvmError::LayerAlreadyOpen(1));
    }

    #[test]
    fn test_empty_message_never_reaches_engine() {
        let (_svm, mut runtime) = runtime();
        assert_eq!(runtime.validate_deploy(&[]).unwrap_err(), SvmError::EmptyMessage);
        assert_eq!(runtime.validate_spawn(&[]).unwrap_err(), SvmError::EmptyMessage);
        assert_eq!(runtime.validate_call(&[]).unwrap_err(), SvmError::EmptyMessage);

        runtime.open(1).unwrap();
        let env = Envelope::default();
        let ctx = Context::new(1, [0; 32]);
        assert_eq!(runtime.deploy(&env, &[], &ctx).unwrap_err(), SvmError::EmptyMessage);
        assert_eq!(runtime.call(&env, &[], &ctx).unwrap_err(), SvmError::EmptyMessage);
    }

    #[test]
    fn test_transactions_require_open_layer() {
        let (_svm, mut runtime) = runtime();
        let env = Envelope::default();
        let ctx = Context::new(1, [0; 32]);
        assert_eq!(
            runtime.deploy(&env, b"\x01", &ctx).unwrap_err(),
            SvmError::LayerNotOpen
        );
    }

    // ── Engine faults ──

    /// `MemEngine` with switchable failures.
    #[derive(Default)]
    struct FaultyEngine {
        inner: MemEngine,
        fail_commit: AtomicBool,
        fail_layer_info: AtomicBool,
        report_max_layer: AtomicBool,
    }

    impl FaultyEngine {
        fn set(flag: &AtomicBool, on: bool) {
            flag.store(on, Ordering::SeqCst);
        }
    }

    impl Engine for FaultyEngine {
        fn init_flag(&self) -> &Mutex<bool> {
            self.inner.init_flag()
        }
        fn init(&self, in_memory: bool, path: &[u8]) -> svm_result_t {
            self.inner.init(in_memory, path)
        }
        fn runtime_create(&self, runtime: &mut Option<RawRuntime>) -> svm_result_t {
            self.inner.runtime_create(runtime)
        }
        fn runtime_destroy(&self, runtime: RawRuntime) {
            self.inner.runtime_destroy(runtime)
        }
        fn runtimes_count(&self) -> u64 {
            self.inner.runtimes_count()
        }
        fn validate_deploy(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
            self.inner.validate_deploy(runtime, message)
        }
        fn validate_spawn(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
            self.inner.validate_spawn(runtime, message)
        }
        fn validate_call(&self, runtime: &RawRuntime, message: &[u8]) -> svm_result_t {
            self.inner.validate_call(runtime, message)
        }
        fn deploy(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            self.inner.deploy(runtime, envelope, message, context)
        }
        fn spawn(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            self.inner.spawn(runtime, envelope, message, context)
        }
        fn verify(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            self.inner.verify(runtime, envelope, message, context)
        }
        fn call(
            &self,
            runtime: &RawRuntime,
            envelope: &[u8; ENVELOPE_LENGTH],
            message: &[u8],
            context: &[u8; CONTEXT_LENGTH],
        ) -> svm_result_t {
            self.inner.call(runtime, envelope, message, context)
        }
        fn commit(&self, runtime: &RawRuntime) -> svm_result_t {
            if self.fail_commit.load(Ordering::SeqCst) {
                return self.inner.error_result("persisting layer failed");
            }
            self.inner.commit(runtime)
        }
        fn rewind(&self, runtime: &RawRuntime, layer: u64) -> svm_result_t {
            self.inner.rewind(runtime, layer)
        }
        fn layer_info(
            &self,
            runtime: &RawRuntime,
            state: &mut [u8; STATE_LENGTH],
            layer: &mut u64,
        ) -> svm_result_t {
            if self.fail_layer_info.load(Ordering::SeqCst) {
                return self.inner.error_result("layer info unavailable");
            }
            let res = self.inner.layer_info(runtime, state, layer);
            if self.report_max_layer.load(Ordering::SeqCst) {
                *layer = u64::MAX;
            }
            res
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
            self.inner
                .get_account(runtime, addr, balance, counter_upper, counter_lower, template_addr)
        }
        fn create_genesis_account(
            &self,
            runtime: &RawRuntime,
            addr: &Address,
            balance: u64,
            counter_upper: u64,
            counter_lower: u64,
        ) -> svm_result_t {
            self.inner
                .create_genesis_account(runtime, addr, balance, counter_upper, counter_lower)
        }
        fn increase_balance(&self, runtime: &RawRuntime, addr: &Address, amount: u64) -> svm_result_t {
            self.inner.increase_balance(runtime, addr, amount)
        }
        unsafe fn free_result(&self, result: svm_result_t) {
            self.inner.free_result(result)
        }
    }

    fn faulty_runtime() -> (Arc<FaultyEngine>, Svm, Runtime) {
        let engine = Arc::new(FaultyEngine::default());
        let svm = Svm::new(engine.clone());
        svm.init(&SvmConfig::in_memory()).unwrap();
        let runtime = svm.new_runtime().unwrap();
        (engine, svm, runtime)
    }

    #[test]
    fn test_failed_commit_keeps_layer_open() {
        let (engine, _svm, mut runtime) = faulty_runtime();
        runtime.open(1).unwrap();

        FaultyEngine::set(&engine.fail_commit, true);
        let err = runtime.commit().unwrap_err();
        assert_eq!(err, SvmError::Engine("persisting layer failed".into()));
        assert_eq!(runtime.open_layer(), Some(1));
        assert_eq!(runtime.current_layer(), 0);
        assert_eq!(engine.inner.outstanding_buffers(), 0);

        FaultyEngine::set(&engine.fail_commit, false);
        assert_eq!(runtime.commit().unwrap().0, 1);
        assert_eq!(runtime.open_layer(), None);
    }

    #[test]
    fn test_failed_read_back_after_commit_advances_layer() {
        let (engine, _svm, mut runtime) = faulty_runtime();
        runtime.open(1).unwrap();

        FaultyEngine::set(&engine.fail_layer_info, true);
        assert!(runtime.commit().unwrap_err().is_engine_error());
        assert_eq!(runtime.open_layer(), None);
        assert_eq!(runtime.current_layer(), 1);
        assert_eq!(engine.inner.outstanding_buffers(), 0);

        FaultyEngine::set(&engine.fail_layer_info, false);
        assert_eq!(
            runtime.open(1).unwrap_err(),
            SvmError::InvalidLayer {
                requested: 1,
                expected: 2
            }
        );
        runtime.open(2).unwrap();
    }

    #[test]
    fn test_open_after_last_possible_layer() {
        let engine = Arc::new(FaultyEngine::default());
        FaultyEngine::set(&engine.report_max_layer, true);
        let svm = Svm::new(engine.clone());
        svm.init(&SvmConfig::in_memory()).unwrap();
        let mut runtime = svm.new_runtime().unwrap();
        assert_eq!(runtime.current_layer(), u64::MAX);

        assert_eq!(
            runtime.open(0).unwrap_err(),
            SvmError::InvalidLayer {
                requested: 0,
                expected: u64::MAX
            }
        );
        assert_eq!(runtime.open_layer(), None);
    }
}
