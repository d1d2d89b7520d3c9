//! Translation of the engine's result envelope into Rust values.
//!
//! Every `svm_result_t` returned by the engine passes through
//! [`take_result`], which copies the present buffer into host memory and
//! frees the envelope before returning, on every path. No other code reads
//! or frees engine buffers.

use svm_primitives::{
    decode_receipt, CallReceipt, DeployReceipt, Receipt, SpawnReceipt, TxType,
};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::SvmError;
use crate::ffi::svm_result_t;

/// Frees the wrapped envelope when dropped.
struct FreeGuard<'a> {
    engine: &'a dyn Engine,
    result: Option<svm_result_t>,
}

impl<'a> FreeGuard<'a> {
    fn new(engine: &'a dyn Engine, result: svm_result_t) -> Self {
        Self {
            engine,
            result: Some(result),
        }
    }
}

impl Drop for FreeGuard<'_> {
    fn drop(&mut self) {
        if let Some(result) = self.result.take() {
            // SAFETY: the envelope came from `self.engine` and is freed only here.
            unsafe { self.engine.free_result(result) };
        }
    }
}

enum Payload {
    Empty,
    Receipt(Vec<u8>),
    Error(Vec<u8>),
}

fn read_payload(result: &svm_result_t) -> Result<Payload, SvmError> {
    let size = result.buf_size as usize;
    match (result.receipt.is_null(), result.error.is_null()) {
        (true, true) => Ok(Payload::Empty),
        // SAFETY: the engine guarantees the non-null buffer holds `buf_size` bytes.
        (false, true) => Ok(Payload::Receipt(unsafe { copy_buffer(result.receipt, size) })),
        (true, false) => Ok(Payload::Error(unsafe { copy_buffer(result.error, size) })),
        (false, false) => Err(SvmError::Protocol(
            "engine returned both a receipt and an error".into(),
        )),
    }
}

unsafe fn copy_buffer(ptr: *const u8, len: usize) -> Vec<u8> {
    std::slice::from_raw_parts(ptr, len).to_vec()
}

/// Copy the payload out of `result` and free it.
///
/// Returns `Ok(Some(bytes))` for a receipt, `Ok(None)` for an empty
/// envelope, and `SvmError::Engine` carrying the engine's message for an
/// error envelope.
pub fn take_result(engine: &dyn Engine, result: svm_result_t) -> Result<Option<Vec<u8>>, SvmError> {
    let guard = FreeGuard::new(engine, result);
    let payload = match guard.result.as_ref() {
        Some(result) => read_payload(result),
        None => Ok(Payload::Empty),
    };
    drop(guard);

    match payload? {
        Payload::Empty => Ok(None),
        Payload::Receipt(bytes) => Ok(Some(bytes)),
        Payload::Error(bytes) => {
            let message = String::from_utf8_lossy(&bytes).into_owned();
            warn!(error = %message, "engine returned an error");
            Err(SvmError::Engine(message))
        }
    }
}

/// Consume a result that carries no data on success.
pub fn expect_ok(engine: &dyn Engine, result: svm_result_t) -> Result<(), SvmError> {
    take_result(engine, result).map(|_| ())
}

/// A receipt shape the engine returns for one kind of transaction.
pub trait TypedReceipt: Sized {
    const TX_TYPE: TxType;

    fn from_receipt(receipt: Receipt) -> Option<Self>;
}

impl TypedReceipt for DeployReceipt {
    const TX_TYPE: TxType = TxType::Deploy;

    fn from_receipt(receipt: Receipt) -> Option<Self> {
        match receipt {
            Receipt::Deploy(r) => Some(r),
            _ => None,
        }
    }
}

impl TypedReceipt for SpawnReceipt {
    const TX_TYPE: TxType = TxType::Spawn;

    fn from_receipt(receipt: Receipt) -> Option<Self> {
        match receipt {
            Receipt::Spawn(r) => Some(r),
            _ => None,
        }
    }
}

/// Call and Verify share this shape.
impl TypedReceipt for CallReceipt {
    const TX_TYPE: TxType = TxType::Call;

    fn from_receipt(receipt: Receipt) -> Option<Self> {
        match receipt {
            Receipt::Call(r) => Some(r),
            _ => None,
        }
    }
}

/// Consume a result that must carry a receipt of shape `R`.
pub fn expect_receipt<R: TypedReceipt>(
    engine: &dyn Engine,
    result: svm_result_t,
) -> Result<R, SvmError> {
    let bytes = take_result(engine, result)?
        .ok_or_else(|| SvmError::Protocol("engine returned no receipt".into()))?;

    let receipt = decode_receipt(&bytes)?;
    let tx_type = receipt.tx_type();
    match receipt.error() {
        Some(err) => debug!(?tx_type, kind = %err.kind(), "transaction failed"),
        None => debug!(?tx_type, gas_used = receipt.gas_used(), "transaction succeeded"),
    }

    R::from_receipt(receipt).ok_or_else(|| {
        SvmError::Protocol(format!(
            "expected a {:?} receipt, got {:?}",
            R::TX_TYPE,
            tx_type
        ))
    })
}

/// Reject input the ABI cannot describe: lengths travel as `u32`.
pub fn check_abi_len(what: &'static str, len: usize) -> Result<u32, SvmError> {
    u32::try_from(len).map_err(|_| SvmError::TooLarge { what, len })
}
