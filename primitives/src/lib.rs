//! `svm-primitives`: fixed-layout types and wire codecs for the SVM host binding.
//!
//! This crate provides the domain types exchanged with the SVM engine and
//! the deterministic binary codecs for them:
//!
//! - `types`: fixed-width scalars, field lengths, `Envelope`, `Context`, `Account`
//! - `codec`: the 60-byte `Envelope` and 40-byte `Context` layouts
//! - `field`: length-prefixed and fixed-width field readers and writers
//! - `receipt`: the self-describing Deploy / Spawn / Call receipts
//! - `runtime_error`: the structured `RuntimeError` carried by failed receipts
//!
//! All multi-byte integers on the wire are big-endian.
//!
//! Supports `#![no_std]` (use `default-features = false`).

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod types;
pub mod error;
pub mod field;
pub mod codec;
pub mod runtime_error;
pub mod receipt;

// Re-export commonly used types at the crate root for convenience.
pub use types::{
    Account, Address, Amount, Context, Envelope, Gas, GasFee, Layer, Log, ReturnData, State,
    TemplateAddr, TxId, TxNonce, TxType, CONTEXT_LENGTH, ENVELOPE_LENGTH,
    RECEIPT_HEADER_LENGTH, RECEIPT_VERSION, to_hex,
};
pub use error::{CodecError, CodecResult};
pub use codec::{decode_context, decode_envelope, encode_context, encode_envelope};
pub use runtime_error::{RuntimeError, RuntimeErrorKind};
pub use receipt::{
    decode_receipt, encode_receipt, CallReceipt, DeployReceipt, Receipt, ReceiptHeader,
    SpawnReceipt,
};
