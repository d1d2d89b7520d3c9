//! Binding error types.
//!
//! Errors fall into three disjoint channels:
//!
//! - **caller**: a precondition was violated; the engine was never called
//! - **engine**: the engine returned an error buffer; its text is kept verbatim
//! - **protocol**: the engine returned something that breaks the host/engine
//!   contract (malformed receipt, wrong receipt type, bad result envelope)
//!
//! A failed transaction is *not* an error: it is a receipt with
//! `success == false` and a structured `RuntimeError`.

use svm_primitives::{CodecError, Layer};

/// Top-level error type for the binding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SvmError {
    /// Transaction or validation message was empty.
    #[error("msg cannot be empty")]
    EmptyMessage,

    /// `Svm::init` has not completed successfully yet.
    #[error("SVM has not been initialized")]
    NotInitialized,

    /// Configuration rejected before reaching the engine.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// `open` was called with a layer other than the next one.
    #[error("cannot open layer {requested}, expected layer {expected}")]
    InvalidLayer { requested: Layer, expected: Layer },

    /// A layer is already open.
    #[error("layer {0} is already open")]
    LayerAlreadyOpen(Layer),

    /// The operation needs an open layer.
    #[error("no layer is open")]
    LayerNotOpen,

    /// Input longer than the ABI's `u32` length field can carry.
    #[error("{what} of {len} bytes exceeds the engine's length limit")]
    TooLarge { what: &'static str, len: usize },

    /// Error message returned by the engine.
    #[error("{0}")]
    Engine(String),

    /// Receipt bytes could not be decoded.
    #[error("malformed receipt: {0}")]
    MalformedReceipt(#[from] CodecError),

    /// Result envelope or receipt type violates the engine contract.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl SvmError {
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyMessage
                | Self::NotInitialized
                | Self::InvalidConfig(_)
                | Self::InvalidLayer { .. }
                | Self::LayerAlreadyOpen(_)
                | Self::LayerNotOpen
                | Self::TooLarge { .. }
        )
    }

    pub fn is_engine_error(&self) -> bool {
        matches!(self, Self::Engine(_))
    }

    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Self::MalformedReceipt(_) | Self::Protocol(_))
    }
}
