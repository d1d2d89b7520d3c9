//! Structured runtime errors carried by failed receipts.
//!
//! Payload layout:
//!
//! ```text
//! error code : u8
//! logs       : count:u8 | count × (len:u16 BE | bytes)
//! tail       : per error code (below)
//!
//! 0 OOG                   (none)
//! 1 TemplateNotFound      template
//! 2 AccountNotFound       target
//! 3 CompilationFailed     template, target, message
//! 4 InstantiationFailed   template, target, message
//! 5 FuncNotFound          template, target, function
//! 6 FuncFailed            template, target, function, message
//! 7 FuncNotCtor           template, function
//! 8 FuncNotAllowed        template, target, function, message
//! 9 FuncInvalidSignature  template, target, function
//! ```
//!
//! Addresses are 20 raw bytes, strings are `len:u8 | UTF-8`.

use alloc::string::String;
use alloc::vec::Vec;
use bytes::BufMut;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::field::{
    decode_address, decode_logs, decode_string, decode_template_addr, decode_u8,
    encode_address, encode_logs, encode_string,
};
use crate::types::{Address, Log, TemplateAddr};

/// Kind of a runtime error. The repr values are the wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum RuntimeErrorKind {
    OutOfGas = 0,
    TemplateNotFound = 1,
    AccountNotFound = 2,
    CompilationFailed = 3,
    InstantiationFailed = 4,
    FuncNotFound = 5,
    FuncFailed = 6,
    FuncNotCtor = 7,
    FuncNotAllowed = 8,
    FuncInvalidSignature = 9,
}

impl RuntimeErrorKind {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::OutOfGas),
            1 => Some(Self::TemplateNotFound),
            2 => Some(Self::AccountNotFound),
            3 => Some(Self::CompilationFailed),
            4 => Some(Self::InstantiationFailed),
            5 => Some(Self::FuncNotFound),
            6 => Some(Self::FuncFailed),
            7 => Some(Self::FuncNotCtor),
            8 => Some(Self::FuncNotAllowed),
            9 => Some(Self::FuncInvalidSignature),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether resubmitting the transaction later may succeed
    /// (more gas, or a missing template/account appearing).
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::OutOfGas | Self::TemplateNotFound | Self::AccountNotFound
        )
    }
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OutOfGas => "OOG",
            Self::TemplateNotFound => "TemplateNotFound",
            Self::AccountNotFound => "AccountNotFound",
            Self::CompilationFailed => "CompilationFailed",
            Self::InstantiationFailed => "InstantiationFailed",
            Self::FuncNotFound => "FuncNotFound",
            Self::FuncFailed => "FuncFailed",
            Self::FuncNotCtor => "FuncNotCtor",
            Self::FuncNotAllowed => "FuncNotAllowed",
            Self::FuncInvalidSignature => "FuncInvalidSignature",
        };
        f.write_str(name)
    }
}

/// A failure raised by the engine while executing a transaction.
///
/// Each variant carries exactly the fields its wire payload defines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuntimeError {
    OutOfGas,
    TemplateNotFound {
        template: TemplateAddr,
    },
    AccountNotFound {
        target: Address,
    },
    CompilationFailed {
        template: TemplateAddr,
        target: Address,
        message: String,
    },
    InstantiationFailed {
        template: TemplateAddr,
        target: Address,
        message: String,
    },
    FuncNotFound {
        template: TemplateAddr,
        target: Address,
        function: String,
    },
    FuncFailed {
        template: TemplateAddr,
        target: Address,
        function: String,
        message: String,
    },
    FuncNotCtor {
        template: TemplateAddr,
        function: String,
    },
    FuncNotAllowed {
        template: TemplateAddr,
        target: Address,
        function: String,
        message: String,
    },
    FuncInvalidSignature {
        template: TemplateAddr,
        target: Address,
        function: String,
    },
}

impl RuntimeError {
    pub fn kind(&self) -> RuntimeErrorKind {
        match self {
            Self::OutOfGas => RuntimeErrorKind::OutOfGas,
            Self::TemplateNotFound { .. } => RuntimeErrorKind::TemplateNotFound,
            Self::AccountNotFound { .. } => RuntimeErrorKind::AccountNotFound,
            Self::CompilationFailed { .. } => RuntimeErrorKind::CompilationFailed,
            Self::InstantiationFailed { .. } => RuntimeErrorKind::InstantiationFailed,
            Self::FuncNotFound { .. } => RuntimeErrorKind::FuncNotFound,
            Self::FuncFailed { .. } => RuntimeErrorKind::FuncFailed,
            Self::FuncNotCtor { .. } => RuntimeErrorKind::FuncNotCtor,
            Self::FuncNotAllowed { .. } => RuntimeErrorKind::FuncNotAllowed,
            Self::FuncInvalidSignature { .. } => RuntimeErrorKind::FuncInvalidSignature,
        }
    }

    pub fn template(&self) -> Option<&TemplateAddr> {
        match self {
            Self::OutOfGas | Self::AccountNotFound { .. } => None,
            Self::TemplateNotFound { template }
            | Self::CompilationFailed { template, .. }
            | Self::InstantiationFailed { template, .. }
            | Self::FuncNotFound { template, .. }
            | Self::FuncFailed { template, .. }
            | Self::FuncNotCtor { template, .. }
            | Self::FuncNotAllowed { template, .. }
            | Self::FuncInvalidSignature { template, .. } => Some(template),
        }
    }

    pub fn target(&self) -> Option<&Address> {
        match self {
            Self::OutOfGas | Self::TemplateNotFound { .. } | Self::FuncNotCtor { .. } => None,
            Self::AccountNotFound { target }
            | Self::CompilationFailed { target, .. }
            | Self::InstantiationFailed { target, .. }
            | Self::FuncNotFound { target, .. }
            | Self::FuncFailed { target, .. }
            | Self::FuncNotAllowed { target, .. }
            | Self::FuncInvalidSignature { target, .. } => Some(target),
        }
    }

    pub fn function(&self) -> Option<&str> {
        match self {
            Self::FuncNotFound { function, .. }
            | Self::FuncFailed { function, .. }
            | Self::FuncNotCtor { function, .. }
            | Self::FuncNotAllowed { function, .. }
            | Self::FuncInvalidSignature { function, .. } => Some(function),
            _ => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::CompilationFailed { message, .. }
            | Self::InstantiationFailed { message, .. }
            | Self::FuncFailed { message, .. }
            | Self::FuncNotAllowed { message, .. } => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if let Some(function) = self.function() {
            write!(f, " in `{}`", function)?;
        }
        if let Some(message) = self.message() {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Decode a runtime error payload.
///
/// Returns the error, the logs emitted before the failure, and the bytes
/// after the payload.
pub fn decode_runtime_error(bytes: &[u8]) -> CodecResult<(RuntimeError, Vec<Log>, &[u8])> {
    let (code, rest) = decode_u8(bytes)?;
    let kind = RuntimeErrorKind::from_u8(code).ok_or(CodecError::UnknownErrorCode(code))?;
    let (logs, rest) = decode_logs(rest)?;

    let (err, rest) = match kind {
        RuntimeErrorKind::OutOfGas => (RuntimeError::OutOfGas, rest),
        RuntimeErrorKind::TemplateNotFound => {
            let (template, rest) = decode_template_addr(rest)?;
            (RuntimeError::TemplateNotFound { template }, rest)
        }
        RuntimeErrorKind::AccountNotFound => {
            let (target, rest) = decode_address(rest)?;
            (RuntimeError::AccountNotFound { target }, rest)
        }
        RuntimeErrorKind::CompilationFailed | RuntimeErrorKind::InstantiationFailed => {
            let (template, rest) = decode_template_addr(rest)?;
            let (target, rest) = decode_address(rest)?;
            let (message, rest) = decode_string(rest)?;
            let err = if kind == RuntimeErrorKind::CompilationFailed {
                RuntimeError::CompilationFailed {
                    template,
                    target,
                    message,
                }
            } else {
                RuntimeError::InstantiationFailed {
                    template,
                    target,
                    message,
                }
            };
            (err, rest)
        }
        RuntimeErrorKind::FuncNotFound | RuntimeErrorKind::FuncInvalidSignature => {
            let (template, rest) = decode_template_addr(rest)?;
            let (target, rest) = decode_address(rest)?;
            let (function, rest) = decode_string(rest)?;
            let err = if kind == RuntimeErrorKind::FuncNotFound {
                RuntimeError::FuncNotFound {
                    template,
                    target,
                    function,
                }
            } else {
                RuntimeError::FuncInvalidSignature {
                    template,
                    target,
                    function,
                }
            };
            (err, rest)
        }
        RuntimeErrorKind::FuncFailed | RuntimeErrorKind::FuncNotAllowed => {
            let (template, rest) = decode_template_addr(rest)?;
            let (target, rest) = decode_address(rest)?;
            let (function, rest) = decode_string(rest)?;
            let (message, rest) = decode_string(rest)?;
            let err = if kind == RuntimeErrorKind::FuncFailed {
                RuntimeError::FuncFailed {
                    template,
                    target,
                    function,
                    message,
                }
            } else {
                RuntimeError::FuncNotAllowed {
                    template,
                    target,
                    function,
                    message,
                }
            };
            (err, rest)
        }
        RuntimeErrorKind::FuncNotCtor => {
            let (template, rest) = decode_template_addr(rest)?;
            let (function, rest) = decode_string(rest)?;
            (RuntimeError::FuncNotCtor { template, function }, rest)
        }
    };

    Ok((err, logs, rest))
}

/// Append the wire payload of `err` (with the logs emitted before it) to `buf`.
pub fn encode_runtime_error(
    buf: &mut Vec<u8>,
    err: &RuntimeError,
    logs: &[Log],
) -> CodecResult<()> {
    buf.put_u8(err.kind().as_u8());
    encode_logs(buf, logs)?;

    match err {
        RuntimeError::OutOfGas => {}
        RuntimeError::TemplateNotFound { template } => encode_address(buf, template),
        RuntimeError::AccountNotFound { target } => encode_address(buf, target),
        RuntimeError::CompilationFailed {
            template,
            target,
            message,
        }
        | RuntimeError::InstantiationFailed {
            template,
            target,
            message,
        } => {
            encode_address(buf, template);
            encode_address(buf, target);
            encode_string(buf, message)?;
        }
        RuntimeError::FuncNotFound {
            template,
            target,
            function,
        }
        | RuntimeError::FuncInvalidSignature {
            template,
            target,
            function,
        } => {
            encode_address(buf, template);
            encode_address(buf, target);
            encode_string(buf, function)?;
        }
        RuntimeError::FuncFailed {
            template,
            target,
            function,
            message,
        }
        | RuntimeError::FuncNotAllowed {
            template,
            target,
            function,
            message,
        } => {
            encode_address(buf, template);
            encode_address(buf, target);
            encode_string(buf, function)?;
            encode_string(buf, message)?;
        }
        RuntimeError::FuncNotCtor { template, function } => {
            encode_address(buf, template);
            encode_string(buf, function)?;
        }
    }
    Ok(())
}
