//! Codec error type.
//!
//! Every decoder checks the declared length of a field against the bytes
//! remaining before reading it, so malformed input surfaces as a
//! `CodecError` rather than a panic.

use core::fmt;

/// Failure to encode or decode an SVM wire structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A field needed more bytes than were left in the buffer.
    UnexpectedEof { needed: usize, remaining: usize },

    /// Receipt header carried a version other than `RECEIPT_VERSION`.
    UnsupportedVersion(u16),

    /// Receipt header carried an unknown transaction type.
    UnknownTxType(u8),

    /// Runtime error payload carried an unknown error code.
    UnknownErrorCode(u8),

    /// A string field was not valid UTF-8.
    InvalidUtf8,

    /// A success-only field was absent when encoding a successful receipt.
    MissingField(&'static str),

    /// A value is too long for its length prefix.
    LengthOverflow {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEof { needed, remaining } => write!(
                f,
                "unexpected end of data: needed {} bytes, {} remaining",
                needed, remaining
            ),
            Self::UnsupportedVersion(v) => write!(f, "unsupported receipt version {}", v),
            Self::UnknownTxType(t) => write!(f, "unknown transaction type {}", t),
            Self::UnknownErrorCode(c) => write!(f, "unknown runtime error code {}", c),
            Self::InvalidUtf8 => write!(f, "invalid UTF-8"),
            Self::MissingField(field) => write!(f, "missing {}", field),
            Self::LengthOverflow { field, len, max } => {
                write!(f, "{} too long: {} exceeds maximum of {}", field, len, max)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodecError {}

/// Convenience result type for the codecs.
pub type CodecResult<T> = core::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_eof() {
        let err = CodecError::UnexpectedEof {
            needed: 20,
            remaining: 3,
        };
        let s = alloc::format!("{}", err);
        assert!(s.contains("20"));
        assert!(s.contains("3"));
    }

    #[test]
    fn test_display_overflow() {
        let err = CodecError::LengthOverflow {
            field: "string",
            len: 300,
            max: 255,
        };
        assert_eq!(
            alloc::format!("{}", err),
            "string too long: 300 exceeds maximum of 255"
        );
    }
}
