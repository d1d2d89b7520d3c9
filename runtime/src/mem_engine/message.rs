//! Transaction message formats understood by [`MemEngine`](super::MemEngine).
//!
//! ```text
//! deploy: name_len:u8 | name | code            (code starts with "\0asm")
//! spawn:  template:20 | name_len:u8 | name | ctor_len:u8 | ctor | calldata
//! call:   target:20   | func_len:u8 | func | calldata
//! ```
//!
//! Calldata runs to the end of the message. Verify messages use the call
//! format.

use svm_primitives::field::{decode_address, decode_string, decode_template_addr, encode_address, encode_string};
use svm_primitives::{Address, CodecError, CodecResult, TemplateAddr};

/// Leading bytes of every Wasm module.
pub const WASM_MAGIC: [u8; 4] = *b"\0asm";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployMessage {
    pub name: String,
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnMessage {
    pub template: TemplateAddr,
    pub name: String,
    pub ctor: String,
    pub calldata: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMessage {
    pub target: Address,
    pub function: String,
    pub calldata: Vec<u8>,
}

/// Message parsing failures. Reported to the host as engine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Codec(#[from] CodecError),

    #[error("template code is not a Wasm module")]
    NotWasm,

    #[error("{0} cannot be empty")]
    Empty(&'static str),
}

impl DeployMessage {
    pub fn new(name: impl Into<String>, code: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let (name, code) = decode_string(bytes)?;
        if name.is_empty() {
            return Err(MessageError::Empty("template name"));
        }
        if !code.starts_with(&WASM_MAGIC) {
            return Err(MessageError::NotWasm);
        }
        Ok(Self {
            name,
            code: code.to_vec(),
        })
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(1 + self.name.len() + self.code.len());
        encode_string(&mut buf, &self.name)?;
        buf.extend_from_slice(&self.code);
        Ok(buf)
    }
}

impl SpawnMessage {
    pub fn new(
        template: TemplateAddr,
        name: impl Into<String>,
        ctor: impl Into<String>,
        calldata: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            template,
            name: name.into(),
            ctor: ctor.into(),
            calldata: calldata.into(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let (template, rest) = decode_template_addr(bytes)?;
        let (name, rest) = decode_string(rest)?;
        let (ctor, calldata) = decode_string(rest)?;
        if ctor.is_empty() {
            return Err(MessageError::Empty("ctor name"));
        }
        Ok(Self {
            template,
            name,
            ctor,
            calldata: calldata.to_vec(),
        })
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(22 + self.name.len() + self.ctor.len() + self.calldata.len());
        encode_address(&mut buf, &self.template);
        encode_string(&mut buf, &self.name)?;
        encode_string(&mut buf, &self.ctor)?;
        buf.extend_from_slice(&self.calldata);
        Ok(buf)
    }
}

impl CallMessage {
    pub fn new(target: Address, function: impl Into<String>, calldata: impl Into<Vec<u8>>) -> Self {
        Self {
            target,
            function: function.into(),
            calldata: calldata.into(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        let (target, rest) = decode_address(bytes)?;
        let (function, calldata) = decode_string(rest)?;
        if function.is_empty() {
            return Err(MessageError::Empty("function name"));
        }
        Ok(Self {
            target,
            function,
            calldata: calldata.to_vec(),
        })
    }

    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(21 + self.function.len() + self.calldata.len());
        encode_address(&mut buf, &self.target);
        encode_string(&mut buf, &self.function)?;
        buf.extend_from_slice(&self.calldata);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_message_layout() {
        let msg = DeployMessage::new("wallet", b"\0asm\x01\0\0\0".to_vec());
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes[0], 6);
        assert_eq!(&bytes[1..7], b"wallet");
        assert_eq!(&bytes[7..11], &WASM_MAGIC);
        assert_eq!(DeployMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_deploy_rejects_non_wasm() {
        let bytes = DeployMessage::new("wallet", b"ELF".to_vec()).encode().unwrap();
        assert_eq!(DeployMessage::decode(&bytes).unwrap_err(), MessageError::NotWasm);
    }

    #[test]
    fn test_deploy_rejects_truncated_name() {
        let err = DeployMessage::decode(&[10, b'a']).unwrap_err();
        assert!(matches!(err, MessageError::Codec(CodecError::UnexpectedEof { .. })));
    }

    #[test]
    fn test_spawn_message_calldata_runs_to_end() {
        let msg = SpawnMessage::new([3; 20], "alice", "initialize", vec![1, 2, 3]);
        let bytes = msg.encode().unwrap();
        assert_eq!(bytes.len(), 20 + 1 + 5 + 1 + 10 + 3);
        assert_eq!(SpawnMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_call_message_requires_function() {
        let mut bytes = vec![0u8; 20];
        bytes.push(0);
        assert_eq!(
            CallMessage::decode(&bytes).unwrap_err(),
            MessageError::Empty("function name")
        );
    }

    #[test]
    fn test_call_message_short_target() {
        let err = CallMessage::decode(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, MessageError::Codec(_)));
    }
}
