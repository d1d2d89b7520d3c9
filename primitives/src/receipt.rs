//! Receipts returned by the engine after executing a transaction.
//!
//! Every receipt starts with a 4-byte header:
//!
//! ```text
//! tx type : u8        (0 = Deploy, 1 = Spawn, 2 = Call / Verify)
//! version : u16 BE    (must be 0)
//! success : u8        (0 = failure, anything else = success)
//! ```
//!
//! On failure the header is followed by a runtime error payload
//! (see [`crate::runtime_error`]). On success the body depends on the tx type:
//!
//! ```text
//! Deploy: template(20) | gas used(8 BE) | logs
//! Spawn:  account(20) | init state(32) | return data | gas used(8 BE) | touched accounts | logs
//! Call:   new state(32) | return data | gas used(8 BE) | touched accounts | logs
//! ```
//!
//! Bytes following the last field are ignored.

use alloc::vec::Vec;
use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::field::*;
use crate::runtime_error::{decode_runtime_error, encode_runtime_error, RuntimeError};
use crate::types::*;

/// Decoded receipt header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptHeader {
    pub tx_type: TxType,
    pub version: u16,
    pub success: bool,
}

/// Receipt of a `Deploy` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReceipt {
    pub success: bool,
    pub error: Option<RuntimeError>,
    /// Address of the deployed template. `None` on failure.
    pub template_addr: Option<TemplateAddr>,
    pub gas_used: Gas,
    pub logs: Vec<Log>,
}

/// Receipt of a `Spawn` transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnReceipt {
    pub success: bool,
    pub error: Option<RuntimeError>,
    /// Address of the spawned account. `None` on failure.
    pub account_addr: Option<Address>,
    /// State right after the ctor ran. `None` on failure.
    pub init_state: Option<State>,
    pub return_data: ReturnData,
    pub gas_used: Gas,
    /// Accounts touched by the transaction, in emission order.
    /// Not deduplicated.
    pub touched_accounts: Vec<Address>,
    pub logs: Vec<Log>,
}

/// Receipt of a `Call` (or `Verify`) transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReceipt {
    pub success: bool,
    pub error: Option<RuntimeError>,
    /// State right after the call. `None` on failure.
    pub new_state: Option<State>,
    pub return_data: ReturnData,
    pub gas_used: Gas,
    /// Accounts touched by the transaction, in emission order.
    /// Not deduplicated.
    pub touched_accounts: Vec<Address>,
    pub logs: Vec<Log>,
}

impl DeployReceipt {
    pub fn failure(error: RuntimeError, logs: Vec<Log>) -> Self {
        Self {
            success: false,
            error: Some(error),
            template_addr: None,
            gas_used: 0,
            logs,
        }
    }
}

impl SpawnReceipt {
    pub fn failure(error: RuntimeError, logs: Vec<Log>) -> Self {
        Self {
            success: false,
            error: Some(error),
            account_addr: None,
            init_state: None,
            return_data: Vec::new(),
            gas_used: 0,
            touched_accounts: Vec::new(),
            logs,
        }
    }
}

impl CallReceipt {
    pub fn failure(error: RuntimeError, logs: Vec<Log>) -> Self {
        Self {
            success: false,
            error: Some(error),
            new_state: None,
            return_data: Vec::new(),
            gas_used: 0,
            touched_accounts: Vec::new(),
            logs,
        }
    }
}

/// Any of the three receipt shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Receipt {
    Deploy(DeployReceipt),
    Spawn(SpawnReceipt),
    Call(CallReceipt),
}

impl Receipt {
    pub fn tx_type(&self) -> TxType {
        match self {
            Self::Deploy(_) => TxType::Deploy,
            Self::Spawn(_) => TxType::Spawn,
            Self::Call(_) => TxType::Call,
        }
    }

    pub fn success(&self) -> bool {
        match self {
            Self::Deploy(r) => r.success,
            Self::Spawn(r) => r.success,
            Self::Call(r) => r.success,
        }
    }

    pub fn error(&self) -> Option<&RuntimeError> {
        match self {
            Self::Deploy(r) => r.error.as_ref(),
            Self::Spawn(r) => r.error.as_ref(),
            Self::Call(r) => r.error.as_ref(),
        }
    }

    pub fn gas_used(&self) -> Gas {
        match self {
            Self::Deploy(r) => r.gas_used,
            Self::Spawn(r) => r.gas_used,
            Self::Call(r) => r.gas_used,
        }
    }

    pub fn logs(&self) -> &[Log] {
        match self {
            Self::Deploy(r) => &r.logs,
            Self::Spawn(r) => &r.logs,
            Self::Call(r) => &r.logs,
        }
    }
}

// ── Decoding ──

/// Decode and validate the receipt header, returning the body.
pub fn decode_receipt_header(bytes: &[u8]) -> CodecResult<(ReceiptHeader, &[u8])> {
    if bytes.len() < RECEIPT_HEADER_LENGTH {
        return Err(CodecError::UnexpectedEof {
            needed: RECEIPT_HEADER_LENGTH,
            remaining: bytes.len(),
        });
    }

    let (tx_type, rest) = decode_tx_type(bytes)?;
    let (version, rest) = decode_u16(rest)?;
    if version != RECEIPT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let (success, rest) = decode_u8(rest)?;

    let header = ReceiptHeader {
        tx_type,
        version,
        success: success != 0,
    };
    Ok((header, rest))
}

/// Decode a receipt produced by the engine.
pub fn decode_receipt(bytes: &[u8]) -> CodecResult<Receipt> {
    let (header, body) = decode_receipt_header(bytes)?;

    if !header.success {
        let (error, logs, _) = decode_runtime_error(body)?;
        let receipt = match header.tx_type {
            TxType::Deploy => Receipt::Deploy(DeployReceipt::failure(error, logs)),
            TxType::Spawn => Receipt::Spawn(SpawnReceipt::failure(error, logs)),
            TxType::Call => Receipt::Call(CallReceipt::failure(error, logs)),
        };
        return Ok(receipt);
    }

    let receipt = match header.tx_type {
        TxType::Deploy => Receipt::Deploy(decode_deploy_body(body)?),
        TxType::Spawn => Receipt::Spawn(decode_spawn_body(body)?),
        TxType::Call => Receipt::Call(decode_call_body(body)?),
    };
    Ok(receipt)
}

fn decode_deploy_body(bytes: &[u8]) -> CodecResult<DeployReceipt> {
    let (template_addr, rest) = decode_template_addr(bytes)?;
    let (gas_used, rest) = decode_gas(rest)?;
    let (logs, _) = decode_logs(rest)?;

    Ok(DeployReceipt {
        success: true,
        error: None,
        template_addr: Some(template_addr),
        gas_used,
        logs,
    })
}

fn decode_spawn_body(bytes: &[u8]) -> CodecResult<SpawnReceipt> {
    let (account_addr, rest) = decode_address(bytes)?;
    let (init_state, rest) = decode_state(rest)?;
    let (return_data, rest) = decode_return_data(rest)?;
    let (gas_used, rest) = decode_gas(rest)?;
    let (touched_accounts, rest) = decode_touched_accounts(rest)?;
    let (logs, _) = decode_logs(rest)?;

    Ok(SpawnReceipt {
        success: true,
        error: None,
        account_addr: Some(account_addr),
        init_state: Some(init_state),
        return_data,
        gas_used,
        touched_accounts,
        logs,
    })
}

fn decode_call_body(bytes: &[u8]) -> CodecResult<CallReceipt> {
    let (new_state, rest) = decode_state(bytes)?;
    let (return_data, rest) = decode_return_data(rest)?;
    let (gas_used, rest) = decode_gas(rest)?;
    let (touched_accounts, rest) = decode_touched_accounts(rest)?;
    let (logs, _) = decode_logs(rest)?;

    Ok(CallReceipt {
        success: true,
        error: None,
        new_state: Some(new_state),
        return_data,
        gas_used,
        touched_accounts,
        logs,
    })
}

// ── Encoding ──

fn write_header(buf: &mut Vec<u8>, tx_type: TxType, success: bool) {
    buf.put_u8(tx_type.as_u8());
    buf.put_u16(RECEIPT_VERSION);
    buf.put_u8(success as u8);
}

/// Encode a receipt into the engine's wire format.
///
/// A receipt whose `success` flag is false is encoded from its `error`;
/// one without an `error` is encoded as a success and needs the
/// success-only fields to be present.
pub fn encode_receipt(receipt: &Receipt) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(128);
    let tx_type = receipt.tx_type();

    if let Some(error) = receipt.error().filter(|_| !receipt.success()) {
        write_header(&mut buf, tx_type, false);
        encode_runtime_error(&mut buf, error, receipt.logs())?;
        return Ok(buf);
    }

    write_header(&mut buf, tx_type, true);
    match receipt {
        Receipt::Deploy(r) => {
            encode_address(&mut buf, &require(r.template_addr, "template address")?);
            encode_u64(&mut buf, r.gas_used);
            encode_logs(&mut buf, &r.logs)?;
        }
        Receipt::Spawn(r) => {
            encode_address(&mut buf, &require(r.account_addr, "account address")?);
            encode_state(&mut buf, &require(r.init_state, "init state")?);
            encode_return_data(&mut buf, &r.return_data)?;
            encode_u64(&mut buf, r.gas_used);
            encode_touched_accounts(&mut buf, &r.touched_accounts)?;
            encode_logs(&mut buf, &r.logs)?;
        }
        Receipt::Call(r) => {
            encode_state(&mut buf, &require(r.new_state, "new state")?);
            encode_return_data(&mut buf, &r.return_data)?;
            encode_u64(&mut buf, r.gas_used);
            encode_touched_accounts(&mut buf, &r.touched_accounts)?;
            encode_logs(&mut buf, &r.logs)?;
        }
    }
    Ok(buf)
}

fn require<T>(value: Option<T>, field: &'static str) -> CodecResult<T> {
    value.ok_or(CodecError::MissingField(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    fn header(tx_type: u8, success: u8) -> Vec<u8> {
        vec![tx_type, 0, 0, success]
    }

    fn sample_call() -> CallReceipt {
        CallReceipt {
            success: true,
            error: None,
            new_state: Some([0x33; 32]),
            return_data: vec![0x40, 1, 2, 3],
            gas_used: 1_000,
            touched_accounts: vec![[1; 20], [2; 20]],
            logs: vec![b"called".to_vec()],
        }
    }

    #[test]
    fn test_header_too_short() {
        assert_eq!(
            decode_receipt(&[0, 0, 0]).unwrap_err(),
            CodecError::UnexpectedEof {
                needed: 4,
                remaining: 3
            }
        );
    }

    #[test]
    fn test_header_rejects_nonzero_version() {
        assert_eq!(
            decode_receipt(&[0, 0, 1, 1]).unwrap_err(),
            CodecError::UnsupportedVersion(1)
        );
        assert_eq!(
            decode_receipt(&[2, 0x01, 0x00, 1]).unwrap_err(),
            CodecError::UnsupportedVersion(256)
        );
    }

    #[test]
    fn test_header_rejects_unknown_tx_type() {
        assert_eq!(
            decode_receipt(&[3, 0, 0, 1]).unwrap_err(),
            CodecError::UnknownTxType(3)
        );
    }

    #[test]
    fn test_decode_deploy_success() {
        let mut bytes = header(0, 1);
        bytes.extend_from_slice(&[0xAA; 20]);
        bytes.extend_from_slice(&42u64.to_be_bytes());
        bytes.push(0);

        let receipt = decode_receipt(&bytes).unwrap();
        let Receipt::Deploy(r) = receipt else {
            panic!("expected deploy receipt");
        };
        assert!(r.success);
        assert_eq!(r.error, None);
        assert_eq!(r.template_addr, Some([0xAA; 20]));
        assert_eq!(r.gas_used, 42);
        assert!(r.logs.is_empty());
    }

    #[test]
    fn test_decode_deploy_out_of_gas() {
        let mut bytes = header(0, 0);
        bytes.extend_from_slice(&[0, 0]);

        let Receipt::Deploy(r) = decode_receipt(&bytes).unwrap() else {
            panic!("expected deploy receipt");
        };
        assert!(!r.success);
        assert_eq!(r.error, Some(RuntimeError::OutOfGas));
        assert_eq!(r.template_addr, None);
    }

    #[test]
    fn test_decode_spawn_field_order() {
        let mut bytes = header(1, 1);
        bytes.extend_from_slice(&[0x0A; 20]); // account
        bytes.extend_from_slice(&[0x0B; 32]); // init state
        bytes.extend_from_slice(&[0, 1, 0x7F]); // return data
        bytes.extend_from_slice(&9u64.to_be_bytes()); // gas used
        bytes.extend_from_slice(&[0, 2]); // touched accounts
        bytes.extend_from_slice(&[0x0A; 20]);
        bytes.extend_from_slice(&[0x00; 20]);
        bytes.extend_from_slice(&[1, 0, 1, 0x55]); // logs

        let Receipt::Spawn(r) = decode_receipt(&bytes).unwrap() else {
            panic!("expected spawn receipt");
        };
        assert_eq!(r.account_addr, Some([0x0A; 20]));
        assert_eq!(r.init_state, Some([0x0B; 32]));
        assert_eq!(r.return_data, vec![0x7F]);
        assert_eq!(r.gas_used, 9);
        assert_eq!(r.touched_accounts, vec![[0x0A; 20], [0x00; 20]]);
        assert_eq!(r.logs, vec![vec![0x55]]);
    }

    #[test]
    fn test_call_roundtrip() {
        let receipt = Receipt::Call(sample_call());
        let bytes = encode_receipt(&receipt).unwrap();
        assert_eq!(&bytes[..4], &[2, 0, 0, 1]);
        assert_eq!(decode_receipt(&bytes).unwrap(), receipt);
    }

    #[test]
    fn test_call_truncated_fails_cleanly() {
        let bytes = encode_receipt(&Receipt::Call(sample_call())).unwrap();
        for len in 4..bytes.len() {
            assert!(
                decode_receipt(&bytes[..len]).is_err(),
                "truncation at {} must fail",
                len
            );
        }
    }

    #[test]
    fn test_failed_call_keeps_logs() {
        let receipt = Receipt::Call(CallReceipt::failure(
            RuntimeError::FuncNotFound {
                template: [1; 20],
                target: [2; 20],
                function: "missing".to_string(),
            },
            vec![b"before failure".to_vec()],
        ));
        let bytes = encode_receipt(&receipt).unwrap();
        assert_eq!(bytes[3], 0);

        let decoded = decode_receipt(&bytes).unwrap();
        assert!(!decoded.success());
        assert_eq!(decoded.logs(), &[b"before failure".to_vec()]);
        assert_eq!(decoded, receipt);
    }

    #[test]
    fn test_any_nonzero_success_byte_is_success() {
        let mut bytes = encode_receipt(&Receipt::Call(sample_call())).unwrap();
        bytes[3] = 0x7F;
        assert!(decode_receipt(&bytes).unwrap().success());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = encode_receipt(&Receipt::Call(sample_call())).unwrap();
        bytes.extend_from_slice(&[0xDE, 0xAD]);
        assert_eq!(decode_receipt(&bytes).unwrap(), Receipt::Call(sample_call()));
    }

    #[test]
    fn test_encode_success_requires_fields() {
        let receipt = Receipt::Deploy(DeployReceipt {
            success: true,
            error: None,
            template_addr: None,
            gas_used: 0,
            logs: vec![],
        });
        assert_eq!(
            encode_receipt(&receipt).unwrap_err(),
            CodecError::MissingField("template address")
        );
    }
}
