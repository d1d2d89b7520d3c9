//! Field-level readers and writers shared by the receipt and error codecs.
//!
//! Each decoder consumes its field from the front of the input and returns
//! `(value, rest)`, so composite decoders read as a chain of field reads:
//!
//! ```text
//! fixed:    Address(20) | State(32) | TxId(32) | u64 BE (8) | TxNonce(16)
//! string:   len:u8  | len bytes of UTF-8
//! logs:     count:u8 | count × (len:u16 BE | len bytes)
//! touched:  count:u16 BE | count × Address(20)
//! returns:  len:u16 BE | len bytes
//! ```
//!
//! Encoders append to a `Vec<u8>` and reject values that do not fit their
//! length prefix.

use alloc::string::String;
use alloc::vec::Vec;
use bytes::{Buf, BufMut};

use crate::error::{CodecError, CodecResult};
use crate::types::*;

/// Maximum byte length of a string field (1-byte length prefix).
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

/// Maximum number of logs in a receipt (1-byte count).
pub const MAX_LOGS: usize = u8::MAX as usize;

/// Maximum byte length of a single log entry (2-byte length prefix).
pub const MAX_LOG_LEN: usize = u16::MAX as usize;

/// Maximum byte length of return data (2-byte length prefix).
pub const MAX_RETURN_DATA_LEN: usize = u16::MAX as usize;

/// Maximum number of touched accounts (2-byte count).
pub const MAX_TOUCHED_ACCOUNTS: usize = u16::MAX as usize;

fn ensure(bytes: &[u8], needed: usize) -> CodecResult<()> {
    if bytes.len() < needed {
        return Err(CodecError::UnexpectedEof {
            needed,
            remaining: bytes.len(),
        });
    }
    Ok(())
}

fn check_len(field: &'static str, len: usize, max: usize) -> CodecResult<()> {
    if len > max {
        return Err(CodecError::LengthOverflow { field, len, max });
    }
    Ok(())
}

// ── Fixed-width decoders ──

fn decode_array<const N: usize>(bytes: &[u8]) -> CodecResult<([u8; N], &[u8])> {
    ensure(bytes, N)?;
    let (head, rest) = bytes.split_at(N);
    let mut out = [0u8; N];
    out.copy_from_slice(head);
    Ok((out, rest))
}

/// Split off the first `n` raw bytes.
pub fn decode_bytes(bytes: &[u8], n: usize) -> CodecResult<(&[u8], &[u8])> {
    ensure(bytes, n)?;
    Ok(bytes.split_at(n))
}

pub fn decode_u8(mut bytes: &[u8]) -> CodecResult<(u8, &[u8])> {
    ensure(bytes, 1)?;
    let v = bytes.get_u8();
    Ok((v, bytes))
}

pub fn decode_u16(mut bytes: &[u8]) -> CodecResult<(u16, &[u8])> {
    ensure(bytes, 2)?;
    let v = bytes.get_u16();
    Ok((v, bytes))
}

pub fn decode_u64(mut bytes: &[u8]) -> CodecResult<(u64, &[u8])> {
    ensure(bytes, 8)?;
    let v = bytes.get_u64();
    Ok((v, bytes))
}

pub fn decode_address(bytes: &[u8]) -> CodecResult<(Address, &[u8])> {
    decode_array::<ADDRESS_LENGTH>(bytes)
}

pub fn decode_template_addr(bytes: &[u8]) -> CodecResult<(TemplateAddr, &[u8])> {
    decode_array::<ADDRESS_LENGTH>(bytes)
}

pub fn decode_state(bytes: &[u8]) -> CodecResult<(State, &[u8])> {
    decode_array::<STATE_LENGTH>(bytes)
}

pub fn decode_tx_id(bytes: &[u8]) -> CodecResult<(TxId, &[u8])> {
    decode_array::<TX_ID_LENGTH>(bytes)
}

pub fn decode_amount(bytes: &[u8]) -> CodecResult<(Amount, &[u8])> {
    decode_u64(bytes)
}

pub fn decode_gas(bytes: &[u8]) -> CodecResult<(Gas, &[u8])> {
    decode_u64(bytes)
}

pub fn decode_gas_fee(bytes: &[u8]) -> CodecResult<(GasFee, &[u8])> {
    decode_u64(bytes)
}

pub fn decode_layer(bytes: &[u8]) -> CodecResult<(Layer, &[u8])> {
    decode_u64(bytes)
}

/// `Upper(8 BE) || Lower(8 BE)`.
pub fn decode_tx_nonce(bytes: &[u8]) -> CodecResult<(TxNonce, &[u8])> {
    ensure(bytes, TX_NONCE_LENGTH)?;
    let (upper, rest) = decode_u64(bytes)?;
    let (lower, rest) = decode_u64(rest)?;
    Ok((TxNonce { upper, lower }, rest))
}

pub fn decode_tx_type(bytes: &[u8]) -> CodecResult<(TxType, &[u8])> {
    let (tag, rest) = decode_u8(bytes)?;
    let tx_type = TxType::from_u8(tag).ok_or(CodecError::UnknownTxType(tag))?;
    Ok((tx_type, rest))
}

// ── Length-prefixed decoders ──

pub fn decode_string(bytes: &[u8]) -> CodecResult<(String, &[u8])> {
    let (len, rest) = decode_u8(bytes)?;
    let (raw, rest) = decode_bytes(rest, len as usize)?;
    let s = core::str::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8)?;
    Ok((String::from(s), rest))
}

pub fn decode_logs(bytes: &[u8]) -> CodecResult<(Vec<Log>, &[u8])> {
    let (count, mut rest) = decode_u8(bytes)?;
    let mut logs = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (len, tail) = decode_u16(rest)?;
        let (data, tail) = decode_bytes(tail, len as usize)?;
        logs.push(data.to_vec());
        rest = tail;
    }
    Ok((logs, rest))
}

pub fn decode_touched_accounts(bytes: &[u8]) -> CodecResult<(Vec<Address>, &[u8])> {
    let (count, mut rest) = decode_u16(bytes)?;
    // Reject before allocating for a count the buffer cannot hold.
    ensure(rest, count as usize * ADDRESS_LENGTH)?;
    let mut accounts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (addr, tail) = decode_address(rest)?;
        accounts.push(addr);
        rest = tail;
    }
    Ok((accounts, rest))
}

pub fn decode_return_data(bytes: &[u8]) -> CodecResult<(ReturnData, &[u8])> {
    let (len, rest) = decode_u16(bytes)?;
    let (data, rest) = decode_bytes(rest, len as usize)?;
    Ok((data.to_vec(), rest))
}

// ── Encoders ──

pub fn encode_address(buf: &mut Vec<u8>, addr: &Address) {
    buf.put_slice(addr);
}

pub fn encode_state(buf: &mut Vec<u8>, state: &State) {
    buf.put_slice(state);
}

pub fn encode_u64(buf: &mut Vec<u8>, v: u64) {
    buf.put_u64(v);
}

pub fn encode_string(buf: &mut Vec<u8>, s: &str) -> CodecResult<()> {
    check_len("string", s.len(), MAX_STRING_LEN)?;
    buf.put_u8(s.len() as u8);
    buf.put_slice(s.as_bytes());
    Ok(())
}

pub fn encode_logs(buf: &mut Vec<u8>, logs: &[Log]) -> CodecResult<()> {
    check_len("logs", logs.len(), MAX_LOGS)?;
    for log in logs {
        check_len("log", log.len(), MAX_LOG_LEN)?;
    }
    buf.put_u8(logs.len() as u8);
    for log in logs {
        buf.put_u16(log.len() as u16);
        buf.put_slice(log);
    }
    Ok(())
}

pub fn encode_touched_accounts(buf: &mut Vec<u8>, accounts: &[Address]) -> CodecResult<()> {
    check_len("touched accounts", accounts.len(), MAX_TOUCHED_ACCOUNTS)?;
    buf.put_u16(accounts.len() as u16);
    for addr in accounts {
        buf.put_slice(addr);
    }
    Ok(())
}

pub fn encode_return_data(buf: &mut Vec<u8>, data: &[u8]) -> CodecResult<()> {
    check_len("return data", data.len(), MAX_RETURN_DATA_LEN)?;
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
    Ok(())
}
