//! Fixed-layout encoding of the `Envelope` and `Context` passed to the engine.
//!
//! Both structures have a constant encoded length so the engine can read
//! their fields at fixed offsets without a structural parser.
//!
//! ```text
//! Envelope (60 bytes)
//! +-------------+----------+--------------+--------------+-----------+---------+
//! |  Principal  |  Amount  | Nonce.Upper  | Nonce.Lower  | Gas Limit | Gas Fee |
//! |  20 bytes   | 8 BE     | 8 BE         | 8 BE         | 8 BE      | 8 BE    |
//! +-------------+----------+--------------+--------------+-----------+---------+
//!
//! Context (40 bytes)
//! +-----------+-----------+
//! |  Layer    |   Tx Id   |
//! |  8 BE     | 32 bytes  |
//! +-----------+-----------+
//! ```

use bytes::BufMut;

use crate::error::{CodecError, CodecResult};
use crate::field::{
    decode_address, decode_amount, decode_gas, decode_gas_fee, decode_layer, decode_tx_id,
    decode_tx_nonce,
};
use crate::types::*;

/// Encode an `Envelope` into its 60-byte wire form.
pub fn encode_envelope(env: &Envelope) -> [u8; ENVELOPE_LENGTH] {
    let mut out = [0u8; ENVELOPE_LENGTH];
    let mut buf = &mut out[..];

    buf.put_slice(&env.principal);
    buf.put_u64(env.amount);
    buf.put_u64(env.tx_nonce.upper);
    buf.put_u64(env.tx_nonce.lower);
    buf.put_u64(env.gas_limit);
    buf.put_u64(env.gas_fee);
    debug_assert!(buf.is_empty());

    out
}

/// Decode an `Envelope`, returning the bytes after it.
pub fn decode_envelope(bytes: &[u8]) -> CodecResult<(Envelope, &[u8])> {
    if bytes.len() < ENVELOPE_LENGTH {
        return Err(CodecError::UnexpectedEof {
            needed: ENVELOPE_LENGTH,
            remaining: bytes.len(),
        });
    }

    let (principal, rest) = decode_address(bytes)?;
    let (amount, rest) = decode_amount(rest)?;
    let (tx_nonce, rest) = decode_tx_nonce(rest)?;
    let (gas_limit, rest) = decode_gas(rest)?;
    let (gas_fee, rest) = decode_gas_fee(rest)?;

    let env = Envelope {
        principal,
        amount,
        tx_nonce,
        gas_limit,
        gas_fee,
    };
    Ok((env, rest))
}

/// Encode a `Context` into its 40-byte wire form.
pub fn encode_context(ctx: &Context) -> [u8; CONTEXT_LENGTH] {
    let mut out = [0u8; CONTEXT_LENGTH];
    let mut buf = &mut out[..];

    buf.put_u64(ctx.layer);
    buf.put_slice(&ctx.tx_id);
    debug_assert!(buf.is_empty());

    out
}

/// Decode a `Context`, returning the bytes after it.
pub fn decode_context(bytes: &[u8]) -> CodecResult<(Context, &[u8])> {
    if bytes.len() < CONTEXT_LENGTH {
        return Err(CodecError::UnexpectedEof {
            needed: CONTEXT_LENGTH,
            remaining: bytes.len(),
        });
    }

    let (layer, rest) = decode_layer(bytes)?;
    let (tx_id, rest) = decode_tx_id(rest)?;
    Ok((Context { layer, tx_id }, rest))
}
