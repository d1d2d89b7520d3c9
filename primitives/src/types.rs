//! Fixed-width domain types and constants shared with the SVM engine.
//!
//! Every scalar has a fixed wire width. Composite values (`Envelope`,
//! `Context`) therefore encode to a constant number of bytes regardless
//! of their field values.

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

pub const ADDRESS_LENGTH: usize = 20;
pub const TX_ID_LENGTH: usize = 32;
pub const STATE_LENGTH: usize = 32;
pub const AMOUNT_LENGTH: usize = 8;
pub const TX_NONCE_LENGTH: usize = 16;
pub const GAS_LENGTH: usize = 8;
pub const GAS_FEE_LENGTH: usize = 8;
pub const LAYER_LENGTH: usize = 8;

/// Encoded `Envelope` length: principal, amount, nonce, gas limit, gas fee.
pub const ENVELOPE_LENGTH: usize =
    ADDRESS_LENGTH + AMOUNT_LENGTH + TX_NONCE_LENGTH + GAS_LENGTH + GAS_FEE_LENGTH;

/// Encoded `Context` length: layer, tx id.
pub const CONTEXT_LENGTH: usize = LAYER_LENGTH + TX_ID_LENGTH;

/// Receipt header: tx type (1) + version (2) + success flag (1).
pub const RECEIPT_HEADER_LENGTH: usize = 1 + 2 + 1;

/// The only receipt version understood by this crate.
pub const RECEIPT_VERSION: u16 = 0;

/// 20-byte account address.
pub type Address = [u8; ADDRESS_LENGTH];

/// 20-byte address of a deployed template.
pub type TemplateAddr = [u8; ADDRESS_LENGTH];

/// 32-byte transaction identifier supplied by the host.
pub type TxId = [u8; TX_ID_LENGTH];

/// 32-byte root digest of the global state.
pub type State = [u8; STATE_LENGTH];

pub type Amount = u64;
pub type Gas = u64;
pub type GasFee = u64;

/// Index of a committed state layer (analogous to a block height).
pub type Layer = u64;

/// Opaque log entry emitted during execution.
pub type Log = Vec<u8>;

/// Raw bytes returned by a Spawn ctor or a Call.
pub type ReturnData = Vec<u8>;

pub const ZERO_ADDRESS: Address = [0u8; ADDRESS_LENGTH];
pub const ZERO_STATE: State = [0u8; STATE_LENGTH];

/// 128-bit transaction nonce carried as two 64-bit halves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxNonce {
    pub upper: u64,
    pub lower: u64,
}

impl TxNonce {
    pub const fn new(upper: u64, lower: u64) -> Self {
        Self { upper, lower }
    }
}

impl From<u128> for TxNonce {
    fn from(v: u128) -> Self {
        Self {
            upper: (v >> 64) as u64,
            lower: v as u64,
        }
    }
}

impl From<TxNonce> for u128 {
    fn from(n: TxNonce) -> Self {
        ((n.upper as u128) << 64) | n.lower as u128
    }
}

/// Transaction type tag. `Verify` shares the `Call` wire shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    Deploy = 0,
    Spawn = 1,
    Call = 2,
}

impl TxType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Deploy),
            1 => Some(Self::Spawn),
            2 => Some(Self::Call),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// The fields common to every Deploy / Spawn / Call / Verify transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Envelope {
    pub principal: Address,
    pub amount: Amount,
    pub tx_nonce: TxNonce,
    pub gas_limit: Gas,
    pub gas_fee: GasFee,
}

impl Envelope {
    pub fn new(
        principal: Address,
        amount: Amount,
        tx_nonce: TxNonce,
        gas_limit: Gas,
        gas_fee: GasFee,
    ) -> Self {
        Self {
            principal,
            amount,
            tx_nonce,
            gas_limit,
            gas_fee,
        }
    }
}

/// Execution context of a transaction: the layer it runs under and its id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    pub layer: Layer,
    pub tx_id: TxId,
}

impl Context {
    pub fn new(layer: Layer, tx_id: TxId) -> Self {
        Self { layer, tx_id }
    }
}

/// Basic account information as reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub addr: Address,
    pub balance: Amount,
    pub counter: TxNonce,
    /// Template the account was spawned from. All zeros for genesis accounts.
    pub template_addr: TemplateAddr,
}

impl Account {
    /// An account without a template, as seeded at genesis.
    pub fn new(addr: Address, balance: Amount, counter: TxNonce) -> Self {
        Self {
            addr,
            balance,
            counter,
            template_addr: ZERO_ADDRESS,
        }
    }
}

/// Render bytes as a `0x`-prefixed lowercase hex string.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for byte in bytes {
        use core::fmt::Write;
        let _ = write!(s, "{:02x}", byte);
    }
    s
}
