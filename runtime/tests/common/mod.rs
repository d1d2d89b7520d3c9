//! Shared test helpers for integration tests.
//!
//! Provides an initialized `Svm` over a fresh `MemEngine`, envelope and
//! context builders, and message builders for the built-in template.

#![allow(dead_code)]

use std::sync::Arc;

use svm_runtime::mem_engine::{CallMessage, DeployMessage, SpawnMessage};
use svm_runtime::primitives::{Address, Context, Envelope, Layer, TemplateAddr, TxNonce};
use svm_runtime::{MemEngine, Runtime, Svm, SvmConfig};

/// Enough gas for any built-in transaction.
pub const MAX_GAS: u64 = 1_000_000_000;

/// Minimal Wasm module: magic and version.
pub const TEMPLATE_CODE: &[u8] = b"\0asm\x01\0\0\0";

/// The address written by `store_addr` in the load/store scenario.
pub const STORED_ADDR: Address = [
    0x10, 0x20, 0x30, 0x40, 0x50, 0x60, 0x70, 0x80, 0x90, 0x10, 0x20, 0x30, 0x40, 0x50, 0x60,
    0x70, 0x80, 0x90, 0xAA, 0xBB,
];

// ── Engine & Runtime Factories ──

/// An initialized in-memory `Svm` and a handle to its engine.
pub fn svm() -> (Svm, Arc<MemEngine>) {
    let engine = Arc::new(MemEngine::new());
    let svm = Svm::new(engine.clone());
    svm.init(&SvmConfig::in_memory()).unwrap();
    (svm, engine)
}

/// A runtime with `layer` already opened.
pub fn runtime_at(svm: &Svm, layer: Layer) -> Runtime {
    let mut runtime = svm.new_runtime().unwrap();
    runtime.open(layer).unwrap();
    runtime
}

// ── Envelope & Context ──

pub fn envelope(gas_limit: u64) -> Envelope {
    Envelope::new([0; 20], 0, TxNonce::default(), gas_limit, 0)
}

pub fn context(layer: Layer) -> Context {
    Context::new(layer, [0; 32])
}

// ── Messages ──

pub fn deploy_msg(name: &str) -> Vec<u8> {
    DeployMessage::new(name, TEMPLATE_CODE).encode().unwrap()
}

pub fn spawn_msg(template: TemplateAddr, name: &str) -> Vec<u8> {
    SpawnMessage::new(template, name, "initialize", Vec::new())
        .encode()
        .unwrap()
}

pub fn call_msg(target: Address, function: &str, calldata: Vec<u8>) -> Vec<u8> {
    CallMessage::new(target, function, calldata).encode().unwrap()
}

/// Calldata for an address argument: type tag `0x40` then the address.
pub fn addr_calldata(addr: &Address) -> Vec<u8> {
    let mut data = vec![0x40];
    data.extend_from_slice(addr);
    data
}

// ── Transaction Shortcuts ──

/// Deploy the example template in the open layer.
pub fn deploy_template(runtime: &mut Runtime, layer: Layer) -> TemplateAddr {
    let receipt = runtime
        .deploy(&envelope(MAX_GAS), &deploy_msg("template_example"), &context(layer))
        .unwrap();
    assert!(receipt.success, "deploy failed: {:?}", receipt.error);
    receipt.template_addr.unwrap()
}

/// Spawn an account of `template` in the open layer.
pub fn spawn_account(runtime: &mut Runtime, template: TemplateAddr, layer: Layer) -> Address {
    let receipt = runtime
        .spawn(&envelope(MAX_GAS), &spawn_msg(template, "alice"), &context(layer))
        .unwrap();
    assert!(receipt.success, "spawn failed: {:?}", receipt.error);
    receipt.account_addr.unwrap()
}
