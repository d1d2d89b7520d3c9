//! Transaction execution for the built-in template.
//!
//! Every deployed template exposes the same functions:
//!
//! | function     | calldata                  | effect                               |
//! |--------------|---------------------------|--------------------------------------|
//! | `initialize` | empty or `0x40 ‖ addr20`  | constructor, optionally stores addr  |
//! | `store_addr` | `0x40 ‖ addr20`           | stores the address                   |
//! | `load_addr`  | empty                     | returns `0x40 ‖ addr20`              |
//! | `verify`     | any                       | verify stage only, accepts the tx    |
//!
//! Gas is a fixed cost per transaction kind. A transaction whose gas limit
//! is below that cost fails with `OutOfGas` and leaves state untouched.

use svm_primitives::{
    Address, CallReceipt, DeployReceipt, Envelope, Gas, Log, Receipt, RuntimeError,
    SpawnReceipt, TemplateAddr,
};
use tracing::trace;

use super::message::{CallMessage, DeployMessage, SpawnMessage};
use super::world::{AccountState, LayeredWorld, Template};

// ── Gas costs ──

pub const G_DEPLOY: Gas = 1_000;
pub const G_DEPLOY_PER_BYTE: Gas = 10;
pub const G_SPAWN: Gas = 5_000;
pub const G_CALL: Gas = 2_000;
pub const G_VERIFY: Gas = 500;

// ── Built-in functions ──

pub const FN_CTOR: &str = "initialize";
pub const FN_STORE_ADDR: &str = "store_addr";
pub const FN_LOAD_ADDR: &str = "load_addr";
pub const FN_VERIFY: &str = "verify";

/// Type tag of an address value in calldata and return data.
pub const ADDRESS_TAG: u8 = 0x40;

pub fn deploy_cost(code_len: usize) -> Gas {
    G_DEPLOY.saturating_add((code_len as Gas).saturating_mul(G_DEPLOY_PER_BYTE))
}

pub fn template_addr(msg: &DeployMessage) -> TemplateAddr {
    let mut hasher = blake3::Hasher::new();
    hasher.update(msg.name.as_bytes());
    hasher.update(&msg.code);
    truncate(hasher.finalize())
}

pub fn account_addr(env: &Envelope, msg: &SpawnMessage) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&msg.template);
    hasher.update(&env.principal);
    hasher.update(&env.tx_nonce.upper.to_be_bytes());
    hasher.update(&env.tx_nonce.lower.to_be_bytes());
    hasher.update(msg.name.as_bytes());
    truncate(hasher.finalize())
}

fn truncate(hash: blake3::Hash) -> [u8; 20] {
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash.as_bytes()[..20]);
    addr
}

fn log(text: String) -> Log {
    text.into_bytes()
}

fn decode_tagged_addr(calldata: &[u8]) -> Option<Address> {
    match calldata {
        [ADDRESS_TAG, rest @ ..] if rest.len() == 20 => {
            let mut addr = [0u8; 20];
            addr.copy_from_slice(rest);
            Some(addr)
        }
        _ => None,
    }
}

pub fn deploy(world: &mut LayeredWorld, env: &Envelope, message: &[u8]) -> Result<Receipt, String> {
    let msg = DeployMessage::decode(message).map_err(|e| e.to_string())?;
    let cost = deploy_cost(msg.code.len());
    if env.gas_limit < cost {
        return Ok(Receipt::Deploy(DeployReceipt::failure(RuntimeError::OutOfGas, vec![])));
    }

    let addr = template_addr(&msg);
    let logs = vec![log(format!("deployed {}", msg.name))];
    world.pending_mut().templates.insert(
        addr,
        Template {
            name: msg.name,
            code: msg.code,
        },
    );
    trace!(gas = cost, "template stored");

    Ok(Receipt::Deploy(DeployReceipt {
        success: true,
        error: None,
        template_addr: Some(addr),
        gas_used: cost,
        logs,
    }))
}

pub fn spawn(world: &mut LayeredWorld, env: &Envelope, message: &[u8]) -> Result<Receipt, String> {
    let msg = SpawnMessage::decode(message).map_err(|e| e.to_string())?;
    let fail = |err| Ok(Receipt::Spawn(SpawnReceipt::failure(err, vec![])));

    if !world.pending().templates.contains_key(&msg.template) {
        return fail(RuntimeError::TemplateNotFound {
            template: msg.template,
        });
    }
    if env.gas_limit < G_SPAWN {
        return fail(RuntimeError::OutOfGas);
    }

    let target = account_addr(env, &msg);
    if msg.ctor != FN_CTOR {
        return fail(match msg.ctor.as_str() {
            FN_STORE_ADDR | FN_LOAD_ADDR | FN_VERIFY => RuntimeError::FuncNotCtor {
                template: msg.template,
                function: msg.ctor.clone(),
            },
            _ => RuntimeError::FuncNotFound {
                template: msg.template,
                target,
                function: msg.ctor.clone(),
            },
        });
    }
    if world.pending().accounts.contains_key(&target) {
        return fail(RuntimeError::InstantiationFailed {
            template: msg.template,
            target,
            message: "account already exists".into(),
        });
    }
    let stored_addr = match msg.calldata.as_slice() {
        [] => None,
        calldata => match decode_tagged_addr(calldata) {
            Some(addr) => Some(addr),
            None => {
                return fail(RuntimeError::FuncInvalidSignature {
                    template: msg.template,
                    target,
                    function: msg.ctor,
                })
            }
        },
    };

    let logs = vec![log(format!("spawned {}", msg.name))];
    world.pending_mut().accounts.insert(
        target,
        AccountState {
            name: msg.name,
            template: msg.template,
            stored_addr,
            ..AccountState::default()
        },
    );

    Ok(Receipt::Spawn(SpawnReceipt {
        success: true,
        error: None,
        account_addr: Some(target),
        init_state: Some(world.pending_root()),
        return_data: Vec::new(),
        gas_used: G_SPAWN,
        touched_accounts: vec![env.principal, target],
        logs,
    }))
}

/// Resolve the target account and its template, or the failure to report.
fn resolve(world: &LayeredWorld, target: &Address) -> Result<TemplateAddr, RuntimeError> {
    let account = world
        .pending()
        .accounts
        .get(target)
        .ok_or(RuntimeError::AccountNotFound { target: *target })?;
    if !world.pending().templates.contains_key(&account.template) {
        return Err(RuntimeError::TemplateNotFound {
            template: account.template,
        });
    }
    Ok(account.template)
}

pub fn call(world: &mut LayeredWorld, env: &Envelope, message: &[u8]) -> Result<Receipt, String> {
    let msg = CallMessage::decode(message).map_err(|e| e.to_string())?;
    let fail = |err, logs| Ok(Receipt::Call(CallReceipt::failure(err, logs)));

    let template = match resolve(world, &msg.target) {
        Ok(template) => template,
        Err(err) => return fail(err, vec![]),
    };
    if env.gas_limit < G_CALL {
        return fail(RuntimeError::OutOfGas, vec![]);
    }

    let target = msg.target;
    let function = msg.function;
    let logs = vec![log(format!("called {function}"))];
    let invalid_signature = |function: String| RuntimeError::FuncInvalidSignature {
        template,
        target,
        function,
    };

    let return_data = match function.as_str() {
        FN_STORE_ADDR => match decode_tagged_addr(&msg.calldata) {
            Some(addr) => {
                if let Some(account) = world.pending_mut().accounts.get_mut(&target) {
                    account.stored_addr = Some(addr);
                }
                Vec::new()
            }
            None => return fail(invalid_signature(function.clone()), vec![]),
        },
        FN_LOAD_ADDR => {
            if !msg.calldata.is_empty() {
                return fail(invalid_signature(function.clone()), vec![]);
            }
            match world.pending().accounts.get(&target).and_then(|a| a.stored_addr) {
                Some(addr) => {
                    let mut data = Vec::with_capacity(21);
                    data.push(ADDRESS_TAG);
                    data.extend_from_slice(&addr);
                    data
                }
                None => {
                    return fail(
                        RuntimeError::FuncFailed {
                            template,
                            target,
                            function: function.clone(),
                            message: "no address stored".into(),
                        },
                        logs,
                    )
                }
            }
        }
        FN_CTOR => {
            return fail(
                RuntimeError::FuncNotAllowed {
                    template,
                    target,
                    function: function.clone(),
                    message: "ctor can only run on spawn".into(),
                },
                vec![],
            )
        }
        FN_VERIFY => {
            return fail(
                RuntimeError::FuncNotAllowed {
                    template,
                    target,
                    function: function.clone(),
                    message: "verify can only run in the verify stage".into(),
                },
                vec![],
            )
        }
        _ => {
            return fail(
                RuntimeError::FuncNotFound {
                    template,
                    target,
                    function: function.clone(),
                },
                vec![],
            )
        }
    };

    Ok(Receipt::Call(CallReceipt {
        success: true,
        error: None,
        new_state: Some(world.pending_root()),
        return_data,
        gas_used: G_CALL,
        touched_accounts: vec![env.principal, target],
        logs,
    }))
}

/// Run the target's `verify` function. Never changes state.
pub fn verify(world: &LayeredWorld, env: &Envelope, message: &[u8]) -> Result<Receipt, String> {
    let msg = CallMessage::decode(message).map_err(|e| e.to_string())?;

    if let Err(err) = resolve(world, &msg.target) {
        return Ok(Receipt::Call(CallReceipt::failure(err, vec![])));
    }
    if env.gas_limit < G_VERIFY {
        return Ok(Receipt::Call(CallReceipt::failure(RuntimeError::OutOfGas, vec![])));
    }

    Ok(Receipt::Call(CallReceipt {
        success: true,
        error: None,
        new_state: Some(world.pending_root()),
        return_data: vec![1],
        gas_used: G_VERIFY,
        touched_accounts: vec![msg.target],
        logs: Vec::new(),
    }))
}
