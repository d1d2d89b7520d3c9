//! Account and template state of one in-process runtime, with its layer
//! history.
//!
//! Pending changes live in a working copy of the world. `commit` snapshots
//! it as the next layer; `rewind` restores an earlier snapshot. Maps are
//! `BTreeMap`s so state roots do not depend on insertion order.

use std::collections::BTreeMap;

use svm_primitives::types::ZERO_STATE;
use svm_primitives::{to_hex, Address, Amount, Layer, State, TemplateAddr, TxNonce};

const TEMPLATE_TAG: u8 = 0x01;
const ACCOUNT_TAG: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    pub name: String,
    /// All zeros for genesis accounts.
    pub template: TemplateAddr,
    pub balance: Amount,
    pub counter: TxNonce,
    /// Value written by `store_addr`.
    pub stored_addr: Option<Address>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct World {
    pub templates: BTreeMap<TemplateAddr, Template>,
    pub accounts: BTreeMap<Address, AccountState>,
}

impl World {
    /// Root over every template and account, in key order.
    pub fn state_root(&self) -> State {
        let mut hasher = blake3::Hasher::new();
        for (addr, template) in &self.templates {
            hasher.update(&[TEMPLATE_TAG]);
            hasher.update(addr);
            hash_bytes(&mut hasher, template.name.as_bytes());
            hash_bytes(&mut hasher, &template.code);
        }
        for (addr, account) in &self.accounts {
            hasher.update(&[ACCOUNT_TAG]);
            hasher.update(addr);
            hash_bytes(&mut hasher, account.name.as_bytes());
            hasher.update(&account.template);
            hasher.update(&account.balance.to_be_bytes());
            hasher.update(&account.counter.upper.to_be_bytes());
            hasher.update(&account.counter.lower.to_be_bytes());
            match &account.stored_addr {
                Some(stored) => {
                    hasher.update(&[1]);
                    hasher.update(stored);
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
        *hasher.finalize().as_bytes()
    }
}

fn hash_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u32).to_be_bytes());
    hasher.update(bytes);
}

#[derive(Debug, Clone)]
struct Snapshot {
    layer: Layer,
    root: State,
    world: World,
}

/// Layer history plus the pending world of one runtime.
#[derive(Debug, Clone)]
pub struct LayeredWorld {
    /// Committed layers, oldest first. Never empty: layer 0 is genesis.
    history: Vec<Snapshot>,
    pending: World,
}

impl Default for LayeredWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl LayeredWorld {
    pub fn new() -> Self {
        Self {
            history: vec![Snapshot {
                layer: 0,
                root: ZERO_STATE,
                world: World::default(),
            }],
            pending: World::default(),
        }
    }

    fn last(&self) -> &Snapshot {
        // `history` always holds genesis.
        &self.history[self.history.len() - 1]
    }

    /// Last committed layer and its root.
    pub fn layer_info(&self) -> (Layer, State) {
        let last = self.last();
        (last.layer, last.root)
    }

    pub fn pending(&self) -> &World {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut World {
        &mut self.pending
    }

    pub fn pending_root(&self) -> State {
        self.pending.state_root()
    }

    /// True until the first layer after genesis is committed.
    pub fn at_genesis(&self) -> bool {
        self.history.len() == 1
    }

    pub fn commit(&mut self) -> (Layer, State) {
        let layer = self.last().layer + 1;
        let root = self.pending.state_root();
        self.history.push(Snapshot {
            layer,
            root,
            world: self.pending.clone(),
        });
        (layer, root)
    }

    pub fn rewind(&mut self, layer: Layer) -> Result<State, String> {
        let pos = self
            .history
            .iter()
            .position(|snapshot| snapshot.layer == layer)
            .ok_or_else(|| format!("layer {layer} does not exist"))?;
        self.history.truncate(pos + 1);
        self.pending = self.history[pos].world.clone();
        Ok(self.history[pos].root)
    }

    pub fn create_genesis_account(
        &mut self,
        addr: Address,
        balance: Amount,
        counter: TxNonce,
    ) -> Result<(), String> {
        if !self.at_genesis() {
            return Err("genesis accounts can only be created before the first commit".into());
        }
        if self.pending.accounts.contains_key(&addr) {
            return Err(format!("account {} already exists", to_hex(&addr)));
        }
        self.pending.accounts.insert(
            addr,
            AccountState {
                balance,
                counter,
                ..AccountState::default()
            },
        );
        Ok(())
    }

    pub fn increase_balance(&mut self, addr: &Address, amount: Amount) -> Result<(), String> {
        let account = self
            .pending
            .accounts
            .get_mut(addr)
            .ok_or_else(|| format!("account {} not found", to_hex(addr)))?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| format!("balance of {} overflows", to_hex(addr)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_layer() {
        let world = LayeredWorld::new();
        assert_eq!(world.layer_info(), (0, ZERO_STATE));
        assert!(world.at_genesis());
    }

    #[test]
    fn test_state_root_ignores_insertion_order() {
        let mut a = World::default();
        let mut b = World::default();
        a.accounts.insert([1; 20], AccountState::default());
        a.accounts.insert([2; 20], AccountState::default());
        b.accounts.insert([2; 20], AccountState::default());
        b.accounts.insert([1; 20], AccountState::default());
        assert_eq!(a.state_root(), b.state_root());
    }

    #[test]
    fn test_state_root_tracks_balances() {
        let mut world = LayeredWorld::new();
        world.create_genesis_account([1; 20], 10, TxNonce::default()).unwrap();
        let before = world.pending_root();
        world.increase_balance(&[1; 20], 5).unwrap();
        assert_ne!(world.pending_root(), before);
        assert_eq!(world.pending().accounts[&[1u8; 20]].balance, 15);
    }

    #[test]
    fn test_commit_and_rewind() {
        let mut world = LayeredWorld::new();
        world.create_genesis_account([1; 20], 10, TxNonce::default()).unwrap();
        let (layer1, root1) = world.commit();
        assert_eq!(layer1, 1);

        world.increase_balance(&[1; 20], 1).unwrap();
        let (layer2, root2) = world.commit();
        assert_eq!(layer2, 2);
        assert_ne!(root1, root2);

        assert_eq!(world.rewind(1).unwrap(), root1);
        assert_eq!(world.layer_info(), (1, root1));
        assert_eq!(world.pending().accounts[&[1u8; 20]].balance, 10);

        assert_eq!(world.commit(), (2, root1));
    }

    #[test]
    fn test_rewind_unknown_layer() {
        let mut world = LayeredWorld::new();
        assert!(world.rewind(4).is_err());
    }

    #[test]
    fn test_genesis_accounts_only_before_first_commit() {
        let mut world = LayeredWorld::new();
        world.commit();
        assert!(world
            .create_genesis_account([1; 20], 1, TxNonce::default())
            .is_err());
    }

    #[test]
    fn test_duplicate_genesis_account() {
        let mut world = LayeredWorld::new();
        world.create_genesis_account([1; 20], 1, TxNonce::default()).unwrap();
        assert!(world
            .create_genesis_account([1; 20], 2, TxNonce::default())
            .is_err());
    }

    #[test]
    fn test_increase_balance_overflow() {
        let mut world = LayeredWorld::new();
        world
            .create_genesis_account([1; 20], u64::MAX, TxNonce::default())
            .unwrap();
        assert!(world.increase_balance(&[1; 20], 1).is_err());
        assert!(world.increase_balance(&[2; 20], 1).is_err());
    }
}
