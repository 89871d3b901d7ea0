use std::collections::HashMap;

use meshnode_core::{hash_block, hash_transaction, Block, Transaction};
use meshnode_crypto::Address;
use parking_lot::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
}

/// `{tx_hash_hex}_{out_index}`, the canonical UTXO key.
pub fn utxo_key(tx_hash_hex: &str, out_index: u32) -> String {
    format!("{tx_hash_hex}_{out_index}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub tx_hash: String,
    pub out_index: u32,
    pub amount: u64,
    pub address: Address,
    pub spent: bool,
}

pub trait BlockStore: Send + Sync {
    fn put(&self, block: Block) -> String;
    fn get(&self, hash_hex: &str) -> Result<Block, StoreError>;
}

pub trait TxStore: Send + Sync {
    fn put(&self, tx: Transaction) -> String;
    fn get(&self, hash_hex: &str) -> Result<Transaction, StoreError>;
}

pub trait UtxoStore: Send + Sync {
    fn put(&self, utxo: Utxo);
    fn get(&self, key: &str) -> Result<Utxo, StoreError>;
    fn mark_spent(&self, key: &str) -> Result<(), StoreError>;
    fn scan_by_address(&self, addr: &Address) -> Vec<Utxo>;
}

#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: RwLock<HashMap<String, Block>>,
}

impl BlockStore for MemoryBlockStore {
    fn put(&self, block: Block) -> String {
        let key = hex::encode(hash_block(&block));
        self.blocks.write().insert(key.clone(), block);
        key
    }

    fn get(&self, hash_hex: &str) -> Result<Block, StoreError> {
        self.blocks
            .read()
            .get(hash_hex)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryTxStore {
    txs: RwLock<HashMap<String, Transaction>>,
}

impl TxStore for MemoryTxStore {
    fn put(&self, tx: Transaction) -> String {
        let key = hex::encode(hash_transaction(&tx));
        self.txs.write().insert(key.clone(), tx);
        key
    }

    fn get(&self, hash_hex: &str) -> Result<Transaction, StoreError> {
        self.txs
            .read()
            .get(hash_hex)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

/// Primary map keyed by `"{tx_hash_hex}_{out_index}"`, secondary index from
/// address to the set of keys it owns.
#[derive(Default)]
pub struct MemoryUtxoStore {
    utxos: RwLock<HashMap<String, Utxo>>,
    by_address: RwLock<HashMap<Address, Vec<String>>>,
}

impl UtxoStore for MemoryUtxoStore {
    fn put(&self, utxo: Utxo) {
        let key = utxo_key(&utxo.tx_hash, utxo.out_index);
        self.by_address
            .write()
            .entry(utxo.address)
            .or_default()
            .push(key.clone());
        self.utxos.write().insert(key, utxo);
    }

    fn get(&self, key: &str) -> Result<Utxo, StoreError> {
        self.utxos
            .read()
            .get(key)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn mark_spent(&self, key: &str) -> Result<(), StoreError> {
        let mut utxos = self.utxos.write();
        let utxo = utxos.get_mut(key).ok_or(StoreError::NotFound)?;
        utxo.spent = true;
        Ok(())
    }

    fn scan_by_address(&self, addr: &Address) -> Vec<Utxo> {
        let keys = self.by_address.read().get(addr).cloned().unwrap_or_default();
        let utxos = self.utxos.read();
        keys.iter().filter_map(|k| utxos.get(k).cloned()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshnode_core::{Header, TxOutput};

    fn sample_block() -> Block {
        Block {
            header: Header::genesis(),
            transactions: vec![],
            public_key: [0u8; 32],
            signature: [0u8; 64],
        }
    }

    #[test]
    fn block_store_put_get_round_trip() {
        let store = MemoryBlockStore::default();
        let block = sample_block();
        let key = store.put(block.clone());
        assert_eq!(store.get(&key).unwrap(), block);
    }

    #[test]
    fn block_store_missing_is_not_found() {
        let store = MemoryBlockStore::default();
        assert!(matches!(store.get("deadbeef"), Err(StoreError::NotFound)));
    }

    #[test]
    fn utxo_store_scan_by_address() {
        let store = MemoryUtxoStore::default();
        let addr = Address([7u8; 20]);
        store.put(Utxo {
            tx_hash: "abc".into(),
            out_index: 0,
            amount: 100,
            address: addr,
            spent: false,
        });
        store.put(Utxo {
            tx_hash: "abc".into(),
            out_index: 1,
            amount: 50,
            address: addr,
            spent: false,
        });
        let found = store.scan_by_address(&addr);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn utxo_store_mark_spent() {
        let store = MemoryUtxoStore::default();
        let key = utxo_key("abc", 0);
        store.put(Utxo {
            tx_hash: "abc".into(),
            out_index: 0,
            amount: 100,
            address: Address([1u8; 20]),
            spent: false,
        });
        store.mark_spent(&key).unwrap();
        assert!(store.get(&key).unwrap().spent);
    }

    #[test]
    fn tx_store_keys_by_hash() {
        let store = MemoryTxStore::default();
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                amount: 1,
                address: [0u8; 20],
            }],
        };
        let key = store.put(tx.clone());
        assert_eq!(key, hex::encode(hash_transaction(&tx)));
        assert_eq!(store.get(&key).unwrap(), tx);
    }
}
