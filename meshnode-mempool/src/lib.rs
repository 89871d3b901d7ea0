use std::collections::HashMap;

use meshnode_core::{hash_transaction, Transaction};
use parking_lot::RwLock;

/// Concurrent-safe dedup set of pending transactions, keyed by hex transaction hash.
/// Insertion order is preserved so `clear()` drains in the order transactions arrived.
#[derive(Default)]
pub struct Mempool {
    order: RwLock<Vec<String>>,
    txs: RwLock<HashMap<String, Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true iff the transaction was not already present. Callers use
    /// this as the sole gate for re-broadcast: a false return means some
    /// other caller already inserted it, and gossip must stop here.
    pub fn add(&self, tx: Transaction) -> bool {
        let key = hex::encode(hash_transaction(&tx));
        let mut txs = self.txs.write();
        if txs.contains_key(&key) {
            return false;
        }
        txs.insert(key.clone(), tx);
        self.order.write().push(key);
        true
    }

    pub fn has(&self, tx: &Transaction) -> bool {
        let key = hex::encode(hash_transaction(tx));
        self.txs.read().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.txs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically drains and returns all pending transactions, in insertion order.
    pub fn clear(&self) -> Vec<Transaction> {
        let keys = std::mem::take(&mut *self.order.write());
        let mut txs = self.txs.write();
        keys.into_iter().filter_map(|k| txs.remove(&k)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshnode_core::TxOutput;

    fn tx(amount: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![TxOutput {
                amount,
                address: [0u8; 20],
            }],
        }
    }

    #[test]
    fn add_is_gate_for_rebroadcast() {
        let pool = Mempool::new();
        assert!(pool.add(tx(1)));
        assert!(!pool.add(tx(1)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn clear_drains_in_insertion_order() {
        let pool = Mempool::new();
        pool.add(tx(1));
        pool.add(tx(2));
        pool.add(tx(3));
        let drained = pool.clear();
        assert_eq!(
            drained.iter().map(|t| t.outputs[0].amount).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn has_reflects_membership() {
        let pool = Mempool::new();
        let t = tx(5);
        assert!(!pool.has(&t));
        pool.add(t.clone());
        assert!(pool.has(&t));
    }
}
