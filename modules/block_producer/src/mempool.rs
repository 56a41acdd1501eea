//! Pending and orphan transaction pools owned by the block producer

use pergamon_common::{Transaction, TxHash};
use std::collections::HashSet;

/// A transaction pool with stable time ordering.
///
/// Selection order is declared timestamp, earliest first; ties keep
/// insertion order. System transactions are never pooled.
pub struct TxPool {
    txs: Vec<Transaction>,
    hashes: HashSet<TxHash>,
}

impl TxPool {
    pub fn new() -> Self {
        Self {
            txs: Vec::new(),
            hashes: HashSet::new(),
        }
    }

    /// Add a transaction; duplicates and system kinds are refused.
    pub fn add(&mut self, tx: Transaction) -> bool {
        if tx.kind.is_system() || self.hashes.contains(&tx.hash) {
            return false;
        }
        self.hashes.insert(tx.hash);
        self.txs.push(tx);
        true
    }

    /// Snapshot in selection order (stable sort by declared time)
    pub fn sorted_snapshot(&self) -> Vec<Transaction> {
        let mut snapshot = self.txs.clone();
        snapshot.sort_by_key(|tx| tx.time);
        snapshot
    }

    pub fn remove_all(&mut self, hashes: &[TxHash]) {
        if hashes.is_empty() {
            return;
        }
        let removing: HashSet<&TxHash> = hashes.iter().collect();
        self.txs.retain(|tx| !removing.contains(&tx.hash));
        for hash in hashes {
            self.hashes.remove(hash);
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn clear(&mut self) {
        self.txs.clear();
        self.hashes.clear();
    }
}

impl Default for TxPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pergamon_common::TxKind;

    fn tx(time: u64, tag: u8) -> Transaction {
        Transaction::new(TxKind::Transfer, time, vec![tag])
    }

    #[test]
    fn sorted_by_time_stable() {
        let mut pool = TxPool::new();
        assert!(pool.add(tx(300, 1)));
        assert!(pool.add(tx(100, 2)));
        assert!(pool.add(tx(100, 3)));
        assert!(pool.add(tx(200, 4)));

        let order: Vec<u8> = pool.sorted_snapshot().iter().map(|t| t.payload[0]).collect();
        // Ties at t=100 keep insertion order
        assert_eq!(order, vec![2, 3, 4, 1]);
    }

    #[test]
    fn duplicates_refused() {
        let mut pool = TxPool::new();
        let t = tx(100, 1);
        assert!(pool.add(t.clone()));
        assert!(!pool.add(t));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn system_kinds_refused() {
        let mut pool = TxPool::new();
        assert!(!pool.add(Transaction::new(TxKind::Coinbase, 100, vec![])));
        assert!(pool.is_empty());
    }

    #[test]
    fn remove_all_clears_hash_index() {
        let mut pool = TxPool::new();
        let t = tx(100, 1);
        let hash = t.hash;
        pool.add(t.clone());
        pool.remove_all(&[hash]);
        assert!(pool.is_empty());
        // Re-adding after removal works
        assert!(pool.add(t));
    }
}
