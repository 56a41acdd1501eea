//! Fork choice over candidate header chains.
//!
//! Owns the candidate-chain set and the approving ("canonical") pointer.
//! Selection picks the chain with the greatest tip height, ties broken by
//! the lowest tip timestamp; a changed winner is a reorganization and every
//! header of the old chain past the fork point is rolled back through the
//! observer in strictly decreasing height order.

use pergamon_common::{BlockHash, BlockHeader, ChainStatus, HeaderDigest};
use tracing::debug;

use crate::header_chain::HeaderChain;

/// Callback receiver for chain switches.
///
/// The owning module turns rollback callbacks into block-service requests;
/// failures there are logged and bookkeeping proceeds.
pub trait ForkChoiceObserver {
    fn rollback(&self, digest: &HeaderDigest);
}

/// The candidate-chain set and approving pointer.
///
/// Operations are single-threaded; the owning module serialises access.
pub struct ForkChoice {
    chains: Vec<HeaderChain>,
    approving_id: Option<u64>,
    next_chain_id: u64,
    max_height: u64,
    /// Chains shorter than (approving length - margin) are pruned
    prune_margin: u64,
    /// Depth the approving tip must reach past a height before commit
    confirmation_depth: u64,
    observer: Box<dyn ForkChoiceObserver + Send>,
}

impl ForkChoice {
    pub fn new(
        prune_margin: u64,
        confirmation_depth: u64,
        observer: Box<dyn ForkChoiceObserver + Send>,
    ) -> Self {
        Self {
            chains: Vec::new(),
            approving_id: None,
            next_chain_id: 0,
            max_height: 0,
            prune_margin,
            confirmation_depth,
            observer,
        }
    }

    /// Add an observed header. Returns whether the maximum known height
    /// advanced (the signal that the best block may need updating).
    ///
    /// Duplicates are a no-op returning false. A header with an
    /// unrecognized parent starts a new singleton chain — an optimistic
    /// orphan root.
    pub fn add_header(&mut self, header: &BlockHeader) -> bool {
        if !self.insert(header) {
            return false;
        }
        let advanced = header.height > self.max_height;
        if advanced {
            self.max_height = header.height;
        }
        self.select();
        advanced
    }

    fn insert(&mut self, header: &BlockHeader) -> bool {
        let digest = HeaderDigest::from(header);
        if self.chains.iter().any(|c| c.contains(&digest)) {
            return false;
        }

        // Extend the chain whose tip is the declared parent
        if let Some(chain) = self
            .chains
            .iter_mut()
            .find(|c| c.tip().is_some_and(|tip| tip.hash == header.parent_hash))
        {
            chain.append(digest);
            return true;
        }

        // Mid-chain parent: fork off a new candidate sharing the prefix
        let parent =
            HeaderDigest::new(header.parent_hash, header.height.saturating_sub(1), 0);
        if let Some(chain) = self.chains.iter().find(|c| c.contains(&parent)) {
            let fork = chain.bifurcate(header, self.next_chain_id);
            self.next_chain_id += 1;
            self.chains.push(fork);
            return true;
        }

        // Unknown parent: admit as a potential orphan root
        let mut chain = HeaderChain::new(self.next_chain_id);
        self.next_chain_id += 1;
        chain.append(digest);
        self.chains.push(chain);
        true
    }

    /// Re-run selection: longest tip wins, ties to the lowest tip
    /// timestamp. Fires rollbacks when the approving chain changes.
    fn select(&mut self) {
        let mut best: Option<&HeaderChain> = None;
        for chain in &self.chains {
            let Some(tip) = chain.tip() else {
                continue;
            };
            match best.and_then(|b| b.tip()) {
                None => best = Some(chain),
                Some(best_tip) => {
                    if tip.height > best_tip.height
                        || (tip.height == best_tip.height && tip.time < best_tip.time)
                    {
                        best = Some(chain);
                    }
                }
            }
        }
        let Some(winner) = best else {
            debug!("no candidate chain to approve");
            return;
        };
        let winner_id = winner.id();

        let previous = self.approving_id;
        self.approving_id = Some(winner_id);

        if let Some(previous_id) = previous {
            if previous_id != winner_id {
                self.rollback_to_fork_point(previous_id, winner_id);
            }
        }
    }

    /// Walk the old approving chain from its tip toward the root until a
    /// header shared with the new chain (the fork point); every header
    /// strictly after it is rolled back in strictly decreasing height
    /// order.
    fn rollback_to_fork_point(&self, old_id: u64, new_id: u64) {
        let Some(old_chain) = self.chain_by_id(old_id) else {
            // The old approving chain was already discarded; nothing to walk
            return;
        };
        let Some(new_chain) = self.chain_by_id(new_id) else {
            return;
        };

        for digest in old_chain.digests().iter().rev() {
            if new_chain.contains(digest) {
                break;
            }
            self.observer.rollback(digest);
        }
    }

    fn chain_by_id(&self, id: u64) -> Option<&HeaderChain> {
        self.chains.iter().find(|c| c.id() == id)
    }

    /// Remove the header with this hash (and whatever was built on it)
    /// from every chain containing it; emptied chains are discarded.
    pub fn remove_hash(&mut self, hash: &BlockHash) {
        if self.chains.is_empty() {
            return;
        }
        for chain in &mut self.chains {
            chain.truncate_from(hash);
        }
        self.chains.retain(|c| !c.is_empty());
        if let Some(id) = self.approving_id {
            if self.chain_by_id(id).is_none() {
                self.approving_id = None;
            }
        }
        self.select();
    }

    /// Depth processing: re-select, prune stale candidates, and report
    /// whether the block at `persisted_height + 1` may be committed to
    /// durable storage.
    pub fn processing(&mut self, persisted_height: u64) -> bool {
        if self.chains.is_empty() {
            return false;
        }
        self.select();
        let Some(approving_len) = self.approving_chain().map(|c| c.len() as u64) else {
            return false;
        };

        let keep_from = approving_len.saturating_sub(self.prune_margin);
        self.chains.retain(|c| {
            let keep = (c.len() as u64) >= keep_from;
            if !keep {
                debug!(chain = c.id(), len = c.len(), "pruning stale candidate chain");
            }
            keep
        });

        self.approving_chain()
            .and_then(|c| c.tip())
            .is_some_and(|tip| tip.height >= persisted_height + self.confirmation_depth)
    }

    pub fn approving_chain(&self) -> Option<&HeaderChain> {
        self.approving_id.and_then(|id| self.chain_by_id(id))
    }

    /// Hash at a height on the approving chain; None when unknown
    pub fn get_block_hash(&self, height: u64) -> Option<BlockHash> {
        self.approving_chain().and_then(|c| c.digest_at_height(height)).map(|d| d.hash)
    }

    pub fn max_height(&self) -> u64 {
        self.max_height
    }

    pub fn chain_count(&self) -> usize {
        self.chains.len()
    }

    pub fn status(&self) -> ChainStatus {
        ChainStatus {
            chain_count: self.chains.len(),
            approving_tip: self.approving_chain().and_then(|c| c.tip()).cloned(),
            max_height: self.max_height,
        }
    }

    pub fn clear(&mut self) {
        self.chains.clear();
        self.approving_id = None;
        self.max_height = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pergamon_common::Hash32;
    use std::sync::{Arc, Mutex};

    /// Observer that records rollbacks for assertion
    struct TestObserver {
        rollbacks: Arc<Mutex<Vec<(u64, Hash32)>>>,
    }

    impl ForkChoiceObserver for TestObserver {
        fn rollback(&self, digest: &HeaderDigest) {
            self.rollbacks.lock().unwrap().push((digest.height, digest.hash));
        }
    }

    fn hash(n: u8) -> Hash32 {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        Hash32::new(bytes)
    }

    fn header(h: u8, parent: u8, height: u64, time: u64) -> BlockHeader {
        BlockHeader {
            hash: hash(h),
            parent_hash: hash(parent),
            height,
            time,
            ..Default::default()
        }
    }

    fn make_fork_choice() -> (ForkChoice, Arc<Mutex<Vec<(u64, Hash32)>>>) {
        let rollbacks = Arc::new(Mutex::new(Vec::new()));
        let observer = Box::new(TestObserver {
            rollbacks: rollbacks.clone(),
        });
        (ForkChoice::new(6, 6, observer), rollbacks)
    }

    #[test]
    fn linear_chain_extends_and_approves() {
        let (mut fork, _) = make_fork_choice();
        assert!(fork.add_header(&header(10, 9, 10, 1000)));
        assert!(fork.add_header(&header(11, 10, 11, 1100)));
        assert!(fork.add_header(&header(12, 11, 12, 1200)));

        assert_eq!(fork.chain_count(), 1);
        let tip = fork.approving_chain().unwrap().tip().unwrap();
        assert_eq!(tip.height, 12);
        assert_eq!(tip.hash, hash(12));
    }

    #[test]
    fn duplicate_header_is_noop() {
        let (mut fork, _) = make_fork_choice();
        assert!(fork.add_header(&header(10, 9, 10, 1000)));
        assert!(!fork.add_header(&header(10, 9, 10, 1000)));
        assert_eq!(fork.chain_count(), 1);
        assert_eq!(fork.approving_chain().unwrap().len(), 1);
    }

    #[test]
    fn mid_chain_parent_creates_fork() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 10, 1000));
        fork.add_header(&header(11, 10, 11, 1100));
        fork.add_header(&header(12, 11, 12, 1200));

        // Competing header with parent at height 10, mid-chain
        fork.add_header(&header(21, 10, 11, 1150));
        assert_eq!(fork.chain_count(), 2);

        // The original chain is still longest, so still approving
        assert_eq!(fork.approving_chain().unwrap().tip().unwrap().hash, hash(12));
    }

    #[test]
    fn unknown_parent_admitted_as_orphan_root() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 10, 1000));
        fork.add_header(&header(50, 49, 50, 5000));
        assert_eq!(fork.chain_count(), 2);
        // The orphan is higher, so it wins selection
        assert_eq!(fork.approving_chain().unwrap().tip().unwrap().hash, hash(50));
    }

    #[test]
    fn approving_chain_has_max_tip_height() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 10, 1000));
        fork.add_header(&header(11, 10, 11, 1100));
        fork.add_header(&header(21, 10, 11, 1150));
        fork.add_header(&header(22, 21, 12, 1250));

        assert_eq!(fork.approving_chain().unwrap().tip().unwrap().hash, hash(22));
    }

    #[test]
    fn tie_breaks_to_lowest_tip_timestamp() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 10, 1000));
        fork.add_header(&header(11, 10, 11, 1100));
        // Same height as 11 but produced earlier
        fork.add_header(&header(21, 10, 11, 1050));

        assert_eq!(fork.approving_chain().unwrap().tip().unwrap().hash, hash(21));
    }

    #[test]
    fn reorg_rolls_back_exactly_the_divergent_headers_descending() {
        let (mut fork, rollbacks) = make_fork_choice();
        // Chain A: 10 -> 11 -> 12
        fork.add_header(&header(10, 9, 10, 1000));
        fork.add_header(&header(11, 10, 11, 1100));
        fork.add_header(&header(12, 11, 12, 1200));
        // Chain B diverges after height 10
        fork.add_header(&header(21, 10, 11, 1150));
        assert!(rollbacks.lock().unwrap().is_empty());

        // B catches up and overtakes
        fork.add_header(&header(22, 21, 12, 1250));
        assert!(rollbacks.lock().unwrap().is_empty());
        fork.add_header(&header(23, 22, 13, 1350));

        // Approving switched to B; rolled back exactly [A@12, A@11]
        assert_eq!(fork.approving_chain().unwrap().tip().unwrap().hash, hash(23));
        let rolled = rollbacks.lock().unwrap().clone();
        assert_eq!(rolled, vec![(12, hash(12)), (11, hash(11))]);
    }

    #[test]
    fn processing_prunes_short_chains() {
        let (mut fork, _) = make_fork_choice();
        // Approving chain of 10 blocks
        fork.add_header(&header(10, 9, 1, 100));
        for i in 2..=10u8 {
            fork.add_header(&header(9 + i, 8 + i, i as u64, i as u64 * 100));
        }
        // A stale two-block fork off the root
        fork.add_header(&header(31, 10, 2, 150));
        assert_eq!(fork.chain_count(), 2);

        fork.processing(0);
        // 2 < 10 - 6, so the fork is pruned
        assert_eq!(fork.chain_count(), 1);
        for chain_len in fork.approving_chain().map(|c| c.len() as u64) {
            assert!(chain_len >= 10 - 6);
        }
    }

    #[test]
    fn processing_signals_commit_at_confirmation_depth() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 1, 100));
        for i in 2..=6u8 {
            fork.add_header(&header(9 + i, 8 + i, i as u64, i as u64 * 100));
        }
        // Tip height 6, persisted 0: 6 >= 0 + 6
        assert!(fork.processing(0));
        // 6 < 1 + 6
        assert!(!fork.processing(1));
    }

    #[test]
    fn processing_empty_is_false() {
        let (mut fork, _) = make_fork_choice();
        assert!(!fork.processing(0));
    }

    #[test]
    fn get_block_hash_reads_approving_chain_only() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 10, 1000));
        fork.add_header(&header(11, 10, 11, 1100));
        fork.add_header(&header(21, 10, 11, 1050));

        assert_eq!(fork.get_block_hash(11), Some(hash(21)));
        assert_eq!(fork.get_block_hash(12), None);
    }

    #[test]
    fn remove_hash_truncates_and_discards_empty_chains() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 10, 1000));
        fork.add_header(&header(11, 10, 11, 1100));
        fork.add_header(&header(50, 49, 50, 5000));

        fork.remove_hash(&hash(50));
        assert_eq!(fork.chain_count(), 1);
        assert_eq!(fork.approving_chain().unwrap().tip().unwrap().hash, hash(11));

        fork.remove_hash(&hash(11));
        assert_eq!(fork.approving_chain().unwrap().tip().unwrap().hash, hash(10));
    }

    #[test]
    fn clear_resets_everything() {
        let (mut fork, _) = make_fork_choice();
        fork.add_header(&header(10, 9, 10, 1000));
        fork.clear();
        assert_eq!(fork.chain_count(), 0);
        assert!(fork.approving_chain().is_none());
        assert_eq!(fork.max_height(), 0);
        // Idempotent after clear
        assert!(fork.add_header(&header(10, 9, 10, 1000)));
    }

    #[test]
    fn add_header_reports_height_advance() {
        let (mut fork, _) = make_fork_choice();
        assert!(fork.add_header(&header(10, 9, 10, 1000)));
        // Same height on a fork: inserted but no advance
        assert!(!fork.add_header(&header(21, 9, 10, 900)));
        assert!(fork.add_header(&header(22, 21, 11, 1100)));
    }
}
