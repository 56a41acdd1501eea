//! One candidate header chain: a height-contiguous branch of the block tree

use pergamon_common::{BlockHash, BlockHeader, HeaderDigest};

/// An ordered, height-contiguous run of header digests.
///
/// Each digest's declared parent equals its predecessor's hash (the root
/// excepted — an orphan root is admitted optimistically). Chains sharing a
/// prefix are never merged, only discarded.
#[derive(Debug, Clone)]
pub struct HeaderChain {
    id: u64,
    digests: Vec<HeaderDigest>,
}

impl HeaderChain {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            digests: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }

    pub fn digests(&self) -> &[HeaderDigest] {
        &self.digests
    }

    pub fn tip(&self) -> Option<&HeaderDigest> {
        self.digests.last()
    }

    pub fn root(&self) -> Option<&HeaderDigest> {
        self.digests.first()
    }

    pub fn contains(&self, digest: &HeaderDigest) -> bool {
        self.digest_at_height(digest.height).is_some_and(|d| d == digest)
    }

    /// Digest at an absolute height, if this chain covers it.
    ///
    /// Contiguity makes this an index lookup.
    pub fn digest_at_height(&self, height: u64) -> Option<&HeaderDigest> {
        let root_height = self.root()?.height;
        if height < root_height {
            return None;
        }
        self.digests.get((height - root_height) as usize)
    }

    /// Append a digest; the caller has already matched the parent hash to
    /// the current tip (or is starting a new chain).
    pub fn append(&mut self, digest: HeaderDigest) {
        self.digests.push(digest);
    }

    /// Clone the prefix strictly below `header.height` and append the
    /// forking header — the new candidate chain for a mid-chain fork.
    pub fn bifurcate(&self, header: &BlockHeader, new_id: u64) -> HeaderChain {
        let digests: Vec<HeaderDigest> =
            self.digests.iter().filter(|d| d.height < header.height).cloned().collect();
        let mut chain = HeaderChain { id: new_id, digests };
        chain.append(HeaderDigest::from(header));
        chain
    }

    /// Remove the header with this hash and everything built on it in this
    /// chain, preserving contiguity. Returns whether anything was removed.
    pub fn truncate_from(&mut self, hash: &BlockHash) -> bool {
        match self.digests.iter().position(|d| d.hash == *hash) {
            Some(pos) => {
                self.digests.truncate(pos);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pergamon_common::Hash32;

    fn hash(n: u8) -> Hash32 {
        let mut bytes = [0u8; 32];
        bytes[0] = n;
        Hash32::new(bytes)
    }

    fn chain_of(id: u64, heights: &[(u8, u64)]) -> HeaderChain {
        let mut chain = HeaderChain::new(id);
        for (h, height) in heights {
            chain.append(HeaderDigest::new(hash(*h), *height, *height * 1000));
        }
        chain
    }

    #[test]
    fn digest_at_height_indexes_from_root() {
        let chain = chain_of(1, &[(10, 100), (11, 101), (12, 102)]);
        assert_eq!(chain.digest_at_height(101).unwrap().hash, hash(11));
        assert!(chain.digest_at_height(99).is_none());
        assert!(chain.digest_at_height(103).is_none());
    }

    #[test]
    fn contains_matches_height_and_hash() {
        let chain = chain_of(1, &[(10, 100), (11, 101)]);
        // Time differs but equality is (height, hash)
        assert!(chain.contains(&HeaderDigest::new(hash(11), 101, 0)));
        assert!(!chain.contains(&HeaderDigest::new(hash(11), 100, 0)));
    }

    #[test]
    fn bifurcate_clones_prefix_and_appends() {
        let chain = chain_of(1, &[(10, 100), (11, 101), (12, 102)]);
        let header = BlockHeader {
            hash: hash(21),
            parent_hash: hash(10),
            height: 101,
            time: 500,
            ..Default::default()
        };
        let fork = chain.bifurcate(&header, 2);
        assert_eq!(fork.id(), 2);
        assert_eq!(fork.len(), 2);
        assert_eq!(fork.root().unwrap().hash, hash(10));
        assert_eq!(fork.tip().unwrap().hash, hash(21));
    }

    #[test]
    fn truncate_from_drops_descendants() {
        let mut chain = chain_of(1, &[(10, 100), (11, 101), (12, 102)]);
        assert!(chain.truncate_from(&hash(11)));
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.tip().unwrap().hash, hash(10));
        assert!(!chain.truncate_from(&hash(99)));
    }
}
