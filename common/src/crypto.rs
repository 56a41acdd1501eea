//! Common cryptography helper functions for Pergamon

use crate::hash::Hash32;
use blake2::{digest::consts::U32, Blake2b, Digest};

/// Get a Blake2b-256 hash of arbitrary data
pub fn blake2b_256(data: &[u8]) -> Hash32 {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    let bytes: [u8; 32] = hasher.finalize().into();
    Hash32::new(bytes)
}

/// Merkle root over an ordered list of digests.
///
/// Pairwise Blake2b-256, odd leaf carried up unchanged; the empty list
/// yields the zero digest.
pub fn merkle_root(hashes: &[Hash32]) -> Hash32 {
    if hashes.is_empty() {
        return Hash32::ZERO;
    }
    let mut level: Vec<Hash32> = hashes.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            if pair.len() == 2 {
                let mut data = Vec::with_capacity(64);
                data.extend_from_slice(pair[0].as_ref());
                data.extend_from_slice(pair[1].as_ref());
                next.push(blake2b_256(&data));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_merkle_is_zero() {
        assert_eq!(merkle_root(&[]), Hash32::ZERO);
    }

    #[test]
    fn single_leaf_is_itself() {
        let leaf = blake2b_256(b"leaf");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn order_matters() {
        let a = blake2b_256(b"a");
        let b = blake2b_256(b"b");
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
    }

    #[test]
    fn odd_leaf_count() {
        let a = blake2b_256(b"a");
        let b = blake2b_256(b"b");
        let c = blake2b_256(b"c");
        // Three leaves reduce deterministically
        assert_eq!(merkle_root(&[a, b, c]), merkle_root(&[a, b, c]));
        assert_ne!(merkle_root(&[a, b, c]), merkle_root(&[a, b]));
    }
}
