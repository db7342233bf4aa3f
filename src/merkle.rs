// Flat pairwise hash tree over payload chunks.
//
// Leaves are Keccak-256 hashes of fixed-size byte chunks. Each level pairs
// neighbours left to right; a pair contributes `keccak(left || right)` to the
// next level and its right-hand element to the proof path. An odd trailing
// node is carried up unchanged and adds nothing to the path.
//
// The path alone does not say which positions were paired and which were
// carried, so it cannot rebuild the root without knowing the tree shape.

use sha3::{Digest, Keccak256};
use std::num::NonZeroUsize;

pub type Hash32 = [u8; 32];

pub const ZERO_HASH: Hash32 = [0u8; 32];

pub fn keccak256(data: &[u8]) -> Hash32 {
    Keccak256::digest(data).into()
}

/// `0x`-prefixed lowercase hex
pub fn to_hex(hash: &Hash32) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Splits the payload bytes into `chunk_size` slices; the last may be shorter
pub fn chunk(payload: &[u8], chunk_size: NonZeroUsize) -> Vec<&[u8]> {
    payload.chunks(chunk_size.get()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleOutput {
    pub root: Hash32,
    pub path: Vec<Hash32>,
}

pub fn build(payload: &[u8], chunk_size: NonZeroUsize) -> MerkleOutput {
    let leaves = chunk(payload, chunk_size)
        .into_iter()
        .map(keccak256)
        .collect();
    reduce(leaves)
}

/// Collapses a leaf level to its root, collecting the right-hand sibling of
/// every pairing across all levels.
pub fn reduce(leaves: Vec<Hash32>) -> MerkleOutput {
    let mut level = leaves;
    let mut path = Vec::new();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => {
                    let mut joined = [0u8; 64];
                    joined[..32].copy_from_slice(left);
                    joined[32..].copy_from_slice(right);
                    next.push(keccak256(&joined));
                    path.push(*right);
                }
                [lone] => next.push(*lone),
                _ => unreachable!("chunks(2) yields one or two elements"),
            }
        }
        level = next;
    }

    MerkleOutput {
        root: level.first().copied().unwrap_or(ZERO_HASH),
        path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    fn node(left: &Hash32, right: &Hash32) -> Hash32 {
        keccak256(&[left.as_slice(), right.as_slice()].concat())
    }

    #[test]
    fn test_chunking_65_bytes() {
        let payload = vec![7u8; 65];
        let chunks = chunk(&payload, size(32));
        let lens: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(lens, vec![32, 32, 1]);
    }

    #[test]
    fn test_single_leaf() {
        let out = build(b"abc", size(32));
        assert_eq!(out.root, keccak256(b"abc"));
        assert!(out.path.is_empty());
    }

    #[test]
    fn test_empty_payload_has_zero_root() {
        let out = build(b"", size(32));
        assert_eq!(out.root, ZERO_HASH);
        assert!(out.path.is_empty());
    }

    #[test]
    fn test_three_leaves_promote_last() {
        let payload: Vec<u8> = (0..65u8).collect();
        let h: Vec<Hash32> = chunk(&payload, size(32)).into_iter().map(keccak256).collect();

        let out = build(&payload, size(32));
        let h12 = node(&h[0], &h[1]);
        assert_eq!(out.root, node(&h12, &h[2]));
        assert_eq!(out.path, vec![h[1], h[2]]);
    }

    #[test]
    fn test_five_leaves_carry_lone_node_twice() {
        let h: Vec<Hash32> = (0..5u8).map(|i| keccak256(&[i])).collect();
        let out = reduce(h.clone());

        let h12 = node(&h[0], &h[1]);
        let h34 = node(&h[2], &h[3]);
        let h1234 = node(&h12, &h34);
        assert_eq!(out.root, node(&h1234, &h[4]));
        assert_eq!(out.path, vec![h[1], h[3], h34, h[4]]);
    }

    #[test]
    fn test_keccak_known_vector() {
        assert_eq!(
            to_hex(&keccak256(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
