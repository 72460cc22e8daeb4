//! Binary Merkle tree used to commit to a block's transactions.
//!
//! Leaves are the hashes of the data items. Each parent is
//! `hash(left || right)`; when a level has an odd number of nodes the last
//! one is paired with itself.

use crate::hash::{hash, hash_concat, Hash};

fn parent_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| {
            let left = &pair[0];
            let right = pair.get(1).unwrap_or(left);
            hash_concat(&[left.as_ref(), right.as_ref()])
        })
        .collect()
}

/// Compute the root over already-hashed leaves.
///
/// Returns the zero hash if the list is empty.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return Hash::ZERO;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = parent_level(&level);
    }
    level[0]
}

/// A Merkle tree that keeps every level so inclusion proofs can be produced.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// Levels from leaves (index 0) to root.
    levels: Vec<Vec<Hash>>,
}

/// An inclusion proof for a single leaf.
#[derive(Debug, Clone)]
pub struct MerkleProof {
    pub leaf: Hash,
    /// Sibling hashes from leaf to root.
    pub siblings: Vec<Hash>,
    /// For each sibling, whether the running hash sits on the left.
    pub directions: Vec<bool>,
}

impl MerkleTree {
    /// Build a tree from raw data items, hashing each one into a leaf.
    pub fn from_data<T: AsRef<[u8]>>(items: &[T]) -> Self {
        let leaves: Vec<Hash> = items.iter().map(|item| hash(item.as_ref())).collect();
        Self::new(&leaves)
    }

    /// Build a tree from leaf hashes.
    pub fn new(leaves: &[Hash]) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![vec![Hash::ZERO]],
            };
        }

        let mut levels = vec![leaves.to_vec()];
        while let Some(top) = levels.last().filter(|level| level.len() > 1) {
            let next = parent_level(top);
            levels.push(next);
        }
        Self { levels }
    }

    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(|l| l.len()).unwrap_or(0)
    }

    /// Generate a proof for the leaf at the given index.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let leaf = self.levels[0][index];
        let mut siblings = Vec::new();
        let mut directions = Vec::new();
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let is_left = idx % 2 == 0;
            let sibling_idx = if is_left { idx + 1 } else { idx - 1 };
            // An unpaired node is its own sibling.
            let sibling = level.get(sibling_idx).copied().unwrap_or(level[idx]);

            siblings.push(sibling);
            directions.push(is_left);
            idx /= 2;
        }

        Some(MerkleProof {
            leaf,
            siblings,
            directions,
        })
    }

    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        verify_proof(&self.root(), proof)
    }
}

/// Verify a Merkle proof against a given root.
pub fn verify_proof(root: &Hash, proof: &MerkleProof) -> bool {
    let computed = proof
        .siblings
        .iter()
        .zip(&proof.directions)
        .fold(proof.leaf, |current, (sibling, is_left)| {
            if *is_left {
                hash_concat(&[current.as_ref(), sibling.as_ref()])
            } else {
                hash_concat(&[sibling.as_ref(), current.as_ref()])
            }
        });
    computed == *root
}
