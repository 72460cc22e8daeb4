//! Content-addressed blocks.

use crate::hash::{hash_concat, Hash};
use crate::merkle::MerkleTree;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Application data carried by the genesis block.
pub const GENESIS_DATA: &[u8] = b"Genesis Block";

/// What a block carries: free-form data plus an ordered transaction list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub data: Vec<u8>,
    pub transactions: Vec<Transaction>,
}

impl Payload {
    pub fn new(data: impl Into<Vec<u8>>, transactions: Vec<Transaction>) -> Self {
        Self {
            data: data.into(),
            transactions,
        }
    }

    /// A payload with data only.
    pub fn from_data(data: impl Into<Vec<u8>>) -> Self {
        Self::new(data, Vec::new())
    }

    /// A payload with transactions only.
    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self::new(Vec::new(), transactions)
    }

    /// Merkle root over the transaction ids, or `None` without transactions.
    pub fn transactions_root(&self) -> Option<Hash> {
        if self.transactions.is_empty() {
            return None;
        }
        let ids: Vec<Hash> = self.transactions.iter().map(|tx| tx.id).collect();
        Some(MerkleTree::from_data(&ids).root())
    }
}

/// A block in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 for genesis).
    pub index: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    pub payload: Payload,
    /// Hash of the previous block; `None` only for genesis.
    pub prev_hash: Option<Hash>,
    /// Hash over `prev_hash`, payload, timestamp and nonce.
    pub hash: Hash,
    /// Proof-of-work solution.
    pub nonce: u64,
}

impl Block {
    /// Create a block on top of `prev_hash` with nonce 0 and the current time.
    pub fn new(index: u64, payload: Payload, prev_hash: Hash) -> Self {
        Self::assemble(index, current_timestamp(), payload, Some(prev_hash))
    }

    /// Create the genesis block.
    pub fn genesis() -> Self {
        Self::assemble(0, current_timestamp(), Payload::from_data(GENESIS_DATA), None)
    }

    fn assemble(index: u64, timestamp: u64, payload: Payload, prev_hash: Option<Hash>) -> Self {
        let mut block = Self {
            index,
            timestamp,
            payload,
            prev_hash,
            hash: Hash::ZERO,
            nonce: 0,
        };
        block.hash = block.recompute_hash();
        block
    }

    /// Everything hashed before the nonce:
    /// `prev_hash || data || tx root || timestamp (u64 BE)`.
    ///
    /// The transaction root is always 32 bytes, [`Hash::ZERO`] for a block
    /// without transactions, so the data can never absorb a root.
    pub fn hash_prefix(&self) -> Vec<u8> {
        let root = self.payload.transactions_root().unwrap_or(Hash::ZERO);
        let mut prefix = Vec::with_capacity(32 + self.payload.data.len() + 32 + 8);
        if let Some(prev) = &self.prev_hash {
            prefix.extend_from_slice(prev.as_bytes());
        }
        prefix.extend_from_slice(&self.payload.data);
        prefix.extend_from_slice(root.as_bytes());
        prefix.extend_from_slice(&self.timestamp.to_be_bytes());
        prefix
    }

    /// Complete a [`Block::hash_prefix`] with a nonce.
    pub fn hash_prefix_with_nonce(prefix: &[u8], nonce: u64) -> Hash {
        hash_concat(&[prefix, &nonce.to_be_bytes()])
    }

    /// Hash this block would have with `nonce`.
    pub fn hash_with_nonce(&self, nonce: u64) -> Hash {
        Self::hash_prefix_with_nonce(&self.hash_prefix(), nonce)
    }

    /// Recompute the hash from the stored fields, ignoring `self.hash`.
    pub fn recompute_hash(&self) -> Hash {
        self.hash_with_nonce(self.nonce)
    }

    /// Overwrite the stored hash with a recomputation.
    pub fn rehash(&mut self) {
        self.hash = self.recompute_hash();
    }

    /// Seal the block with a nonce found by mining.
    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self.rehash();
        self
    }

    /// Whether the stored hash matches the block's contents.
    pub fn has_consistent_hash(&self) -> bool {
        self.hash == self.recompute_hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0 && self.prev_hash.is_none()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.payload.transactions
    }

    pub fn tx_count(&self) -> usize {
        self.payload.transactions.len()
    }

    /// Wire encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("serialization should not fail")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PubKeyHash;
    use crate::hash::hash;

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert!(genesis.is_genesis());
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.prev_hash, None);
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.payload.data, GENESIS_DATA);
        assert!(genesis.has_consistent_hash());
    }

    #[test]
    fn test_hash_layout() {
        let prev = hash(b"prev");
        let block = Block::new(1, Payload::from_data("Test data"), prev);

        let mut preimage = prev.as_bytes().to_vec();
        preimage.extend_from_slice(b"Test data");
        preimage.extend_from_slice(Hash::ZERO.as_bytes());
        preimage.extend_from_slice(&block.timestamp.to_be_bytes());
        preimage.extend_from_slice(&0u64.to_be_bytes());
        assert_eq!(block.hash, hash(&preimage));
    }

    #[test]
    fn test_genesis_hash_has_no_prev_bytes() {
        let genesis = Block::genesis();
        let mut preimage = GENESIS_DATA.to_vec();
        preimage.extend_from_slice(Hash::ZERO.as_bytes());
        preimage.extend_from_slice(&genesis.timestamp.to_be_bytes());
        preimage.extend_from_slice(&0u64.to_be_bytes());
        assert_eq!(genesis.hash, hash(&preimage));
    }

    #[test]
    fn test_nonce_changes_hash() {
        let block = Block::new(1, Payload::from_data("data"), Hash::ZERO);
        assert_ne!(block.hash_with_nonce(0), block.hash_with_nonce(1));

        let sealed = block.clone().with_nonce(42);
        assert_eq!(sealed.nonce, 42);
        assert_eq!(sealed.hash, block.hash_with_nonce(42));
        assert!(sealed.has_consistent_hash());
    }

    #[test]
    fn test_tampering_detected_until_rehash() {
        let mut block = Block::new(1, Payload::from_data("original"), Hash::ZERO);
        block.payload.data = b"tampered".to_vec();
        assert!(!block.has_consistent_hash());

        block.rehash();
        assert!(block.has_consistent_hash());
    }

    #[test]
    fn test_transactions_are_committed() {
        let tx = Transaction::new_coinbase(PubKeyHash([1u8; 20]), b"reward");
        let block = Block::new(1, Payload::from_transactions(vec![tx]), Hash::ZERO);
        assert_eq!(block.tx_count(), 1);
        assert!(block.payload.transactions_root().is_some());

        let mut forged = block.clone();
        forged.payload.transactions[0] =
            Transaction::new_coinbase(PubKeyHash([2u8; 20]), b"reward");
        assert_ne!(forged.recompute_hash(), block.hash);
    }

    #[test]
    fn test_stripped_transactions_change_hash() {
        let tx = Transaction::new_coinbase(PubKeyHash([1u8; 20]), b"reward");
        let block = Block::new(1, Payload::new("data", vec![tx]), Hash::ZERO).with_nonce(9);
        let root = block.payload.transactions_root().unwrap();

        let mut stripped = block.clone();
        stripped.payload.transactions.clear();
        stripped.payload.data.extend_from_slice(root.as_bytes());
        assert_ne!(stripped.recompute_hash(), block.hash);
        assert!(!stripped.has_consistent_hash());
    }

    #[test]
    fn test_empty_payload_has_no_root() {
        assert_eq!(Payload::from_data("x").transactions_root(), None);
    }

    #[test]
    fn test_wire_encoding() {
        let tx = Transaction::new_coinbase(PubKeyHash([1u8; 20]), b"reward");
        let block = Block::new(3, Payload::new("data", vec![tx]), hash(b"prev")).with_nonce(7);

        let decoded = Block::from_bytes(&block.to_bytes()).unwrap();
        assert_eq!(decoded, block);
        assert!(decoded.has_consistent_hash());
    }
}
