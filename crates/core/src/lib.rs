//! Core ledger primitives for powchain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - Hashing (Blake3) and Merkle trees
//! - ECDSA P-256 key pairs, signatures and public-key hashes
//! - Base-58 checksummed addresses
//! - UTXO transactions
//! - Blocks

pub mod address;
pub mod block;
pub mod crypto;
pub mod hash;
pub mod merkle;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use address::{decode_address, encode_address, validate_address, AddressError};
pub use block::{current_timestamp, Block, Payload, GENESIS_DATA};
pub use crypto::{verify, CryptoError, Keypair, PubKeyHash, PublicKey, Signature};
pub use hash::{hash, hash_concat, Hash, H256};
pub use merkle::{merkle_root, MerkleProof, MerkleTree};
pub use transaction::{
    OutPoint, Transaction, TransactionError, TxInput, TxOutput, COINBASE_REWARD,
};
