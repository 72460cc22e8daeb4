//! Proof-of-work UTXO ledger for powchain.
//!
//! This crate ties the other components into a working chain:
//! - **Consensus**: every appended block is mined by a [`PowEngine`](powchain_consensus::PowEngine)
//! - **UTXO**: balances and spendable outputs are derived by scanning blocks
//! - **Storage**: an optional [`ChainStore`](powchain_storage::ChainStore) persists accepted blocks
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_chain::{Blockchain, ChainConfig};
//! use powchain_core::Keypair;
//!
//! let mut chain = Blockchain::new(ChainConfig::with_difficulty(8)).unwrap();
//!
//! // Pay the block reward to Alice, then have her send 6 to Bob.
//! let alice = Keypair::generate().unwrap();
//! let bob = Keypair::generate().unwrap();
//! let coinbase = chain.coinbase(alice.pub_key_hash(), b"");
//! chain.mine_block(vec![coinbase]).unwrap();
//!
//! let tx = chain.new_transfer(&alice, bob.pub_key_hash(), 6).unwrap();
//! chain.mine_block(vec![tx]).unwrap();
//!
//! assert_eq!(chain.balance(&bob.pub_key_hash()), 6);
//! assert!(chain.is_valid());
//! ```

pub mod blockchain;
pub mod utxo;

// Re-export commonly used types
pub use blockchain::{
    Blockchain, BlockchainError, ChainConfig, ChainIter, ChainStats, ChainValidationError, Result,
};
pub use utxo::{compute_spendable, find_unspent_outputs, UnspentOutput};
