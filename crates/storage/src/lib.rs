//! Persistent block storage for powchain.
//!
//! The ledger keeps its blocks in memory; this crate lets a host persist
//! them in order and reload them on restart.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │          Blockchain (powchain-chain)      │
//! └────────────────────┬─────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────┐
//! │  ChainStore                               │
//! │   - block:index:{i} → Block               │
//! │   - block:hash:{h}  → index               │
//! │   - chain:head      → index               │
//! └────────────────────┬─────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────┐
//! │  Storage: sled wrapper, bincode values    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_core::Block;
//! use powchain_storage::{ChainStore, Storage};
//!
//! let store = ChainStore::new(Storage::open("./chain_data").unwrap());
//! store.init_genesis(&Block::genesis()).unwrap();
//! let blocks = store.load_blocks().unwrap();
//! ```

pub mod chain;
pub mod db;

// Re-export commonly used types
pub use chain::ChainStore;
pub use db::{BatchOp, Result, Storage, StorageError};
