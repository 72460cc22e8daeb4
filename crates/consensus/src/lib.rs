//! Proof-of-work consensus for powchain.
//!
//! This crate provides:
//! - [`Target`] arithmetic for a difficulty expressed in leading zero bits
//! - [`ProofOfWork`] mining and validation with per-call difficulty
//! - The [`Consensus`] trait and its proof-of-work implementation
//!
//! # Example
//!
//! ```rust,no_run
//! use powchain_consensus::{Consensus, MiningConfig, PowEngine};
//! use powchain_core::{Block, Payload};
//!
//! let genesis = Block::genesis();
//! let candidate = Block::new(1, Payload::from_data("hello"), genesis.hash);
//!
//! let mut engine = PowEngine::new(16, MiningConfig::default());
//! engine.start().unwrap();
//! let block = engine.propose_block(candidate).unwrap();
//! assert!(engine.validate_block(&block));
//! ```

pub mod engine;
pub mod pow;

// Re-export commonly used types
pub use engine::{Consensus, ConsensusError, PowEngine};
pub use pow::{MiningConfig, PowError, ProofOfWork, Target};
