//! The consensus capability seam.
//!
//! A ledger talks to its block-admission rule through [`Consensus`]. The
//! only implementation is [`PowEngine`], which binds a [`ProofOfWork`] to a
//! fixed difficulty.

use crate::pow::{MiningConfig, PowError, ProofOfWork, Target};
use powchain_core::Block;
use thiserror::Error;

/// Errors that can occur during consensus operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("proof-of-work error: {0}")]
    Pow(#[from] PowError),

    #[error("consensus engine has not been started")]
    NotStarted,
}

pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Block admission rule.
pub trait Consensus {
    /// Check configuration and get ready to seal blocks.
    fn start(&mut self) -> Result<()>;

    /// Turn an unsealed candidate into a block this rule accepts.
    fn propose_block(&self, candidate: Block) -> Result<Block>;

    /// Whether `block` satisfies this rule.
    fn validate_block(&self, block: &Block) -> bool;
}

/// Proof-of-work at a fixed difficulty.
#[derive(Debug, Clone)]
pub struct PowEngine {
    pow: ProofOfWork,
    difficulty_bits: u32,
    started: bool,
}

impl PowEngine {
    pub fn new(difficulty_bits: u32, mining: MiningConfig) -> Self {
        Self {
            pow: ProofOfWork::new(mining),
            difficulty_bits,
            started: false,
        }
    }

    pub fn difficulty_bits(&self) -> u32 {
        self.difficulty_bits
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }
}

impl Consensus for PowEngine {
    fn start(&mut self) -> Result<()> {
        Target::from_difficulty(self.difficulty_bits)?;
        self.started = true;
        tracing::debug!(difficulty_bits = self.difficulty_bits, "proof-of-work engine started");
        Ok(())
    }

    fn propose_block(&self, candidate: Block) -> Result<Block> {
        if !self.started {
            return Err(ConsensusError::NotStarted);
        }
        let (nonce, _) = self.pow.mine(&candidate, self.difficulty_bits)?;
        Ok(candidate.with_nonce(nonce))
    }

    fn validate_block(&self, block: &Block) -> bool {
        self.pow.validate(block, self.difficulty_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powchain_core::{Hash, Payload};

    fn candidate() -> Block {
        Block::new(1, Payload::from_data("candidate"), Hash::ZERO)
    }

    #[test]
    fn test_propose_requires_start() {
        let engine = PowEngine::new(4, MiningConfig::default());
        assert_eq!(
            engine.propose_block(candidate()),
            Err(ConsensusError::NotStarted)
        );
    }

    #[test]
    fn test_start_rejects_bad_difficulty() {
        let mut engine = PowEngine::new(0, MiningConfig::default());
        assert_eq!(
            engine.start(),
            Err(ConsensusError::Pow(PowError::InvalidDifficulty(0)))
        );
    }

    #[test]
    fn test_proposed_block_validates() {
        let mut engine = PowEngine::new(6, MiningConfig::default());
        engine.start().unwrap();

        let block = engine.propose_block(candidate()).unwrap();
        assert!(block.has_consistent_hash());
        assert!(engine.validate_block(&block));
    }

    #[test]
    fn test_unmined_block_rejected_at_high_difficulty() {
        let engine = PowEngine::new(32, MiningConfig::default());
        // Nonce 0 meeting a 32-bit target is a 1 in 2^32 event.
        let block = candidate();
        assert_eq!(
            engine.validate_block(&block),
            block.hash.leading_zero_bits() >= 32
        );
    }
}
