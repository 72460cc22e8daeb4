//! Proof-of-work: find a nonce whose block hash, read as a 256-bit
//! big-endian integer, is strictly below `2^(256 - difficulty_bits)`.
//!
//! The search is stateless. Difficulty is passed on every call so callers
//! can retarget without touching this module.

use powchain_core::{Block, Hash};
use std::time::Instant;
use thiserror::Error;

/// Errors that can occur during proof-of-work.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowError {
    #[error("difficulty must be between 1 and 256 bits, got {0}")]
    InvalidDifficulty(u32),

    #[error("nonce space exhausted after {attempts} attempts at difficulty {difficulty_bits}")]
    NonceSpaceExhausted { difficulty_bits: u32, attempts: u64 },
}

pub type Result<T> = std::result::Result<T, PowError>;

/// Mining knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MiningConfig {
    /// Log mining progress and results.
    pub verbose: bool,
    /// Highest nonce tried before giving up.
    pub max_nonce: u64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            max_nonce: u64::MAX,
        }
    }
}

/// How often a verbose miner reports progress.
const PROGRESS_INTERVAL: u64 = 1 << 20;

/// A 256-bit threshold stored big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target([u8; 32]);

impl Target {
    /// `2^(256 - difficulty_bits)`.
    pub fn from_difficulty(difficulty_bits: u32) -> Result<Self> {
        if !(1..=256).contains(&difficulty_bits) {
            return Err(PowError::InvalidDifficulty(difficulty_bits));
        }
        let bit = (256 - difficulty_bits) as usize;
        let mut bytes = [0u8; 32];
        bytes[31 - bit / 8] = 1 << (bit % 8);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Strictly-less-than comparison of `hash` against the target.
    pub fn is_met_by(&self, hash: &Hash) -> bool {
        hash.0 < self.0
    }
}

/// The proof-of-work engine.
#[derive(Debug, Clone, Default)]
pub struct ProofOfWork {
    config: MiningConfig,
}

impl ProofOfWork {
    pub fn new(config: MiningConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MiningConfig {
        &self.config
    }

    /// Search nonces from 0 up to `max_nonce` for one that meets the target.
    ///
    /// Returns the nonce and the resulting hash. Exhausting the search is an
    /// error: the difficulty is too high for the configured nonce space.
    pub fn mine(&self, block: &Block, difficulty_bits: u32) -> Result<(u64, Hash)> {
        let target = Target::from_difficulty(difficulty_bits)?;
        let prefix = block.hash_prefix();
        let started = Instant::now();

        if self.config.verbose {
            tracing::info!(index = block.index, difficulty_bits, "mining a new block");
        }

        let mut nonce = 0u64;
        loop {
            let hash = Block::hash_prefix_with_nonce(&prefix, nonce);
            if target.is_met_by(&hash) {
                if self.config.verbose {
                    tracing::info!(
                        index = block.index,
                        nonce,
                        %hash,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "block mined"
                    );
                }
                return Ok((nonce, hash));
            }

            if self.config.verbose && nonce > 0 && nonce % PROGRESS_INTERVAL == 0 {
                tracing::debug!(index = block.index, nonce, %hash, "still mining");
            }

            if nonce >= self.config.max_nonce {
                return Err(PowError::NonceSpaceExhausted {
                    difficulty_bits,
                    attempts: nonce.saturating_add(1),
                });
            }
            nonce += 1;
        }
    }

    /// Recompute the hash from the block's stored nonce and check it against
    /// the target. The stored `hash` field is not consulted.
    ///
    /// An out-of-range difficulty validates nothing.
    pub fn validate(&self, block: &Block, difficulty_bits: u32) -> bool {
        match Target::from_difficulty(difficulty_bits) {
            Ok(target) => target.is_met_by(&block.recompute_hash()),
            Err(_) => false,
        }
    }
}
