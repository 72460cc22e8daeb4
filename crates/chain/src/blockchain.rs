//! The ledger: an ordered, proof-of-work sealed list of blocks.
//!
//! All queries (transaction lookup, unspent outputs, balances) are answered
//! by scanning the in-memory blocks. A [`ChainStore`] can be attached so
//! every accepted block is also written to disk.

use crate::utxo::{self, UnspentOutput};
use powchain_consensus::{Consensus, ConsensusError, MiningConfig, PowEngine};
use powchain_core::{
    Block, Hash, Keypair, OutPoint, Payload, PubKeyHash, Transaction, TransactionError, TxInput,
    TxOutput, COINBASE_REWARD,
};
use powchain_storage::{ChainStore, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("stored chain is invalid: {0}")]
    InvalidStoredChain(#[from] ChainValidationError),

    #[error("transaction not found: {0}")]
    TransactionNotFound(Hash),

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("transfer amount must be positive")]
    ZeroAmount,

    #[error("transaction {0} failed verification")]
    InvalidTransaction(Hash),

    #[error("output {} of transaction {} is already spent", .0.index, .0.txid)]
    DoubleSpend(OutPoint),

    #[error("transaction {txid} spends {inputs} but creates {outputs}")]
    Overspend { txid: Hash, inputs: u64, outputs: u64 },

    #[error("transaction {0} is already recorded")]
    DuplicateTransaction(Hash),

    #[error("block carries more than one coinbase")]
    MultipleCoinbase,

    #[error("coinbase {txid} pays {actual}, block reward is {expected}")]
    InvalidReward { txid: Hash, expected: u64, actual: u64 },
}

pub type Result<T> = std::result::Result<T, BlockchainError>;

/// First broken rule found by [`Blockchain::validate`].
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ChainValidationError {
    #[error("genesis block is malformed")]
    InvalidGenesis,

    #[error("block {index} does not meet the proof-of-work target")]
    ProofOfWork { index: u64 },

    #[error("block {index} stored hash does not match its contents")]
    HashMismatch { index: u64 },

    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: u64 },
}

/// Ledger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Leading zero bits every mined block must have.
    pub difficulty_bits: u32,
    /// Value of each coinbase created through [`Blockchain::coinbase`].
    pub block_reward: u64,
    #[serde(default)]
    pub mining: MiningConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty_bits: 16,
            block_reward: COINBASE_REWARD,
            mining: MiningConfig::default(),
        }
    }
}

impl ChainConfig {
    pub fn with_difficulty(difficulty_bits: u32) -> Self {
        Self {
            difficulty_bits,
            ..Self::default()
        }
    }
}

/// Summary of the chain's current state.
#[derive(Debug, Clone)]
pub struct ChainStats {
    /// Index of the tip.
    pub height: u64,
    pub tip_hash: Hash,
    pub tip_timestamp: u64,
    /// Transactions across all blocks.
    pub transaction_count: usize,
    pub difficulty_bits: u32,
}

/// Iterator over blocks from the tip back to genesis.
#[derive(Debug, Clone)]
pub struct ChainIter<'a> {
    remaining: &'a [Block],
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let (last, rest) = self.remaining.split_last()?;
        self.remaining = rest;
        Some(last)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining.len(), Some(self.remaining.len()))
    }
}

impl ExactSizeIterator for ChainIter<'_> {}

/// The ledger.
///
/// Never empty: construction always leaves at least the genesis block.
/// Not synchronized; wrap it in a lock to share between threads.
pub struct Blockchain {
    blocks: Vec<Block>,
    config: ChainConfig,
    engine: PowEngine,
    store: Option<ChainStore>,
}

impl Blockchain {
    /// Create an in-memory chain holding only a fresh genesis block.
    pub fn new(config: ChainConfig) -> Result<Self> {
        let engine = Self::start_engine(&config)?;
        Ok(Self {
            blocks: vec![Block::genesis()],
            config,
            engine,
            store: None,
        })
    }

    /// Load a chain from `store`, creating genesis if the store is empty.
    ///
    /// Loaded blocks are revalidated at the configured difficulty.
    pub fn open(store: ChainStore, config: ChainConfig) -> Result<Self> {
        let chain = Self::load(store, config)?;
        chain.validate()?;
        tracing::info!(height = chain.height(), "loaded chain from storage");
        Ok(chain)
    }

    /// Like [`Blockchain::open`] but without revalidating, so a damaged
    /// store can still be inspected with [`Blockchain::validate`].
    pub fn load(store: ChainStore, config: ChainConfig) -> Result<Self> {
        let engine = Self::start_engine(&config)?;
        let mut blocks = store.load_blocks()?;
        if blocks.is_empty() {
            let genesis = Block::genesis();
            store.init_genesis(&genesis)?;
            blocks.push(genesis);
            tracing::info!("initialized new chain with genesis block");
        }

        Ok(Self {
            blocks,
            config,
            engine,
            store: Some(store),
        })
    }

    fn start_engine(config: &ChainConfig) -> Result<PowEngine> {
        let mut engine = PowEngine::new(config.difficulty_bits, config.mining);
        engine.start()?;
        Ok(engine)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Blocks from genesis to tip.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Index of the tip block.
    pub fn height(&self) -> u64 {
        self.tip().index
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false; kept alongside [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get_block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.blocks.iter().find(|block| block.hash == *hash)
    }

    /// Walk from the tip back to genesis.
    pub fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            remaining: &self.blocks,
        }
    }

    pub fn stats(&self) -> ChainStats {
        let tip = self.tip();
        ChainStats {
            height: tip.index,
            tip_hash: tip.hash,
            tip_timestamp: tip.timestamp,
            transaction_count: self.blocks.iter().map(Block::tx_count).sum(),
            difficulty_bits: self.config.difficulty_bits,
        }
    }

    // =========================================================================
    // Appending
    // =========================================================================

    /// Mine `payload` on top of the tip and append it.
    ///
    /// Transactions are checked first; a rejected payload leaves the chain
    /// unchanged.
    pub fn append(&mut self, payload: Payload) -> Result<&Block> {
        self.check_transactions(&payload.transactions)?;

        let tip = self.tip();
        let candidate = Block::new(tip.index + 1, payload, tip.hash);
        let block = self.engine.propose_block(candidate)?;

        if let Some(store) = &self.store {
            store.append_block(&block)?;
        }
        tracing::debug!(
            index = block.index,
            hash = %block.hash,
            nonce = block.nonce,
            transactions = block.tx_count(),
            "appended block"
        );
        self.blocks.push(block);
        Ok(self.tip())
    }

    /// Flush the attached store, if any.
    pub fn flush(&self) -> Result<()> {
        if let Some(store) = &self.store {
            store.flush()?;
        }
        Ok(())
    }

    /// Append a data-only block.
    pub fn append_data(&mut self, data: impl Into<Vec<u8>>) -> Result<&Block> {
        self.append(Payload::from_data(data))
    }

    /// Append a block carrying `transactions` and no data.
    pub fn mine_block(&mut self, transactions: Vec<Transaction>) -> Result<&Block> {
        self.append(Payload::from_transactions(transactions))
    }

    /// A coinbase paying the configured block reward to `to`.
    pub fn coinbase(&self, to: PubKeyHash, memo: &[u8]) -> Transaction {
        Transaction::new_coinbase_with_reward(to, memo, self.config.block_reward)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Whether every block after genesis meets the proof-of-work target and
    /// links to its predecessor.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Like [`is_valid`](Self::is_valid), reporting the first violation.
    pub fn validate(&self) -> std::result::Result<(), ChainValidationError> {
        let result = self.check_blocks();
        if let Err(err) = &result {
            tracing::warn!(%err, "chain validation failed");
        }
        result
    }

    fn check_blocks(&self) -> std::result::Result<(), ChainValidationError> {
        let genesis = &self.blocks[0];
        if !genesis.is_genesis() || !genesis.has_consistent_hash() {
            return Err(ChainValidationError::InvalidGenesis);
        }

        for pair in self.blocks.windows(2) {
            let (prev, block) = (&pair[0], &pair[1]);
            let index = block.index;

            if !self.engine.validate_block(block) {
                return Err(ChainValidationError::ProofOfWork { index });
            }
            if !block.has_consistent_hash() {
                return Err(ChainValidationError::HashMismatch { index });
            }
            if block.prev_hash != Some(prev.hash) || index != prev.index + 1 {
                return Err(ChainValidationError::BrokenLink { index });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Transaction queries
    // =========================================================================

    /// Find a transaction by id, searching from the tip.
    pub fn find_transaction(&self, id: &Hash) -> Result<&Transaction> {
        self.iter()
            .flat_map(|block| block.transactions())
            .find(|tx| tx.id == *id)
            .ok_or(BlockchainError::TransactionNotFound(*id))
    }

    /// Unspent outputs locked to `pub_key_hash`, newest first.
    pub fn find_unspent_outputs(&self, pub_key_hash: &PubKeyHash) -> Vec<UnspentOutput> {
        utxo::find_unspent_outputs(pub_key_hash, self.iter())
    }

    /// Pick unspent outputs of `pub_key_hash` worth at least `amount`.
    ///
    /// Returns the accumulated value, which is below `amount` when the owner
    /// cannot afford it.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &PubKeyHash,
        amount: u64,
    ) -> (u64, Vec<OutPoint>) {
        let unspent = self.find_unspent_outputs(pub_key_hash);
        utxo::compute_spendable(pub_key_hash, amount, &unspent)
    }

    pub fn balance(&self, pub_key_hash: &PubKeyHash) -> u64 {
        self.find_unspent_outputs(pub_key_hash)
            .iter()
            .map(|utxo| utxo.output.value)
            .sum()
    }

    /// Resolve every transaction `tx` spends from.
    fn prior_transactions(&self, tx: &Transaction) -> Result<HashMap<Hash, Transaction>> {
        let mut prior = HashMap::new();
        for input in &tx.inputs {
            let Some(outpoint) = input.outpoint() else {
                continue;
            };
            if !prior.contains_key(&outpoint.txid) {
                let found = self.find_transaction(&outpoint.txid)?;
                prior.insert(outpoint.txid, found.clone());
            }
        }
        Ok(prior)
    }

    /// Sign `tx` with `keypair`, resolving referenced transactions from the
    /// chain.
    pub fn sign_transaction(&self, tx: &mut Transaction, keypair: &Keypair) -> Result<()> {
        let prior = self.prior_transactions(tx)?;
        tx.sign(keypair, &prior)?;
        Ok(())
    }

    /// Verify `tx` against the chain. False when a referenced transaction
    /// is not on the chain.
    pub fn verify_transaction(&self, tx: &Transaction) -> bool {
        match self.prior_transactions(tx) {
            Ok(prior) => tx.verify(&prior),
            Err(_) => false,
        }
    }

    /// Build and sign a transfer of `amount` from `from` to `to`, returning
    /// change to the sender.
    pub fn new_transfer(
        &self,
        from: &Keypair,
        to: PubKeyHash,
        amount: u64,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::ZeroAmount);
        }

        let sender = from.pub_key_hash();
        let (accumulated, selected) = self.find_spendable_outputs(&sender, amount);
        if accumulated < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let public_key = from.public_key.to_bytes();
        let inputs = selected
            .into_iter()
            .map(|outpoint| TxInput::new(outpoint, public_key.clone()))
            .collect();

        let mut outputs = vec![TxOutput::new(amount, to)];
        if accumulated > amount {
            outputs.push(TxOutput::new(accumulated - amount, sender));
        }

        let mut tx = Transaction::new(inputs, outputs)?;
        self.sign_transaction(&mut tx, from)?;
        Ok(tx)
    }

    /// Admission checks for a block's transactions.
    ///
    /// Every transaction needs a correct id that is not already on the chain
    /// or earlier in the batch. At most one coinbase is allowed and it must
    /// pay exactly the configured reward. Other transactions must verify,
    /// spend only outputs that are still unspent and create no more value
    /// than they consume. Later transactions may spend outputs of earlier
    /// ones in the same batch.
    fn check_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        if transactions.is_empty() {
            return Ok(());
        }

        let mut available = utxo::unspent_index(self.iter());
        let mut pending: HashMap<Hash, Transaction> = HashMap::new();
        let mut has_coinbase = false;

        for tx in transactions {
            if tx.id != tx.compute_id() {
                tracing::warn!(txid = %tx.id, "rejected transaction with mismatched id");
                return Err(BlockchainError::InvalidTransaction(tx.id));
            }
            if pending.contains_key(&tx.id) || self.find_transaction(&tx.id).is_ok() {
                tracing::warn!(txid = %tx.id, "rejected replayed transaction");
                return Err(BlockchainError::DuplicateTransaction(tx.id));
            }

            if tx.is_coinbase() {
                if has_coinbase {
                    return Err(BlockchainError::MultipleCoinbase);
                }
                has_coinbase = true;

                let actual = tx.total_output_value();
                if actual != self.config.block_reward {
                    tracing::warn!(txid = %tx.id, actual, "rejected coinbase with wrong reward");
                    return Err(BlockchainError::InvalidReward {
                        txid: tx.id,
                        expected: self.config.block_reward,
                        actual,
                    });
                }
            } else {
                let mut prior = HashMap::new();
                for outpoint in tx.inputs.iter().filter_map(TxInput::outpoint) {
                    let source = match pending.get(&outpoint.txid) {
                        Some(earlier) => earlier.clone(),
                        None => self.find_transaction(&outpoint.txid)?.clone(),
                    };
                    prior.insert(outpoint.txid, source);
                }
                if !tx.verify(&prior) {
                    tracing::warn!(txid = %tx.id, "rejected transaction with bad signature");
                    return Err(BlockchainError::InvalidTransaction(tx.id));
                }

                let mut inputs = 0u64;
                for outpoint in tx.inputs.iter().filter_map(TxInput::outpoint) {
                    let spent = available.remove(&outpoint).ok_or_else(|| {
                        tracing::warn!(txid = %tx.id, "rejected double spend");
                        BlockchainError::DoubleSpend(outpoint)
                    })?;
                    inputs = inputs.saturating_add(spent.value);
                }

                let outputs = tx.total_output_value();
                if outputs > inputs {
                    return Err(BlockchainError::Overspend {
                        txid: tx.id,
                        inputs,
                        outputs,
                    });
                }
            }

            for (index, output) in tx.outputs.iter().enumerate() {
                available.insert(OutPoint::new(tx.id, index as u32), output.clone());
            }
            pending.insert(tx.id, tx.clone());
        }
        Ok(())
    }
}
