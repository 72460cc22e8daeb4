//! Block storage in chain order.

use crate::db::{BatchOp, Result, Storage, StorageError};
use powchain_core::{Block, Hash};

/// Key holding the index of the last stored block.
const CHAIN_HEAD_KEY: &[u8] = b"chain:head";

/// Stores blocks by index with a hash → index lookup.
#[derive(Clone)]
pub struct ChainStore {
    storage: Storage,
}

impl ChainStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    // =========================================================================
    // Block Storage
    // =========================================================================

    fn block_ops(block: &Block) -> Result<Vec<BatchOp>> {
        Ok(vec![
            BatchOp::put(Storage::block_index_key(block.index), block)?,
            BatchOp::put(Storage::block_hash_key(&block.hash), &block.index)?,
            BatchOp::put(CHAIN_HEAD_KEY.to_vec(), &block.index)?,
        ])
    }

    /// Get a block by its chain index.
    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        self.storage.get(Storage::block_index_key(index))
    }

    /// Get a block by its hash.
    pub fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>> {
        match self.storage.get::<_, u64>(Storage::block_hash_key(hash))? {
            Some(index) => self.get_block(index),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Chain Head Tracking
    // =========================================================================

    /// Index of the last stored block, `None` before genesis.
    pub fn head_index(&self) -> Result<Option<u64>> {
        self.storage.get(CHAIN_HEAD_KEY)
    }

    /// Get the last stored block.
    pub fn get_latest_block(&self) -> Result<Option<Block>> {
        match self.head_index()? {
            Some(index) => self.get_block(index),
            None => Ok(None),
        }
    }

    /// Check if the chain is initialized (has a genesis block).
    pub fn is_initialized(&self) -> Result<bool> {
        self.storage.contains(CHAIN_HEAD_KEY)
    }

    // =========================================================================
    // Chain Operations
    // =========================================================================

    /// Store the genesis block of an empty store.
    pub fn init_genesis(&self, genesis: &Block) -> Result<()> {
        if !genesis.is_genesis() {
            return Err(StorageError::InvalidGenesis(format!(
                "block {} is not a genesis block",
                genesis.index
            )));
        }
        if self.is_initialized()? {
            return Err(StorageError::InvalidGenesis(
                "Chain already initialized".into(),
            ));
        }
        self.storage.batch(Self::block_ops(genesis)?)
    }

    /// Store a block directly on top of the current head.
    ///
    /// Only linkage is checked here; proof-of-work and transactions are the
    /// ledger's responsibility.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let head = self
            .get_latest_block()?
            .ok_or_else(|| StorageError::InvalidGenesis("Chain not initialized".into()))?;

        if block.index != head.index + 1 {
            return Err(StorageError::Discontinuity {
                index: block.index,
                reason: format!("expected index {}", head.index + 1),
            });
        }
        if block.prev_hash != Some(head.hash) {
            return Err(StorageError::Discontinuity {
                index: block.index,
                reason: format!("prev_hash does not match head {}", head.hash),
            });
        }

        self.storage.batch(Self::block_ops(block)?)
    }

    /// Read every block from genesis to head, in order.
    pub fn load_blocks(&self) -> Result<Vec<Block>> {
        let Some(head) = self.head_index()? else {
            return Ok(Vec::new());
        };
        (0..=head)
            .map(|index| self.get_block(index)?.ok_or(StorageError::MissingBlock(index)))
            .collect()
    }

    pub fn flush(&self) -> Result<()> {
        self.storage.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use powchain_core::Payload;

    fn setup() -> ChainStore {
        ChainStore::new(Storage::open_temporary().unwrap())
    }

    fn child_of(parent: &Block, data: &str) -> Block {
        Block::new(parent.index + 1, Payload::from_data(data), parent.hash)
    }

    #[test]
    fn test_genesis_init() {
        let chain = setup();
        assert!(!chain.is_initialized().unwrap());

        let genesis = Block::genesis();
        chain.init_genesis(&genesis).unwrap();

        assert!(chain.is_initialized().unwrap());
        assert_eq!(chain.head_index().unwrap(), Some(0));
        assert_eq!(chain.get_latest_block().unwrap(), Some(genesis));
    }

    #[test]
    fn test_genesis_double_init_fails() {
        let chain = setup();
        let genesis = Block::genesis();
        chain.init_genesis(&genesis).unwrap();

        let result = chain.init_genesis(&genesis);
        assert!(matches!(result, Err(StorageError::InvalidGenesis(_))));
    }

    #[test]
    fn test_non_genesis_as_genesis_fails() {
        let chain = setup();
        let block = Block::new(1, Payload::from_data("x"), Hash::ZERO);

        let result = chain.init_genesis(&block);
        assert!(matches!(result, Err(StorageError::InvalidGenesis(_))));
    }

    #[test]
    fn test_append_and_load() {
        let chain = setup();
        let genesis = Block::genesis();
        chain.init_genesis(&genesis).unwrap();

        let first = child_of(&genesis, "first");
        chain.append_block(&first).unwrap();
        let second = child_of(&first, "second");
        chain.append_block(&second).unwrap();

        let blocks = chain.load_blocks().unwrap();
        assert_eq!(blocks, vec![genesis, first.clone(), second]);
        assert_eq!(chain.get_block_by_hash(&first.hash).unwrap(), Some(first));
        assert!(chain.get_block(3).unwrap().is_none());
    }

    #[test]
    fn test_append_requires_linkage() {
        let chain = setup();
        let genesis = Block::genesis();
        chain.init_genesis(&genesis).unwrap();

        let orphan = Block::new(1, Payload::from_data("orphan"), Hash::ZERO);
        assert!(matches!(
            chain.append_block(&orphan),
            Err(StorageError::Discontinuity { index: 1, .. })
        ));

        let gap = Block::new(2, Payload::from_data("gap"), genesis.hash);
        assert!(matches!(
            chain.append_block(&gap),
            Err(StorageError::Discontinuity { index: 2, .. })
        ));
        assert_eq!(chain.head_index().unwrap(), Some(0));
    }

    #[test]
    fn test_append_before_genesis_fails() {
        let chain = setup();
        let block = Block::new(1, Payload::from_data("x"), Hash::ZERO);
        assert!(chain.append_block(&block).is_err());
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = Block::genesis();
        let first = child_of(&genesis, "persisted");
        {
            let chain = ChainStore::new(Storage::open(dir.path()).unwrap());
            chain.init_genesis(&genesis).unwrap();
            chain.append_block(&first).unwrap();
            chain.flush().unwrap();
        }

        let reopened = ChainStore::new(Storage::open(dir.path()).unwrap());
        assert_eq!(reopened.load_blocks().unwrap(), vec![genesis, first]);
    }

    #[test]
    fn test_load_empty() {
        assert!(setup().load_blocks().unwrap().is_empty());
    }
}
