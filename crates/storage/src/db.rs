//! sled database wrapper with serialization helpers.

use powchain_core::Hash;
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("Block {index} does not extend the stored chain: {reason}")]
    Discontinuity { index: u64, reason: String },

    #[error("Stored chain is missing block {0}")]
    MissingBlock(u64),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Wrapper around sled database with serialization helpers.
///
/// Cloning is cheap and shares the underlying database.
#[derive(Clone)]
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open an in-memory database (for testing).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Retrieve and deserialize a value.
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: serde::de::DeserializeOwned,
    {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Check if a key exists.
    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> Result<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// Apply multiple operations atomically.
    pub fn batch(&self, operations: Vec<BatchOp>) -> Result<()> {
        let mut batch = sled::Batch::default();
        for op in operations {
            match op {
                BatchOp::Insert { key, value } => batch.insert(key, value),
                BatchOp::Remove { key } => batch.remove(key),
            }
        }
        self.db.apply_batch(batch)?;
        Ok(())
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // =========================================================================
    // Key Construction Helpers
    // =========================================================================

    /// Key for a block by chain index.
    /// Format: "block:index:{index}"
    pub fn block_index_key(index: u64) -> Vec<u8> {
        format!("block:index:{}", index).into_bytes()
    }

    /// Key mapping a block hash to its index.
    /// Format: "block:hash:" + hash_bytes
    pub fn block_hash_key(hash: &Hash) -> Vec<u8> {
        let mut key = b"block:hash:".to_vec();
        key.extend_from_slice(&hash.0);
        key
    }
}

/// Batch operation for atomic updates.
pub enum BatchOp {
    Insert { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
}

impl BatchOp {
    /// Insert a bincode-encoded value.
    pub fn put<V: serde::Serialize>(key: Vec<u8>, value: &V) -> Result<Self> {
        Ok(BatchOp::Insert {
            key,
            value: bincode::serialize(value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_then_get() {
        let storage = Storage::open_temporary().unwrap();
        assert!(!storage.contains("key1").unwrap());
        storage
            .batch(vec![BatchOp::put(b"key1".to_vec(), &42u64).unwrap()])
            .unwrap();

        assert!(storage.contains("key1").unwrap());
        let value: Option<u64> = storage.get("key1").unwrap();
        assert_eq!(value, Some(42));

        let missing: Option<u64> = storage.get("missing").unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_batch_operations() {
        let storage = Storage::open_temporary().unwrap();
        storage
            .batch(vec![BatchOp::put(b"gone".to_vec(), &0u64).unwrap()])
            .unwrap();

        let ops = vec![
            BatchOp::put(b"a".to_vec(), &1u64).unwrap(),
            BatchOp::put(b"b".to_vec(), &2u64).unwrap(),
            BatchOp::Remove {
                key: b"gone".to_vec(),
            },
        ];
        storage.batch(ops).unwrap();

        let a: u64 = storage.get("a").unwrap().unwrap();
        let b: u64 = storage.get("b").unwrap().unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(!storage.contains("gone").unwrap());
    }

    #[test]
    fn test_clones_share_database() {
        let storage = Storage::open_temporary().unwrap();
        let other = storage.clone();
        storage
            .batch(vec![BatchOp::put(b"shared".to_vec(), &7u64).unwrap()])
            .unwrap();
        assert_eq!(other.get::<_, u64>("shared").unwrap(), Some(7));
    }

    #[test]
    fn test_key_construction() {
        assert_eq!(Storage::block_index_key(42), b"block:index:42");
        let hash_key = Storage::block_hash_key(&Hash([0xBB; 32]));
        assert!(hash_key.starts_with(b"block:hash:"));
        assert_eq!(hash_key.len(), b"block:hash:".len() + 32);
    }
}
