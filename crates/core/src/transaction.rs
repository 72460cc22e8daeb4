//! UTXO transactions: inputs, outputs, coinbase issuance, signing and
//! verification.
//!
//! # Canonical encoding
//!
//! Both the transaction id and the per-input signing digest hash the same
//! explicit encoding: `bincode((SIGNING_ENCODING_VERSION, inputs, outputs))`.
//! Signatures are always cleared before encoding, so an id never changes when
//! a transaction is signed. The `id` field itself is never encoded.
//!
//! For signing, each input gets its own "trimmed copy": every signature is
//! cleared, every public key emptied, and only the input being signed carries
//! the `pub_key_hash` of the output it spends in its `public_key` slot.

use crate::address::{decode_address, AddressError};
use crate::crypto::{self, CryptoError, Keypair, PubKeyHash, Signature};
use crate::hash::{hash, Hash};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Amount credited by a coinbase transaction.
pub const COINBASE_REWARD: u64 = 10;

/// Output index carried by the single input of a coinbase transaction.
pub const COINBASE_OUTPUT_INDEX: i64 = -1;

/// Version tag of the canonical encoding used for ids and signing digests.
pub const SIGNING_ENCODING_VERSION: u8 = 1;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("referenced transaction {0} is unknown")]
    UnknownTransaction(Hash),

    #[error("output {index} of transaction {txid} does not exist")]
    UnknownOutput { txid: Hash, index: i64 },

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("transaction has no inputs")]
    NoInputs,

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, TransactionError>;

/// Reference to one output of a prior transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }
}

/// A spendable amount locked to a public-key hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: PubKeyHash,
}

impl TxOutput {
    pub fn new(value: u64, pub_key_hash: PubKeyHash) -> Self {
        Self {
            value,
            pub_key_hash,
        }
    }

    /// Create an output locked to a base-58 address.
    pub fn to_address(value: u64, address: &str) -> std::result::Result<Self, AddressError> {
        Ok(Self::new(value, decode_address(address)?))
    }

    /// Whether the owner of `pub_key_hash` can spend this output.
    pub fn is_locked_with_key(&self, pub_key_hash: &PubKeyHash) -> bool {
        self.pub_key_hash == *pub_key_hash
    }
}

/// A claim on a prior output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the transaction holding the spent output (`None` for coinbase).
    pub prev_tx_id: Option<Hash>,
    /// Index of the spent output ([`COINBASE_OUTPUT_INDEX`] for coinbase).
    pub prev_output_index: i64,
    pub signature: Option<Signature>,
    /// SEC1-encoded public key of the spender; memo bytes for a coinbase.
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// An unsigned input spending `outpoint` with the given public key.
    pub fn new(outpoint: OutPoint, public_key: Vec<u8>) -> Self {
        Self {
            prev_tx_id: Some(outpoint.txid),
            prev_output_index: i64::from(outpoint.index),
            signature: None,
            public_key,
        }
    }

    /// The output this input spends, if it references one.
    pub fn outpoint(&self) -> Option<OutPoint> {
        let txid = self.prev_tx_id?;
        let index = u32::try_from(self.prev_output_index).ok()?;
        Some(OutPoint { txid, index })
    }

    /// Whether this input was created by the owner of `pub_key_hash`.
    pub fn uses_key(&self, pub_key_hash: &PubKeyHash) -> bool {
        PubKeyHash::of(&self.public_key) == *pub_key_hash
    }
}

/// A value transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Borrowed view that is encoded. `id` is not part of it.
#[derive(Serialize)]
struct CanonicalTransaction<'a> {
    version: u8,
    inputs: &'a [TxInput],
    outputs: &'a [TxOutput],
}

fn canonical_hash(inputs: &[TxInput], outputs: &[TxOutput]) -> Hash {
    let view = CanonicalTransaction {
        version: SIGNING_ENCODING_VERSION,
        inputs,
        outputs,
    };
    let encoded = bincode::serialize(&view).expect("serialization should not fail");
    hash(&encoded)
}

impl Transaction {
    /// Build a transaction and compute its id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Result<Self> {
        if outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }
        if inputs.is_empty() {
            return Err(TransactionError::NoInputs);
        }
        let mut tx = Self {
            id: Hash::ZERO,
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        Ok(tx)
    }

    /// Coinbase paying the standard [`COINBASE_REWARD`] to `to`.
    pub fn new_coinbase(to: PubKeyHash, memo: &[u8]) -> Self {
        Self::new_coinbase_with_reward(to, memo, COINBASE_REWARD)
    }

    /// Coinbase paying `reward` to `to`.
    ///
    /// An empty memo is replaced with random bytes so that two coinbases to
    /// the same key never share an id.
    pub fn new_coinbase_with_reward(to: PubKeyHash, memo: &[u8], reward: u64) -> Self {
        let memo = if memo.is_empty() {
            let mut random = vec![0u8; 20];
            rand::thread_rng().fill_bytes(&mut random);
            random
        } else {
            memo.to_vec()
        };

        let input = TxInput {
            prev_tx_id: None,
            prev_output_index: COINBASE_OUTPUT_INDEX,
            signature: None,
            public_key: memo,
        };
        let mut tx = Self {
            id: Hash::ZERO,
            inputs: vec![input],
            outputs: vec![TxOutput::new(reward, to)],
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Coinbase iff exactly one input with an empty reference and index -1.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].prev_tx_id.is_none()
            && self.inputs[0].prev_output_index == COINBASE_OUTPUT_INDEX
    }

    /// Hash of the canonical encoding with all signatures cleared.
    pub fn compute_id(&self) -> Hash {
        let inputs: Vec<TxInput> = self
            .inputs
            .iter()
            .map(|input| TxInput {
                signature: None,
                ..input.clone()
            })
            .collect();
        canonical_hash(&inputs, &self.outputs)
    }

    /// Sum of output values, saturating at `u64::MAX`.
    pub fn total_output_value(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.value))
    }

    /// Copy with all signatures and public keys cleared.
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput {
                prev_tx_id: input.prev_tx_id,
                prev_output_index: input.prev_output_index,
                signature: None,
                public_key: Vec::new(),
            })
            .collect();
        Transaction {
            id: self.id,
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Digest signed by input `index`, given the `pub_key_hash` of the output
    /// that input spends.
    fn signing_digest(trimmed: &mut Transaction, index: usize, locking: &PubKeyHash) -> Hash {
        trimmed.inputs[index].public_key = locking.as_bytes().to_vec();
        let digest = canonical_hash(&trimmed.inputs, &trimmed.outputs);
        trimmed.inputs[index].public_key.clear();
        digest
    }

    /// Resolve the output spent by `input` in `prev_txs`.
    fn referenced_output<'a>(
        input: &TxInput,
        prev_txs: &'a HashMap<Hash, Transaction>,
    ) -> Result<&'a TxOutput> {
        let txid = input.prev_tx_id.ok_or(TransactionError::UnknownOutput {
            txid: Hash::ZERO,
            index: input.prev_output_index,
        })?;
        let prev = prev_txs
            .get(&txid)
            .ok_or(TransactionError::UnknownTransaction(txid))?;
        usize::try_from(input.prev_output_index)
            .ok()
            .and_then(|index| prev.outputs.get(index))
            .ok_or(TransactionError::UnknownOutput {
                txid,
                index: input.prev_output_index,
            })
    }

    /// Sign every input with `keypair`. A coinbase is left untouched.
    ///
    /// All references are resolved before any signature is written, so on
    /// error the transaction is unchanged.
    pub fn sign(&mut self, keypair: &Keypair, prev_txs: &HashMap<Hash, Transaction>) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        let locking: Vec<PubKeyHash> = self
            .inputs
            .iter()
            .map(|input| Self::referenced_output(input, prev_txs).map(|out| out.pub_key_hash))
            .collect::<Result<_>>()?;

        let mut trimmed = self.trimmed_copy();
        let mut signatures = Vec::with_capacity(locking.len());
        for (index, pub_key_hash) in locking.iter().enumerate() {
            let digest = Self::signing_digest(&mut trimmed, index, pub_key_hash);
            signatures.push(keypair.sign(digest.as_bytes())?);
        }

        for (input, signature) in self.inputs.iter_mut().zip(signatures) {
            input.signature = Some(signature);
        }
        Ok(())
    }

    /// Verify every input's signature and ownership. Always true for a
    /// coinbase; false if there are no inputs or any referenced transaction
    /// or output is unknown.
    pub fn verify(&self, prev_txs: &HashMap<Hash, Transaction>) -> bool {
        if self.is_coinbase() {
            return true;
        }
        if self.inputs.is_empty() {
            return false;
        }

        let mut trimmed = self.trimmed_copy();
        for (index, input) in self.inputs.iter().enumerate() {
            let Ok(output) = Self::referenced_output(input, prev_txs) else {
                return false;
            };
            let Some(signature) = &input.signature else {
                return false;
            };
            if !input.uses_key(&output.pub_key_hash) {
                return false;
            }
            let digest = Self::signing_digest(&mut trimmed, index, &output.pub_key_hash);
            if !crypto::verify(&input.public_key, digest.as_bytes(), signature) {
                return false;
            }
        }
        true
    }

    /// Wire encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("serialization should not fail")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
