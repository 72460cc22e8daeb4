//! Unspent-output derivation and spendable-output selection.
//!
//! Nothing here is stored: the unspent set is recomputed from the blocks
//! every time it is needed.

use powchain_core::{Block, OutPoint, PubKeyHash, TxOutput};
use std::collections::{HashMap, HashSet};

/// An output that no input in the scanned chain references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub output: TxOutput,
}

/// Walk `blocks` newest first and collect the unspent outputs accepted by
/// `keep`, in scan order.
///
/// Within a block transactions are visited last to first, so an input is
/// always recorded before the output it spends is reached, even when both
/// sit in the same block. Spends are keyed by the referenced outpoint.
fn scan<'a, I, F>(blocks: I, mut keep: F) -> Vec<UnspentOutput>
where
    I: IntoIterator<Item = &'a Block>,
    F: FnMut(&TxOutput) -> bool,
{
    let mut spent: HashSet<OutPoint> = HashSet::new();
    let mut unspent = Vec::new();

    for block in blocks {
        for tx in block.transactions().iter().rev() {
            for (index, output) in tx.outputs.iter().enumerate() {
                let outpoint = OutPoint::new(tx.id, index as u32);
                if spent.contains(&outpoint) || !keep(output) {
                    continue;
                }
                unspent.push(UnspentOutput {
                    outpoint,
                    output: output.clone(),
                });
            }

            if !tx.is_coinbase() {
                spent.extend(tx.inputs.iter().filter_map(|input| input.outpoint()));
            }
        }
    }

    unspent
}

/// Unspent outputs locked to `pub_key_hash`, newest first.
pub fn find_unspent_outputs<'a, I>(pub_key_hash: &PubKeyHash, blocks: I) -> Vec<UnspentOutput>
where
    I: IntoIterator<Item = &'a Block>,
{
    scan(blocks, |output| output.is_locked_with_key(pub_key_hash))
}

/// Every unspent output in the chain, keyed by outpoint.
pub fn unspent_index<'a, I>(blocks: I) -> HashMap<OutPoint, TxOutput>
where
    I: IntoIterator<Item = &'a Block>,
{
    scan(blocks, |_| true)
        .into_iter()
        .map(|utxo| (utxo.outpoint, utxo.output))
        .collect()
}

/// Greedily pick outputs locked to `pub_key_hash` from `unspent`, in the
/// order given, until at least `amount` is gathered.
///
/// Returns the accumulated value and the selected outpoints. An accumulated
/// value below `amount` means the owner cannot afford it.
pub fn compute_spendable(
    pub_key_hash: &PubKeyHash,
    amount: u64,
    unspent: &[UnspentOutput],
) -> (u64, Vec<OutPoint>) {
    let mut accumulated = 0u64;
    let mut selected = Vec::new();

    for utxo in unspent {
        if accumulated >= amount {
            break;
        }
        if utxo.output.is_locked_with_key(pub_key_hash) {
            accumulated = accumulated.saturating_add(utxo.output.value);
            selected.push(utxo.outpoint);
        }
    }

    (accumulated, selected)
}
