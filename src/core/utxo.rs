//! Unspent output index.
//!
//! The index is a cache over the chain: `compute_unspent` derives it from the
//! blocks alone, `UtxoSet::reindex` persists that result and
//! `UtxoSet::update` keeps it current one block at a time. Both paths must
//! produce identical entries.

use crate::core::transaction::checked_sum;
use crate::core::{Block, Blockchain, OutPoint, Transaction, TxInput, TxOutput};
use crate::crypto::hash::{Hash160, Hash256};
use crate::storage::{Database, UtxoChanges};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub vout: u32,
    pub value: u64,
    pub pub_key_hash: Hash160,
}

/// txid -> unspent outputs of that transaction, in output order.
pub type UtxoMap = BTreeMap<Hash256, Vec<UtxoEntry>>;

impl UtxoEntry {
    fn from_output(vout: usize, output: &TxOutput) -> Self {
        Self {
            vout: vout as u32,
            value: output.value,
            pub_key_hash: output.pub_key_hash,
        }
    }
    
    pub fn output(&self) -> TxOutput {
        TxOutput::new(self.value, self.pub_key_hash)
    }
}

/// Unspent outputs of the whole chain. Replays blocks oldest to newest with
/// the same spend rules `UtxoSet::update` applies, so a chain holding a spend
/// of a missing or already spent output is refused.
pub fn compute_unspent(chain: &Blockchain) -> Result<UtxoMap> {
    let mut blocks = chain.iter().collect::<Result<Vec<Block>>>()?;
    blocks.reverse();
    
    let mut unspent = UtxoMap::new();
    for block in &blocks {
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let outpoint = spent_outpoint(tx, input)?;
                    let mut outputs = unspent.remove(&outpoint.txid).unwrap_or_default();
                    take_output(&mut outputs, &outpoint, tx)?;
                    if !outputs.is_empty() {
                        unspent.insert(outpoint.txid, outputs);
                    }
                }
            }
            
            let created = created_entries(tx);
            if !created.is_empty() {
                unspent.insert(tx.id, created);
            }
        }
    }
    
    Ok(unspent)
}

fn spent_outpoint(tx: &Transaction, input: &TxInput) -> Result<OutPoint> {
    input.outpoint().ok_or_else(|| {
        LedgerError::UtxoInconsistency(format!("transaction {} has a null input", tx.id))
    })
}

/// Removes the entry `outpoint` names from `outputs`, the unspent outputs of
/// its transaction.
fn take_output(outputs: &mut Vec<UtxoEntry>, outpoint: &OutPoint, spender: &Transaction) -> Result<()> {
    let position = outputs.iter()
        .position(|entry| entry.vout == outpoint.vout)
        .ok_or_else(|| LedgerError::UtxoInconsistency(format!(
            "output {}:{} spent by {} is not unspent",
            outpoint.txid, outpoint.vout, spender.id
        )))?;
    outputs.remove(position);
    Ok(())
}

fn created_entries(tx: &Transaction) -> Vec<UtxoEntry> {
    tx.outputs.iter()
        .enumerate()
        .map(|(vout, output)| UtxoEntry::from_output(vout, output))
        .collect()
}

#[derive(Debug, Clone)]
pub struct UtxoSet {
    db: Arc<Database>,
}

impl UtxoSet {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
    
    /// Rebuilds the index from a full chain scan. Returns the number of
    /// transactions with unspent outputs.
    pub fn reindex(&self, chain: &Blockchain) -> Result<usize> {
        let unspent = compute_unspent(chain)?;
        self.db.replace_utxos(&unspent, chain.tip())?;
        
        log::info!("🔁 UTXO index rebuilt at height {}: {} transactions", chain.height(), unspent.len());
        Ok(unspent.len())
    }
    
    /// Applies one block appended directly on top of the indexed tip. A spend
    /// of an output the index does not hold is an inconsistency and leaves
    /// the index untouched.
    pub fn update(&self, block: &Block) -> Result<()> {
        let mut changes = UtxoChanges::new();
        
        for tx in &block.transactions {
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    let outpoint = spent_outpoint(tx, input)?;
                    let mut outputs = self.pending_outputs(&changes, &outpoint.txid)?;
                    take_output(&mut outputs, &outpoint, tx)?;
                    changes.insert(outpoint.txid, (!outputs.is_empty()).then_some(outputs));
                }
            }
            
            let created = created_entries(tx);
            changes.insert(tx.id, (!created.is_empty()).then_some(created));
        }
        
        let parent = (!block.is_genesis()).then_some(block.header.previous_hash);
        self.db.apply_utxo_changes(&changes, parent, block.hash)?;
        
        log::debug!("UTXO index updated with block {} at height {}", block.hash, block.header.height);
        Ok(())
    }
    
    fn pending_outputs(&self, changes: &UtxoChanges, txid: &Hash256) -> Result<Vec<UtxoEntry>> {
        match changes.get(txid) {
            Some(pending) => Ok(pending.clone().unwrap_or_default()),
            None => Ok(self.db.get_utxos(txid)?.unwrap_or_default()),
        }
    }
    
    /// Collects outputs locked to `pub_key_hash` until `amount` is covered or
    /// the index runs out. Scans in txid order, then output order.
    pub fn find_spendable_outputs(&self, pub_key_hash: &Hash160, amount: u64) -> Result<(u64, Vec<OutPoint>)> {
        let mut accumulated = 0u64;
        let mut selected = Vec::new();
        
        'scan: for (txid, entries) in self.db.get_all_utxos()? {
            for entry in entries.iter().filter(|entry| &entry.pub_key_hash == pub_key_hash) {
                if accumulated >= amount {
                    break 'scan;
                }
                accumulated = accumulated.checked_add(entry.value).ok_or(LedgerError::ValueOverflow)?;
                selected.push(OutPoint::new(txid, entry.vout));
            }
        }
        
        Ok((accumulated, selected))
    }
    
    pub fn find_unspent(&self, pub_key_hash: &Hash160) -> Result<Vec<TxOutput>> {
        Ok(self.db.get_all_utxos()?
            .into_iter()
            .flat_map(|(_, entries)| entries)
            .filter(|entry| &entry.pub_key_hash == pub_key_hash)
            .map(|entry| entry.output())
            .collect())
    }
    
    pub fn balance(&self, pub_key_hash: &Hash160) -> Result<u64> {
        checked_sum(self.find_unspent(pub_key_hash)?.iter().map(|output| output.value))
    }
    
    pub fn get_output(&self, outpoint: &OutPoint) -> Result<Option<TxOutput>> {
        Ok(self.db.get_utxos(&outpoint.txid)?
            .and_then(|entries| entries.into_iter().find(|entry| entry.vout == outpoint.vout))
            .map(|entry| entry.output()))
    }
    
    /// Number of transactions with at least one unspent output.
    pub fn count_transactions(&self) -> Result<usize> {
        self.db.count_utxos()
    }
    
    pub fn total_value(&self) -> Result<u64> {
        checked_sum(self.db.get_all_utxos()?
            .iter()
            .flat_map(|(_, entries)| entries.iter())
            .map(|entry| entry.value))
    }
    
    pub fn entries(&self) -> Result<UtxoMap> {
        Ok(self.db.get_all_utxos()?.into_iter().collect())
    }
    
    /// Tip hash the index reflects; `None` before the first build or during
    /// an interrupted one.
    pub fn indexed_tip(&self) -> Result<Option<Hash256>> {
        self.db.get_utxo_tip()
    }
    
    pub fn is_synced(&self, chain: &Blockchain) -> Result<bool> {
        Ok(self.indexed_tip()? == Some(chain.tip()))
    }
}
