use crate::core::utxo::UtxoEntry;
use crate::core::Block;
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use serde::de::DeserializeOwned;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Batch, Db, Transactional, Tree};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

// Database tree names
const TREE_BLOCKS: &str = "blocks";
const TREE_UTXOS: &str = "utxos";
const TREE_UTXO_STATE: &str = "utxo_state";

/// Reserved key in the blocks tree holding the tip hash. Block keys are 32
/// bytes so it cannot collide.
const TIP_KEY: &[u8] = b"l";
const UTXO_TIP_KEY: &[u8] = b"tip";

/// Pending index change for one transaction: `None` deletes the entry.
pub type UtxoChanges = BTreeMap<Hash256, Option<Vec<UtxoEntry>>>;

#[derive(Debug, Clone)]
pub struct Database {
    db: Arc<Db>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;
        
        Ok(Self {
            db: Arc::new(db),
        })
    }
    
    fn get_tree(&self, tree_name: &str) -> Result<Tree> {
        self.db.open_tree(tree_name)
            .map_err(|e| LedgerError::Storage(format!("Failed to open tree {}: {}", tree_name, e)))
    }
    
    // Block operations
    
    /// Stores `block` and moves the tip to it in one transaction. The stored
    /// tip must equal `expected_tip` (`None` for an empty chain).
    pub fn append_block(&self, block: &Block, expected_tip: Option<Hash256>) -> Result<()> {
        let blocks_tree = self.get_tree(TREE_BLOCKS)?;
        let block_data = encode(block, "block")?;
        let block_key = block.hash.as_bytes().to_vec();
        
        blocks_tree
            .transaction(|tx| {
                let current = read_hash(tx, TIP_KEY)?;
                if current != expected_tip {
                    return Err(ConflictableTransactionError::Abort(LedgerError::StaleTip {
                        expected: expected_tip.unwrap_or_else(Hash256::zero),
                        found: current.unwrap_or_else(Hash256::zero),
                    }));
                }
                
                tx.insert(block_key.as_slice(), block_data.as_slice())?;
                tx.insert(TIP_KEY, block_key.as_slice())?;
                Ok(())
            })
            .map_err(unwrap_transaction_error)?;
        
        log::debug!("💾 Saved block {} at height {}", block.hash, block.header.height);
        Ok(())
    }
    
    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        let blocks_tree = self.get_tree(TREE_BLOCKS)?;
        
        match blocks_tree.get(hash.as_bytes())
            .map_err(|e| LedgerError::Storage(format!("Failed to get block: {}", e)))? {
            Some(data) => Ok(Some(decode(&data, "block")?)),
            None => Ok(None),
        }
    }
    
    pub fn get_tip(&self) -> Result<Option<Hash256>> {
        let blocks_tree = self.get_tree(TREE_BLOCKS)?;
        
        match blocks_tree.get(TIP_KEY)
            .map_err(|e| LedgerError::Storage(format!("Failed to get tip: {}", e)))? {
            Some(data) => Ok(Some(parse_hash(&data)?)),
            None => Ok(None),
        }
    }
    
    // UTXO operations
    
    pub fn get_utxos(&self, txid: &Hash256) -> Result<Option<Vec<UtxoEntry>>> {
        let utxo_tree = self.get_tree(TREE_UTXOS)?;
        
        match utxo_tree.get(txid.as_bytes())
            .map_err(|e| LedgerError::Storage(format!("Failed to get UTXO: {}", e)))? {
            Some(data) => Ok(Some(decode(&data, "UTXO entry")?)),
            None => Ok(None),
        }
    }
    
    /// Every index entry in txid byte order.
    pub fn get_all_utxos(&self) -> Result<Vec<(Hash256, Vec<UtxoEntry>)>> {
        let utxo_tree = self.get_tree(TREE_UTXOS)?;
        let mut utxos = Vec::new();
        
        for item in utxo_tree.iter() {
            let (key, value) = item
                .map_err(|e| LedgerError::Storage(format!("Failed to iterate UTXOs: {}", e)))?;
            utxos.push((parse_hash(&key)?, decode(&value, "UTXO entry")?));
        }
        
        Ok(utxos)
    }
    
    pub fn count_utxos(&self) -> Result<usize> {
        Ok(self.get_tree(TREE_UTXOS)?.len())
    }
    
    pub fn get_utxo_tip(&self) -> Result<Option<Hash256>> {
        let state_tree = self.get_tree(TREE_UTXO_STATE)?;
        
        match state_tree.get(UTXO_TIP_KEY)
            .map_err(|e| LedgerError::Storage(format!("Failed to get UTXO tip: {}", e)))? {
            Some(data) => Ok(Some(parse_hash(&data)?)),
            None => Ok(None),
        }
    }
    
    /// Drops the whole index and writes `entries`. The tip marker is cleared
    /// first and set last, so an interrupted rebuild reads as out of sync.
    pub fn replace_utxos(&self, entries: &BTreeMap<Hash256, Vec<UtxoEntry>>, tip: Hash256) -> Result<()> {
        let utxo_tree = self.get_tree(TREE_UTXOS)?;
        let state_tree = self.get_tree(TREE_UTXO_STATE)?;
        
        state_tree.remove(UTXO_TIP_KEY)?;
        utxo_tree.clear()?;
        
        let mut batch = Batch::default();
        for (txid, outputs) in entries {
            batch.insert(txid.as_bytes().to_vec(), encode(outputs, "UTXO entry")?);
        }
        utxo_tree.apply_batch(batch)?;
        state_tree.insert(UTXO_TIP_KEY, tip.as_bytes().to_vec())?;
        
        log::debug!("💾 Rewrote UTXO index with {} entries at {}", entries.len(), tip);
        Ok(())
    }
    
    /// Applies `changes` and advances the tip marker from `parent` to `tip`
    /// atomically.
    pub fn apply_utxo_changes(&self, changes: &UtxoChanges, parent: Option<Hash256>, tip: Hash256) -> Result<()> {
        let utxo_tree = self.get_tree(TREE_UTXOS)?;
        let state_tree = self.get_tree(TREE_UTXO_STATE)?;
        
        let mut encoded = Vec::with_capacity(changes.len());
        for (txid, outputs) in changes {
            let value = match outputs {
                Some(outputs) => Some(encode(outputs, "UTXO entry")?),
                None => None,
            };
            encoded.push((txid.as_bytes().to_vec(), value));
        }
        
        (&utxo_tree, &state_tree)
            .transaction(|(utxos, state)| {
                let current = read_hash(state, UTXO_TIP_KEY)?;
                if current != parent {
                    return Err(ConflictableTransactionError::Abort(LedgerError::UtxoInconsistency(
                        format!(
                            "index reflects {}, block extends {}",
                            describe(current),
                            describe(parent)
                        ),
                    )));
                }
                
                for (key, value) in &encoded {
                    match value {
                        Some(data) => {
                            utxos.insert(key.as_slice(), data.as_slice())?;
                        }
                        None => {
                            utxos.remove(key.as_slice())?;
                        }
                    }
                }
                state.insert(UTXO_TIP_KEY, &tip.as_bytes()[..])?;
                Ok(())
            })
            .map_err(unwrap_transaction_error)?;
        
        log::debug!("💾 Applied {} UTXO changes, index now at {}", changes.len(), tip);
        Ok(())
    }
    
    // Database maintenance
    pub fn flush(&self) -> Result<()> {
        self.db.flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
    
    #[cfg(test)]
    pub(crate) fn put_raw_block(&self, hash: &Hash256, data: &[u8]) -> Result<()> {
        self.get_tree(TREE_BLOCKS)?.insert(hash.as_bytes(), data)?;
        Ok(())
    }
}

fn encode<T: serde::Serialize + ?Sized>(value: &T, what: &str) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| LedgerError::Storage(format!("Failed to serialize {}: {}", what, e)))
}

fn decode<T: DeserializeOwned>(data: &[u8], what: &str) -> Result<T> {
    bincode::deserialize(data)
        .map_err(|e| LedgerError::Storage(format!("Failed to deserialize {}: {}", what, e)))
}

fn parse_hash(bytes: &[u8]) -> Result<Hash256> {
    Hash256::from_slice(bytes)
        .ok_or_else(|| LedgerError::Storage("Invalid hash length".to_string()))
}

fn read_hash(
    tree: &TransactionalTree,
    key: &[u8],
) -> std::result::Result<Option<Hash256>, ConflictableTransactionError<LedgerError>> {
    match tree.get(key)? {
        Some(data) => parse_hash(&data)
            .map(Some)
            .map_err(ConflictableTransactionError::Abort),
        None => Ok(None),
    }
}

fn unwrap_transaction_error(err: TransactionError<LedgerError>) -> LedgerError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => LedgerError::Database(e),
    }
}

fn describe(hash: Option<Hash256>) -> String {
    hash.map(|h| h.to_hex()).unwrap_or_else(|| "nothing".to_string())
}
