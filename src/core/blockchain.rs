use crate::core::{Block, Transaction};
use crate::crypto::hash::{Hash160, Hash256};
use crate::mining::ProofOfWork;
use crate::storage::Database;
use crate::{LedgerError, Result};
use std::sync::Arc;

/// Handle on the persisted chain. Owns the tip; every append goes through
/// `&mut self`.
#[derive(Debug, Clone)]
pub struct Blockchain {
    tip: Hash256,
    height: u64,
    db: Arc<Database>,
    pow: ProofOfWork,
}

impl Blockchain {
    /// Opens the chain stored in `db`, or creates it with a genesis block
    /// paying `subsidy` to `genesis_key`.
    pub fn initialize(db: Arc<Database>, pow: ProofOfWork, genesis_key: &Hash160, subsidy: u64) -> Result<Self> {
        match Self::open(db.clone(), pow.clone()) {
            Err(LedgerError::ChainNotFound) => Self::create(db, pow, genesis_key, subsidy),
            other => other,
        }
    }
    
    /// Creates a new chain. Fails with `ChainAlreadyExists` if `db` holds one.
    pub fn create(db: Arc<Database>, pow: ProofOfWork, genesis_key: &Hash160, subsidy: u64) -> Result<Self> {
        if db.get_tip()?.is_some() {
            return Err(LedgerError::ChainAlreadyExists);
        }
        
        let coinbase = Transaction::new_coinbase(*genesis_key, subsidy, Some(GENESIS_DATA.to_vec()));
        let genesis = Block::genesis(coinbase, &pow)?;
        db.append_block(&genesis, None)?;
        
        log::info!("✅ Genesis block {} created", genesis.hash);
        Ok(Self {
            tip: genesis.hash,
            height: 0,
            db,
            pow,
        })
    }
    
    pub fn open(db: Arc<Database>, pow: ProofOfWork) -> Result<Self> {
        let tip = db.get_tip()?.ok_or(LedgerError::ChainNotFound)?;
        let tip_block = db.get_block(&tip)?.ok_or(LedgerError::BlockNotFound(tip))?;
        
        log::debug!("Opened chain at height {} ({})", tip_block.header.height, tip);
        Ok(Self {
            tip,
            height: tip_block.header.height,
            db,
            pow,
        })
    }
    
    /// Seals `transactions` on top of the tip and persists the block together
    /// with the new tip. Nothing is written if any step fails.
    pub fn mine(&mut self, transactions: Vec<Transaction>) -> Result<Block> {
        if let Some(tx) = transactions.iter().find(|tx| !tx.has_valid_id()) {
            return Err(LedgerError::Transaction(format!(
                "Transaction {} does not match its content",
                tx.id
            )));
        }
        for tx in &transactions {
            if let Some(outpoint) = tx.repeated_input() {
                return Err(LedgerError::Transaction(format!(
                    "Transaction {} spends {}:{} more than once",
                    tx.id, outpoint.txid, outpoint.vout
                )));
            }
        }
        
        let block = Block::mine(self.tip, transactions, self.height + 1, &self.pow)?;
        self.db.append_block(&block, Some(self.tip))?;
        
        self.tip = block.hash;
        self.height = block.header.height;
        
        log::info!("✅ Block {} added at height {}", block.hash, block.header.height);
        Ok(block)
    }
    
    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        self.db.get_block(hash)
    }
    
    /// Walks from the current tip back to genesis.
    pub fn iter(&self) -> BlockchainIterator {
        BlockchainIterator {
            current: Some(self.tip),
            db: self.db.clone(),
        }
    }
    
    pub fn find_transaction(&self, txid: &Hash256) -> Result<Option<Transaction>> {
        for block in self.iter() {
            if let Some(tx) = block?.transactions.into_iter().find(|tx| &tx.id == txid) {
                return Ok(Some(tx));
            }
        }
        Ok(None)
    }
    
    pub fn tip(&self) -> Hash256 {
        self.tip
    }
    
    pub fn height(&self) -> u64 {
        self.height
    }
    
    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }
}

const GENESIS_DATA: &[u8] = b"The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// Backward iterator over a fixed tip. Blocks appended after creation are
/// never visited.
#[derive(Debug, Clone)]
pub struct BlockchainIterator {
    current: Option<Hash256>,
    db: Arc<Database>,
}

impl Iterator for BlockchainIterator {
    type Item = Result<Block>;
    
    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.current.take()?;
        
        let block = match self.db.get_block(&hash) {
            Ok(Some(block)) => block,
            Ok(None) => return Some(Err(LedgerError::BlockNotFound(hash))),
            Err(e) => return Some(Err(e)),
        };
        
        if !block.is_genesis() {
            self.current = Some(block.header.previous_hash);
        }
        Some(Ok(block))
    }
}
