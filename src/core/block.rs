use crate::core::merkle::merkle_root;
use crate::core::Transaction;
use crate::crypto::hash::{Hash256, Hashable};
use crate::mining::ProofOfWork;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Proof-of-work digest of the header; zero until sealed.
    pub hash: Hash256,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub previous_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u64,
    pub nonce: u64,
    pub height: u64,
}

impl Block {
    /// Unsealed block. Fails when `transactions` is empty.
    pub fn new(previous_hash: Hash256, transactions: Vec<Transaction>, height: u64) -> Result<Self> {
        let merkle_root = Self::calculate_merkle_root(&transactions)?;
        let timestamp = Utc::now().timestamp() as u64;
        
        Ok(Self {
            header: BlockHeader {
                previous_hash,
                merkle_root,
                timestamp,
                nonce: 0,
                height,
            },
            hash: Hash256::zero(),
            transactions,
        })
    }
    
    pub fn mine(
        previous_hash: Hash256,
        transactions: Vec<Transaction>,
        height: u64,
        pow: &ProofOfWork,
    ) -> Result<Self> {
        let mut block = Self::new(previous_hash, transactions, height)?;
        block.seal(pow)?;
        Ok(block)
    }
    
    pub fn genesis(coinbase: Transaction, pow: &ProofOfWork) -> Result<Self> {
        Self::mine(Hash256::zero(), vec![coinbase], 0, pow)
    }
    
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<Hash256> {
        let digests: Vec<Hash256> = transactions.iter().map(|tx| tx.hash()).collect();
        merkle_root(&digests)
    }
    
    pub fn seal(&mut self, pow: &ProofOfWork) -> Result<()> {
        let (nonce, hash) = pow.seal(&self.header)?;
        self.header.nonce = nonce;
        self.hash = hash;
        Ok(())
    }
    
    pub fn is_genesis(&self) -> bool {
        self.header.previous_hash.is_zero()
    }
    
    pub fn transaction_ids(&self) -> Vec<Hash256> {
        self.transactions.iter().map(|tx| tx.id).collect()
    }
}
