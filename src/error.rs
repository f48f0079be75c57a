use crate::crypto::hash::Hash256;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Blockchain error: {0}")]
    Blockchain(String),
    
    #[error("Transaction error: {0}")]
    Transaction(String),
    
    #[error("Crypto error: {0}")]
    Crypto(String),
    
    #[error("Wallet error: {0}")]
    Wallet(String),
    
    #[error("Storage error: {0}")]
    Storage(String),
    
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),
    
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },
    
    #[error("Value overflows a 64-bit amount")]
    ValueOverflow,
    
    #[error("Blockchain already exists")]
    ChainAlreadyExists,
    
    #[error("No existing blockchain found, create one first")]
    ChainNotFound,
    
    #[error("Block not found: {0}")]
    BlockNotFound(Hash256),
    
    #[error("Tip moved: expected {expected}, found {found}")]
    StaleTip { expected: Hash256, found: Hash256 },
    
    #[error("Merkle tree needs at least one transaction")]
    EmptyMerkleTree,
    
    #[error("Invalid difficulty: {0} bits (expected 1..=255)")]
    InvalidDifficulty(u32),
    
    #[error("No nonce up to {max_nonce} satisfies the target")]
    NonceExhausted { max_nonce: u64 },
    
    #[error("Mining cancelled")]
    MiningCancelled,
    
    #[error("UTXO index inconsistent: {0} (run reindex-utxo)")]
    UtxoInconsistency(String),
}
