//! Operations offered to the CLI and wallet: chain creation, balances,
//! transfers, chain listing and index maintenance.

use crate::config::Config;
use crate::core::utxo::UtxoSet;
use crate::core::{Block, Blockchain, Transaction, TxInput, TxOutput};
use crate::crypto::hash::{Hash160, Hash256};
use crate::crypto::keys;
use crate::storage::Database;
use crate::{LedgerError, Result};
use crate::core::transaction::checked_sum;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Turns a human-readable address into the key-hash outputs are locked to.
/// Supplied by the wallet side; `None` means the address is invalid.
pub trait AddressResolver {
    fn key_hash(&self, address: &str) -> Option<Hash160>;
}

/// Base58Check addresses as produced by `crypto::keys`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base58Addresses;

impl AddressResolver for Base58Addresses {
    fn key_hash(&self, address: &str) -> Option<Hash160> {
        keys::address_to_hash160(address).ok()
    }
}

/// One `print-chain` entry. Hashes serialize as hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSummary {
    #[serde(serialize_with = "hex_hash")]
    pub hash: Hash256,
    #[serde(serialize_with = "hex_hash")]
    pub previous_hash: Hash256,
    pub nonce: u64,
    pub height: u64,
    pub timestamp: u64,
    pub pow_valid: bool,
    #[serde(serialize_with = "hex_hashes")]
    pub transaction_ids: Vec<Hash256>,
}

fn hex_hash<S: Serializer>(hash: &Hash256, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&hash.to_hex())
}

fn hex_hashes<S: Serializer>(hashes: &[Hash256], serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(hashes.iter().map(Hash256::to_hex))
}

pub struct Ledger<R: AddressResolver = Base58Addresses> {
    chain: Blockchain,
    utxo_set: UtxoSet,
    resolver: R,
    subsidy: u64,
}

impl<R: AddressResolver> Ledger<R> {
    /// Creates the chain with its genesis reward paid to `address` and builds
    /// the index.
    pub fn create_chain(db: Arc<Database>, config: &Config, resolver: R, address: &str) -> Result<Self> {
        let genesis_key = resolve(&resolver, address)?;
        let chain = Blockchain::create(db.clone(), config.proof_of_work()?, &genesis_key, config.consensus.subsidy)?;
        
        let utxo_set = UtxoSet::new(db);
        utxo_set.reindex(&chain)?;
        
        Ok(Self {
            chain,
            utxo_set,
            resolver,
            subsidy: config.consensus.subsidy,
        })
    }
    
    /// Opens an existing chain. An index that does not reflect the chain tip
    /// is rebuilt before returning.
    pub fn open(db: Arc<Database>, config: &Config, resolver: R) -> Result<Self> {
        let chain = Blockchain::open(db.clone(), config.proof_of_work()?)?;
        let utxo_set = UtxoSet::new(db);
        
        if !utxo_set.is_synced(&chain)? {
            log::warn!("⚠️  UTXO index is behind the chain tip {}, reindexing", chain.tip());
            utxo_set.reindex(&chain)?;
        }
        
        Ok(Self {
            chain,
            utxo_set,
            resolver,
            subsidy: config.consensus.subsidy,
        })
    }
    
    pub fn get_balance(&self, address: &str) -> Result<u64> {
        let key_hash = resolve(&self.resolver, address)?;
        self.utxo_set.balance(&key_hash)
    }
    
    /// Moves `amount` from `from` to `to` in a newly mined block. The block
    /// also carries a coinbase rewarding `from`, the miner.
    pub fn send(&mut self, from: &str, to: &str, amount: u64) -> Result<Block> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let from_key = resolve(&self.resolver, from)?;
        let to_key = resolve(&self.resolver, to)?;
        
        let transfer = build_transfer(&self.utxo_set, &from_key, &to_key, amount)?;
        self.verify_transaction(&transfer)?;
        
        let coinbase = Transaction::new_coinbase(from_key, self.subsidy, None);
        let block = self.chain.mine(vec![coinbase, transfer])?;
        self.utxo_set.update(&block)?;
        
        log::info!("💸 Sent {} from {} to {} in block {}", amount, from, to, block.hash);
        Ok(block)
    }
    
    /// Every input must spend a distinct indexed output locked to its own
    /// key, and inputs must cover outputs.
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<()> {
        if tx.is_coinbase() {
            return Ok(());
        }
        
        let mut seen = HashSet::new();
        let mut input_values = Vec::with_capacity(tx.inputs.len());
        for input in &tx.inputs {
            let outpoint = input.outpoint()
                .ok_or_else(|| LedgerError::Transaction(format!("{} has a null input", tx.id)))?;
            if !seen.insert(outpoint) {
                return Err(LedgerError::Transaction(format!(
                    "{} spends {}:{} more than once",
                    tx.id, outpoint.txid, outpoint.vout
                )));
            }
            let output = self.utxo_set.get_output(&outpoint)?
                .ok_or_else(|| LedgerError::Transaction(format!(
                    "{} spends unknown or spent output {}:{}",
                    tx.id, outpoint.txid, outpoint.vout
                )))?;
            
            if !input.uses_key(&output.pub_key_hash) {
                return Err(LedgerError::Transaction(format!(
                    "{} cannot unlock output {}:{}",
                    tx.id, outpoint.txid, outpoint.vout
                )));
            }
            input_values.push(output.value);
        }
        
        let input_value = checked_sum(input_values)?;
        let output_value = tx.total_output_value()?;
        if input_value < output_value {
            return Err(LedgerError::Transaction(format!(
                "{} spends {} but only has {}",
                tx.id,
                output_value,
                input_value
            )));
        }
        Ok(())
    }
    
    /// Newest block first.
    pub fn print_chain(&self) -> impl Iterator<Item = Result<BlockSummary>> + '_ {
        self.chain.iter().map(move |block| {
            block.map(|block| BlockSummary {
                pow_valid: self.chain.pow().validate(&block),
                hash: block.hash,
                previous_hash: block.header.previous_hash,
                nonce: block.header.nonce,
                height: block.header.height,
                timestamp: block.header.timestamp,
                transaction_ids: block.transaction_ids(),
            })
        })
    }
    
    pub fn reindex_utxo(&self) -> Result<usize> {
        self.utxo_set.reindex(&self.chain)
    }
    
    pub fn find_transaction(&self, txid: &Hash256) -> Result<Option<Transaction>> {
        self.chain.find_transaction(txid)
    }
    
    pub fn chain(&self) -> &Blockchain {
        &self.chain
    }
    
    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }
}

fn resolve<R: AddressResolver>(resolver: &R, address: &str) -> Result<Hash160> {
    resolver.key_hash(address)
        .ok_or_else(|| LedgerError::InvalidAddress(address.to_string()))
}

/// Spends `from`'s outputs to pay `amount` to `to`, returning change to `from`.
pub fn build_transfer(utxo_set: &UtxoSet, from: &Hash160, to: &Hash160, amount: u64) -> Result<Transaction> {
    let (accumulated, outpoints) = utxo_set.find_spendable_outputs(from, amount)?;
    if accumulated < amount {
        return Err(LedgerError::InsufficientFunds {
            required: amount,
            available: accumulated,
        });
    }
    
    let inputs = outpoints.into_iter()
        .map(|outpoint| TxInput::spend(outpoint, from))
        .collect();
    
    let mut outputs = vec![TxOutput::new(amount, *to)];
    if accumulated > amount {
        outputs.push(TxOutput::new(accumulated - amount, *from));
    }
    
    Ok(Transaction::new(inputs, outputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutPoint;
    use crate::crypto::keys::key_hash_to_address;
    use tempfile::TempDir;
    
    struct Fixture {
        _dir: TempDir,
        config: Config,
        db: Arc<Database>,
    }
    
    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_data_dir(dir.path());
        config.mining.target_bits = 8;
        let db = Arc::new(Database::new(config.db_path()).unwrap());
        Fixture { _dir: dir, config, db }
    }
    
    fn address(tag: &[u8]) -> String {
        key_hash_to_address(&Hash160::hash_sha256(tag))
    }
    
    fn chain_length(ledger: &Ledger) -> usize {
        ledger.chain().iter().count()
    }
    
    #[test]
    fn test_genesis_balance() -> Result<()> {
        let f = setup();
        let ledger = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &address(b"A"))?;
        
        assert_eq!(ledger.get_balance(&address(b"A"))?, 10);
        assert_eq!(ledger.get_balance(&address(b"B"))?, 0);
        Ok(())
    }
    
    #[test]
    fn test_create_chain_twice() -> Result<()> {
        let f = setup();
        Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &address(b"A"))?;
        
        let result = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &address(b"B"));
        assert!(matches!(result, Err(LedgerError::ChainAlreadyExists)));
        Ok(())
    }
    
    #[test]
    fn test_send_moves_funds() -> Result<()> {
        let f = setup();
        let (a, b) = (address(b"A"), address(b"B"));
        let mut ledger = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &a)?;
        
        let block = ledger.send(&a, &b, 4)?;
        
        assert_eq!(block.header.height, 1);
        assert_eq!(block.transactions.len(), 2);
        // 6 change plus the miner's reward for the send block
        assert_eq!(ledger.get_balance(&a)?, 6 + 10);
        assert_eq!(ledger.get_balance(&b)?, 4);
        
        let key_a = Hash160::hash_sha256(b"A");
        let (available, outputs) = ledger.utxo_set().find_spendable_outputs(&key_a, 100)?;
        assert_eq!(available, 16);
        assert_eq!(outputs.len(), 2);
        Ok(())
    }
    
    #[test]
    fn test_rejected_sends_leave_chain_unchanged() -> Result<()> {
        let f = setup();
        let (a, b) = (address(b"A"), address(b"B"));
        let mut ledger = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &a)?;
        let tip = ledger.chain().tip();
        
        assert!(matches!(ledger.send(&a, &b, 0), Err(LedgerError::InvalidAmount)));
        assert!(matches!(ledger.send(&a, "not-an-address", 1), Err(LedgerError::InvalidAddress(_))));
        assert!(matches!(ledger.send("not-an-address", &b, 1), Err(LedgerError::InvalidAddress(_))));
        assert!(matches!(
            ledger.send(&a, &b, 11),
            Err(LedgerError::InsufficientFunds { required: 11, available: 10 })
        ));
        
        assert_eq!(ledger.chain().tip(), tip);
        assert_eq!(chain_length(&ledger), 1);
        assert_eq!(ledger.get_balance(&a)?, 10);
        Ok(())
    }
    
    #[test]
    fn test_verify_transaction() -> Result<()> {
        let f = setup();
        let a = address(b"A");
        let ledger = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &a)?;
        let genesis = ledger.chain().get_block(&ledger.chain().tip())?.unwrap();
        let funding = OutPoint::new(genesis.transactions[0].id, 0);
        let key_a = Hash160::hash_sha256(b"A");
        let key_b = Hash160::hash_sha256(b"B");
        
        let honest = Transaction::new(vec![TxInput::spend(funding, &key_a)], vec![TxOutput::new(10, key_b)]);
        assert!(ledger.verify_transaction(&honest).is_ok());
        
        let thief = Transaction::new(vec![TxInput::spend(funding, &key_b)], vec![TxOutput::new(10, key_b)]);
        assert!(matches!(ledger.verify_transaction(&thief), Err(LedgerError::Transaction(_))));
        
        let inflated = Transaction::new(vec![TxInput::spend(funding, &key_a)], vec![TxOutput::new(11, key_b)]);
        assert!(matches!(ledger.verify_transaction(&inflated), Err(LedgerError::Transaction(_))));
        Ok(())
    }
    
    #[test]
    fn test_repeated_input_cannot_create_value() -> Result<()> {
        let f = setup();
        let (a, b) = (address(b"A"), address(b"B"));
        let mut ledger = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &a)?;
        let genesis = ledger.chain().get_block(&ledger.chain().tip())?.unwrap();
        let funding = OutPoint::new(genesis.transactions[0].id, 0);
        let key_a = Hash160::hash_sha256(b"A");
        let key_b = Hash160::hash_sha256(b"B");
        
        let doubled = Transaction::new(
            vec![TxInput::spend(funding, &key_a), TxInput::spend(funding, &key_a)],
            vec![TxOutput::new(20, key_b)],
        );
        assert!(matches!(ledger.verify_transaction(&doubled), Err(LedgerError::Transaction(_))));
        
        let coinbase = Transaction::new_coinbase(key_a, 10, None);
        assert!(matches!(ledger.chain.mine(vec![coinbase, doubled]), Err(LedgerError::Transaction(_))));
        
        assert_eq!(chain_length(&ledger), 1);
        assert_eq!(ledger.reindex_utxo()?, 1);
        assert_eq!(ledger.get_balance(&a)?, 10);
        assert_eq!(ledger.get_balance(&b)?, 0);
        Ok(())
    }
    
    #[test]
    fn test_print_chain() -> Result<()> {
        let f = setup();
        let (a, b) = (address(b"A"), address(b"B"));
        let mut ledger = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &a)?;
        let block = ledger.send(&a, &b, 1)?;
        
        let summaries: Vec<BlockSummary> = ledger.print_chain().collect::<Result<_>>()?;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].hash, block.hash);
        assert_eq!(summaries[0].transaction_ids, block.transaction_ids());
        assert_eq!(summaries[1].height, 0);
        assert!(summaries[1].previous_hash.is_zero());
        assert!(summaries.iter().all(|s| s.pow_valid));
        
        let json = serde_json::to_value(&summaries[0])?;
        assert_eq!(json["hash"], block.hash.to_hex());
        assert_eq!(json["previous_hash"], summaries[1].hash.to_hex());
        assert_eq!(json["transaction_ids"][1], block.transactions[1].id.to_hex());
        assert_eq!(json["height"], 1);
        Ok(())
    }
    
    #[test]
    fn test_open_rebuilds_stale_index() -> Result<()> {
        let f = setup();
        let (a, b) = (address(b"A"), address(b"B"));
        {
            let ledger = Ledger::create_chain(f.db.clone(), &f.config, Base58Addresses, &a)?;
            // Append behind the index's back
            let mut chain = ledger.chain().clone();
            let coinbase = Transaction::new_coinbase(Hash160::hash_sha256(b"B"), 10, None);
            chain.mine(vec![coinbase])?;
            assert!(!ledger.utxo_set().is_synced(&chain)?);
        }
        
        let ledger = Ledger::open(f.db.clone(), &f.config, Base58Addresses)?;
        assert!(ledger.utxo_set().is_synced(ledger.chain())?);
        assert_eq!(ledger.get_balance(&b)?, 10);
        assert_eq!(ledger.reindex_utxo()?, 2);
        Ok(())
    }
    
    #[test]
    fn test_open_without_chain() {
        let f = setup();
        let result = Ledger::open(f.db.clone(), &f.config, Base58Addresses);
        assert!(matches!(result, Err(LedgerError::ChainNotFound)));
    }
}
