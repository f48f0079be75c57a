use crate::crypto::hash::{Hash160, Hash256, Hashable};
use crate::{LedgerError, Result};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Output index carried by the single input of a coinbase transaction.
pub const COINBASE_VOUT: i32 = -1;

const COINBASE_DATA_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub txid: Hash256,
    pub vout: i32,
    /// Key-hash bytes of the spender; arbitrary data for coinbase inputs.
    pub unlock_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: Hash160,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl Transaction {
    /// Builds a transaction and derives its id from the content.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.id = tx.hash();
        tx
    }
    
    /// Mints `value` to `to`. With no `data`, 20 random bytes keep coinbase ids
    /// unique across blocks paying the same key.
    pub fn new_coinbase(to: Hash160, value: u64, data: Option<Vec<u8>>) -> Self {
        let data = data.unwrap_or_else(|| {
            let mut random = vec![0u8; COINBASE_DATA_LEN];
            OsRng.fill_bytes(&mut random);
            random
        });
        
        let coinbase_input = TxInput {
            txid: Hash256::zero(),
            vout: COINBASE_VOUT,
            unlock_key: data,
        };
        
        Self::new(vec![coinbase_input], vec![TxOutput::new(value, to)])
    }
    
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 
            && self.inputs[0].txid.is_zero()
            && self.inputs[0].vout == COINBASE_VOUT
    }
    
    /// True when the stored id still matches the content.
    pub fn has_valid_id(&self) -> bool {
        self.id == self.hash()
    }
    
    pub fn total_output_value(&self) -> Result<u64> {
        checked_sum(self.outputs.iter().map(|output| output.value))
    }
    
    /// First outpoint referenced by more than one input, if any.
    pub fn repeated_input(&self) -> Option<OutPoint> {
        let mut seen = HashSet::new();
        self.inputs.iter()
            .filter_map(TxInput::outpoint)
            .find(|outpoint| !seen.insert(*outpoint))
    }
}

/// Sums output values, failing instead of wrapping past `u64::MAX`.
pub fn checked_sum<I: IntoIterator<Item = u64>>(values: I) -> Result<u64> {
    values.into_iter()
        .try_fold(0u64, |total, value| total.checked_add(value))
        .ok_or(LedgerError::ValueOverflow)
}

impl Hashable for Transaction {
    fn hash(&self) -> Hash256 {
        let mut data = Vec::new();
        
        data.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            data.extend_from_slice(input.txid.as_bytes());
            data.extend_from_slice(&input.vout.to_le_bytes());
            data.extend_from_slice(&(input.unlock_key.len() as u32).to_le_bytes());
            data.extend_from_slice(&input.unlock_key);
        }
        
        data.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            data.extend_from_slice(&output.value.to_le_bytes());
            data.extend_from_slice(output.pub_key_hash.as_bytes());
        }
        
        Hash256::hash(&data)
    }
}

impl TxInput {
    pub fn spend(outpoint: OutPoint, spender: &Hash160) -> Self {
        Self {
            txid: outpoint.txid,
            vout: outpoint.vout as i32,
            unlock_key: spender.as_bytes().to_vec(),
        }
    }
    
    /// The output this input consumes; `None` for a coinbase input.
    pub fn outpoint(&self) -> Option<OutPoint> {
        if self.txid.is_zero() || self.vout < 0 {
            return None;
        }
        Some(OutPoint::new(self.txid, self.vout as u32))
    }
    
    pub fn uses_key(&self, pub_key_hash: &Hash160) -> bool {
        self.unlock_key.as_slice() == pub_key_hash.as_bytes()
    }
}

impl TxOutput {
    pub fn new(value: u64, pub_key_hash: Hash160) -> Self {
        Self { value, pub_key_hash }
    }
    
    pub fn is_locked_with_key(&self, pub_key_hash: &Hash160) -> bool {
        &self.pub_key_hash == pub_key_hash
    }
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }
}
