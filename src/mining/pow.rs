//! Fixed-difficulty proof of work.
//!
//! The header material is a fixed 92-byte layout:
//! `previous_hash(32) | merkle_root(32) | height(8) | timestamp(8) | nonce(8) | bits(4)`,
//! integers big-endian. A digest satisfies the target when, read as a 256-bit
//! big-endian integer, it is below `2^(256 - bits)`.

use crate::core::{Block, BlockHeader};
use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const HEADER_LEN: usize = 92;
const NONCE_OFFSET: usize = 80;
const CANCEL_CHECK_INTERVAL: u64 = 1 << 14;

pub const MIN_TARGET_BITS: u32 = 1;
pub const MAX_TARGET_BITS: u32 = 255;

#[derive(Debug, Clone)]
pub struct ProofOfWork {
    bits: u32,
    target: [u8; 32],
    max_nonce: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl ProofOfWork {
    pub fn new(bits: u32, max_nonce: u64) -> Result<Self> {
        if !(MIN_TARGET_BITS..=MAX_TARGET_BITS).contains(&bits) {
            return Err(LedgerError::InvalidDifficulty(bits));
        }
        
        let shift = (256 - bits) as usize;
        let mut target = [0u8; 32];
        target[31 - shift / 8] = 1 << (shift % 8);
        
        Ok(Self {
            bits,
            target,
            max_nonce,
            cancel: None,
        })
    }
    
    /// Sealing stops with `MiningCancelled` once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
    
    pub fn bits(&self) -> u32 {
        self.bits
    }
    
    pub fn max_nonce(&self) -> u64 {
        self.max_nonce
    }
    
    pub fn target(&self) -> Hash256 {
        Hash256::new(self.target)
    }
    
    pub fn meets_target(&self, hash: &Hash256) -> bool {
        hash.as_bytes() < &self.target
    }
    
    pub fn header_material(&self, header: &BlockHeader) -> [u8; HEADER_LEN] {
        let mut data = [0u8; HEADER_LEN];
        data[0..32].copy_from_slice(header.previous_hash.as_bytes());
        data[32..64].copy_from_slice(header.merkle_root.as_bytes());
        data[64..72].copy_from_slice(&header.height.to_be_bytes());
        data[72..80].copy_from_slice(&header.timestamp.to_be_bytes());
        data[NONCE_OFFSET..88].copy_from_slice(&header.nonce.to_be_bytes());
        data[88..92].copy_from_slice(&self.bits.to_be_bytes());
        data
    }
    
    pub fn hash_header(&self, header: &BlockHeader) -> Hash256 {
        Hash256::hash(&self.header_material(header))
    }
    
    /// Searches nonces `0..=max_nonce` for a digest below the target. The
    /// header's own nonce is ignored.
    pub fn seal(&self, header: &BlockHeader) -> Result<(u64, Hash256)> {
        let started = Instant::now();
        let mut material = self.header_material(header);
        let mut nonce = 0u64;
        
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && self.is_cancelled() {
                log::debug!("Sealing of height {} cancelled at nonce {}", header.height, nonce);
                return Err(LedgerError::MiningCancelled);
            }
            
            material[NONCE_OFFSET..NONCE_OFFSET + 8].copy_from_slice(&nonce.to_be_bytes());
            let hash = Hash256::hash(&material);
            if self.meets_target(&hash) {
                log::debug!(
                    "⛏️  Sealed height {} with nonce {} in {:?}",
                    header.height,
                    nonce,
                    started.elapsed()
                );
                return Ok((nonce, hash));
            }
            
            if nonce >= self.max_nonce {
                return Err(LedgerError::NonceExhausted { max_nonce: self.max_nonce });
            }
            nonce += 1;
        }
    }
    
    /// Recomputes the merkle root and header digest from the block's own
    /// fields. Any mismatch or a digest above target yields `false`.
    pub fn validate(&self, block: &Block) -> bool {
        match Block::calculate_merkle_root(&block.transactions) {
            Ok(root) if root == block.header.merkle_root => {}
            _ => return false,
        }
        
        let hash = self.hash_header(&block.header);
        hash == block.hash && self.meets_target(&hash)
    }
    
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Transaction;
    use crate::crypto::hash::Hash160;
    
    const TEST_BITS: u32 = 8;
    
    fn sealed_block(pow: &ProofOfWork) -> Block {
        let coinbase = Transaction::new_coinbase(Hash160::hash_sha256(b"miner"), 10, Some(b"pow".to_vec()));
        Block::mine(Hash256::hash(b"parent"), vec![coinbase], 3, pow).unwrap()
    }
    
    fn flip_bit(hash: &Hash256) -> Hash256 {
        let mut bytes = *hash.as_bytes();
        bytes[31] ^= 0x01;
        Hash256::new(bytes)
    }
    
    #[test]
    fn test_target_layout() -> Result<()> {
        let pow = ProofOfWork::new(8, u64::MAX)?;
        let mut expected = [0u8; 32];
        expected[0] = 0x01;
        assert_eq!(pow.target(), Hash256::new(expected));
        
        let pow = ProofOfWork::new(1, u64::MAX)?;
        expected[0] = 0x80;
        assert_eq!(pow.target(), Hash256::new(expected));
        
        let pow = ProofOfWork::new(255, u64::MAX)?;
        let mut low = [0u8; 32];
        low[31] = 0x02;
        assert_eq!(pow.target(), Hash256::new(low));
        Ok(())
    }
    
    #[test]
    fn test_invalid_difficulty() {
        assert!(matches!(ProofOfWork::new(0, 10), Err(LedgerError::InvalidDifficulty(0))));
        assert!(matches!(ProofOfWork::new(256, 10), Err(LedgerError::InvalidDifficulty(256))));
    }
    
    #[test]
    fn test_sealed_block_validates() -> Result<()> {
        let pow = ProofOfWork::new(TEST_BITS, u64::MAX)?;
        let block = sealed_block(&pow);
        
        assert!(pow.validate(&block));
        assert_eq!(block.hash.as_bytes()[0], 0);
        Ok(())
    }
    
    #[test]
    fn test_tampering_breaks_validation() -> Result<()> {
        let pow = ProofOfWork::new(TEST_BITS, u64::MAX)?;
        let block = sealed_block(&pow);
        
        let mut tampered = block.clone();
        tampered.hash = flip_bit(&block.hash);
        assert!(!pow.validate(&tampered));
        
        let mut tampered = block.clone();
        tampered.header.previous_hash = flip_bit(&block.header.previous_hash);
        assert!(!pow.validate(&tampered));
        
        let mut tampered = block.clone();
        tampered.header.merkle_root = flip_bit(&block.header.merkle_root);
        assert!(!pow.validate(&tampered));
        
        let mut tampered = block.clone();
        tampered.header.nonce ^= 1;
        assert!(!pow.validate(&tampered));
        
        let mut tampered = block.clone();
        tampered.transactions[0].outputs[0].value += 1;
        assert!(!pow.validate(&tampered));
        Ok(())
    }
    
    #[test]
    fn test_validation_depends_on_difficulty() -> Result<()> {
        let easy = ProofOfWork::new(1, u64::MAX)?;
        let block = sealed_block(&easy);
        
        // Header material commits to the bits, so another difficulty never matches
        let other = ProofOfWork::new(2, u64::MAX)?;
        assert!(!other.validate(&block));
        Ok(())
    }
    
    #[test]
    fn test_nonce_bound_is_reported() -> Result<()> {
        let pow = ProofOfWork::new(MAX_TARGET_BITS, 100)?;
        let block = Block::new(
            Hash256::zero(),
            vec![Transaction::new_coinbase(Hash160::hash_sha256(b"m"), 1, None)],
            0,
        )?;
        
        let result = pow.seal(&block.header);
        assert!(matches!(result, Err(LedgerError::NonceExhausted { max_nonce: 100 })));
        Ok(())
    }
    
    #[test]
    fn test_cancel_flag_stops_sealing() -> Result<()> {
        let flag = Arc::new(AtomicBool::new(true));
        let pow = ProofOfWork::new(MAX_TARGET_BITS, u64::MAX)?.with_cancel_flag(flag);
        let block = Block::new(
            Hash256::zero(),
            vec![Transaction::new_coinbase(Hash160::hash_sha256(b"m"), 1, None)],
            0,
        )?;
        
        assert!(matches!(pow.seal(&block.header), Err(LedgerError::MiningCancelled)));
        Ok(())
    }
}
