//! Merkle root over transaction digests.
//!
//! Leaves are the re-hashed transaction ids. Whenever a level has an odd
//! number of nodes its last node is paired with itself.

use crate::crypto::hash::Hash256;
use crate::{LedgerError, Result};

pub fn merkle_root(digests: &[Hash256]) -> Result<Hash256> {
    if digests.is_empty() {
        return Err(LedgerError::EmptyMerkleTree);
    }
    
    let mut level: Vec<Hash256> = digests
        .iter()
        .map(|digest| Hash256::hash(digest.as_bytes()))
        .collect();
    if level.len() % 2 != 0 {
        level.push(level[level.len() - 1]);
    }
    
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or(&pair[0]);
                let mut bytes = [0u8; 64];
                bytes[..32].copy_from_slice(pair[0].as_bytes());
                bytes[32..].copy_from_slice(right.as_bytes());
                Hash256::hash(&bytes)
            })
            .collect();
    }
    
    Ok(level[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    
    fn digests(count: u8) -> Vec<Hash256> {
        (0..count).map(|i| Hash256::hash(&[i])).collect()
    }
    
    fn parent(left: &Hash256, right: &Hash256) -> Hash256 {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(left.as_bytes());
        bytes.extend_from_slice(right.as_bytes());
        Hash256::hash(&bytes)
    }
    
    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(merkle_root(&[]), Err(LedgerError::EmptyMerkleTree)));
    }
    
    #[test]
    fn test_root_is_deterministic() -> Result<()> {
        let input = digests(5);
        assert_eq!(merkle_root(&input)?, merkle_root(&input)?);
        Ok(())
    }
    
    #[test]
    fn test_single_leaf_equals_duplicated_pair() -> Result<()> {
        let d = Hash256::hash(b"coinbase");
        let leaf = Hash256::hash(d.as_bytes());
        
        assert_eq!(merkle_root(&[d])?, merkle_root(&[d, d])?);
        assert_eq!(merkle_root(&[d])?, parent(&leaf, &leaf));
        Ok(())
    }
    
    #[test]
    fn test_two_leaves_by_hand() -> Result<()> {
        let input = digests(2);
        let left = Hash256::hash(input[0].as_bytes());
        let right = Hash256::hash(input[1].as_bytes());
        
        assert_eq!(merkle_root(&input)?, parent(&left, &right));
        Ok(())
    }
    
    #[test]
    fn test_order_matters() -> Result<()> {
        let input = digests(4);
        let mut swapped = input.clone();
        swapped.swap(1, 2);
        
        assert_ne!(merkle_root(&input)?, merkle_root(&swapped)?);
        Ok(())
    }
    
    #[test]
    fn test_odd_inner_level() -> Result<()> {
        // 6 leaves -> 3 parents, the third parent pairs with itself
        let input = digests(6);
        let leaves: Vec<Hash256> = input.iter().map(|d| Hash256::hash(d.as_bytes())).collect();
        let p0 = parent(&leaves[0], &leaves[1]);
        let p1 = parent(&leaves[2], &leaves[3]);
        let p2 = parent(&leaves[4], &leaves[5]);
        let expected = parent(&parent(&p0, &p1), &parent(&p2, &p2));
        
        assert_eq!(merkle_root(&input)?, expected);
        Ok(())
    }
}
