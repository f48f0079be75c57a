use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest. Ordering is byte-wise, which is the same as comparing the
/// digests as 256-bit big-endian integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
    
    /// The empty hash. Used as the previous hash of the genesis block.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }
    
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
    
    pub fn hash(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }
    
    pub fn double_hash(data: &[u8]) -> Self {
        let first_hash = Self::hash(data);
        Self::hash(first_hash.as_bytes())
    }
    
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
    
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
    
    pub fn from_hex(hex_str: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_slice(&bytes).ok_or(hex::FromHexError::InvalidStringLength)
    }
    
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let array: [u8; 32] = slice.try_into().ok()?;
        Some(Self(array))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

pub trait Hashable {
    fn hash(&self) -> Hash256;
}

/// RIPEMD160(SHA256(x)). Outputs are locked to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash160([u8; 20]);

impl Hash160 {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
    
    pub fn hash_sha256(data: &[u8]) -> Self {
        let sha256_hash = Hash256::hash(data);
        Self(Ripemd160::digest(sha256_hash.as_bytes()).into())
    }
    
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let array: [u8; 20] = slice.try_into().ok()?;
        Some(Self(array))
    }
    
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
    
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
