use crate::crypto::hash::{Hash160, Hash256};
use crate::{LedgerError, Result};
use rand::{rngs::OsRng, RngCore};
use secp256k1::{PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address version byte (P2PKH style).
const ADDRESS_VERSION: u8 = 0x00;
const CHECKSUM_LEN: usize = 4;
const ADDRESS_PAYLOAD_LEN: usize = 1 + 20 + CHECKSUM_LEN;

#[derive(Debug, Clone)]
pub struct PrivateKey {
    key: SecretKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key: Vec<u8>, // Compressed SEC1 encoding
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

impl PrivateKey {
    pub fn new() -> Result<Self> {
        let mut secret_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut secret_bytes);
        Self::from_bytes(&secret_bytes)
    }
    
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(LedgerError::Crypto("Private key must be 32 bytes".to_string()));
        }
        
        let secret_key = SecretKey::from_slice(bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid private key: {}", e)))?;
        
        Ok(Self { key: secret_key })
    }
    
    pub fn to_bytes(&self) -> [u8; 32] {
        self.key.secret_bytes()
    }
    
    pub fn public_key(&self) -> PublicKey {
        let secp = Secp256k1::new();
        let public_key = Secp256k1PublicKey::from_secret_key(&secp, &self.key);
        
        PublicKey {
            key: public_key.serialize().to_vec(),
        }
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Secp256k1PublicKey::from_slice(bytes)
            .map_err(|e| LedgerError::Crypto(format!("Invalid public key: {}", e)))?;
        
        Ok(Self {
            key: bytes.to_vec(),
        })
    }
    
    pub fn to_bytes(&self) -> &[u8] {
        &self.key
    }
    
    pub fn hash160(&self) -> Hash160 {
        Hash160::hash_sha256(&self.key)
    }
    
    pub fn to_address(&self) -> String {
        key_hash_to_address(&self.hash160())
    }
}

impl KeyPair {
    pub fn new() -> Result<Self> {
        let private_key = PrivateKey::new()?;
        Ok(Self::from_private_key(private_key))
    }
    
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        
        Self {
            private_key,
            public_key,
        }
    }
    
    pub fn address(&self) -> String {
        self.public_key.to_address()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.key))
    }
}

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let hash = Hash256::double_hash(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&hash.as_bytes()[..CHECKSUM_LEN]);
    out
}

/// Base58Check(version || key_hash || checksum)
pub fn key_hash_to_address(key_hash: &Hash160) -> String {
    let mut data = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
    data.push(ADDRESS_VERSION);
    data.extend_from_slice(key_hash.as_bytes());
    let check = checksum(&data);
    data.extend_from_slice(&check);
    
    bs58::encode(data).into_string()
}

pub fn address_to_hash160(address: &str) -> Result<Hash160> {
    let decoded = bs58::decode(address).into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", address, e)))?;
    
    if decoded.len() != ADDRESS_PAYLOAD_LEN || decoded[0] != ADDRESS_VERSION {
        return Err(LedgerError::InvalidAddress(address.to_string()));
    }
    
    let (payload, check) = decoded.split_at(ADDRESS_PAYLOAD_LEN - CHECKSUM_LEN);
    if &checksum(payload)[..] != check {
        return Err(LedgerError::InvalidAddress(format!("{}: bad checksum", address)));
    }
    
    Hash160::from_slice(&payload[1..])
        .ok_or_else(|| LedgerError::InvalidAddress(address.to_string()))
}

pub fn is_valid_address(address: &str) -> bool {
    address_to_hash160(address).is_ok()
}
