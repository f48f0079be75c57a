use crate::crypto::keys::{KeyPair, PrivateKey};
use crate::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredKey {
    private_key: String, // hex
    created_at: i64,
}

/// Key pairs kept in a JSON file, indexed by address.
#[derive(Debug)]
pub struct Wallets {
    path: PathBuf,
    keys: BTreeMap<String, StoredKey>,
}

impl Wallets {
    /// Loads `path`, or starts empty if the file does not exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let keys = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            BTreeMap::new()
        };
        
        Ok(Self { path, keys })
    }
    
    pub fn create_wallet(&mut self) -> Result<String> {
        let keypair = KeyPair::new()?;
        let address = keypair.address();
        
        self.keys.insert(address.clone(), StoredKey {
            private_key: hex::encode(keypair.private_key.to_bytes()),
            created_at: chrono::Utc::now().timestamp(),
        });
        
        log::debug!("🔑 Created wallet {}", address);
        Ok(address)
    }
    
    pub fn addresses(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }
    
    pub fn get(&self, address: &str) -> Result<Option<KeyPair>> {
        let Some(stored) = self.keys.get(address) else {
            return Ok(None);
        };
        
        let bytes = hex::decode(&stored.private_key)
            .map_err(|e| LedgerError::Wallet(format!("Corrupt key for {}: {}", address, e)))?;
        Ok(Some(KeyPair::from_private_key(PrivateKey::from_bytes(&bytes)?)))
    }
    
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        
        let content = serde_json::to_string_pretty(&self.keys)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
